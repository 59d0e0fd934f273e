use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Looks up the IPv4 address assigned to the named network interface.
///
/// The node's identity is derived from this address plus the listening
/// port; callers may bypass discovery entirely with an explicit address.
pub fn interface_ipv4(name: &str) -> Result<Ipv4Addr> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|err| Error::Config(format!("cannot enumerate interfaces: {}", err)))?;
    for ifaddr in addrs {
        if ifaddr.interface_name != name {
            continue;
        }
        if let Some(addr) = ifaddr.address {
            if let Some(sin) = addr.as_sockaddr_in() {
                return Ok(Ipv4Addr::from(sin.ip()));
            }
        }
    }
    Err(Error::Config(format!("no IPv4 address on interface {}", name)))
}

/// Checks that an address is a plausible `host:port` pair.
///
/// Reachability is deliberately not verified; registration accepts
/// addresses the liveness monitor may later evict.
pub fn validate_host_port(addr: &str) -> Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| Error::Parse(format!("invalid address {:?}, expected host:port", addr)))?;
    if host.is_empty() {
        return Err(Error::Parse(format!("invalid address {:?}, empty host", addr)));
    }
    if port.parse::<u16>().is_err() {
        return Err(Error::Parse(format!("invalid port in address {:?}", addr)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_host_port() {
        assert!(validate_host_port("127.0.0.1:8080").is_ok());
        assert!(validate_host_port("worker.local:9001").is_ok());
    }

    #[test]
    fn invalid_host_port() {
        assert!(validate_host_port("").is_err());
        assert!(validate_host_port("127.0.0.1").is_err());
        assert!(validate_host_port(":8080").is_err());
        assert!(validate_host_port("127.0.0.1:").is_err());
        assert!(validate_host_port("127.0.0.1:notaport").is_err());
        assert!(validate_host_port("127.0.0.1:99999").is_err());
    }

    #[test]
    fn unknown_interface() {
        assert!(interface_ipv4("definitely-not-an-interface0").is_err());
    }
}
