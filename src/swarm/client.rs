use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;

use crate::error::{Error, Result};

/// Bounded timeout for drone-bound and queen-bound calls. Task forwards
/// and registrations are not on the election hot path, so they get more
/// slack than raft traffic.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct Registration<'a> {
    address: &'a str,
    /// Marks a registration another queen is relaying; the receiver must
    /// not forward it again. Elided on the wire for drone-originated
    /// requests so their body stays a bare address.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    proxied: bool,
}

#[derive(Serialize)]
struct Task<'a> {
    text: &'a str,
}

/// JSON/HTTP client for the task-dispatch side of the hive: registering
/// with a queen and handing tasks to drones.
pub struct HiveClient {
    http: reqwest::Client,
}

impl HiveClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http })
    }

    /// Registers `address` with the queen at `queen`. Returns the HTTP
    /// status so the caller can tell rejection from acceptance; transport
    /// failures bubble up as errors.
    pub async fn register(&self, queen: &str, address: &str) -> Result<StatusCode> {
        self.post_registration(queen, &Registration { address, proxied: false }).await
    }

    /// Relays a registration this queen accepted on behalf of the leader.
    /// The marker caps a forwarding chain at one hop: the receiver settles
    /// the registration itself instead of proxying again.
    pub async fn proxy_register(&self, queen: &str, address: &str) -> Result<StatusCode> {
        self.post_registration(queen, &Registration { address, proxied: true }).await
    }

    async fn post_registration(
        &self,
        queen: &str,
        registration: &Registration<'_>,
    ) -> Result<StatusCode> {
        let url = format!("http://{}/register", queen);
        let resp = self.http.post(&url).json(registration).send().await?;
        Ok(resp.status())
    }

    /// Hands a task to the drone at `addr`.
    pub async fn forward_task(&self, addr: &str, text: &str) -> Result<()> {
        let url = format!("http://{}/do_task", addr);
        let resp = self.http.post(&url).json(&Task { text }).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Network(format!(
                "drone at {} refused task: {}",
                addr,
                resp.status()
            )));
        }
        Ok(())
    }
}
