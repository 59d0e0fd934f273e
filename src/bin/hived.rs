use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::error;

use hive::error::{Error, Result};
use hive::net;
use hive::server;
use hive::swarm::{drone, Node};

/// Hive node daemon. Runs as a drone worker by default, or as a member of
/// the queen controller cluster with --queen.
#[derive(Parser, Debug)]
#[command(name = "hived", version, about = "Hive task-dispatch node")]
struct Args {
    /// Start this node in queen mode.
    #[arg(long)]
    queen: bool,

    /// Host and port of the queen to register with, e.g. 127.0.0.1:8080.
    /// Required in drone mode.
    #[arg(long = "queen-host", required_unless_present = "queen")]
    queen_host: Option<String>,

    /// The full queen roster, host:port each. Required in queen mode; an
    /// entry for this node itself is ignored.
    #[arg(long = "queen-list", num_args = 1.., required_if_eq("queen", "true"))]
    queen_list: Vec<String>,

    /// Network interface whose IPv4 address identifies this node.
    #[arg(long, required_unless_present = "host")]
    interface: Option<String>,

    /// Explicit IPv4 address, bypassing interface discovery.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!("{}", err);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let ip: Ipv4Addr = match (&args.host, &args.interface) {
        (Some(host), _) => host.parse()?,
        (None, Some(interface)) => net::interface_ipv4(interface)?,
        (None, None) => {
            return Err(Error::Config("either --interface or --host is required".to_string()))
        }
    };
    let address = format!("{}:{}", ip, args.port);

    if args.queen {
        for peer in &args.queen_list {
            net::validate_host_port(peer)?;
        }
        let node = Node::queen(address, args.queen_list)?;
        node.start();
        node.set_ready();
        server::serve(node).await
    } else {
        let queen_host = args
            .queen_host
            .ok_or_else(|| Error::Config("--queen-host is required in drone mode".to_string()))?;
        net::validate_host_port(&queen_host)?;
        let node = Node::drone(address.clone())?;
        let serving = tokio::spawn(server::serve(Arc::clone(&node)));
        drone::register_with_queen(node.client(), &queen_host, &address).await?;
        node.set_ready();
        serving.await.map_err(|err| Error::Internal(err.to_string()))?
    }
}
