mod client;
mod dispatch;
pub mod drone;
mod monitor;
mod registry;

pub use client::HiveClient;
pub use dispatch::submit;
pub use registry::{drone_name, DroneRegistry};

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::raft::{PeerClient, Pulse, RaftNode};

/// The role a process runs as, fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Drone,
    Queen,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Drone => "DRONE",
            Mode::Queen => "QUEEN",
        }
    }
}

/// Whether bootstrap has completed: a drone is ready once registered with
/// its queen, a queen once its election driver is running and it serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NotReady,
    Ready,
}

impl Status {
    pub fn name(self) -> &'static str {
        match self {
            Status::NotReady => "NOT_READY",
            Status::Ready => "READY",
        }
    }
}

/// A running hive node.
///
/// Owns the identity, election engine, drone registry, and peer clients,
/// and is handed to request handlers by capability instead of living in
/// process globals.
pub struct Node {
    address: String,
    mode: Mode,
    status: Mutex<Status>,
    pulse: Arc<Pulse>,
    registry: DroneRegistry,
    client: HiveClient,
    probe: PeerClient,
    raft: Option<Arc<RaftNode>>,
}

impl Node {
    /// Builds a queen from the full roster supplied at startup.
    pub fn queen(address: String, roster: Vec<String>) -> Result<Arc<Node>> {
        let pulse = Arc::new(Pulse::new());
        let raft = RaftNode::new(address.clone(), roster, Arc::clone(&pulse))?;
        Ok(Arc::new(Node {
            address,
            mode: Mode::Queen,
            status: Mutex::new(Status::NotReady),
            pulse,
            registry: DroneRegistry::new(),
            client: HiveClient::new()?,
            probe: PeerClient::new()?,
            raft: Some(Arc::new(raft)),
        }))
    }

    /// Builds a drone. The registry and election engine stay dormant.
    pub fn drone(address: String) -> Result<Arc<Node>> {
        Ok(Arc::new(Node {
            address,
            mode: Mode::Drone,
            status: Mutex::new(Status::NotReady),
            pulse: Arc::new(Pulse::new()),
            registry: DroneRegistry::new(),
            client: HiveClient::new()?,
            probe: PeerClient::new()?,
            raft: None,
        }))
    }

    /// Spawns the long-lived queen activities: the election driver and the
    /// drone liveness monitor. A drone has neither.
    pub fn start(self: &Arc<Self>) {
        if let Some(raft) = &self.raft {
            tokio::spawn(Arc::clone(raft).run());
            tokio::spawn(monitor::run(Arc::clone(self)));
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    pub fn set_ready(&self) {
        *self.status.lock() = Status::Ready;
        info!("{} at {} is ready", self.mode.name(), self.address);
    }

    /// Records an inbound sign of life; local health checks count too.
    pub fn touch(&self) {
        self.pulse.touch();
    }

    pub fn last_heartbeat_ms(&self) -> u64 {
        self.pulse.last_ms()
    }

    pub fn registry(&self) -> &DroneRegistry {
        &self.registry
    }

    pub fn client(&self) -> &HiveClient {
        &self.client
    }

    pub fn probe_client(&self) -> &PeerClient {
        &self.probe
    }

    pub fn raft(&self) -> Option<&Arc<RaftNode>> {
        self.raft.as_ref()
    }

    pub fn is_leader(&self) -> bool {
        self.raft.as_ref().map_or(false, |raft| raft.is_leader())
    }

    /// Accepts a drone registration.
    ///
    /// Only the leader runs the liveness monitor, so an entry parked on a
    /// follower would never be probed or dispatched by the node that
    /// matters. A follower that knows the current leader therefore proxies
    /// the call there; with no leader in sight it keeps the entry locally
    /// rather than turn the drone away. A registration that arrives with
    /// the proxied marker is settled here no matter what this node thinks
    /// the leadership looks like: during a contested handoff two queens
    /// can each name the other as leader, and without the marker a
    /// registration would bounce between them until every hop timed out.
    pub async fn accept_registration(&self, address: &str, proxied: bool) -> Result<()> {
        if !proxied {
            if let Some(raft) = &self.raft {
                if !raft.is_leader() {
                    if let Some(leader) = raft.leader() {
                        if leader != self.address {
                            match self.client.proxy_register(&leader, address).await {
                                Ok(status) if status.is_success() => {
                                    info!(
                                        "proxied registration of {} to leader {}",
                                        address, leader
                                    );
                                    return Ok(());
                                }
                                Ok(status) => {
                                    return Err(Error::Network(format!(
                                        "leader at {} rejected registration: {}",
                                        leader, status
                                    )));
                                }
                                Err(err) => {
                                    warn!(
                                        "could not proxy registration to leader {}: {}, keeping locally",
                                        leader, err
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
        let name = self.registry.register(address);
        info!("registered drone {} as {}", address, name);
        Ok(())
    }
}
