use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::swarm::Node;

/// Time between liveness sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Probe attempts per drone before it is marked dead.
const MAX_RETRY: u32 = 5;
/// Pause between consecutive probes of the same drone.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Periodically probes every registered drone and evicts the silent ones.
///
/// Only an acting leader sweeps; a follower keeps sleeping and re-checking
/// its role, so a leadership change picks the monitor up or lays it down
/// within one interval.
pub async fn run(node: Arc<Node>) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;
        if !node.is_leader() {
            continue;
        }
        sweep(&node).await;
    }
}

/// One pass over a registry snapshot. Dead drones are collected and then
/// evicted in a single registry mutation.
pub async fn sweep(node: &Node) {
    let drones = node.registry().snapshot();
    if drones.is_empty() {
        return;
    }
    debug!("starting liveness sweep over {} drones", drones.len());
    let mut dead = Vec::new();
    for (addr, name) in drones {
        if !probe_with_retry(node, &addr, &name).await {
            dead.push(addr);
        }
    }
    if !dead.is_empty() {
        node.registry().evict(&dead);
        for addr in &dead {
            info!("removed {} from drone list", addr);
        }
    }
}

async fn probe_with_retry(node: &Node, addr: &str, name: &str) -> bool {
    for attempt in 1..=MAX_RETRY {
        if node.probe_client().probe(addr).await {
            debug!("check-in from {} ({})", addr, name);
            return true;
        }
        warn!("could not check {} ({}) on attempt {}/{}", addr, name, attempt, MAX_RETRY);
        if attempt < MAX_RETRY {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }
    info!("marking {} ({}) for removal from drone list", addr, name);
    false
}
