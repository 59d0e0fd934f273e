use log::{info, warn};

use crate::error::{Error, Result};
use crate::swarm::Node;

/// Picks a random registered drone and forwards the task to it.
///
/// The registry lock is held only for the pick; the forward happens after
/// release so a slow drone cannot stall registration or eviction. Forward
/// failures are logged but not surfaced: dispatch is best-effort
/// at-most-once, and the eviction sweep is what retires dead drones.
pub async fn submit(node: &Node, text: &str) -> Result<()> {
    let (addr, name) = node
        .registry()
        .pick_one()
        .ok_or_else(|| Error::Internal("no drones registered".to_string()))?;
    match node.client().forward_task(&addr, text).await {
        Ok(()) => info!("sent task to {}", name),
        Err(err) => warn!("failed to forward task to {} ({}): {}", name, addr, err),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::Node;

    #[tokio::test]
    async fn submit_with_empty_registry_fails() {
        let node = Node::queen("10.0.0.1:8080".to_string(), vec![]).unwrap();
        assert!(submit(&node, "hello").await.is_err());
    }

    #[tokio::test]
    async fn submit_swallows_forward_failure() {
        // The drone is unreachable, but a drone was selectable, so the
        // dispatcher still acknowledges.
        let node = Node::queen("10.0.0.1:8080".to_string(), vec![]).unwrap();
        node.registry().register("127.0.0.1:1");
        assert!(submit(&node, "hello").await.is_ok());
    }
}
