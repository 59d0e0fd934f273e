use std::time::Duration;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::swarm::HiveClient;

/// How long to wait before retrying an unreachable queen.
const REGISTER_RETRY: Duration = Duration::from_secs(10);

/// Registers this drone with its queen, retrying forever while the queen
/// is unreachable.
///
/// A definitive rejection (HTTP >= 300) is fatal: the roster or address is
/// wrong, and looping would never fix it, so the error is returned for the
/// process to exit on.
pub async fn register_with_queen(client: &HiveClient, queen: &str, address: &str) -> Result<()> {
    loop {
        match client.register(queen, address).await {
            Ok(status) if status.as_u16() < 300 => {
                info!("registered to {}", queen);
                return Ok(());
            }
            Ok(status) => {
                return Err(Error::Config(format!(
                    "queen at {} rejected registration: {}",
                    queen, status
                )));
            }
            Err(err) => {
                warn!(
                    "could not register to queen at {}: {}, retrying in {}s",
                    queen,
                    err,
                    REGISTER_RETRY.as_secs()
                );
                tokio::time::sleep(REGISTER_RETRY).await;
            }
        }
    }
}

/// Handles one accepted task.
///
/// Execution beyond acknowledgement is the extension point of the system;
/// for now receipt is recorded in the log.
pub fn execute(text: &str) {
    info!("task received: {}", text);
}
