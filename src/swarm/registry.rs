use std::collections::HashMap;

use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use sha1::{Digest, Sha1};

/// Derives the stable name for a drone address.
pub fn drone_name(address: &str) -> String {
    format!("drone-{}", hex::encode(Sha1::digest(address.as_bytes())))
}

/// The queen-local mapping of drone address to drone name.
///
/// All mutation is serialized under one mutex, and readers take atomic
/// snapshots; nothing here is ever persisted.
#[derive(Default)]
pub struct DroneRegistry {
    drones: Mutex<HashMap<String, String>>,
}

impl DroneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a drone, returning its name. Re-registration
    /// is idempotent since the name is a pure function of the address.
    pub fn register(&self, address: &str) -> String {
        let name = drone_name(address);
        self.drones.lock().insert(address.to_string(), name.clone());
        name
    }

    /// Picks a uniformly random drone, or None when the registry is empty.
    pub fn pick_one(&self) -> Option<(String, String)> {
        let drones = self.drones.lock();
        drones
            .iter()
            .choose(&mut rand::thread_rng())
            .map(|(addr, name)| (addr.clone(), name.clone()))
    }

    /// An atomic copy of the mapping, for health reports and probing.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.drones.lock().clone()
    }

    /// Drops the given addresses in one pass.
    pub fn evict(&self, addresses: &[String]) {
        let mut drones = self.drones.lock();
        for address in addresses {
            drones.remove(address);
        }
    }

    pub fn len(&self) -> usize {
        self.drones.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.lock().is_empty()
    }
}
