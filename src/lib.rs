pub mod error;
pub mod net;
pub mod raft;
pub mod server;
pub mod swarm;
