use std::time::Duration;

use serde::Serialize;

use crate::error::Result;

/// Transport timeout for vote and heartbeat calls, kept below the leader
/// tick interval so a dead peer cannot stall a round.
const RPC_TIMEOUT: Duration = Duration::from_millis(100);
/// Health probes tolerate slower nodes than election traffic does.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Outcome of a vote solicitation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vote {
    Granted,
    Rejected,
    Unreachable,
}

#[derive(Serialize)]
struct VoteRequest<'a> {
    candidate: &'a str,
    term: u64,
}

#[derive(Serialize)]
struct AppendEntriesRequest<'a> {
    leader: &'a str,
    term: u64,
    entries: &'a [String],
}

/// JSON/HTTP client for traffic between cluster nodes.
///
/// Every call is synchronous per peer with a bounded timeout; callers fan
/// out across peers concurrently.
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self { http })
    }

    /// Checks whether a node answers its health endpoint.
    pub async fn probe(&self, addr: &str) -> bool {
        let url = format!("http://{}/healthz", addr);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Solicits a vote from one peer. Any HTTP reply that is not a success
    /// counts as a rejection; transport failures count as no vote.
    pub async fn request_vote(&self, addr: &str, candidate: &str, term: u64) -> Vote {
        let url = format!("http://{}/request_vote", addr);
        let body = VoteRequest { candidate, term };
        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => Vote::Granted,
            Ok(_) => Vote::Rejected,
            Err(_) => Vote::Unreachable,
        }
    }

    /// Sends one empty AppendEntries heartbeat. Returns whether the peer
    /// acknowledged it.
    pub async fn append_entries(&self, addr: &str, leader: &str, term: u64) -> bool {
        let url = format!("http://{}/append_entries", addr);
        let body = AppendEntriesRequest { leader, term, entries: &[] };
        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
