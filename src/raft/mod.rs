mod client;
mod clock;

pub use client::{PeerClient, Vote};
pub use clock::{election_timeout, Clock, Pulse};

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info};
use parking_lot::Mutex;

use crate::error::Result;

/// The interval between leader heartbeat broadcasts.
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);
/// How often a follower re-checks its election timer.
const FOLLOWER_TICK: Duration = Duration::from_millis(10);

/// The local election state machine.
pub enum Role {
    Follower {
        /// The leader's address, or None if none has been heard from.
        leader: Option<String>,
    },
    Candidate,
    Leader,
}

impl Role {
    fn init_follower() -> Role {
        Role::Follower { leader: None }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Follower { .. } => "FOLLOWER",
            Role::Candidate => "CANDIDATE",
            Role::Leader => "LEADER",
        }
    }
}

/// Role and term move together under one lock; the election timer lives
/// with them since it is re-randomized on every candidacy.
struct ElectionState {
    role: Role,
    term: u64,
    timeout: Duration,
}

/// A queen's election engine.
///
/// One driver task advances the state machine; inbound messages mutate it
/// through the handler methods. The lock is never held across network I/O.
pub struct RaftNode {
    /// Our own host:port identity.
    id: String,
    /// The other queens. Never contains self.
    peers: Vec<String>,
    client: PeerClient,
    state: Mutex<ElectionState>,
    pulse: Arc<Pulse>,
}

impl RaftNode {
    pub fn new(id: String, mut peers: Vec<String>, pulse: Arc<Pulse>) -> Result<Self> {
        // A roster that lists ourselves would make us vote for and
        // heartbeat ourselves over HTTP; drop the entry.
        peers.retain(|peer| peer != &id);
        info!("queen {} joining cluster of {} peers", id, peers.len());
        Ok(Self {
            id,
            peers,
            client: PeerClient::new()?,
            state: Mutex::new(ElectionState {
                role: Role::init_follower(),
                term: 0,
                timeout: election_timeout(),
            }),
            pulse,
        })
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state.lock().role, Role::Leader)
    }

    pub fn role_name(&self) -> &'static str {
        self.state.lock().role.name()
    }

    pub fn term(&self) -> u64 {
        self.state.lock().term
    }

    /// The leader address this node currently believes in, if any.
    pub fn leader(&self) -> Option<String> {
        match &self.state.lock().role {
            Role::Leader => Some(self.id.clone()),
            Role::Follower { leader } => leader.clone(),
            Role::Candidate => None,
        }
    }

    /// Votes needed to win: a strict majority of the queen cluster,
    /// counting ourselves.
    fn quorum(&self) -> u64 {
        (self.peers.len() as u64 + 1) / 2 + 1
    }

    /// Handles an inbound RequestVote. Grants iff the candidate's term is
    /// strictly newer than ours; granting adopts the term and demotes any
    /// role to follower. Every well-formed request counts as hearing from
    /// the cluster.
    pub fn handle_request_vote(&self, candidate: &str, term: u64) -> bool {
        self.pulse.touch();
        let mut state = self.state.lock();
        if term <= state.term {
            debug!(
                "rejecting vote for {} at term {}, already at term {}",
                candidate, term, state.term
            );
            return false;
        }
        state.term = term;
        state.role = Role::init_follower();
        info!("granted vote to {} for term {}", candidate, term);
        true
    }

    /// Handles an inbound AppendEntries heartbeat. Stale terms are
    /// rejected; a current or newer term refreshes the election timer,
    /// records the sender as leader, and demotes a candidate (or, on a
    /// strictly newer term, a leader) to follower.
    pub fn handle_append_entries(&self, leader: &str, term: u64) -> bool {
        let mut state = self.state.lock();
        if term < state.term {
            debug!(
                "rejecting heartbeat from {} at stale term {}, at term {}",
                leader, term, state.term
            );
            return false;
        }
        let demote = term > state.term || matches!(state.role, Role::Candidate);
        state.term = term;
        if demote {
            info!("following {} at term {}", leader, term);
            state.role = Role::Follower { leader: Some(leader.to_string()) };
        } else if let Role::Follower { leader: known } = &mut state.role {
            *known = Some(leader.to_string());
        }
        drop(state);
        self.pulse.touch();
        true
    }

    /// Drives the state machine until the process exits.
    pub async fn run(self: Arc<Self>) {
        loop {
            let (is_leader, timed_out) = {
                let state = self.state.lock();
                match state.role {
                    Role::Leader => (true, false),
                    Role::Follower { .. } => {
                        (false, self.pulse.elapsed_ms() > state.timeout.as_millis() as u64)
                    }
                    // Candidacy begins and ends inside campaign(), below.
                    Role::Candidate => (false, false),
                }
            };
            if is_leader {
                self.broadcast_heartbeats();
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            } else if timed_out {
                self.campaign().await;
            } else {
                tokio::time::sleep(FOLLOWER_TICK).await;
            }
        }
    }

    /// Runs one election round: bump the term, solicit votes from every
    /// peer in parallel, and tally once every reply (grant, rejection, or
    /// timeout) is in.
    async fn campaign(&self) {
        let term = {
            let mut state = self.state.lock();
            state.term += 1;
            state.role = Role::Candidate;
            state.timeout = election_timeout();
            state.term
        };
        self.pulse.touch();
        info!("election timeout reached, campaigning in term {}", term);

        let mut requests: FuturesUnordered<_> = self
            .peers
            .iter()
            .map(|peer| self.client.request_vote(peer, &self.id, term))
            .collect();
        let mut granted: u64 = 1; // our own vote
        while let Some(vote) = requests.next().await {
            if vote == Vote::Granted {
                granted += 1;
            }
        }
        drop(requests);

        let mut state = self.state.lock();
        // A heartbeat may have demoted us while the round was in flight;
        // votes collected for a dead candidacy are void.
        if !matches!(state.role, Role::Candidate) || state.term != term {
            info!("demoted during term {} vote round, discarding votes", term);
            return;
        }
        if granted >= self.quorum() {
            info!("won election for term {} with {} of {} votes", term, granted, self.peers.len() + 1);
            state.role = Role::Leader;
        } else {
            debug!("lost election for term {} with {} votes", term, granted);
            state.role = Role::init_follower();
        }
    }

    /// Fans out one empty AppendEntries to every peer, fire-and-forget.
    /// Replies are ignored; only inbound traffic can change our state.
    fn broadcast_heartbeats(self: &Arc<Self>) {
        let term = {
            let state = self.state.lock();
            if !matches!(state.role, Role::Leader) {
                return;
            }
            state.term
        };
        for peer in &self.peers {
            let node = Arc::clone(self);
            let peer = peer.clone();
            tokio::spawn(async move {
                if !node.client.append_entries(&peer, &node.id, term).await {
                    debug!("heartbeat to {} not acknowledged", peer);
                }
            });
        }
    }
}
