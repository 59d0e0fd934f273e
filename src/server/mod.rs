use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::net;
use crate::swarm::{self, drone, Mode, Node};

#[derive(Deserialize)]
struct RegisterRequest {
    address: Option<String>,
    /// Set by a queen relaying a registration to the leader it knows; the
    /// receiver settles it locally instead of forwarding another hop.
    #[serde(default)]
    proxied: bool,
}

#[derive(Deserialize)]
struct TaskRequest {
    text: Option<String>,
}

#[derive(Deserialize)]
struct VoteRequest {
    candidate: Option<String>,
    term: Option<u64>,
}

#[derive(Deserialize)]
struct AppendEntriesRequest {
    leader: Option<String>,
    term: Option<u64>,
    #[allow(dead_code)]
    entries: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct OkReply {
    result: &'static str,
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    mode: &'static str,
    last_heartbeat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    drones: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raft_state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raft_term: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leader: Option<String>,
}

fn ok() -> Response {
    (StatusCode::OK, Json(OkReply { result: "OK" })).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorReply { error: message.into() })).into_response()
}

/// Builds the node's public HTTP surface.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/submit_task", post(submit_task))
        .route("/do_task", post(do_task))
        .route("/request_vote", post(request_vote))
        .route("/append_entries", post(append_entries))
        .with_state(node)
}

/// Binds the node's address and serves until the process is terminated.
pub async fn serve(node: Arc<Node>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(node.address()).await?;
    info!("{} listening on {}", node.mode().name(), node.address());
    axum::serve(listener, router(node)).await?;
    Ok(())
}

/// GET /healthz. Answering a health check counts as hearing from the
/// cluster, so the election timer is refreshed as a side effect.
async fn healthz(State(node): State<Arc<Node>>) -> Response {
    node.touch();
    let mut health = Health {
        status: node.status().name(),
        version: env!("CARGO_PKG_VERSION"),
        mode: node.mode().name(),
        last_heartbeat: node.last_heartbeat_ms(),
        drones: None,
        raft_state: None,
        raft_term: None,
        leader: None,
    };
    if node.mode() == Mode::Queen {
        health.drones = Some(node.registry().snapshot());
        if let Some(raft) = node.raft() {
            health.raft_state = Some(raft.role_name());
            health.raft_term = Some(raft.term());
            health.leader = raft.leader();
        }
    }
    Json(health).into_response()
}

/// POST /register. Queen only.
async fn register(
    State(node): State<Arc<Node>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return bad_request("expected JSON body with an address field");
    };
    if node.mode() == Mode::Drone {
        return bad_request("In drone mode, not taking registration");
    }
    let Some(address) = request.address else {
        return bad_request("missing address");
    };
    if let Err(err) = net::validate_host_port(&address) {
        return bad_request(err.to_string());
    }
    match node.accept_registration(&address, request.proxied).await {
        Ok(()) => ok(),
        Err(err) => bad_request(err.to_string()),
    }
}

/// POST /submit_task. Queen only; forwards to a random registered drone.
async fn submit_task(
    State(node): State<Arc<Node>>,
    payload: std::result::Result<Json<TaskRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return bad_request("expected JSON body with a text field");
    };
    if node.mode() == Mode::Drone {
        return bad_request("In drone mode, not scheduling tasks");
    }
    let Some(text) = request.text.filter(|text| !text.is_empty()) else {
        return bad_request("missing task text");
    };
    match swarm::submit(&node, &text).await {
        Ok(()) => ok(),
        Err(err) => bad_request(err.to_string()),
    }
}

/// POST /do_task. Drone only.
async fn do_task(
    State(node): State<Arc<Node>>,
    payload: std::result::Result<Json<TaskRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return bad_request("expected JSON body with a text field");
    };
    if node.mode() == Mode::Queen {
        return bad_request("In queen mode, not taking tasks");
    }
    let Some(text) = request.text.filter(|text| !text.is_empty()) else {
        return bad_request("missing task text");
    };
    drone::execute(&text);
    ok()
}

/// POST /request_vote. Queen only. Rejections answer with HTTP 300 for
/// wire compatibility with existing peers.
async fn request_vote(
    State(node): State<Arc<Node>>,
    payload: std::result::Result<Json<VoteRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return bad_request("expected JSON body with candidate and term fields");
    };
    let Some(raft) = node.raft() else {
        return bad_request("In drone mode, not voting");
    };
    let (Some(candidate), Some(term)) = (request.candidate, request.term) else {
        return bad_request("missing candidate or term");
    };
    if raft.handle_request_vote(&candidate, term) {
        ok()
    } else {
        (StatusCode::MULTIPLE_CHOICES, Json(ErrorReply { error: "vote rejected".to_string() }))
            .into_response()
    }
}

/// POST /append_entries. Queen only. Entries are always empty in this
/// cluster; the message is a leadership heartbeat.
async fn append_entries(
    State(node): State<Arc<Node>>,
    payload: std::result::Result<Json<AppendEntriesRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return bad_request("expected JSON body with leader and term fields");
    };
    let Some(raft) = node.raft() else {
        return bad_request("In drone mode, not following leaders");
    };
    let (Some(leader), Some(term)) = (request.leader, request.term) else {
        return bad_request("missing leader or term");
    };
    if raft.handle_append_entries(&leader, term) {
        ok()
    } else {
        bad_request("stale term")
    }
}
