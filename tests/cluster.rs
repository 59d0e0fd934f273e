use std::sync::Arc;
use std::time::Duration;

use hive::server;
use hive::swarm::{drone, drone_name, Node};
use tokio::task::JoinHandle;

/// Asks the OS for distinct free loopback ports, then releases them for
/// the nodes under test to take.
fn free_ports(n: usize) -> Vec<u16> {
    let listeners: Vec<std::net::TcpListener> =
        (0..n).map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap()).collect();
    listeners.iter().map(|listener| listener.local_addr().unwrap().port()).collect()
}

async fn healthz(client: &reqwest::Client, addr: &str) -> Option<serde_json::Value> {
    let resp = client.get(format!("http://{}/healthz", addr)).send().await.ok()?;
    resp.json().await.ok()
}

/// Waits until the node answers its health endpoint.
async fn wait_serving(client: &reqwest::Client, addr: &str) {
    for _ in 0..50 {
        if healthz(client, addr).await.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("node at {} never started serving", addr);
}

/// Starts a queen with explicit task handles so tests can kill it.
fn spawn_queen(addr: &str, roster: &[String]) -> (Arc<Node>, Vec<JoinHandle<()>>) {
    let node = Node::queen(addr.to_string(), roster.to_vec()).unwrap();
    let raft = Arc::clone(node.raft().unwrap());
    let driver = tokio::spawn(raft.run());
    let serving = {
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            server::serve(node).await.unwrap();
        })
    };
    node.set_ready();
    (node, vec![driver, serving])
}

/// Polls the roster until exactly one leader and n-1 followers are seen.
/// Polling itself refreshes each node's election timer, so the interval
/// stays above the maximum election timeout.
async fn await_settled(
    client: &reqwest::Client,
    addrs: &[String],
    deadline: Duration,
) -> (String, u64) {
    let start = tokio::time::Instant::now();
    loop {
        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut leader = None;
        let mut followers = 0;
        for addr in addrs {
            match healthz(client, addr).await {
                Some(health) => match health["raft_state"].as_str() {
                    Some("LEADER") => {
                        leader = Some((addr.clone(), health["raft_term"].as_u64().unwrap()))
                    }
                    Some("FOLLOWER") => followers += 1,
                    _ => {}
                },
                None => {}
            }
        }
        if let Some((addr, term)) = leader {
            if followers == addrs.len() - 1 {
                return (addr, term);
            }
        }
        if start.elapsed() > deadline {
            panic!("cluster did not settle on a single leader within {:?}", deadline);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_queens_elect_exactly_one_leader() {
    let ports = free_ports(3);
    let addrs: Vec<String> = ports.iter().map(|p| format!("127.0.0.1:{}", p)).collect();
    for addr in &addrs {
        spawn_queen(addr, &addrs);
    }
    let client = reqwest::Client::new();
    for addr in &addrs {
        wait_serving(&client, addr).await;
    }
    let (_, term) = await_settled(&client, &addrs, Duration::from_secs(4)).await;
    assert!(term >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surviving_queens_reelect_at_a_higher_term() {
    let ports = free_ports(3);
    let addrs: Vec<String> = ports.iter().map(|p| format!("127.0.0.1:{}", p)).collect();
    let mut cluster = Vec::new();
    for addr in &addrs {
        cluster.push((addr.clone(), spawn_queen(addr, &addrs)));
    }
    let client = reqwest::Client::new();
    for addr in &addrs {
        wait_serving(&client, addr).await;
    }
    let (leader, old_term) = await_settled(&client, &addrs, Duration::from_secs(4)).await;

    // Kill the leader: stop both its election driver and its server.
    for (addr, (_, handles)) in &cluster {
        if *addr == leader {
            for handle in handles {
                handle.abort();
            }
        }
    }
    let survivors: Vec<String> = addrs.iter().filter(|a| **a != leader).cloned().collect();
    let (_, new_term) = await_settled(&client, &survivors, Duration::from_secs(6)).await;
    assert!(new_term > old_term, "re-election must advance the term");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drone_registers_and_tasks_dispatch() {
    let ports = free_ports(2);
    let queen_addr = format!("127.0.0.1:{}", ports[0]);
    let drone_addr = format!("127.0.0.1:{}", ports[1]);

    let (queen, _handles) = spawn_queen(&queen_addr, &[]);
    let worker = Node::drone(drone_addr.clone()).unwrap();
    {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            server::serve(worker).await.unwrap();
        });
    }

    let client = reqwest::Client::new();
    wait_serving(&client, &queen_addr).await;
    wait_serving(&client, &drone_addr).await;

    drone::register_with_queen(worker.client(), &queen_addr, &drone_addr).await.unwrap();
    worker.set_ready();

    let health = healthz(&client, &queen_addr).await.unwrap();
    let drones = health["drones"].as_object().unwrap();
    assert_eq!(drones.len(), 1);
    assert_eq!(drones[&drone_addr], drone_name(&drone_addr));

    let resp = client
        .post(format!("http://{}/submit_task", queen_addr))
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "OK");

    // A lone queen elects itself once its first timeout fires.
    let health = healthz(&client, &queen_addr).await.unwrap();
    assert_eq!(health["mode"], "QUEEN");
    assert!(queen.registry().len() == 1);
}
