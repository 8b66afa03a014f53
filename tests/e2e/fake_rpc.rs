//! In-process JSON-RPC server standing in for the nodes' RPC interfaces.
//!
//! One listener per node on consecutive ports, all sharing one storage map,
//! so a value written through any node becomes visible on every node after
//! the configured propagation delay.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use parity_scale_codec::Decode;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Minimum port for random test allocation.
pub const TEST_PORT_RANGE_MIN: u16 = 20_000;

/// Maximum port for random test allocation.
pub const TEST_PORT_RANGE_MAX: u16 = 60_000;

const BIND_ATTEMPTS: usize = 100;

/// Peer id reported by node 0 unless overridden.
pub const FAKE_PEER_ID: &str = "12D3KooWFakeBootnodePeerId";

/// Behaviour of the fake nodes.
#[derive(Debug, Clone)]
pub struct FakeRpcConfig {
    /// Peer id returned by `system_networkState`.
    pub peer_id: String,
    /// How long a written value stays invisible to reads.
    pub propagation_delay: Duration,
    /// Answer `author_submitExtrinsic` with an error envelope.
    pub reject_submissions: bool,
}

impl Default for FakeRpcConfig {
    fn default() -> Self {
        Self {
            peer_id: FAKE_PEER_ID.to_string(),
            propagation_delay: Duration::from_millis(200),
            reject_submissions: false,
        }
    }
}

/// A request seen by the fake server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// Index of the node whose port received it.
    pub node: usize,
    /// JSON-RPC method.
    pub method: String,
    /// Raw params.
    pub params: Value,
}

#[derive(Debug, Default)]
struct Shared {
    storage: HashMap<Vec<u8>, (Vec<u8>, Instant)>,
    requests: Vec<SeenRequest>,
}

#[derive(Clone)]
struct NodeState {
    node: usize,
    config: Arc<FakeRpcConfig>,
    shared: Arc<Mutex<Shared>>,
}

/// Handle to a running fake RPC network.
pub struct FakeRpc {
    base_port: u16,
    shared: Arc<Mutex<Shared>>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeRpc {
    /// Serve `node_count` fake nodes on consecutive local ports.
    pub async fn start(node_count: usize, config: FakeRpcConfig) -> Self {
        let (base_port, listeners) = bind_consecutive(node_count).await;
        let config = Arc::new(config);
        let shared = Arc::new(Mutex::new(Shared::default()));

        let tasks = listeners
            .into_iter()
            .enumerate()
            .map(|(node, listener)| {
                let state = NodeState {
                    node,
                    config: Arc::clone(&config),
                    shared: Arc::clone(&shared),
                };
                let app = Router::new().route("/", post(handle)).with_state(state);
                tokio::spawn(async move {
                    let _ = axum::serve(listener, app).await;
                })
            })
            .collect();

        Self {
            base_port,
            shared,
            tasks,
        }
    }

    /// RPC port of node 0.
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.shared.lock().unwrap().requests.clone()
    }

    /// Nodes that received a request for `method`.
    pub fn nodes_called(&self, method: &str) -> Vec<usize> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.node)
            .collect()
    }

    /// Stored value for `key`, regardless of visibility.
    pub fn stored(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.shared
            .lock()
            .unwrap()
            .storage
            .get(key)
            .map(|(value, _)| value.clone())
    }
}

impl Drop for FakeRpc {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn bind_consecutive(count: usize) -> (u16, Vec<TcpListener>) {
    let count_u16 = u16::try_from(count).unwrap();
    'attempt: for _ in 0..BIND_ATTEMPTS {
        let base =
            rand::thread_rng().gen_range(TEST_PORT_RANGE_MIN..TEST_PORT_RANGE_MAX - count_u16);
        let mut listeners = Vec::with_capacity(count);
        for offset in 0..count_u16 {
            match TcpListener::bind(("127.0.0.1", base + offset)).await {
                Ok(listener) => listeners.push(listener),
                Err(_) => continue 'attempt,
            }
        }
        return (base, listeners);
    }
    panic!("could not bind {count} consecutive ports");
}

async fn handle(State(state): State<NodeState>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let mut shared = state.shared.lock().unwrap();
    shared.requests.push(SeenRequest {
        node: state.node,
        method: method.clone(),
        params: params.clone(),
    });

    let reply = match method.as_str() {
        "system_networkState" => json!({
            "jsonrpc": "2.0",
            "result": { "networkState": { "peerId": state.config.peer_id } },
            "id": 1
        }),
        "state_getStorage" => {
            let key = params[0].as_str().map(decode_hex).unwrap_or_default();
            let value = shared
                .storage
                .get(&key)
                .filter(|(_, visible_at)| Instant::now() >= *visible_at)
                .map(|(value, _)| format!("0x{}", hex::encode(value)));
            json!({ "jsonrpc": "2.0", "result": value, "id": 1 })
        }
        "author_submitExtrinsic" if state.config.reject_submissions => json!({
            "jsonrpc": "2.0",
            "error": { "message": "invalid transaction", "code": 1010 },
            "id": 1
        }),
        "author_submitExtrinsic" => {
            let extrinsic = params.as_str().map(decode_hex).unwrap_or_default();
            match decode_storage_change(&extrinsic) {
                Some((key, Some(value))) => {
                    let visible_at = Instant::now() + state.config.propagation_delay;
                    shared.storage.insert(key, (value, visible_at));
                    json!({ "jsonrpc": "2.0", "result": "0x00", "id": 1 })
                }
                Some((key, None)) => {
                    shared.storage.remove(&key);
                    json!({ "jsonrpc": "2.0", "result": "0x00", "id": 1 })
                }
                None => json!({
                    "jsonrpc": "2.0",
                    "error": { "message": "could not decode extrinsic", "code": 1002 },
                    "id": 1
                }),
            }
        }
        _ => json!({
            "jsonrpc": "2.0",
            "error": { "message": "method not found", "code": -32601 },
            "id": 1
        }),
    };
    Json(reply)
}

fn decode_hex(value: &str) -> Vec<u8> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value)).unwrap_or_default()
}

type StorageChange = (Vec<u8>, Option<Vec<u8>>);

fn decode_storage_change(extrinsic: &[u8]) -> Option<StorageChange> {
    let (&tag, mut rest) = extrinsic.split_first()?;
    if tag != 3 {
        return None;
    }
    <StorageChange as Decode>::decode(&mut rest).ok()
}
