//! Nullable chain node: scripted JSON-RPC replies, every request recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use srt_ledger::{ChainRpc, LedgerError};

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Clone, Debug)]
enum Reply {
    Result(Value),
    Error { code: i64, message: String },
}

/// One request received by the null node.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

#[derive(Default)]
struct Script {
    once: HashMap<String, VecDeque<Reply>>,
    defaults: HashMap<String, Reply>,
    calls: Vec<RecordedCall>,
    latency: Option<Duration>,
    /// When set, raw transactions are "mined" immediately with this status.
    auto_mine: Option<bool>,
    mined: HashMap<String, bool>,
    sent: u64,
}

/// A chain node for tests.
///
/// Replies are resolved in order: queued one-shot replies, then per-method
/// defaults, then auto-mining (for `eth_sendRawTransaction` and
/// `eth_getTransactionReceipt`), otherwise "method not found".
#[derive(Default)]
pub struct NullChainNode {
    script: Mutex<Script>,
}

impl NullChainNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// A node that accepts and mines every reward transaction successfully.
    pub fn with_reward_flow() -> Self {
        let node = Self::new();
        node.respond("eth_estimateGas", json!("0x186a0"));
        node.respond("eth_getTransactionCount", json!("0x0"));
        node.respond("eth_gasPrice", json!("0x3b9aca00"));
        node.set_auto_mine(true);
        node
    }

    /// Reply to every `method` call with `result`.
    pub fn respond(&self, method: &str, result: Value) {
        self.script
            .lock()
            .unwrap()
            .defaults
            .insert(method.to_string(), Reply::Result(result));
    }

    /// Reply to the next `method` call with `result`.
    pub fn respond_once(&self, method: &str, result: Value) {
        self.push_once(method, Reply::Result(result));
    }

    /// Fail every `method` call with a JSON-RPC error.
    pub fn fail(&self, method: &str, code: i64, message: &str) {
        self.script.lock().unwrap().defaults.insert(
            method.to_string(),
            Reply::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Fail the next `method` call with a JSON-RPC error.
    pub fn fail_once(&self, method: &str, code: i64, message: &str) {
        self.push_once(
            method,
            Reply::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Mine sent transactions immediately; `success` sets the receipt status.
    pub fn set_auto_mine(&self, success: bool) {
        self.script.lock().unwrap().auto_mine = Some(success);
    }

    /// Delay every reply.
    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().unwrap().latency = Some(latency);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Raw transactions passed to `eth_sendRawTransaction`, as hex.
    pub fn sent_transactions(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == "eth_sendRawTransaction")
            .filter_map(|c| c.params.get(0).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    fn push_once(&self, method: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .once
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    fn resolve(&self, method: &str, params: Value) -> (Reply, Option<Duration>) {
        let mut script = self.script.lock().unwrap();
        script.calls.push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
        });
        let latency = script.latency;

        if let Some(reply) = script.once.get_mut(method).and_then(VecDeque::pop_front) {
            return (reply, latency);
        }
        if let Some(reply) = script.defaults.get(method) {
            return (reply.clone(), latency);
        }
        if let Some(success) = script.auto_mine {
            match method {
                "eth_sendRawTransaction" => {
                    script.sent += 1;
                    let hash = format!("0x{:064x}", script.sent);
                    script.mined.insert(hash.clone(), success);
                    return (Reply::Result(json!(hash)), latency);
                }
                "eth_getTransactionReceipt" => {
                    let hash = params.get(0).and_then(Value::as_str).unwrap_or_default();
                    let reply = match script.mined.get(hash) {
                        Some(ok) => json!({
                            "transactionHash": hash,
                            "status": if *ok { "0x1" } else { "0x0" },
                        }),
                        None => Value::Null,
                    };
                    return (Reply::Result(reply), latency);
                }
                _ => {}
            }
        }
        (
            Reply::Error {
                code: METHOD_NOT_FOUND,
                message: format!("method {method} not scripted"),
            },
            latency,
        )
    }
}

#[async_trait]
impl ChainRpc for NullChainNode {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let (reply, latency) = self.resolve(method, params);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match reply {
            Reply::Result(value) => Ok(value),
            Reply::Error { code, message } => Err(LedgerError::Rpc { code, message }),
        }
    }
}
