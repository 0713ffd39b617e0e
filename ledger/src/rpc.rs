//! JSON-RPC transport to the chain node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use srt_types::U256;

use crate::LedgerError;

/// A chain node that answers Ethereum JSON-RPC requests.
///
/// Returns the `result` member of the response (which may be `null`);
/// a JSON-RPC `error` member becomes [`LedgerError::Rpc`].
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError>;
}

/// JSON-RPC over HTTP POST.
pub struct HttpChainRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpChainRpc {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "chain rpc request");
        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_response(response)
    }
}

fn parse_response(mut response: Value) -> Result<Value, LedgerError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(LedgerError::Rpc { code, message });
    }
    match response.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(LedgerError::Rpc {
            code: 0,
            message: "response has neither result nor error".into(),
        }),
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1bc16d674ec80000"`.
pub fn parse_quantity(raw: &str) -> Option<U256> {
    let digits = raw.trim().strip_prefix("0x")?;
    if digits.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(digits, 16).ok()
}

pub(crate) fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, LedgerError> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::Rpc {
            code: 0,
            message: format!("{what}: expected a string, got {value}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_extracted() {
        let v = parse_response(json!({"jsonrpc":"2.0","id":1,"result":"0x10"})).unwrap();
        assert_eq!(v, json!("0x10"));
    }

    #[test]
    fn null_result_is_not_an_error() {
        let v = parse_response(json!({"jsonrpc":"2.0","id":1,"result":null})).unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn error_member_becomes_rpc_error() {
        let err = parse_response(json!({
            "jsonrpc":"2.0","id":1,
            "error":{"code":-32000,"message":"execution reverted"}
        }))
        .unwrap_err();
        match err {
            LedgerError::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn quantities_parse_from_hex() {
        assert_eq!(parse_quantity("0x0"), Some(U256::zero()));
        assert_eq!(parse_quantity("0x"), Some(U256::zero()));
        assert_eq!(parse_quantity("0x7a69"), Some(U256::from(31337u64)));
        assert_eq!(parse_quantity("0x8ac7230489e80000"), Some(U256::exp10(19)));
        assert_eq!(parse_quantity("7a69"), None);
        assert_eq!(parse_quantity("0xzz"), None);
        assert_eq!(parse_quantity(&format!("0x1{}", "0".repeat(64))), None);
    }
}
