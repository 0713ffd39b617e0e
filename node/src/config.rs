//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use srt_ledger::{AdminSigner, LedgerError, LedgerSettings, WalletRegistry};
use srt_types::LedgerAddress;

use crate::NodeError;

/// Configuration for an SRT telemetry node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB telemetry store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Serve Prometheus metrics at `/metrics` on the WebSocket port.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub rewards: RewardsConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    /// Sensor id to reward wallet address.
    #[serde(default)]
    pub wallets: BTreeMap<String, String>,
}

/// MQTT broker connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Run the subscriber. Disabled nodes only serve what is fed to the gateway directly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Subscription filter.
    #[serde(default = "default_broker_topic")]
    pub topic: String,

    /// Client id; a unique one is generated when unset.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Pause after a connection error before polling again.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Capacity of the client's request channel.
    #[serde(default = "default_broker_channel_capacity")]
    pub channel_capacity: usize,
}

/// Chain node, admin account and contract session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Hex secp256k1 key of the admin account. Required.
    #[serde(default)]
    pub admin_private_key: Option<String>,

    /// Bind the session at startup instead of waiting for the deployment descriptor.
    #[serde(default)]
    pub contract_address: Option<String>,

    #[serde(default = "default_deployment_path")]
    pub deployment_path: PathBuf,

    #[serde(default = "default_deployment_delay_secs")]
    pub deployment_delay_secs: u64,

    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Pending reward jobs before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ws_port")]
    pub port: u16,

    #[serde(default = "default_ws_channel_capacity")]
    pub channel_capacity: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./srt_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_broker_topic() -> String {
    "sensors/#".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_broker_channel_capacity() -> usize {
    100
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_chain_id() -> u64 {
    31337
}

fn default_deployment_path() -> PathBuf {
    PathBuf::from("/blockchain/deployment.json")
}

fn default_deployment_delay_secs() -> u64 {
    10
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_receipt_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    4
}

fn default_ws_port() -> u16 {
    5000
}

fn default_ws_channel_capacity() -> usize {
    256
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Check everything that would otherwise fail later at startup.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.admin_signer()?;
        self.wallet_registry()?;
        self.configured_contract()?;
        if self.rewards.workers == 0 {
            return Err(NodeError::Config("rewards.workers must be at least 1".into()));
        }
        if self.rewards.queue_capacity == 0 {
            return Err(NodeError::Config("rewards.queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn admin_signer(&self) -> Result<AdminSigner, NodeError> {
        let key = self
            .ledger
            .admin_private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NodeError::Config("ledger.admin_private_key is required".into()))?;
        Ok(AdminSigner::from_hex(key)?)
    }

    pub fn wallet_registry(&self) -> Result<WalletRegistry, NodeError> {
        Ok(WalletRegistry::from_config(&self.wallets)?)
    }

    /// The contract address from configuration, if any. Blank counts as unset.
    pub fn configured_contract(&self) -> Result<Option<LedgerAddress>, NodeError> {
        match self.ledger.contract_address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|source| NodeError::Ledger(LedgerError::InvalidAddress {
                    context: "ledger.contract_address".into(),
                    source,
                })),
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            chain_id: self.ledger.chain_id,
            receipt_timeout: Duration::from_secs(self.ledger.receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(self.ledger.receipt_poll_interval_ms),
        }
    }
}

impl BrokerConfig {
    /// Configured client id, or `srt-node-<pid>-<millis>`.
    pub fn effective_client_id(&self) -> String {
        match self.client_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => format!(
                "srt-node-{}-{}",
                std::process::id(),
                chrono::Utc::now().timestamp_millis()
            ),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            broker: BrokerConfig::default(),
            ledger: LedgerConfig::default(),
            rewards: RewardsConfig::default(),
            websocket: WebSocketConfig::default(),
            wallets: BTreeMap::new(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_broker_host(),
            port: default_broker_port(),
            topic: default_broker_topic(),
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            channel_capacity: default_broker_channel_capacity(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            admin_private_key: None,
            contract_address: None,
            deployment_path: default_deployment_path(),
            deployment_delay_secs: default_deployment_delay_secs(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_ws_port(),
            channel_capacity: default_ws_channel_capacity(),
        }
    }
}
