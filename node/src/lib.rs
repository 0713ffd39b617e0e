//! SRT telemetry node: ingestion, persistence, fanout and rewards.
//!
//! The node is the central coordinator that:
//! - Subscribes to sensor telemetry on the MQTT broker
//! - Validates each message into a reading and persists it
//! - Pushes every accepted reading to WebSocket subscribers
//! - Queues a token reward for the reporting sensor without blocking ingestion

pub mod broker;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod rewards;
pub mod shutdown;

pub use broker::BrokerSubscriber;
pub use config::{BrokerConfig, LedgerConfig, NodeConfig, RewardsConfig, WebSocketConfig};
pub use error::NodeError;
pub use gateway::{IngestOutcome, IngestionGateway};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::SensorNode;
pub use rewards::{RewardJob, RewardQueue, RewardScheduling, RewardWorkers};
pub use shutdown::ShutdownController;
