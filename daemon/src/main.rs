//! SRT daemon: entry point for running a telemetry node.

use anyhow::Context;
use clap::Parser;
use srt_node::{init_logging, LogFormat, NodeConfig, SensorNode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "srt-daemon", about = "Sensor telemetry and reward node")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "SRT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the telemetry store.
    #[arg(long, env = "SRT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SRT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SRT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Serve Prometheus metrics at /metrics on the WebSocket port.
    #[arg(long, env = "SRT_ENABLE_METRICS")]
    metrics: bool,

    /// MQTT broker host.
    #[arg(long, env = "SRT_MQTT_HOST")]
    mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(long, env = "SRT_MQTT_PORT")]
    mqtt_port: Option<u16>,

    /// MQTT subscription filter.
    #[arg(long, env = "SRT_MQTT_TOPIC")]
    mqtt_topic: Option<String>,

    /// Chain node JSON-RPC URL.
    #[arg(long, env = "SRT_RPC_URL")]
    rpc_url: Option<String>,

    /// EIP-155 chain id.
    #[arg(long, env = "SRT_CHAIN_ID")]
    chain_id: Option<u64>,

    /// Admin account private key (hex).
    #[arg(long, env = "SRT_ADMIN_PRIVATE_KEY", hide_env_values = true)]
    admin_private_key: Option<String>,

    /// Reward contract address; skips waiting for the deployment descriptor.
    #[arg(long, env = "SRT_CONTRACT_ADDRESS")]
    contract_address: Option<String>,

    /// Deployment descriptor written by the contract deployment tooling.
    #[arg(long, env = "SRT_DEPLOYMENT_PATH")]
    deployment_path: Option<PathBuf>,

    /// WebSocket server port.
    #[arg(long, env = "SRT_WS_PORT")]
    websocket_port: Option<u16>,

    /// Number of reward worker tasks.
    #[arg(long, env = "SRT_REWARD_WORKERS")]
    reward_workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration as TOML (private key redacted).
    Config,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path = path.to_string_lossy();
                NodeConfig::from_toml_file(&path)
                    .with_context(|| format!("failed to load config file {path}"))?
            }
            None => NodeConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut NodeConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config.enable_metrics |= self.metrics;
        if let Some(host) = &self.mqtt_host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.broker.port = port;
        }
        if let Some(topic) = &self.mqtt_topic {
            config.broker.topic = topic.clone();
        }
        if let Some(url) = &self.rpc_url {
            config.ledger.rpc_url = url.clone();
        }
        if let Some(chain_id) = self.chain_id {
            config.ledger.chain_id = chain_id;
        }
        if let Some(key) = &self.admin_private_key {
            config.ledger.admin_private_key = Some(key.clone());
        }
        if let Some(contract) = &self.contract_address {
            config.ledger.contract_address = Some(contract.clone());
        }
        if let Some(path) = &self.deployment_path {
            config.ledger.deployment_path = path.clone();
        }
        if let Some(port) = self.websocket_port {
            config.websocket.port = port;
        }
        if let Some(workers) = self.reward_workers {
            config.rewards.workers = workers;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Config => {
                let mut printable = config;
                if printable.ledger.admin_private_key.is_some() {
                    printable.ledger.admin_private_key = Some("<redacted>".into());
                }
                print!("{}", printable.to_toml_string());
            }
            NodeAction::Run => {
                let format: LogFormat = config.log_format.parse()?;
                init_logging(format, &config.log_level);

                tracing::info!(
                    "Starting SRT node (MQTT:{}:{}, WS:{}, chain:{})",
                    config.broker.host,
                    config.broker.port,
                    if config.websocket.enabled {
                        config.websocket.port.to_string()
                    } else {
                        "off".into()
                    },
                    config.ledger.rpc_url,
                );

                let mut node = SensorNode::new(config).context("failed to initialise node")?;
                node.start().await?;
                node.wait_for_shutdown().await;

                tracing::info!("Shutdown signal received, stopping node");
                node.stop().await?;

                tracing::info!("SRT daemon exited cleanly");
            }
        },
    }

    Ok(())
}
