//! The telemetry node: wires store, fanout, ledger, reward workers and the
//! broker subscriber together.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use srt_ledger::{ChainRpc, HttpChainRpc, LedgerClient, RewardAttempt, SessionState};
use srt_store::TelemetryStore;
use srt_store_lmdb::{environment::DEFAULT_MAP_SIZE, LmdbEnvironment};
use srt_websocket::{WebSocketServer, WsState};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::BrokerSubscriber;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::gateway::IngestionGateway;
use crate::metrics::NodeMetrics;
use crate::rewards::{RewardJob, RewardQueue, RewardWorkers};
use crate::shutdown::ShutdownController;

/// Upper bound on waiting for subsystems and reward workers during stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SensorNode {
    config: NodeConfig,
    store: Arc<dyn TelemetryStore>,
    ledger: Arc<LedgerClient>,
    ws_state: Arc<WsState>,
    metrics: Arc<NodeMetrics>,
    gateway: Arc<IngestionGateway>,
    shutdown: Arc<ShutdownController>,
    /// Consumer end of the reward queue until workers take it in `start`.
    reward_rx: Option<mpsc::Receiver<RewardJob>>,
    reward_workers: Option<RewardWorkers>,
    reward_observer: Option<mpsc::UnboundedSender<RewardAttempt>>,
    /// Address the WebSocket server is bound to, once started.
    websocket_addr: Option<SocketAddr>,
    deployment_watch: Option<JoinHandle<()>>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl SensorNode {
    /// Create a node backed by LMDB at `config.data_dir` and the JSON-RPC
    /// chain node at `config.ledger.rpc_url`.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, DEFAULT_MAP_SIZE)?;
        let store: Arc<dyn TelemetryStore> = Arc::new(env.telemetry_store());
        let rpc = HttpChainRpc::new(
            config.ledger.rpc_url.clone(),
            Duration::from_secs(config.ledger.request_timeout_secs),
        )?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            rpc_url = %rpc.url(),
            "opened telemetry store"
        );
        Self::with_components(config, store, Arc::new(rpc))
    }

    /// Create a node over the given store and chain connection.
    pub fn with_components(
        config: NodeConfig,
        store: Arc<dyn TelemetryStore>,
        rpc: Arc<dyn ChainRpc>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let signer = config.admin_signer()?;
        let wallets = config.wallet_registry()?;
        tracing::info!(
            admin = %signer.address(),
            wallets = wallets.len(),
            chain_id = config.ledger.chain_id,
            "ledger client configured"
        );

        let ledger = Arc::new(LedgerClient::new(rpc, signer, wallets, config.ledger_settings()));
        match config.configured_contract()? {
            Some(contract) => {
                ledger.bind_contract(contract);
            }
            None => tracing::warn!(
                path = %config.ledger.deployment_path.display(),
                "contract address not configured, waiting for deployment descriptor"
            ),
        }

        let metrics = Arc::new(NodeMetrics::new());
        let ws_state = Arc::new(WsState::new(config.websocket.channel_capacity));
        let (reward_queue, reward_rx) =
            RewardQueue::channel(config.rewards.queue_capacity, Arc::clone(&metrics));
        let gateway = Arc::new(IngestionGateway::new(
            Arc::clone(&store),
            Arc::clone(&ws_state),
            reward_queue,
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            store,
            ledger,
            ws_state,
            metrics,
            gateway,
            shutdown: Arc::new(ShutdownController::new()),
            reward_rx: Some(reward_rx),
            reward_workers: None,
            reward_observer: None,
            websocket_addr: None,
            deployment_watch: None,
            task_handles: Vec::new(),
            started: false,
        })
    }

    /// Receive every resolved reward attempt. Must be called before `start`.
    pub fn observe_rewards(&mut self) -> mpsc::UnboundedReceiver<RewardAttempt> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reward_observer = Some(tx);
        rx
    }

    /// Start the reward workers, the deployment watch, the WebSocket server
    /// and the broker subscriber. Returns once everything is spawned.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyStarted);
        }
        let reward_rx = self.reward_rx.take().ok_or(NodeError::AlreadyStarted)?;
        self.started = true;

        tracing::info!(
            data_dir = %self.config.data_dir.display(),
            broker = %format!("{}:{}", self.config.broker.host, self.config.broker.port),
            "SRT node starting"
        );

        // ── Reward workers ────────────────────────────────────────────────
        self.reward_workers = Some(RewardWorkers::spawn(
            reward_rx,
            Arc::clone(&self.ledger),
            Arc::clone(&self.metrics),
            self.config.rewards.workers,
            self.reward_observer.take(),
        ));

        // ── Deployment descriptor (one read after a delay) ────────────────
        if self.ledger.session_state() == SessionState::Uninitialized {
            self.deployment_watch = Some(self.ledger.spawn_deployment_watch(
                self.config.ledger.deployment_path.clone(),
                Duration::from_secs(self.config.ledger.deployment_delay_secs),
            ));
        }

        // ── WebSocket server (optional) ───────────────────────────────────
        if self.config.websocket.enabled {
            self.start_websocket().await?;
        } else if self.config.enable_metrics {
            tracing::warn!("metrics are served on the WebSocket port, which is disabled");
        }

        // ── Broker subscriber ─────────────────────────────────────────────
        if self.config.broker.enabled {
            let subscriber =
                BrokerSubscriber::new(self.config.broker.clone(), Arc::clone(&self.gateway));
            let shutdown_rx = self.shutdown.subscribe();
            self.task_handles.push(tokio::spawn(subscriber.run(shutdown_rx)));
        }

        tracing::info!("SRT node started");
        Ok(())
    }

    async fn start_websocket(&mut self) -> Result<(), NodeError> {
        let addr = format!("0.0.0.0:{}", self.config.websocket.port);
        let listener = TcpListener::bind(&addr).await?;
        self.websocket_addr = Some(listener.local_addr()?);

        let mut extra = Router::new();
        if self.config.enable_metrics {
            let metrics = Arc::clone(&self.metrics);
            extra = extra.route(
                "/metrics",
                get(move || {
                    let metrics = Arc::clone(&metrics);
                    async move { metrics.encode() }
                }),
            );
        }

        let ws_server = WebSocketServer::with_state(self.config.websocket.port, Arc::clone(&self.ws_state));
        let mut shutdown_rx = self.shutdown.subscribe();
        let ws_handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("WebSocket server shutting down");
                }
                result = ws_server.serve(listener, extra) => {
                    match result {
                        Ok(()) => tracing::info!("WebSocket server exited"),
                        Err(e) => tracing::error!("WebSocket server error: {e}"),
                    }
                }
            }
        });
        self.task_handles.push(ws_handle);
        Ok(())
    }

    /// Block until SIGINT/SIGTERM or a programmatic shutdown.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return;
        }
        tokio::select! {
            _ = self.shutdown.wait_for_signal() => {}
            _ = rx.recv() => {}
        }
    }

    /// Stop the node gracefully.
    ///
    /// 1. Signals the broker loop and WebSocket server to stop.
    /// 2. Closes the reward queue.
    /// 3. Waits for workers to finish queued rewards (bounded).
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("SRT node stopping");
        self.shutdown.shutdown();

        if let Some(watch) = self.deployment_watch.take() {
            watch.abort();
        }

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        self.gateway.close_rewards();
        if let Some(workers) = self.reward_workers.take() {
            if workers.drain(SHUTDOWN_TIMEOUT).await {
                tracing::info!("reward queue drained");
            }
        }

        match self.store.reading_count() {
            Ok(count) => tracing::info!(readings = count, "SRT node stopped"),
            Err(_) => tracing::info!("SRT node stopped"),
        }
        Ok(())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<IngestionGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<dyn TelemetryStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<LedgerClient> {
        &self.ledger
    }

    pub fn ws_state(&self) -> &Arc<WsState> {
        &self.ws_state
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket_addr
    }
}
