//! Reward dispatch queue.
//!
//! The gateway schedules one job per accepted reading with a non-blocking
//! `try_send`; a fixed pool of workers pulls jobs and pays them through the
//! ledger client. Each job runs in its own task so a panic inside the ledger
//! path is contained to that job.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use srt_ledger::{LedgerClient, RewardAttempt, RewardOutcome, UnavailableReason};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::NodeMetrics;

/// One pending reward.
#[derive(Debug)]
pub struct RewardJob {
    pub sensor_id: String,
    pub enqueued_at: Instant,
}

/// Result of handing a job to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardScheduling {
    Queued,
    /// Queue at capacity; the job was dropped.
    QueueFull,
    /// Queue closed for shutdown; the job was dropped.
    Closed,
}

/// Producer side of the reward queue, shared by the gateway.
pub struct RewardQueue {
    tx: RwLock<Option<mpsc::Sender<RewardJob>>>,
    metrics: Arc<NodeMetrics>,
}

impl RewardQueue {
    /// A bounded queue and its consumer end.
    pub fn channel(capacity: usize, metrics: Arc<NodeMetrics>) -> (Self, mpsc::Receiver<RewardJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx: RwLock::new(Some(tx)),
            metrics,
        };
        (queue, rx)
    }

    /// Schedule a reward without waiting. Never blocks the caller.
    pub fn schedule(&self, sensor_id: &str) -> RewardScheduling {
        let guard = self.tx.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(tx) = guard.as_ref() else {
            tracing::debug!(sensor_id, "reward queue closed, job dropped");
            self.metrics.rewards_dropped.inc();
            return RewardScheduling::Closed;
        };
        let job = RewardJob {
            sensor_id: sensor_id.to_string(),
            enqueued_at: Instant::now(),
        };
        match tx.try_send(job) {
            Ok(()) => {
                self.metrics.rewards_scheduled.inc();
                self.metrics.rewards_in_flight.inc();
                RewardScheduling::Queued
            }
            Err(TrySendError::Full(job)) => {
                tracing::warn!(sensor_id = %job.sensor_id, "reward queue full, job dropped");
                self.metrics.rewards_dropped.inc();
                RewardScheduling::QueueFull
            }
            Err(TrySendError::Closed(job)) => {
                tracing::debug!(sensor_id = %job.sensor_id, "reward queue closed, job dropped");
                self.metrics.rewards_dropped.inc();
                RewardScheduling::Closed
            }
        }
    }

    /// Drop the producer so workers finish the backlog and exit.
    pub fn close(&self) {
        let mut guard = self.tx.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            tracing::debug!("reward queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .read()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }
}

/// The worker pool consuming the reward queue.
pub struct RewardWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl RewardWorkers {
    /// Spawn `workers` tasks sharing `rx`. Resolved attempts are forwarded to
    /// `observer` when one is given.
    pub fn spawn(
        rx: mpsc::Receiver<RewardJob>,
        ledger: Arc<LedgerClient>,
        metrics: Arc<NodeMetrics>,
        workers: usize,
        observer: Option<mpsc::UnboundedSender<RewardAttempt>>,
    ) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&rx),
                    Arc::clone(&ledger),
                    Arc::clone(&metrics),
                    observer.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for the workers to drain the closed queue. Workers still running
    /// after `timeout` are aborted; returns whether everything drained.
    pub async fn drain(self, timeout: Duration) -> bool {
        let mut handles = self.handles;
        let wait_all = async {
            for handle in handles.iter_mut() {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(timeout, wait_all).await.is_ok() {
            return true;
        }
        tracing::warn!(?timeout, "reward workers did not drain in time, aborting");
        for handle in &handles {
            handle.abort();
        }
        false
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<RewardJob>>>,
    ledger: Arc<LedgerClient>,
    metrics: Arc<NodeMetrics>,
    observer: Option<mpsc::UnboundedSender<RewardAttempt>>,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            tracing::debug!(worker, "reward worker exiting");
            return;
        };

        let started = Instant::now();
        let queued_for = started.duration_since(job.enqueued_at);
        let sensor_id = job.sensor_id;
        let ledger = Arc::clone(&ledger);
        let task_sensor = sensor_id.clone();
        let result = tokio::spawn(async move { ledger.reward_sensor(&task_sensor).await }).await;
        metrics.rewards_in_flight.dec();

        match result {
            Ok(attempt) => {
                metrics.record_reward(&attempt, started.elapsed());
                log_attempt(&attempt, queued_for);
                if let Some(observer) = &observer {
                    let _ = observer.send(attempt);
                }
            }
            Err(e) => {
                metrics.rewards_failed.inc();
                tracing::error!(worker, sensor_id = %sensor_id, error = %e, "reward task aborted");
            }
        }
    }
}

fn log_attempt(attempt: &RewardAttempt, queued_for: Duration) {
    let sensor_id = attempt.sensor_id.as_str();
    match &attempt.outcome {
        RewardOutcome::Rewarded { tx_hash } => {
            tracing::info!(
                sensor_id,
                wallet = ?attempt.wallet,
                tx_hash = %tx_hash,
                "sensor rewarded"
            );
        }
        RewardOutcome::Unavailable(UnavailableReason::SensorUnbound) => {
            tracing::debug!(sensor_id, "no wallet bound to sensor, reward skipped");
        }
        RewardOutcome::Unavailable(UnavailableReason::SessionUninitialized) => {
            tracing::warn!(sensor_id, "ledger contract not initialized, reward skipped");
        }
        RewardOutcome::Failed(e) => {
            tracing::error!(
                sensor_id,
                tx_hash = ?attempt.tx_hash,
                queued_ms = queued_for.as_millis() as u64,
                error = %e,
                "failed to reward sensor"
            );
        }
    }
}
