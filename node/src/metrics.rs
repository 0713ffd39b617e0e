//! Prometheus metrics for the telemetry node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; the `/metrics` route
//! encodes it in the Prometheus text exposition format.

use std::time::Duration;

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};
use srt_ledger::{RewardAttempt, RewardOutcome};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Ingestion ───────────────────────────────────────────────────────
    /// Messages handed to the gateway by the broker.
    pub messages_received: IntCounter,
    /// Messages dropped as malformed.
    pub messages_dropped: IntCounter,
    pub readings_stored: IntCounter,
    pub store_failures: IntCounter,
    pub fanout_failures: IntCounter,

    // ── Rewards ─────────────────────────────────────────────────────────
    pub rewards_scheduled: IntCounter,
    pub rewards_succeeded: IntCounter,
    pub rewards_failed: IntCounter,
    /// Resolved as unavailable (unbound sensor or no contract yet).
    pub rewards_unavailable: IntCounter,
    /// Jobs dropped because the reward queue was full or closed.
    pub rewards_dropped: IntCounter,
    /// Reward jobs waiting or running.
    pub rewards_in_flight: IntGauge,
    /// Time from dequeue to resolved outcome, in seconds.
    pub reward_latency_seconds: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_received = register_int_counter_with_registry!(
            Opts::new("srt_messages_received_total", "Telemetry messages received"),
            registry
        )
        .expect("failed to register messages_received counter");

        let messages_dropped = register_int_counter_with_registry!(
            Opts::new(
                "srt_messages_dropped_total",
                "Telemetry messages dropped as malformed"
            ),
            registry
        )
        .expect("failed to register messages_dropped counter");

        let readings_stored = register_int_counter_with_registry!(
            Opts::new("srt_readings_stored_total", "Readings persisted"),
            registry
        )
        .expect("failed to register readings_stored counter");

        let store_failures = register_int_counter_with_registry!(
            Opts::new("srt_store_failures_total", "Readings that failed to persist"),
            registry
        )
        .expect("failed to register store_failures counter");

        let fanout_failures = register_int_counter_with_registry!(
            Opts::new(
                "srt_fanout_failures_total",
                "Readings that failed to broadcast"
            ),
            registry
        )
        .expect("failed to register fanout_failures counter");

        let rewards_scheduled = register_int_counter_with_registry!(
            Opts::new("srt_rewards_scheduled_total", "Reward jobs queued"),
            registry
        )
        .expect("failed to register rewards_scheduled counter");

        let rewards_succeeded = register_int_counter_with_registry!(
            Opts::new("srt_rewards_succeeded_total", "Reward transactions mined"),
            registry
        )
        .expect("failed to register rewards_succeeded counter");

        let rewards_failed = register_int_counter_with_registry!(
            Opts::new(
                "srt_rewards_failed_total",
                "Reward attempts that failed or reverted"
            ),
            registry
        )
        .expect("failed to register rewards_failed counter");

        let rewards_unavailable = register_int_counter_with_registry!(
            Opts::new(
                "srt_rewards_unavailable_total",
                "Reward attempts skipped: unbound sensor or uninitialized contract"
            ),
            registry
        )
        .expect("failed to register rewards_unavailable counter");

        let rewards_dropped = register_int_counter_with_registry!(
            Opts::new(
                "srt_rewards_dropped_total",
                "Reward jobs dropped by a full or closed queue"
            ),
            registry
        )
        .expect("failed to register rewards_dropped counter");

        let rewards_in_flight = register_int_gauge_with_registry!(
            Opts::new("srt_rewards_in_flight", "Reward jobs queued or running"),
            registry
        )
        .expect("failed to register rewards_in_flight gauge");

        // 50 ms → ~205 s, covering a full receipt timeout.
        let reward_latency_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "srt_reward_latency_seconds",
                "Reward dispatch latency in seconds"
            )
            .buckets(prometheus::exponential_buckets(0.05, 2.0, 13).unwrap()),
            registry
        )
        .expect("failed to register reward_latency_seconds histogram");

        Self {
            registry,
            messages_received,
            messages_dropped,
            readings_stored,
            store_failures,
            fanout_failures,
            rewards_scheduled,
            rewards_succeeded,
            rewards_failed,
            rewards_unavailable,
            rewards_dropped,
            rewards_in_flight,
            reward_latency_seconds,
        }
    }

    /// Count a resolved reward attempt.
    pub fn record_reward(&self, attempt: &RewardAttempt, elapsed: Duration) {
        match attempt.outcome {
            RewardOutcome::Rewarded { .. } => self.rewards_succeeded.inc(),
            RewardOutcome::Unavailable(_) => self.rewards_unavailable.inc(),
            RewardOutcome::Failed(_) => self.rewards_failed.inc(),
        }
        self.reward_latency_seconds.observe(elapsed.as_secs_f64());
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srt_ledger::UnavailableReason;

    #[test]
    fn reward_outcomes_land_in_separate_counters() {
        let metrics = NodeMetrics::new();
        let attempt = RewardAttempt::unavailable("TEMP-1", None, UnavailableReason::SensorUnbound);
        metrics.record_reward(&attempt, Duration::from_millis(1));
        assert_eq!(metrics.rewards_unavailable.get(), 1);
        assert_eq!(metrics.rewards_succeeded.get(), 0);
        assert_eq!(metrics.reward_latency_seconds.get_sample_count(), 1);
    }

    #[test]
    fn encode_contains_metric_names() {
        let metrics = NodeMetrics::new();
        metrics.messages_received.inc_by(3);
        let text = metrics.encode();
        assert!(text.contains("srt_messages_received_total 3"));
        assert!(text.contains("srt_reward_latency_seconds_bucket"));
    }
}
