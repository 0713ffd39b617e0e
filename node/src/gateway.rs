//! Ingestion gateway: turns one broker message into a stored, broadcast and
//! reward-scheduled reading.

use std::sync::Arc;

use srt_store::TelemetryStore;
use srt_types::Reading;
use srt_websocket::WsState;

use crate::rewards::{RewardQueue, RewardScheduling};
use crate::NodeMetrics;

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted {
        /// The reading was persisted.
        stored: bool,
        /// Subscribers the fanout frame was queued for; `None` if fanout failed.
        subscribers: Option<usize>,
        reward: RewardScheduling,
    },
    /// Malformed payload; nothing was stored or broadcast.
    Dropped,
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

pub struct IngestionGateway {
    store: Arc<dyn TelemetryStore>,
    fanout: Arc<WsState>,
    rewards: RewardQueue,
    metrics: Arc<NodeMetrics>,
}

impl IngestionGateway {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        fanout: Arc<WsState>,
        rewards: RewardQueue,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            store,
            fanout,
            rewards,
            metrics,
        }
    }

    /// Handle one broker message. Never awaits and never fails: store and
    /// fanout errors are logged and counted, and the reward is only queued.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        self.metrics.messages_received.inc();

        let reading = match Reading::from_json(payload) {
            Ok(reading) => reading,
            Err(e) => {
                self.metrics.messages_dropped.inc();
                tracing::warn!(
                    topic,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping malformed telemetry message"
                );
                return IngestOutcome::Dropped;
            }
        };
        tracing::debug!(
            topic,
            sensor_id = %reading.sensor_id,
            value = reading.value,
            "telemetry received"
        );

        let stored = match self.store.insert(&reading) {
            Ok(()) => {
                self.metrics.readings_stored.inc();
                true
            }
            Err(e) => {
                self.metrics.store_failures.inc();
                tracing::error!(sensor_id = %reading.sensor_id, error = %e, "failed to store reading");
                false
            }
        };

        let subscribers = match self.fanout.publish_reading(&reading) {
            Ok(n) => Some(n),
            Err(e) => {
                self.metrics.fanout_failures.inc();
                tracing::warn!(sensor_id = %reading.sensor_id, error = %e, "failed to broadcast reading");
                None
            }
        };

        let reward = self.rewards.schedule(&reading.sensor_id);

        IngestOutcome::Accepted {
            stored,
            subscribers,
            reward,
        }
    }

    /// Stop scheduling rewards; later messages are still stored and broadcast.
    pub fn close_rewards(&self) {
        self.rewards.close();
    }

    pub fn store(&self) -> &Arc<dyn TelemetryStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srt_nullables::NullTelemetryStore;

    const PAYLOAD: &[u8] = br#"{"sensorType":"TEMP","sensorId":"TEMP-1","location":"Room","value":21.5,"unit":"C","timestamp":"2024-01-01T00:00:00Z"}"#;

    type Harness = (
        IngestionGateway,
        Arc<WsState>,
        Arc<NodeMetrics>,
        tokio::sync::mpsc::Receiver<crate::rewards::RewardJob>,
    );

    fn gateway(store: Arc<NullTelemetryStore>) -> Harness {
        let metrics = Arc::new(NodeMetrics::new());
        let fanout = Arc::new(WsState::new(16));
        let (queue, rx) = RewardQueue::channel(16, Arc::clone(&metrics));
        let gw = IngestionGateway::new(store, Arc::clone(&fanout), queue, Arc::clone(&metrics));
        (gw, fanout, metrics, rx)
    }

    #[test]
    fn accepted_message_is_stored_broadcast_and_scheduled() {
        let store = Arc::new(NullTelemetryStore::new());
        let (gw, fanout, metrics, _jobs) = gateway(Arc::clone(&store));
        let mut rx = fanout.subscribe();

        let outcome = gw.handle_message("sensors/TEMP/TEMP-1", PAYLOAD);
        assert_eq!(
            outcome,
            IngestOutcome::Accepted {
                stored: true,
                subscribers: Some(1),
                reward: RewardScheduling::Queued,
            }
        );
        assert_eq!(store.reading_count().unwrap(), 1);
        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["data"]["sensorId"], "TEMP-1");
        assert_eq!(metrics.readings_stored.get(), 1);
    }

    #[test]
    fn malformed_message_is_dropped() {
        let store = Arc::new(NullTelemetryStore::new());
        let (gw, fanout, metrics, _jobs) = gateway(Arc::clone(&store));
        let mut rx = fanout.subscribe();

        assert_eq!(gw.handle_message("sensors/x", b"{not json"), IngestOutcome::Dropped);
        assert_eq!(
            gw.handle_message("sensors/x", br#"{"sensorType":"","sensorId":"A","location":"","value":1,"unit":"","timestamp":"2024-01-01T00:00:00Z"}"#),
            IngestOutcome::Dropped
        );
        assert_eq!(store.reading_count().unwrap(), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.messages_dropped.get(), 2);
        assert_eq!(metrics.rewards_scheduled.get(), 0);
    }

    #[test]
    fn store_failure_does_not_block_fanout_or_reward() {
        let store = Arc::new(NullTelemetryStore::new());
        store.set_fail_inserts(true);
        let (gw, fanout, metrics, _jobs) = gateway(store);
        let mut rx = fanout.subscribe();

        let outcome = gw.handle_message("sensors/TEMP/TEMP-1", PAYLOAD);
        assert_eq!(
            outcome,
            IngestOutcome::Accepted {
                stored: false,
                subscribers: Some(1),
                reward: RewardScheduling::Queued,
            }
        );
        assert!(rx.try_recv().is_ok());
        assert_eq!(metrics.store_failures.get(), 1);
    }

    #[test]
    fn closed_rewards_still_accept_readings() {
        let store = Arc::new(NullTelemetryStore::new());
        let (gw, _fanout, _metrics, _jobs) = gateway(Arc::clone(&store));
        gw.close_rewards();
        let outcome = gw.handle_message("sensors/TEMP/TEMP-1", PAYLOAD);
        assert_eq!(
            outcome,
            IngestOutcome::Accepted {
                stored: true,
                subscribers: Some(0),
                reward: RewardScheduling::Closed,
            }
        );
    }
}
