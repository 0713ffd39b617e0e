//! MQTT subscriber feeding the ingestion gateway.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;

use crate::config::BrokerConfig;
use crate::IngestionGateway;

/// Minimum keep-alive accepted by the client.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

pub struct BrokerSubscriber {
    config: BrokerConfig,
    gateway: Arc<IngestionGateway>,
}

impl BrokerSubscriber {
    pub fn new(config: BrokerConfig, gateway: Arc<IngestionGateway>) -> Self {
        Self { config, gateway }
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.effective_client_id(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs).max(MIN_KEEP_ALIVE));
        options.set_clean_session(true);
        options
    }

    /// Poll the broker until shutdown.
    ///
    /// Subscribes after every ConnAck so a reconnect with a clean session
    /// picks the subscription back up. Publishes go to the gateway one at a
    /// time, in arrival order.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let options = self.mqtt_options();
        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %options.client_id(),
            topic = %self.config.topic,
            "connecting to MQTT broker"
        );
        let (client, mut eventloop) = AsyncClient::new(options, self.config.channel_capacity.max(1));
        let reconnect_delay = Duration::from_secs(self.config.reconnect_delay_secs);

        'events: loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break 'events,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(topic = %self.config.topic, "MQTT connected, subscribing");
                    if let Err(e) = client.try_subscribe(self.config.topic.clone(), QoS::AtLeastOnce) {
                        tracing::error!(topic = %self.config.topic, error = %e, "MQTT subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    tracing::debug!(pkid = ack.pkid, "MQTT subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.gateway.handle_message(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in = ?reconnect_delay,
                        "MQTT connection error"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break 'events,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }

        tracing::info!("MQTT subscriber shutting down");
        disconnect(&client, &mut eventloop).await;
    }
}

/// Best-effort clean disconnect; gives the event loop a moment to flush it.
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    let _ = tokio::time::timeout(Duration::from_millis(250), async {
        while let Ok(event) = eventloop.poll().await {
            if matches!(event, Event::Outgoing(rumqttc::Outgoing::Disconnect)) {
                break;
            }
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::RewardQueue;
    use crate::NodeMetrics;
    use srt_nullables::NullTelemetryStore;
    use srt_websocket::WsState;

    fn subscriber(config: BrokerConfig) -> BrokerSubscriber {
        let metrics = Arc::new(NodeMetrics::new());
        let (queue, _rx) = RewardQueue::channel(1, Arc::clone(&metrics));
        let gateway = IngestionGateway::new(
            Arc::new(NullTelemetryStore::new()),
            Arc::new(WsState::new(1)),
            queue,
            metrics,
        );
        BrokerSubscriber::new(config, Arc::new(gateway))
    }

    #[test]
    fn options_follow_config() {
        let sub = subscriber(BrokerConfig {
            host: "mosquitto".into(),
            port: 1884,
            client_id: Some("backend-test".into()),
            keep_alive_secs: 1,
            ..BrokerConfig::default()
        });
        let options = sub.mqtt_options();
        assert_eq!(options.broker_address(), ("mosquitto".to_string(), 1884));
        assert_eq!(options.client_id(), "backend-test");
        assert_eq!(options.keep_alive(), MIN_KEEP_ALIVE);
    }

    #[tokio::test]
    async fn shutdown_interrupts_reconnect_wait() {
        // Nothing listens on port 1, so the first poll fails and the loop
        // parks in its reconnect delay.
        let sub = subscriber(BrokerConfig {
            host: "127.0.0.1".into(),
            port: 1,
            reconnect_delay_secs: 3600,
            ..BrokerConfig::default()
        });
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(sub.run(rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("subscriber should stop promptly")
            .unwrap();
    }
}
