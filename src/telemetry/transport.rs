use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;

use super::error::TelemetryError;
use super::ingest::TelemetryIngestor;
use crate::config::TelemetryConfig;

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const RETRY_PAUSE: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

/// MQTT subscription feeding the telemetry ingestor.
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Step<'a> {
    Sample(&'a str, &'a [u8]),
    Reconnected,
    Disconnected,
    Idle,
}

fn classify(event: &Event) -> Step<'_> {
    match event {
        Event::Incoming(Packet::Publish(publish)) => Step::Sample(&publish.topic, &publish.payload),
        Event::Incoming(Packet::ConnAck(_)) => Step::Reconnected,
        Event::Outgoing(Outgoing::Disconnect) => Step::Disconnected,
        _ => Step::Idle,
    }
}

impl MqttTransport {
    /// Connects, subscribes to every configured topic and waits for the broker's ack.
    pub async fn connect(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let (client, mut eventloop) = open(config, &config.client_id);

        for topic in &config.topics {
            client.subscribe(topic.as_str(), QoS::AtMostOnce).await?;
        }

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(_) => continue,
                Err(e) => return Err(TelemetryError::Connect(e.to_string())),
            }
        }

        log::info!(
            "connected to broker {}:{} as {} ({} topics)",
            config.host,
            config.port,
            config.client_id,
            config.topics.len()
        );
        Ok(Self {
            client,
            eventloop,
            topics: config.topics.clone(),
        })
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Polls until the client sends a disconnect. After a reconnect the session is
    /// clean, so every topic is subscribed again.
    pub async fn run(mut self, ingestor: TelemetryIngestor) {
        loop {
            match self.eventloop.poll().await {
                Ok(event) => match classify(&event) {
                    Step::Sample(topic, payload) => ingestor.handle(topic, payload),
                    Step::Reconnected => self.resubscribe(),
                    Step::Disconnected => {
                        log::info!("disconnected from broker");
                        return;
                    }
                    Step::Idle => {}
                },
                Err(e) => {
                    log::warn!("broker connection error: {}", e);
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
        }
    }

    fn resubscribe(&self) {
        log::info!(
            "reconnected to broker, subscribing to {} topics again",
            self.topics.len()
        );
        for topic in &self.topics {
            if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                log::error!("cannot resubscribe to {}: {}", topic, e);
            }
        }
    }
}

pub(super) fn open(config: &TelemetryConfig, client_id: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
    options.set_keep_alive(KEEP_ALIVE);
    AsyncClient::new(options, REQUEST_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    #[test]
    fn connack_after_startup_triggers_resubscribe() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        )));
        assert_eq!(classify(&event), Step::Reconnected);
    }

    #[test]
    fn publish_is_routed_as_sample() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "aipov/altitude/alt_imu1_m/synchro",
            QoS::AtMostOnce,
            5000.0f32.to_le_bytes().to_vec(),
        )));
        let expected = 5000.0f32.to_le_bytes();
        assert_eq!(
            classify(&event),
            Step::Sample("aipov/altitude/alt_imu1_m/synchro", &expected)
        );
    }

    #[test]
    fn outgoing_disconnect_ends_the_loop() {
        assert_eq!(
            classify(&Event::Outgoing(Outgoing::Disconnect)),
            Step::Disconnected
        );
        assert_eq!(classify(&Event::Outgoing(Outgoing::PingReq)), Step::Idle);
    }
}
