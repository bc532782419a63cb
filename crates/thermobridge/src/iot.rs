//! MQTT recorder for device samples.
//!
//! Devices publish one JSON observation per message on `{deviceMAC}/data_pub`.
//! Each payload is stored as `{iot partition}{device}/{timestamp ms}.json`.
//! Bad payloads are logged and dropped; the subscription keeps running.

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

use crate::observation::{Observation, RecordKey};
use crate::store::{RecordStore, StoreError};
use crate::timestamp::normalize_to_millis;

/// Errors from the IoT recorder.
#[derive(Debug, thiserror::Error)]
pub enum IotError {
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Payload has no device id and topic {0:?} names none")]
    MissingDevice(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

pub type Result<T> = std::result::Result<T, IotError>;

/// Broker connection and subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "thermobridge".to_string(),
            topic: "+/data_pub".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 5,
        }
    }
}

/// Replace characters that would let a device id leave its partition.
pub fn sanitize_device_id(device_id: &str) -> String {
    let cleaned = device_id.trim().replace("..", "_").replace(['/', '\\'], "_");
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Writes device payloads into the IoT partition.
#[derive(Clone)]
pub struct IotRecorder {
    records: RecordStore,
    partition: String,
}

impl IotRecorder {
    pub fn new(records: RecordStore, partition: impl Into<String>) -> Self {
        Self {
            records,
            partition: partition.into(),
        }
    }

    /// Parse and store one message.
    ///
    /// A payload without `device_id` takes the first segment of its topic.
    pub async fn record_payload(&self, topic: &str, payload: &[u8]) -> Result<RecordKey> {
        let mut observation: Observation = serde_json::from_slice(payload)?;
        if observation.device_id.trim().is_empty() {
            observation.device_id = topic
                .split('/')
                .next()
                .filter(|segment| !segment.is_empty() && *segment != "+")
                .ok_or_else(|| IotError::MissingDevice(topic.to_string()))?
                .to_string();
        }
        observation.timestamp = normalize_to_millis(observation.timestamp);

        let device = sanitize_device_id(&observation.device_id);
        let key = RecordKey::for_source(&self.partition, &device, observation.timestamp);
        self.records.put_observation(&key, &observation).await?;
        Ok(key)
    }
}

/// Subscribe and record until shutdown.
///
/// Connection errors are logged and the event loop reconnects on the next
/// poll. The subscription is renewed on every ConnAck.
pub async fn run(
    recorder: IotRecorder,
    config: MqttConfig,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    log::info!(
        "[MQTT] connecting to {}:{} (topic '{}')",
        config.host,
        config.port,
        config.topic
    );

    loop {
        tokio::select! {
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        log::info!("[MQTT] connected, subscribing to '{}'", config.topic);
                        client.try_subscribe(config.topic.clone(), QoS::AtLeastOnce)?;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match recorder.record_payload(&publish.topic, &publish.payload).await {
                            Ok(key) => log::debug!("[MQTT] stored {}", key),
                            Err(e) => log::warn!("[MQTT] dropped message on {}: {}", publish.topic, e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("[MQTT] connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            _ = shutdown.changed() => {
                log::info!("[MQTT] shutdown signal received, exiting");
                break;
            }
        }
    }

    if let Err(e) = client.try_disconnect() {
        log::debug!("[MQTT] disconnect failed: {}", e);
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
