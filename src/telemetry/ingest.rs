use serde::Deserialize;
use std::sync::Arc;

use super::error::TelemetryError;
use super::snapshot::{Field, SnapshotStore};

/// Byte order of the 4 byte IEEE-754 payloads on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

pub fn decode_value(payload: &[u8], order: ByteOrder) -> Result<f32, TelemetryError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| TelemetryError::PayloadLength(payload.len()))?;
    let value = match order {
        ByteOrder::Little => f32::from_le_bytes(bytes),
        ByteOrder::Big => f32::from_be_bytes(bytes),
    };
    if !value.is_finite() {
        return Err(TelemetryError::NonFinite(value));
    }
    Ok(value)
}

pub fn encode_value(value: f32, order: ByteOrder) -> [u8; 4] {
    match order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    }
}

/// Maps inbound single-field messages onto the snapshot store.
#[derive(Clone)]
pub struct TelemetryIngestor {
    store: Arc<SnapshotStore>,
    byte_order: ByteOrder,
}

impl TelemetryIngestor {
    pub fn new(store: Arc<SnapshotStore>, byte_order: ByteOrder) -> Self {
        Self { store, byte_order }
    }

    /// Never fails: bad samples are logged and dropped.
    pub fn handle(&self, topic: &str, payload: &[u8]) {
        log::debug!("message received on {}: {:?}", topic, payload);
        match self.ingest(topic, payload) {
            Ok((field, value)) => log::trace!("{} <- {}", field, value),
            Err(e) => log::warn!("dropping sample on {}: {}", topic, e),
        }
    }

    fn ingest(&self, topic: &str, payload: &[u8]) -> Result<(Field, f64), TelemetryError> {
        let field =
            Field::from_topic(topic).ok_or_else(|| TelemetryError::UnknownTopic(topic.into()))?;
        let value = decode_value(payload, self.byte_order)
            .map(f64::from)
            .map_err(|e| TelemetryError::Sample {
                field,
                source: Box::new(e),
            })?;
        self.store.set_field(field, value);
        Ok((field, value))
    }
}
