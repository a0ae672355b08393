use thiserror::Error;

use super::snapshot::Field;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unrecognized topic: {0}")]
    UnknownTopic(String),
    #[error("expected a 4 byte payload, got {0} bytes")]
    PayloadLength(usize),
    #[error("non-finite value {0}")]
    NonFinite(f32),
    #[error("{field}: {source}")]
    Sample {
        field: Field,
        source: Box<TelemetryError>,
    },
    #[error("publish rate {0} Hz gives no usable period")]
    InvalidRate(f64),
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}
