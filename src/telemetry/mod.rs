mod error;
mod ingest;
mod simulator;
mod snapshot;
mod transport;

pub use error::TelemetryError;
pub use ingest::{ByteOrder, TelemetryIngestor};
pub use simulator::{publish_period, run_simulator};
pub use snapshot::{Field, PoseFix, SnapshotStore};
pub use transport::MqttTransport;
