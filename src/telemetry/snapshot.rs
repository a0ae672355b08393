use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// The six independently sampled pose channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Roll,
    Pitch,
    Heading,
    Altitude,
    Longitude,
    Latitude,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Roll,
        Field::Pitch,
        Field::Heading,
        Field::Altitude,
        Field::Longitude,
        Field::Latitude,
    ];

    /// Topic substrings, checked in this order; first match wins.
    const TOPIC_KEYS: [(&'static str, Field); 6] = [
        ("alt", Field::Altitude),
        ("thead", Field::Heading),
        ("pitch", Field::Pitch),
        ("roll", Field::Roll),
        ("lat", Field::Latitude),
        ("lon", Field::Longitude),
    ];

    pub fn from_topic(topic: &str) -> Option<Field> {
        Self::TOPIC_KEYS
            .iter()
            .find(|(key, _)| topic.contains(key))
            .map(|(_, field)| *field)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::Roll => "roll",
            Field::Pitch => "pitch",
            Field::Heading => "heading",
            Field::Altitude => "altitude",
            Field::Longitude => "longitude",
            Field::Latitude => "latitude",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest known value per field. Fields may come from different update instants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    values: [Option<f64>; 6],
}

impl TelemetrySnapshot {
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: f64) {
        self.values[field.index()] = Some(value);
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// The fully populated pose, if every field has been received.
    pub fn pose(&self) -> Option<PoseFix> {
        match (
            self.get(Field::Roll),
            self.get(Field::Pitch),
            self.get(Field::Heading),
            self.get(Field::Altitude),
            self.get(Field::Longitude),
            self.get(Field::Latitude),
        ) {
            (
                Some(roll),
                Some(pitch),
                Some(heading),
                Some(altitude),
                Some(longitude),
                Some(latitude),
            ) => Some(PoseFix {
                roll,
                pitch,
                heading,
                altitude,
                longitude,
                latitude,
            }),
            _ => None,
        }
    }
}

/// A complete snapshot. Angles in degrees, altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PoseFix {
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    pub altitude: f64,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: TelemetrySnapshot,
    updated_at: [Option<DateTime<Utc>>; 6],
}

/// Shared per-field telemetry state, written by the ingestor and read by the cycle.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    shared: Mutex<Shared>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&self, field: Field, value: f64) {
        let mut locked = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        locked.snapshot.set(field, value);
        locked.updated_at[field.index()] = Some(Utc::now());
    }

    pub fn read_snapshot(&self) -> TelemetrySnapshot {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
    }

    pub fn last_update(&self, field: Field) -> Option<DateTime<Utc>> {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at[field.index()]
    }

    pub fn is_complete(snapshot: &TelemetrySnapshot) -> bool {
        snapshot.is_complete()
    }
}
