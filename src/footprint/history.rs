use chrono::{DateTime, Utc};
use geo_types::Polygon;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::error::HistoryError;
use crate::telemetry::PoseFix;

#[derive(Debug, Clone)]
pub struct FootprintRecord {
    pub geometry: Polygon<f64>,
    pub computed_at: DateTime<Utc>,
    pub pose: PoseFix,
}

impl FootprintRecord {
    fn to_feature(&self) -> Result<Feature, HistoryError> {
        let mut properties = JsonObject::new();
        properties.insert(
            "computed_at".into(),
            serde_json::Value::String(self.computed_at.to_rfc3339()),
        );
        properties.insert("pose".into(), serde_json::to_value(self.pose)?);
        Ok(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        })
    }
}

/// Every footprint computed during the run, in computation order.
#[derive(Debug, Default)]
pub struct FootprintHistory {
    records: Vec<FootprintRecord>,
}

impl FootprintHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: FootprintRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the whole history as one GeoJSON feature collection named after `run_time`.
    pub fn flush(&self, output_dir: &Path, run_time: DateTime<Utc>) -> Result<PathBuf, HistoryError> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("footprint_{}.geojson", run_time.format("%Y%m%d-%H%M")));

        let collection = FeatureCollection {
            bbox: None,
            features: self
                .records
                .iter()
                .map(FootprintRecord::to_feature)
                .collect::<Result<Vec<_>, _>>()?,
            foreign_members: None,
        };
        fs::write(&path, serde_json::to_string(&collection)?)?;
        Ok(path)
    }
}
