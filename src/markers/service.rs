use async_trait::async_trait;
use geo_types::Polygon;
use geojson::{Feature, Geometry, JsonObject};
use std::fmt;

use super::error::MarkerError;

/// Opaque identifier assigned by the marker service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerId(pub String);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(pub String);

/// Remote marker store. Deleting an unknown id must succeed.
#[async_trait]
pub trait MarkerService: Send + Sync {
    async fn get_token(&self) -> Result<Token, MarkerError>;
    async fn add_marker(&self, token: &Token, feature: &Feature) -> Result<MarkerId, MarkerError>;
    async fn modify_marker(
        &self,
        token: &Token,
        feature: &Feature,
        id: &MarkerId,
    ) -> Result<(), MarkerError>;
    async fn delete_marker(&self, token: &Token, id: &MarkerId) -> Result<(), MarkerError>;
}

pub fn marker_feature(geometry: &Polygon<f64>, group: &str, color: &str) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("group".into(), group.into());
    properties.insert("color".into(), color.into());
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
