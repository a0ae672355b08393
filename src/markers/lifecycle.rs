use chrono::{DateTime, Utc};
use geo_types::Polygon;
use geojson::Feature;

use super::error::MarkerError;
use super::retry::RetryPolicy;
use super::service::{marker_feature, MarkerId, MarkerService, Token};
use crate::config::MarkersConfig;

#[derive(Debug, Clone)]
pub struct MarkerStyle {
    pub group: String,
    pub current_color: String,
    pub superseded_color: String,
}

impl From<&MarkersConfig> for MarkerStyle {
    fn from(config: &MarkersConfig) -> Self {
        Self {
            group: config.group.clone(),
            current_color: config.current_color.clone(),
            superseded_color: config.superseded_color.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerRecord {
    pub remote_id: MarkerId,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
    feature: Feature,
}

#[derive(Debug, Default, PartialEq)]
pub struct EvictionReport {
    pub deleted: Vec<MarkerId>,
    pub failed: Vec<MarkerId>,
}

/// Ledger of the markers currently live on the remote service, oldest first.
///
/// At most one record is current. Records older than the eviction window are
/// deleted remotely and dropped from the ledger; a failed delete keeps the
/// record so the next cycle retries it.
pub struct MarkerLifecycleManager {
    service: Box<dyn MarkerService>,
    style: MarkerStyle,
    window: chrono::Duration,
    retry: RetryPolicy,
    ledger: Vec<MarkerRecord>,
}

impl MarkerLifecycleManager {
    pub fn new(
        service: Box<dyn MarkerService>,
        style: MarkerStyle,
        window: std::time::Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            style,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            retry,
            ledger: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &[MarkerRecord] {
        &self.ledger
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&MarkerRecord> {
        self.ledger.iter().find(|r| r.is_current)
    }

    pub async fn acquire_token(&self) -> Result<Token, MarkerError> {
        let service = self.service.as_ref();
        self.retry.run("get_token", || service.get_token()).await
    }

    /// Creates a marker for `geometry`, demotes the previous one and evicts expired ones.
    pub async fn publish(
        &mut self,
        geometry: &Polygon<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<MarkerRecord, MarkerError> {
        let token = self.acquire_token().await?;

        let feature = marker_feature(geometry, &self.style.group, &self.style.current_color);
        let service = self.service.as_ref();
        let id = self
            .retry
            .run("add_marker", || service.add_marker(&token, &feature))
            .await?;

        if self.ledger.iter().any(|r| r.remote_id == id) {
            log::error!(
                "service returned marker id {} twice; the marker created at {} is not tracked and will never be evicted",
                id,
                timestamp
            );
            return Err(MarkerError::InvalidResponse(format!(
                "marker id {} is already in the ledger",
                id
            )));
        }
        log::info!("created marker {} at {}", id, timestamp);

        self.supersede(&token).await;

        let record = MarkerRecord {
            remote_id: id.clone(),
            created_at: timestamp,
            is_current: true,
            feature,
        };
        self.ledger.push(record.clone());

        let report = self.evict(&token, timestamp, Some(&id)).await;
        if !report.deleted.is_empty() || !report.failed.is_empty() {
            log::info!(
                "evicted {} markers, {} left for retry, {} live",
                report.deleted.len(),
                report.failed.len(),
                self.ledger.len()
            );
        }

        Ok(record)
    }

    /// Demotes the current record, recoloring it remotely. A failed modify is logged only.
    async fn supersede(&mut self, token: &Token) {
        let Some(previous) = self.ledger.iter_mut().find(|r| r.is_current) else {
            return;
        };
        previous.is_current = false;
        if let Some(properties) = previous.feature.properties.as_mut() {
            properties.insert(
                "color".into(),
                self.style.superseded_color.as_str().into(),
            );
        }

        let service = self.service.as_ref();
        let feature = &previous.feature;
        let id = &previous.remote_id;
        if let Err(e) = self
            .retry
            .run("modify_marker", || service.modify_marker(token, feature, id))
            .await
        {
            log::error!("failed to demote marker {}: {}", id, e);
        }
    }

    /// Deletes every record created before `now - window`, oldest first, except `keep`.
    pub async fn evict(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        keep: Option<&MarkerId>,
    ) -> EvictionReport {
        let Some(cutoff) = now.checked_sub_signed(self.window) else {
            return EvictionReport::default();
        };
        let mut expired: Vec<(DateTime<Utc>, MarkerId)> = self
            .ledger
            .iter()
            .filter(|r| r.created_at < cutoff && Some(&r.remote_id) != keep)
            .map(|r| (r.created_at, r.remote_id.clone()))
            .collect();
        expired.sort_by_key(|(created_at, _)| *created_at);

        let mut report = EvictionReport::default();
        let service = self.service.as_ref();
        for (created_at, id) in expired {
            match self
                .retry
                .run("delete_marker", || service.delete_marker(token, &id))
                .await
            {
                Ok(()) => {
                    log::debug!("deleted marker {} created at {}", id, created_at);
                    report.deleted.push(id);
                }
                Err(e) => {
                    log::warn!(
                        "failed to delete marker {} created at {}, keeping it for retry: {}",
                        id,
                        created_at,
                        e
                    );
                    report.failed.push(id);
                }
            }
        }

        self.ledger
            .retain(|r| !report.deleted.contains(&r.remote_id));
        report
    }
}
