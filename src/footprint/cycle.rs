use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use super::engine::FootprintEngine;
use super::error::CycleError;
use super::history::{FootprintHistory, FootprintRecord};
use crate::markers::{MarkerLifecycleManager, MarkerRecord};
use crate::scheduler::CycleTask;
use crate::telemetry::{Field, SnapshotStore};

#[derive(Debug)]
pub enum CycleOutcome {
    /// Telemetry still warming up or stalled.
    Incomplete(Vec<Field>),
    /// Aircraft assumed on the ground.
    BelowGuard(f64),
    /// Footprint computed; publishing disabled.
    Computed,
    Published(MarkerRecord),
}

/// One tick of work: snapshot, altitude guard, footprint, history, publication.
pub struct FootprintCycle {
    store: Arc<SnapshotStore>,
    engine: Box<dyn FootprintEngine>,
    markers: Option<MarkerLifecycleManager>,
    history: Option<FootprintHistory>,
    output_dir: PathBuf,
    min_altitude_m: f64,
    started_at: DateTime<Utc>,
}

impl FootprintCycle {
    pub fn new(
        store: Arc<SnapshotStore>,
        engine: Box<dyn FootprintEngine>,
        min_altitude_m: f64,
    ) -> Self {
        Self {
            store,
            engine,
            markers: None,
            history: None,
            output_dir: PathBuf::new(),
            min_altitude_m,
            started_at: Utc::now(),
        }
    }

    pub fn with_markers(mut self, markers: MarkerLifecycleManager) -> Self {
        self.markers = Some(markers);
        self
    }

    pub fn with_history(mut self, output_dir: PathBuf) -> Self {
        self.history = Some(FootprintHistory::new());
        self.output_dir = output_dir;
        self
    }

    #[cfg(test)]
    pub fn history(&self) -> Option<&FootprintHistory> {
        self.history.as_ref()
    }

    #[cfg(test)]
    pub fn markers(&self) -> Option<&MarkerLifecycleManager> {
        self.markers.as_ref()
    }

    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, CycleError> {
        let snapshot = self.store.read_snapshot();
        if !SnapshotStore::is_complete(&snapshot) {
            return Ok(CycleOutcome::Incomplete(snapshot.missing()));
        }
        let Some(pose) = snapshot.pose() else {
            return Ok(CycleOutcome::Incomplete(snapshot.missing()));
        };

        if pose.altitude < self.min_altitude_m {
            return Ok(CycleOutcome::BelowGuard(pose.altitude));
        }

        let geometry = self.engine.compute(&pose, now)?;
        log::debug!(
            "footprint at {}: roll {} pitch {} heading {} altitude {} lon {} lat {}",
            now,
            pose.roll,
            pose.pitch,
            pose.heading,
            pose.altitude,
            pose.longitude,
            pose.latitude
        );

        if let Some(history) = self.history.as_mut() {
            history.append(FootprintRecord {
                geometry: geometry.clone(),
                computed_at: now,
                pose,
            });
        }

        match self.markers.as_mut() {
            Some(markers) => Ok(CycleOutcome::Published(
                markers.publish(&geometry, now).await?,
            )),
            None => Ok(CycleOutcome::Computed),
        }
    }

    fn report_incomplete(&self, missing: &[Field]) {
        let detail: Vec<String> = missing
            .iter()
            .map(|f| match self.store.last_update(*f) {
                Some(t) => format!("{} (last {})", f, t),
                None => f.to_string(),
            })
            .collect();
        log::warn!("snapshot incomplete, missing: {}", detail.join(", "));
    }

    /// Writes the accumulated history. Runs at most once.
    pub fn flush_history(&mut self) {
        let Some(history) = self.history.take() else {
            return;
        };
        match history.flush(&self.output_dir, self.started_at) {
            Ok(path) => log::info!(
                "saved {} footprints to {}",
                history.len(),
                path.display()
            ),
            Err(e) => log::error!(
                "failed to save footprint history to {}: {}",
                self.output_dir.display(),
                e
            ),
        }
    }
}

#[async_trait]
impl CycleTask for FootprintCycle {
    async fn fire(&mut self) {
        let now = Utc::now();
        match self.run_once(now).await {
            Ok(CycleOutcome::Incomplete(missing)) => self.report_incomplete(&missing),
            Ok(CycleOutcome::BelowGuard(altitude)) => {
                log::debug!("altitude {} below guard, skipping", altitude)
            }
            Ok(CycleOutcome::Computed) => log::info!("footprint computed at {}", now),
            Ok(CycleOutcome::Published(record)) => {
                log::info!("footprint published as marker {}", record.remote_id)
            }
            Err(e) => log::error!("cycle at {} aborted: {}", now, e),
        }
    }

    async fn shutdown(&mut self) {
        self.flush_history();
    }
}
