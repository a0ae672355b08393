use thiserror::Error;

use crate::markers::MarkerError;

#[derive(Debug, Error)]
pub enum FootprintError {
    #[error("aircraft is not above the ground plane (height {0:.1} m)")]
    BelowGround(f64),
    #[error("image corner {0} does not intersect the ground")]
    HorizonInView(usize),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single cycle. Never stops the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("footprint computation failed: {0}")]
    Compute(#[from] FootprintError),
    #[error("marker publication failed: {0}")]
    Publish(#[from] MarkerError),
}
