mod client;
mod error;
mod lifecycle;
mod retry;
mod service;

#[cfg(test)]
pub mod testing;

pub use client::PlaneteClient;
pub use error::MarkerError;
pub use lifecycle::{MarkerLifecycleManager, MarkerRecord, MarkerStyle};
pub use retry::RetryPolicy;
