mod cycle;
mod engine;
mod error;
mod history;

pub use cycle::FootprintCycle;
pub use engine::PinholeFootprint;
