mod cadence;

pub use cadence::{CadenceScheduler, CycleTask};
