use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

/// Work driven by the scheduler.
#[async_trait]
pub trait CycleTask: Send {
    /// One cycle. Failures are handled inside; the scheduler never sees them.
    async fn fire(&mut self);
    /// Called exactly once after the scheduler stops.
    async fn shutdown(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Waiting,
    Firing,
    Stopped,
}

/// Delay until the next multiple of `period` measured from the start instant.
pub fn next_delay(elapsed: Duration, period: Duration) -> Duration {
    let period_ns = period.as_nanos();
    if period_ns == 0 {
        return Duration::ZERO;
    }
    let into_period = (elapsed.as_nanos() % period_ns) as u64;
    period - Duration::from_nanos(into_period)
}

/// Fixed-interval trigger aligned on its start instant.
///
/// Ticks that are missed because a cycle ran long are not caught up; the
/// next tick is simply the next period boundary.
pub struct CadenceScheduler {
    period: Duration,
    start: Instant,
    state: SchedulerState,
    ticks: u64,
}

impl CadenceScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            start: Instant::now(),
            state: SchedulerState::Waiting,
            ticks: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[cfg(test)]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs until `stop_rx` resolves, then calls the task's shutdown hook.
    /// A dropped sender counts as a stop request.
    pub async fn run<T: CycleTask + ?Sized>(
        &mut self,
        task: &mut T,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        loop {
            self.state = SchedulerState::Waiting;
            let delay = next_delay(self.start.elapsed(), self.period);

            let should_stop = tokio::select! {
                _ = sleep_until(Instant::now() + delay) => false,
                _ = &mut stop_rx => true,
            };
            if should_stop {
                break;
            }

            self.state = SchedulerState::Firing;
            self.ticks += 1;
            let should_stop = tokio::select! {
                _ = task.fire() => false,
                _ = &mut stop_rx => true,
            };
            if should_stop {
                log::info!("stop requested during cycle {}", self.ticks);
                break;
            }
        }

        self.state = SchedulerState::Stopped;
        log::info!("scheduler {:?} after {} cycles", self.state, self.ticks);
        task.shutdown().await;
    }
}
