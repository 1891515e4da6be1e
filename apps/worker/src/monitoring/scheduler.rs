use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::executor::MonitoringExecutor;
use crate::rotation::LogRotation;

/// Drives the periodic jobs of the worker: the check cycle and the log
/// rotation sweep, each on its own timer.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    rotation: Arc<LogRotation>,
    check_interval: Duration,
    rotation_interval: Duration,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        rotation: Arc<LogRotation>,
        check_interval: Duration,
        rotation_interval: Duration,
    ) -> Self {
        Self { executor, rotation, check_interval, rotation_interval }
    }

    /// Start the check cycle: once now, then every `check_interval`
    pub fn schedule_checks(&self) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        info!(interval_secs = self.check_interval.as_secs(), "Scheduling check cycle");

        spawn_periodic("check cycle", self.check_interval, move || {
            let executor = Arc::clone(&executor);
            async move {
                executor.gather_all_checks().await;
            }
        })
    }

    /// Start log rotation: once now, then every `rotation_interval`
    pub fn schedule_rotation(&self) -> JoinHandle<()> {
        let rotation = Arc::clone(&self.rotation);
        info!(interval_secs = self.rotation_interval.as_secs(), "Scheduling log rotation");

        spawn_periodic("log rotation", self.rotation_interval, move || {
            let rotation = Arc::clone(&rotation);
            async move {
                rotation.rotate_all().await;
            }
        })
    }

    /// Start both timers
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![self.schedule_checks(), self.schedule_rotation()]
    }
}

/// Run `job` immediately and then every `period`, forever.
///
/// Each run is spawned on its own task and never awaited by the timer, so a
/// slow or hung run cannot delay the following ticks.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            debug!(job = name, "Timer fired");
            tokio::spawn(job());
        }
    })
}
