/// Monitoring engine module - probes checks and tracks their state
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS targets with a hard timeout
/// - Deciding up/down transitions and when to alert
/// - Scheduling the periodic check cycle and log rotation
pub mod executor;
pub mod prober;
pub mod scheduler;
pub mod state;
pub mod types;

pub use executor::{CycleSummary, MonitoringExecutor, ProbeReport};
pub use prober::{HttpProber, Prober};
pub use scheduler::MonitoringScheduler;
pub use types::{LogEntry, Outcome, ProbeError, ProbeErrorKind};
