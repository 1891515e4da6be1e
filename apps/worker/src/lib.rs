//! Check worker of the uptime monitor.
//!
//! Periodically probes every stored check, records up/down transitions,
//! alerts owners when a check flips and keeps a rotating per-check log of
//! every probe.

pub mod alerts;
pub mod checks;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod rotation;
pub mod store;

pub use config::Config;
pub use error::{StoreError, WorkerError};
