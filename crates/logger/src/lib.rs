//! Shared tracing setup for the uptime worker binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, parse_level};
