//! Tracing subscriber setup shared by the focusbot binaries.

pub mod subscriber;

pub use subscriber::{init_subscriber, try_init_subscriber, TelemetryConfig};
