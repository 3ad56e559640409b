//! Observability for the guard layers
//!
//! - Structured logging initialization on top of `tracing-subscriber`
//! - Prometheus export of filter and guard counters

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, metrics_handler, MetricsError};
