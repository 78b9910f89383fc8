//! In-process metrics.
//!
//! `metrics` is the registry and its text renderer; `process` samples
//! process-level gauges into it on a timer owned by the registry.

pub mod metrics;
pub mod process;

pub use metrics::{CounterVec, GaugeVec, HistogramVec, MetricsRegistry, CONTENT_TYPE};
