//! Metrics exposition.
//!
//! - `/metrics` : Prometheus text format, served from the raw route table so
//!   scrapes never pass through payload validation or the global prefix.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, response::{IntoResponse, Response}};

use bootwire_core::error::Result;

use crate::app::Application;
use crate::obs::{metrics::CONTENT_TYPE, process, MetricsRegistry};

pub const METRICS_PATH: &str = "/metrics";

/// Registry tagged with `service=<service_name>`, with process metrics
/// sampled every `sample_interval`.
pub fn create_registry(service_name: &str, sample_interval: Duration) -> Result<Arc<MetricsRegistry>> {
    let registry = Arc::new(MetricsRegistry::new(service_name));
    process::start(&registry, sample_interval)?;
    Ok(registry)
}

/// Snapshot of the registry and its content type. Read-only.
pub fn handle_scrape(registry: &MetricsRegistry) -> (String, &'static str) {
    (registry.render(), CONTENT_TYPE)
}

/// Attach the scrape handler on the application's raw route table.
pub fn attach(app: &mut Application, registry: Arc<MetricsRegistry>) -> Result<()> {
    app.http_adapter().get(METRICS_PATH, move || {
        let registry = Arc::clone(&registry);
        async move { scrape(&registry) }
    })?;
    app.note_raw_route(METRICS_PATH);
    Ok(())
}

fn scrape(registry: &MetricsRegistry) -> Response {
    let (body, content_type) = handle_scrape(registry);
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}
