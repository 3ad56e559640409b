//! Prometheus export of the guard counters
//!
//! Counters recorded by the filter and guards:
//! - `ai_content_decisions_total{outcome}`: allowed, filtered or error
//! - `ai_content_fields_removed_total`
//! - `ai_guard_blocks_total{guard}`: reading or ai_generation
//! - `audit_write_failures_total`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to install metrics exporter: {0}")]
    Installation(String),
}

/// Installs the Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> Result<(), MetricsError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Installation("Handle already set".to_string()))?;

    register_metric_descriptions();
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(
        "ai_content_decisions_total",
        "Responses inspected by the AI content filter, by outcome"
    );
    describe_counter!(
        "ai_content_fields_removed_total",
        "AI-derived keys removed from responses"
    );
    describe_counter!(
        "ai_guard_blocks_total",
        "Requests flagged or rejected by an endpoint guard"
    );
    describe_counter!(
        "audit_write_failures_total",
        "Audit records that could not be written"
    );
}

/// Prometheus scrape endpoint
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => {
            error!("Metrics handler called but metrics not initialized");
            (StatusCode::INTERNAL_SERVER_ERROR, "Metrics not initialized").into_response()
        }
    }
}
