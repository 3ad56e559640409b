//! Audit trail for AI-content access decisions
//!
//! Every decision the guards and the response filter take about AI-derived
//! content ends up here as an [`AuditRecord`]. Records are handed to an
//! [`AuditWriter`] off the response path: a failed write is logged locally and
//! never surfaces to the client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tarot_guard_core::{Principal, Role};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::request_context::RequestContext;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors that can occur during audit logging
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// What happened to the AI content of a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    /// Delivered as produced
    Allowed,
    /// Delivered with AI fields removed, or a filter fault was recorded
    Filtered,
    /// Request rejected or flagged by an endpoint guard
    Blocked,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Allowed => "ALLOWED",
            AuditOutcome::Filtered => "FILTERED",
            AuditOutcome::Blocked => "BLOCKED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Critical => "critical",
        }
    }
}

/// One access decision, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_id: String,
    pub role: Role,
    pub endpoint: String,
    pub http_method: String,
    pub outcome: AuditOutcome,
    pub severity: AuditSeverity,
    /// Field names (or detected patterns) the decision concerned
    pub fields_touched: Vec<String>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

impl AuditRecord {
    pub fn new(principal: &Principal, ctx: &RequestContext, outcome: AuditOutcome) -> Self {
        let severity = match outcome {
            AuditOutcome::Allowed => AuditSeverity::Info,
            AuditOutcome::Filtered | AuditOutcome::Blocked => AuditSeverity::Warning,
        };

        Self {
            id: Uuid::new_v4(),
            actor_id: principal.id.clone(),
            role: principal.role,
            endpoint: ctx.path.clone(),
            http_method: ctx.method.to_string(),
            outcome,
            severity,
            fields_touched: Vec::new(),
            ip: ctx.ip,
            user_agent: ctx.user_agent.clone(),
            timestamp: Utc::now(),
            metadata: Value::Null,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields_touched = fields;
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Destination for audit records
#[async_trait]
pub trait AuditWriter: Send + Sync {
    async fn write(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Flush any pending writes
    async fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}

/// Front for an [`AuditWriter`], cheap to clone into request state
#[derive(Clone)]
pub struct AuditLogger {
    writer: Arc<dyn AuditWriter>,
}

impl AuditLogger {
    pub fn new(writer: Box<dyn AuditWriter>) -> Self {
        Self {
            writer: Arc::from(writer),
        }
    }

    /// Write a record in the background.
    ///
    /// The caller never waits on the store; failures are only logged.
    pub fn dispatch(&self, record: AuditRecord) {
        let writer = Arc::clone(&self.writer);
        tokio::spawn(async move {
            if let Err(e) = writer.write(&record).await {
                report_write_failure(&record, &e);
            }
        });
    }
}

fn report_write_failure(record: &AuditRecord, err: &AuditError) {
    counter!("audit_write_failures_total").increment(1);
    warn!(
        audit_id = %record.id,
        outcome = record.outcome.as_str(),
        endpoint = %record.endpoint,
        error = %err,
        "Failed to write audit record"
    );
}

/// Writes audit records to the admin audit log table in PostgreSQL
pub struct DatabaseAuditWriter {
    pool: PgPool,
}

impl DatabaseAuditWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditWriter for DatabaseAuditWriter {
    async fn write(&self, record: &AuditRecord) -> AuditResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_logs (
                id, actor_id, role, endpoint, http_method, outcome, severity,
                fields_touched, ip_address, user_agent, created_at, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(&record.actor_id)
        .bind(record.role.as_str())
        .bind(&record.endpoint)
        .bind(&record.http_method)
        .bind(record.outcome.as_str())
        .bind(record.severity.as_str())
        .bind(&record.fields_touched)
        .bind(record.ip.map(|ip| ip.to_string()))
        .bind(record.user_agent.as_ref())
        .bind(record.timestamp)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Appends audit records to a JSON-lines file
pub struct FileAuditWriter {
    file_path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileAuditWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuditWriter for FileAuditWriter {
    async fn write(&self, record: &AuditRecord) -> AuditResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.file_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)
                .await?;
            *guard = Some(file);
        }

        if let Some(ref mut file) = *guard {
            file.write_all(line.as_bytes()).await?;
        }

        Ok(())
    }

    async fn flush(&self) -> AuditResult<()> {
        let mut guard = self.file.lock().await;
        if let Some(ref mut file) = *guard {
            file.flush().await?;
        }
        Ok(())
    }
}

/// Emits audit records as structured tracing events
#[derive(Default)]
pub struct TracingAuditWriter;

impl TracingAuditWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditWriter for TracingAuditWriter {
    async fn write(&self, record: &AuditRecord) -> AuditResult<()> {
        match record.outcome {
            AuditOutcome::Allowed => {
                info!(
                    audit_id = %record.id,
                    actor_id = %record.actor_id,
                    role = %record.role,
                    endpoint = %record.endpoint,
                    method = %record.http_method,
                    outcome = record.outcome.as_str(),
                    fields = ?record.fields_touched,
                    "AI content access"
                );
            }
            AuditOutcome::Filtered | AuditOutcome::Blocked => {
                warn!(
                    audit_id = %record.id,
                    actor_id = %record.actor_id,
                    role = %record.role,
                    endpoint = %record.endpoint,
                    method = %record.http_method,
                    outcome = record.outcome.as_str(),
                    severity = record.severity.as_str(),
                    fields = ?record.fields_touched,
                    ip = ?record.ip,
                    "AI content access"
                );
            }
        }

        Ok(())
    }
}

/// Fans records out to several writers
#[derive(Default)]
pub struct CompositeAuditWriter {
    writers: Vec<Arc<dyn AuditWriter>>,
}

impl CompositeAuditWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_writer(mut self, writer: Box<dyn AuditWriter>) -> Self {
        self.writers.push(Arc::from(writer));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

#[async_trait]
impl AuditWriter for CompositeAuditWriter {
    async fn write(&self, record: &AuditRecord) -> AuditResult<()> {
        let mut failures = 0;

        for writer in &self.writers {
            if let Err(e) = writer.write(record).await {
                error!("Audit writer failed: {}", e);
                failures += 1;
            }
        }

        // Only an error when nothing got through
        if failures > 0 && failures == self.writers.len() {
            return Err(AuditError::WriteFailed(
                "All audit writers failed".to_string(),
            ));
        }

        Ok(())
    }

    async fn flush(&self) -> AuditResult<()> {
        for writer in &self.writers {
            writer.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::Ipv4Addr;

    struct FailingWriter;

    #[async_trait]
    impl AuditWriter for FailingWriter {
        async fn write(&self, _record: &AuditRecord) -> AuditResult<()> {
            Err(AuditError::WriteFailed("store offline".to_string()))
        }
    }

    fn context() -> RequestContext {
        RequestContext {
            path: "/api/readings/1".to_string(),
            method: Method::GET,
            ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            user_agent: Some("test-agent".to_string()),
        }
    }

    fn record(outcome: AuditOutcome) -> AuditRecord {
        AuditRecord::new(&Principal::new("client-1", Role::Client), &context(), outcome)
    }

    #[test]
    fn test_record_creation() {
        let record = record(AuditOutcome::Filtered)
            .with_fields(vec!["ai_notes".to_string()])
            .with_metadata(serde_json::json!({"reason": "unauthorized_role_client"}));

        assert_eq!(record.actor_id, "client-1");
        assert_eq!(record.role, Role::Client);
        assert_eq!(record.endpoint, "/api/readings/1");
        assert_eq!(record.http_method, "GET");
        assert_eq!(record.severity, AuditSeverity::Warning);
        assert_eq!(record.fields_touched, vec!["ai_notes"]);
    }

    #[test]
    fn test_record_serialization() {
        let record = record(AuditOutcome::Blocked).with_severity(AuditSeverity::Critical);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["outcome"], "BLOCKED");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["role"], "client");
        assert_eq!(json["ip"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_tracing_audit_writer() {
        let writer = TracingAuditWriter::new();
        assert!(writer.write(&record(AuditOutcome::Allowed)).await.is_ok());
        assert!(writer.write(&record(AuditOutcome::Blocked)).await.is_ok());
    }

    #[tokio::test]
    async fn test_composite_writer_tolerates_partial_failure() {
        let composite = CompositeAuditWriter::new()
            .add_writer(Box::new(FailingWriter))
            .add_writer(Box::new(TracingAuditWriter::new()));

        assert!(composite.write(&record(AuditOutcome::Filtered)).await.is_ok());
    }

    #[tokio::test]
    async fn test_composite_writer_all_failed() {
        let composite = CompositeAuditWriter::new().add_writer(Box::new(FailingWriter));

        let result = composite.write(&record(AuditOutcome::Filtered)).await;
        assert!(matches!(result, Err(AuditError::WriteFailed(_))));
    }

    #[test]
    fn test_dispatch_counts_failed_writes() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let logger = AuditLogger::new(Box::new(FailingWriter));
                logger.dispatch(record(AuditOutcome::Filtered));
                logger.dispatch(record(AuditOutcome::Blocked));
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
            });
        });

        assert!(handle.render().contains("audit_write_failures_total 2"));
    }

    #[tokio::test]
    async fn test_file_writer_appends_json_lines() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file_path = temp_dir.path().join("audit").join("ai_access.log");
        let writer = FileAuditWriter::new(file_path.clone());

        writer.write(&record(AuditOutcome::Filtered)).await.unwrap();
        writer.write(&record(AuditOutcome::Allowed)).await.unwrap();
        writer.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&file_path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"FILTERED\""));
        assert!(lines[1].contains("\"ALLOWED\""));
    }
}
