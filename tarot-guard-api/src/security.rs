//! Security module for tarot-guard-api
//!
//! Provides the response-layer protection of AI-generated content:
//! - Endpoint guards for reading and AI-generation routes
//! - Response classification and redaction by requester role
//! - Audit logging of every access decision

pub mod audit;
pub mod content_filter;
pub mod guards;
pub mod request_context;

pub use audit::{
    AuditError, AuditLogger, AuditOutcome, AuditRecord, AuditResult, AuditSeverity,
    AuditWriter, CompositeAuditWriter, DatabaseAuditWriter, FileAuditWriter,
    TracingAuditWriter,
};
pub use content_filter::{
    ai_content_filter_middleware, FailureMode, DEFAULT_BODY_LIMIT, X_ACCESS_LEVEL,
    X_CONTENT_CLASSIFICATION, X_FILTERED_AT, X_FILTERED_FIELDS_COUNT, X_READER_WARNING,
    X_SECURITY_FILTER_REASON,
};
pub use guards::{
    ai_endpoint_guard, reading_endpoint_guard, EndpointGuards, DEFAULT_AI_GENERATION_PATTERNS,
    DEFAULT_READING_PATTERNS,
};
pub use request_context::RequestContext;
