//! Pre-handler guards for reading and AI-generation endpoints
//!
//! Both guards are predicates over the principal's role and the request path.
//! The reading guard is advisory: it records a BLOCKED audit entry and lets
//! the request through. The AI-generation guard enforces: it answers 403
//! before the handler runs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use regex::Regex;
use serde_json::json;

use super::audit::{AuditOutcome, AuditRecord, AuditSeverity};
use super::request_context::RequestContext;
use crate::{error::ApiError, middleware::current_principal, GuardState};

/// Default path patterns for reading and tarot endpoints
pub const DEFAULT_READING_PATTERNS: &[&str] = &[
    r"(?i)/readings?(/|$)",
    r"(?i)/tarot(/|$)",
    r"(?i)/spreads?(/|$)",
];

/// Default path patterns for direct AI-generation endpoints
pub const DEFAULT_AI_GENERATION_PATTERNS: &[&str] = &[r"(?i)/ai/(generate|interpret|reading)(/|$)"];

/// Compiled path patterns for both guards
#[derive(Debug, Clone)]
pub struct EndpointGuards {
    reading: Vec<Regex>,
    ai_generation: Vec<Regex>,
}

impl EndpointGuards {
    pub fn new<R, A>(reading: R, ai_generation: A) -> Result<Self, regex::Error>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Ok(Self {
            reading: compile(reading)?,
            ai_generation: compile(ai_generation)?,
        })
    }

    pub fn is_reading_path(&self, path: &str) -> bool {
        self.reading.iter().any(|re| re.is_match(path))
    }

    pub fn is_ai_generation_path(&self, path: &str) -> bool {
        self.ai_generation.iter().any(|re| re.is_match(path))
    }
}

impl Default for EndpointGuards {
    fn default() -> Self {
        Self::new(DEFAULT_READING_PATTERNS, DEFAULT_AI_GENERATION_PATTERNS)
            .expect("default guard patterns are valid")
    }
}

fn compile<I>(patterns: I) -> Result<Vec<Regex>, regex::Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns.into_iter().map(|p| Regex::new(p.as_ref())).collect()
}

/// Rejects unauthorized principals on AI-generation endpoints with 403.
pub async fn ai_endpoint_guard(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let principal = current_principal(&request);

    if state.policy.is_authorized(principal.role)
        || !state.guards.is_ai_generation_path(request.uri().path())
    {
        return next.run(request).await;
    }

    let ctx = RequestContext::from_request(&request);
    counter!("ai_guard_blocks_total", "guard" => "ai_generation").increment(1);
    tracing::warn!(
        actor_id = %principal.id,
        role = %principal.role,
        endpoint = %ctx.path,
        "Blocked AI generation request"
    );

    state.audit.dispatch(
        AuditRecord::new(&principal, &ctx, AuditOutcome::Blocked)
            .with_severity(AuditSeverity::Critical)
            .with_metadata(json!({
                "denial_reason": "unauthorized access to AI generation endpoint",
                "guard": "ai_generation",
            })),
    );

    ApiError::AiAccessDenied.into_response()
}

/// Records unauthorized access to reading endpoints, then continues.
pub async fn reading_endpoint_guard(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let principal = current_principal(&request);

    if !state.policy.is_authorized(principal.role)
        && state.guards.is_reading_path(request.uri().path())
    {
        let ctx = RequestContext::from_request(&request);
        counter!("ai_guard_blocks_total", "guard" => "reading").increment(1);

        state.audit.dispatch(
            AuditRecord::new(&principal, &ctx, AuditOutcome::Blocked).with_metadata(json!({
                "denial_reason": "unauthorized access to reading endpoint",
                "guard": "reading",
                "enforced": false,
            })),
        );
    }

    next.run(request).await
}
