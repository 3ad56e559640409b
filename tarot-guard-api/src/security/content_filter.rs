//! Outbound response filtering of AI-derived content
//!
//! [`ai_content_filter_middleware`] wraps the downstream handler: it lets the
//! handler produce its response, classifies the JSON body against the
//! requester's role, strips AI-derived keys for unauthorized principals and
//! records the decision in the audit trail.

use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{header, response::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tarot_guard_core::{AccessDecision, CoreError, Principal, Redaction};
use tracing::{debug, error};

use super::audit::{AuditOutcome, AuditRecord};
use super::request_context::RequestContext;
use crate::{error::ApiError, middleware::current_principal, GuardState};

pub const X_SECURITY_FILTER_REASON: HeaderName = HeaderName::from_static("x-security-filter-reason");
pub const X_FILTERED_FIELDS_COUNT: HeaderName = HeaderName::from_static("x-filtered-fields-count");
pub const X_ACCESS_LEVEL: HeaderName = HeaderName::from_static("x-access-level");
pub const X_FILTERED_AT: HeaderName = HeaderName::from_static("x-filtered-at");
pub const X_READER_WARNING: HeaderName = HeaderName::from_static("x-reader-warning");
pub const X_CONTENT_CLASSIFICATION: HeaderName = HeaderName::from_static("x-content-classification");

/// Largest response body the filter buffers by default
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

const ACCESS_LEVEL_RESTRICTED: &str = "client-restricted";
const READER_WARNING: &str = "Contains AI-generated content - do not forward to clients";
const CLASSIFICATION_AI_INTERNAL: &str = "ai-assisted-internal";

/// What the filter does when classification or redaction fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Deliver the original, unfiltered body
    #[default]
    Open,
    /// Replace the body with an `AI_FILTER_FAILURE` error
    Closed,
}

impl FailureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::Open => "open",
            FailureMode::Closed => "closed",
        }
    }
}

/// Marks a request already handled by an outer instance of the filter
#[derive(Debug, Clone, Copy)]
struct ContentFilterApplied;

enum FilterOutcome {
    /// Nothing to report, deliver as produced
    Untouched,
    /// Authorized principal, payload carries AI content
    Advisory { detected: Vec<String> },
    /// Unauthorized principal, AI content removed
    Redacted {
        decision: AccessDecision,
        redaction: Redaction,
        body: Vec<u8>,
    },
}

/// Classifies and, when needed, redacts every JSON response body.
///
/// Only the outermost instance of this layer acts on a request; nested
/// instances pass straight through so the downstream service runs once and
/// at most one audit record is written.
pub async fn ai_content_filter_middleware(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<ContentFilterApplied>().is_some() {
        return next.run(request).await;
    }
    request.extensions_mut().insert(ContentFilterApplied);

    let principal = current_principal(&request);
    let ctx = RequestContext::from_request(&request);

    let response = next.run(request).await;
    if !is_inspectable(response.headers()) {
        return response;
    }

    if let Some(size) = response.body().size_hint().exact() {
        if size > state.body_limit as u64 {
            let reason = format!(
                "response body of {} bytes exceeds the {} byte limit",
                size, state.body_limit
            );
            return failure_response(&state, &principal, &ctx, Some(response), reason);
        }
    }

    // A body that fails to buffer is already consumed
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let reason = format!("failed to buffer response body: {}", e);
            return failure_response(&state, &principal, &ctx, None, reason);
        }
    };

    // Non-JSON bodies cannot carry structured AI fields
    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    match evaluate(&state, &principal, &payload) {
        Ok(FilterOutcome::Untouched) => Response::from_parts(parts, Body::from(bytes)),
        Ok(FilterOutcome::Advisory { detected }) => {
            advisory_response(&state, &principal, &ctx, parts, bytes, detected)
        }
        Ok(FilterOutcome::Redacted {
            decision,
            redaction,
            body,
        }) => redacted_response(&state, &principal, &ctx, parts, decision, redaction, body),
        Err(e) => {
            let original = Response::from_parts(parts, Body::from(bytes));
            failure_response(&state, &principal, &ctx, Some(original), e.to_string())
        }
    }
}

fn evaluate(
    state: &GuardState,
    principal: &Principal,
    payload: &Value,
) -> Result<FilterOutcome, CoreError> {
    let decision = state.policy.classify(principal, payload);

    if !decision.should_filter {
        if state.policy.is_authorized(principal.role) {
            let detected = state.policy.detect(payload);
            if !detected.is_empty() {
                return Ok(FilterOutcome::Advisory { detected });
            }
        }
        debug!(reason = %decision.reason, "Response delivered unfiltered");
        return Ok(FilterOutcome::Untouched);
    }

    let redaction = state.policy.redact(payload);
    let body = serde_json::to_vec(&redaction.payload)?;

    Ok(FilterOutcome::Redacted {
        decision,
        redaction,
        body,
    })
}

fn advisory_response(
    state: &GuardState,
    principal: &Principal,
    ctx: &RequestContext,
    mut parts: Parts,
    bytes: Bytes,
    detected: Vec<String>,
) -> Response {
    counter!("ai_content_decisions_total", "outcome" => "allowed").increment(1);

    parts
        .headers
        .insert(X_READER_WARNING, HeaderValue::from_static(READER_WARNING));
    parts.headers.insert(
        X_CONTENT_CLASSIFICATION,
        HeaderValue::from_static(CLASSIFICATION_AI_INTERNAL),
    );

    state.audit.dispatch(
        AuditRecord::new(principal, ctx, AuditOutcome::Allowed)
            .with_fields(detected)
            .with_metadata(json!({ "reason": "authorized_role" })),
    );

    Response::from_parts(parts, Body::from(bytes))
}

fn redacted_response(
    state: &GuardState,
    principal: &Principal,
    ctx: &RequestContext,
    mut parts: Parts,
    decision: AccessDecision,
    redaction: Redaction,
    body: Vec<u8>,
) -> Response {
    let removed = redaction.removed_count();
    counter!("ai_content_decisions_total", "outcome" => "filtered").increment(1);
    counter!("ai_content_fields_removed_total").increment(removed as u64);

    let reason = decision.reason.to_string();
    let headers = &mut parts.headers;
    headers.remove(header::CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(&reason) {
        headers.insert(X_SECURITY_FILTER_REASON, value);
    }
    headers.insert(X_FILTERED_FIELDS_COUNT, HeaderValue::from(removed));
    headers.insert(X_ACCESS_LEVEL, HeaderValue::from_static(ACCESS_LEVEL_RESTRICTED));
    if let Ok(value) = HeaderValue::from_str(&Utc::now().to_rfc3339()) {
        headers.insert(X_FILTERED_AT, value);
    }

    debug!(
        actor_id = %principal.id,
        endpoint = %ctx.path,
        removed,
        "Removed AI content from response"
    );

    state.audit.dispatch(
        AuditRecord::new(principal, ctx, AuditOutcome::Filtered)
            .with_fields(redaction.removed_keys)
            .with_metadata(json!({
                "reason": reason,
                "detected_patterns": decision.detected_fields,
                "removed_count": removed,
                "truncated_subtrees": redaction.truncated,
            })),
    );

    Response::from_parts(parts, Body::from(body))
}

/// Applies the failure mode. `original` is the untouched response, when it can
/// still be delivered.
fn failure_response(
    state: &GuardState,
    principal: &Principal,
    ctx: &RequestContext,
    original: Option<Response>,
    reason: String,
) -> Response {
    counter!("ai_content_decisions_total", "outcome" => "error").increment(1);
    error!(
        actor_id = %principal.id,
        endpoint = %ctx.path,
        failure_mode = state.failure_mode.as_str(),
        error = %reason,
        "AI content filter failed"
    );

    state.audit.dispatch(
        AuditRecord::new(principal, ctx, AuditOutcome::Filtered).with_metadata(json!({
            "denial_reason": format!("content filter error: {}", reason),
            "failure_mode": state.failure_mode.as_str(),
        })),
    );

    match (state.failure_mode, original) {
        (FailureMode::Open, Some(original)) => original,
        _ => ApiError::FilterFailure.into_response(),
    }
}

/// JSON or text bodies without a content encoding; anything else, including
/// server-sent events, streams through.
fn is_inspectable(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }

    match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) => {
            let content_type = content_type.to_lowercase();
            if content_type.starts_with("text/event-stream") {
                return false;
            }
            content_type.contains("json") || content_type.starts_with("text/")
        }
        None => true,
    }
}
