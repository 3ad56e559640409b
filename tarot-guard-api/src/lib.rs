//! HTTP layers that keep AI-generated reading content away from unauthorized roles.
//!
//! The layers sit between route handlers and the outbound response:
//!
//! ```text
//! request -> principal -> AI endpoint guard -> reading guard -> content filter -> handler
//! ```
//!
//! Use [`apply_guard_layers`] to install them on a router in that order.

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod security;

use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;
use tarot_guard_core::ContentPolicy;
use tower_http::trace::TraceLayer;

pub use config::GuardConfig;
pub use error::ApiError;
pub use middleware::{current_principal, principal_middleware, JwtDecoder};
pub use security::{
    ai_content_filter_middleware, ai_endpoint_guard, reading_endpoint_guard, AuditLogger,
    EndpointGuards, FailureMode, DEFAULT_BODY_LIMIT,
};

/// Shared, read-only state for every guard layer
#[derive(Clone)]
pub struct GuardState {
    pub policy: Arc<ContentPolicy>,
    pub guards: Arc<EndpointGuards>,
    pub audit: AuditLogger,
    pub failure_mode: FailureMode,
    /// Largest response body the content filter buffers
    pub body_limit: usize,
    pub jwt: Option<Arc<JwtDecoder>>,
}

impl GuardState {
    pub fn new(policy: ContentPolicy, audit: AuditLogger) -> Self {
        Self {
            policy: Arc::new(policy),
            guards: Arc::new(EndpointGuards::default()),
            audit,
            failure_mode: FailureMode::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            jwt: None,
        }
    }

    pub fn with_guards(mut self, guards: EndpointGuards) -> Self {
        self.guards = Arc::new(guards);
        self
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn with_jwt(mut self, jwt: JwtDecoder) -> Self {
        self.jwt = Some(Arc::new(jwt));
        self
    }
}

/// Wrap every route of `router` with the principal resolver, both endpoint
/// guards and the AI content filter.
pub fn apply_guard_layers<S>(router: Router<S>, state: GuardState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // The last layer added runs first: principal, AI guard, reading guard,
    // then the filter closest to the handler.
    router
        .layer(from_fn_with_state(state.clone(), ai_content_filter_middleware))
        .layer(from_fn_with_state(state.clone(), reading_endpoint_guard))
        .layer(from_fn_with_state(state.clone(), ai_endpoint_guard))
        .layer(from_fn_with_state(state, principal_middleware))
        .layer(TraceLayer::new_for_http())
}
