use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tarot_guard_core::{Principal, Role};

use crate::{error::ApiError, GuardState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // Platform role
    pub exp: usize,   // Expiration time
    pub iat: usize,   // Issued at
}

/// Validates bearer tokens issued by the platform's auth service
pub struct JwtDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl JwtDecoder {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }

    /// Principal carried by `token`. Unknown roles keep the id but get no privileges.
    pub fn principal(&self, token: &str) -> Result<Principal, ApiError> {
        let claims = self.decode(token)?;
        let role = claims.role.parse().unwrap_or_else(|_| {
            tracing::debug!(role = %claims.role, "Unrecognized role claim");
            Role::Anonymous
        });
        Ok(Principal::new(claims.sub, role))
    }
}

/// Resolves the request's [`Principal`] and stores it in the request extensions.
///
/// A principal already placed there by an upstream layer is trusted as-is.
/// Missing or invalid tokens resolve to the anonymous principal rather than
/// rejecting the request; route-level authorization is not this layer's job.
pub async fn principal_middleware(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Principal>().is_none() {
        let principal = bearer_token(&request)
            .zip(state.jwt.as_deref())
            .and_then(|(token, jwt)| match jwt.principal(token) {
                Ok(principal) => Some(principal),
                Err(_) => {
                    tracing::debug!("Bearer token rejected, treating request as anonymous");
                    None
                }
            })
            .unwrap_or_else(Principal::anonymous);

        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
}

/// The principal resolved for this request, anonymous if none was set.
pub fn current_principal(request: &Request) -> Principal {
    request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(Principal::anonymous)
}
