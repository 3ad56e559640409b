pub mod auth;

pub use auth::{current_principal, principal_middleware, Claims, JwtDecoder};
