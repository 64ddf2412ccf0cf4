//! Operator authentication for booklet-editing routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use hostbook_core::error::CoreError;
use hostbook_core::types::DbId;

use crate::auth::jwt::{verify_token, OperatorRole};
use crate::error::AppError;
use crate::state::AppState;

/// The operator behind a verified Bearer token.
///
/// A token only proves who is calling; ownership of a booklet is checked
/// per request against `id`.
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    pub id: DbId,
    pub role: OperatorRole,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

/// The token from `Authorization: Bearer <token>`, scheme matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Malformed Authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(unauthorized("Expected: Authorization: Bearer <token>")),
    }
}

impl FromRequestParts<AppState> for Operator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = verify_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected operator token");
            unauthorized("Invalid or expired token")
        })?;

        if claims.role == OperatorRole::Support {
            tracing::info!(operator_id = claims.sub, "Support operator request");
        }

        Ok(Operator {
            id: claims.sub,
            role: claims.role,
        })
    }
}
