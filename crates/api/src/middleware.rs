use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use pitstop_auth::{JwtValidator, TokenError};
use pitstop_identity::PrincipalStatus;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub services: Arc<AppServices>,
}

/// Bearer-credential gate for all protected routes.
///
/// Token claims only prove identity; role and status come from the live
/// principal record, so revocation takes effect without waiting for expiry.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token).map_err(|e| match e {
        TokenError::Expired => {
            errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "token has expired")
        }
        _ => errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "invalid token"),
    })?;

    let row = state.services.principals.get(&claims.sub).ok_or_else(|| {
        errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "unknown principal")
    })?;

    if row.throttle.is_locked(Utc::now()) {
        let message = match row.throttle.lock_until {
            Some(until) => format!("account locked until {until}"),
            None => "account locked".to_string(),
        };
        return Err(errors::json_error(StatusCode::LOCKED, "locked", message));
    }

    if row.status != PrincipalStatus::Active {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("account is {}", row.status.as_str()),
        ));
    }

    req.extensions_mut().insert(AuthContext::new(
        row.principal_id,
        row.reference.clone(),
        row.role,
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthenticated = || {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "missing or malformed bearer credential",
        )
    };

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthenticated)?;

    let header = header.to_str().map_err(|_| unauthenticated())?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(unauthenticated)?
        .trim();

    if token.is_empty() {
        return Err(unauthenticated());
    }

    Ok(token)
}
