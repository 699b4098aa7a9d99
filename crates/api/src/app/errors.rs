//! Central error-to-response mapping.
//!
//! Domain errors carry their own HTTP semantics; infra failures are
//! logged and answered with a generic message so store internals never
//! leak through the API.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pitstop_core::DomainError;
use pitstop_infra::command_dispatcher::DispatchError;

use crate::app::services::ServiceError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::BAD_REQUEST, "conflict", msg),
        DomainError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "unauthenticated")
        }
        DomainError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        DomainError::Locked { until } => json_error(
            StatusCode::LOCKED,
            "locked",
            format!("account locked until {until}"),
        ),
        err @ DomainError::InvalidTransition { .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_transition", err.to_string())
        }
        err @ DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_stock", err.to_string())
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "event payload deserialization failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
        DispatchError::Store(e) => {
            tracing::error!(error = ?e, "event store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage failure",
            )
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "event publication failed after append");
            json_error(StatusCode::BAD_GATEWAY, "publish_error", "event publication failed")
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Dispatch(e) => dispatch_error_to_response(e),
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Sequence(e) => {
            tracing::error!(error = %e, "reference sequence failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "sequence_error",
                "internal storage failure",
            )
        }
        ServiceError::Unique(e) => match e {
            pitstop_infra::UniqueError::AlreadyClaimed { scope, key } => json_error(
                StatusCode::BAD_REQUEST,
                "conflict",
                format!("'{key}' is already taken in scope '{scope}'"),
            ),
            pitstop_infra::UniqueError::Unavailable(msg) => {
                tracing::error!(error = %msg, "unique index failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unique_index_error",
                    "internal storage failure",
                )
            }
        },
        ServiceError::Token(e) => {
            tracing::error!(error = %e, "token mint failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                "failed to issue credential",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
