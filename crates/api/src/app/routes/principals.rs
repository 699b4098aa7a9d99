use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use pitstop_auth::Role;
use pitstop_core::PrincipalId;
use pitstop_identity::{ChangeRole, ChangeStatus, Principal, PrincipalCommand};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

/// Admin-only principal management. Status changes are soft; nothing here
/// ever deletes a principal.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/stats", get(stats))
        .route("/:id", get(get_one))
        .route("/:id/status", axum::routing::patch(change_status))
        .route("/:id/role", axum::routing::patch(change_role))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Admin]) {
        return resp;
    }

    let mut rows = services.principals.list();
    if let Some(role) = query.role {
        rows.retain(|row| row.role == role);
    }
    if let Some(status) = &query.status {
        rows.retain(|row| row.status.as_str() == status);
    }
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));

    let items: Vec<serde_json::Value> = rows.iter().map(dto::principal_to_json).collect();
    (
        StatusCode::OK,
        Json(dto::paginated(items, query.page, query.limit)),
    )
        .into_response()
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Admin]) {
        return resp;
    }

    let rows = services.principals.list();
    let mut by_role: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut by_status: BTreeMap<&'static str, u64> = BTreeMap::new();
    for row in &rows {
        *by_role.entry(row.role.as_str()).or_insert(0) += 1;
        *by_status.entry(row.status.as_str()).or_insert(0) += 1;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "total": rows.len(),
            "byRole": by_role,
            "byStatus": by_status,
        })),
    )
        .into_response()
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let principal_id: PrincipalId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid principal id");
        }
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, &[Role::Admin], principal_id) {
        return resp;
    }

    match services.principals.get(&principal_id) {
        Some(row) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "principal": dto::principal_to_json(&row),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "principal not found"),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Admin]) {
        return resp;
    }

    let principal_id: PrincipalId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid principal id");
        }
    };

    let command = PrincipalCommand::ChangeStatus(ChangeStatus {
        principal_id,
        status: body.status,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Principal>(principal_id.into(), "principal", command, |id| {
        Principal::empty(PrincipalId::from(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Admin]) {
        return resp;
    }

    let principal_id: PrincipalId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid principal id");
        }
    };

    let command = PrincipalCommand::ChangeRole(ChangeRole {
        principal_id,
        role: body.role,
        profile: body.profile,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Principal>(principal_id.into(), "principal", command, |id| {
        Principal::empty(PrincipalId::from(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}
