use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use pitstop_auth::Role;
use pitstop_core::AggregateId;
use pitstop_infra::projections::LeaveRow;
use pitstop_leave::{ApproveLeave, LeaveCommand, LeaveRequest, LeaveRequestId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

const APPROVERS: &[Role] = &[Role::Manager, Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
}

fn leave_to_json(row: &LeaveRow) -> serde_json::Value {
    let mut value = dto::row_json(row);
    if let Some(map) = value.as_object_mut() {
        map.insert("totalDays".into(), serde_json::json!(row.total_days()));
    }
    value
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateLeaveRequest>,
) -> axum::response::Response {
    // Leave is for employees; customers have no leave balance.
    if !ctx.role().is_staff() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "only staff can request leave",
        );
    }

    let request_id = match services.create_leave_request(
        ctx.principal_id(),
        body.leave_type,
        body.start,
        body.end,
        body.reason,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let request = services.leave.get(&request_id).as_ref().map(leave_to_json);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "request": request,
        })),
    )
        .into_response()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let mut rows = if APPROVERS.contains(&ctx.role()) {
        services.leave.list()
    } else if ctx.role().is_staff() {
        services.leave.list_for_employee(ctx.principal_id())
    } else {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient role");
    };
    if let Some(status) = &query.status {
        rows.retain(|row| row.status.as_str() == status);
    }
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));

    let items: Vec<serde_json::Value> = rows.iter().map(leave_to_json).collect();
    (
        StatusCode::OK,
        Json(dto::paginated(items, query.page, query.limit)),
    )
        .into_response()
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id");
        }
    };

    let Some(row) = services.leave.get(&LeaveRequestId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "leave request not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, APPROVERS, row.employee) {
        return resp;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "request": leave_to_json(&row),
        })),
    )
        .into_response()
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, APPROVERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id");
        }
    };

    let command = LeaveCommand::Approve(ApproveLeave {
        request_id: LeaveRequestId::new(agg),
        approver: ctx.principal_id(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<LeaveRequest>(agg, "leave_request", command, |id| {
        LeaveRequest::empty(LeaveRequestId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, APPROVERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id");
        }
    };

    if let Err(e) =
        services.reject_leave_request(LeaveRequestId::new(agg), ctx.principal_id(), body.reason)
    {
        return errors::service_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}
