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
use pitstop_goods::{
    GoodsCommand, GoodsRequest, GoodsRequestId, GoodsRequestLine, RejectGoodsRequest,
};
use pitstop_inventory::ItemId;
use pitstop_jobs::JobId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

const REQUESTERS: &[Role] = &[
    Role::Technician,
    Role::ServiceAdvisor,
    Role::Manager,
    Role::Admin,
];

const APPROVERS: &[Role] = &[Role::Manager, Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/release", post(release))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateGoodsRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, REQUESTERS) {
        return resp;
    }

    let job: AggregateId = match body.job.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let item: AggregateId = match line.item.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    format!("invalid item id '{}'", line.item),
                );
            }
        };
        lines.push(GoodsRequestLine {
            item: ItemId::new(item),
            quantity: line.quantity,
        });
    }

    let request_id = match services.create_goods_request(JobId::new(job), ctx.principal_id(), lines)
    {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let request = services.goods.get(&request_id).map(|row| dto::row_json(&row));
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
    if let Err(resp) = authz::require_role(&ctx, REQUESTERS) {
        return resp;
    }

    // Approvers see every request; everyone else sees their own.
    let mut rows = if APPROVERS.contains(&ctx.role()) {
        services.goods.list()
    } else {
        services.goods.list_for_requester(ctx.principal_id())
    };
    if let Some(status) = &query.status {
        rows.retain(|row| row.status.as_str() == status);
    }
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));

    (
        StatusCode::OK,
        Json(dto::paginated(rows, query.page, query.limit)),
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

    let Some(row) = services.goods.get(&GoodsRequestId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "goods request not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, APPROVERS, row.requester) {
        return resp;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "request": dto::row_json(&row),
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

    if let Err(e) = services.approve_goods_request(GoodsRequestId::new(agg), ctx.principal_id()) {
        return errors::service_error_to_response(e);
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

    let command = GoodsCommand::Reject(RejectGoodsRequest {
        request_id: GoodsRequestId::new(agg),
        approver: ctx.principal_id(),
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<GoodsRequest>(agg, "goods_request", command, |id| {
        GoodsRequest::empty(GoodsRequestId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn release(
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

    if let Err(e) = services.release_goods_request(GoodsRequestId::new(agg), ctx.principal_id()) {
        return errors::service_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}
