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
use pitstop_inventory::{
    AdjustStock, InventoryItem, ItemCommand, ItemId, UpdateItemDetails,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

const STAFF: &[Role] = &[
    Role::Technician,
    Role::ServiceAdvisor,
    Role::Manager,
    Role::Admin,
    Role::Cashier,
];

const KEEPERS: &[Role] = &[Role::Manager, Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/low-stock", get(list_low_stock))
        .route("/items/bulk-adjust", post(bulk_adjust))
        .route("/items/:id", get(get_item).patch(update_item))
        .route("/items/:id/adjust", post(adjust_stock))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, KEEPERS) {
        return resp;
    }

    let item_id = match services.create_item(
        body.name,
        body.category,
        body.unit_price,
        body.initial_stock,
        body.minimum,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let item = services
        .inventory
        .get(&item_id)
        .as_ref()
        .map(dto::inventory_item_to_json);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "item": item,
        })),
    )
        .into_response()
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let mut rows = match &query.search {
        Some(term) => services.inventory.search(term),
        None => services.inventory.list(),
    };
    if query.low_stock == Some(true) {
        rows.retain(|row| row.is_low_stock());
    }
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));

    let items: Vec<serde_json::Value> = rows.iter().map(dto::inventory_item_to_json).collect();
    (
        StatusCode::OK,
        Json(dto::paginated(items, query.page, query.limit)),
    )
        .into_response()
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let mut rows = services.inventory.list_low_stock();
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));
    let items: Vec<serde_json::Value> = rows.iter().map(dto::inventory_item_to_json).collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "count": items.len(),
            "items": items,
        })),
    )
        .into_response()
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services.inventory.get(&ItemId::new(agg)) {
        Some(row) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "item": dto::inventory_item_to_json(&row),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, KEEPERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    let command = ItemCommand::UpdateDetails(UpdateItemDetails {
        item_id: ItemId::new(agg),
        name: body.name,
        category: body.category,
        unit_price: body.unit_price,
        minimum: body.minimum,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<InventoryItem>(agg, "inventory_item", command, |id| {
        InventoryItem::empty(ItemId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, KEEPERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    let command = ItemCommand::AdjustStock(AdjustStock {
        item_id: ItemId::new(agg),
        direction: body.direction,
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<InventoryItem>(agg, "inventory_item", command, |id| {
        InventoryItem::empty(ItemId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    let item = services
        .inventory
        .get(&ItemId::new(agg))
        .as_ref()
        .map(dto::inventory_item_to_json);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "item": item,
        })),
    )
        .into_response()
}

/// Per-line partial success: good lines commit, bad lines land in
/// `errors`, and the caller sees both counts.
pub async fn bulk_adjust(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::BulkAdjustRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, KEEPERS) {
        return resp;
    }

    let mut lines = Vec::with_capacity(body.adjustments.len());
    for line in body.adjustments {
        let agg: AggregateId = match line.item.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    format!("invalid item id '{}'", line.item),
                );
            }
        };
        lines.push((ItemId::new(agg), line.direction, line.quantity));
    }

    let (processed, failed) = services.bulk_adjust(lines);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "processed": processed.len(),
            "errors": failed.len(),
            "results": processed,
            "failures": failed,
        })),
    )
        .into_response()
}
