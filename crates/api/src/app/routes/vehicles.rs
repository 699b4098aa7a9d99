use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;

use pitstop_auth::Role;
use pitstop_core::{AggregateId, PrincipalId};
use pitstop_vehicles::{TransferOwnership, UpdateMileage, Vehicle, VehicleCommand, VehicleId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

const STAFF: &[Role] = &[Role::ServiceAdvisor, Role::Manager, Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/", post(register).get(list))
        .route("/by-registration/:registration", get(by_registration))
        .route("/:id", get(get_one))
        .route("/:id/mileage", patch(update_mileage))
        .route("/:id/transfer", post(transfer))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::RegisterVehicleRequest>,
) -> axum::response::Response {
    // Customers register their own vehicles; staff may name the owner.
    let owner = if ctx.role() == Role::Customer {
        ctx.principal_id()
    } else {
        if let Err(resp) = authz::require_role(&ctx, STAFF) {
            return resp;
        }
        let Some(owner) = body.owner.as_deref() else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "owner is required when staff register a vehicle",
            );
        };
        let owner: PrincipalId = match owner.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid owner id");
            }
        };
        match services.principals.get(&owner) {
            Some(row) if row.role == Role::Customer => owner,
            Some(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "vehicles can only be owned by customers",
                );
            }
            None => {
                return errors::json_error(StatusCode::NOT_FOUND, "not_found", "owner not found");
            }
        }
    };

    let vehicle_id = match services.register_vehicle(
        owner,
        &body.registration,
        body.chassis_number,
        body.engine_number,
        body.make,
        body.model,
        body.year,
        body.mileage,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let vehicle = services.vehicles.get(&vehicle_id).map(|row| dto::row_json(&row));
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "vehicle": vehicle,
        })),
    )
        .into_response()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let mut rows = services.vehicles.list();
    if ctx.role() == Role::Customer {
        rows.retain(|row| row.owner == ctx.principal_id());
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
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vehicle id");
        }
    };

    let Some(row) = services.vehicles.get(&VehicleId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "vehicle not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, STAFF, row.owner) {
        return resp;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "vehicle": dto::row_json(&row),
        })),
    )
        .into_response()
}

pub async fn by_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(registration): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Technician, Role::ServiceAdvisor, Role::Manager, Role::Admin]) {
        return resp;
    }

    match services.vehicles.find_by_registration(&registration) {
        Some(row) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "vehicle": dto::row_json(&row),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "vehicle not found"),
    }
}

pub async fn update_mileage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateMileageRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vehicle id");
        }
    };
    let vehicle_id = VehicleId::new(agg);

    let Some(row) = services.vehicles.get(&vehicle_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "vehicle not found");
    };

    // Owner or workshop staff (technicians record mileage at intake).
    if let Err(resp) = authz::require_role_or_owner(
        &ctx,
        &[Role::Technician, Role::ServiceAdvisor, Role::Manager, Role::Admin],
        row.owner,
    ) {
        return resp;
    }

    let command = VehicleCommand::UpdateMileage(UpdateMileage {
        vehicle_id,
        mileage: body.mileage,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Vehicle>(agg, "vehicle", command, |id| {
        Vehicle::empty(VehicleId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransferOwnershipRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, &[Role::Manager, Role::Admin]) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vehicle id");
        }
    };

    let new_owner: PrincipalId = match body.new_owner.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid owner id");
        }
    };
    match services.principals.get(&new_owner) {
        Some(row) if row.role == Role::Customer => {}
        Some(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "vehicles can only be owned by customers",
            );
        }
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "owner not found"),
    }

    let command = VehicleCommand::TransferOwnership(TransferOwnership {
        vehicle_id: VehicleId::new(agg),
        new_owner,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Vehicle>(agg, "vehicle", command, |id| {
        Vehicle::empty(VehicleId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}
