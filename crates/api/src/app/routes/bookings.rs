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
use pitstop_bookings::{AddNote, AssignInspector, Booking, BookingCommand, BookingId};
use pitstop_core::{AggregateId, PrincipalId};

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

const SCHEDULERS: &[Role] = &[Role::ServiceAdvisor, Role::Manager, Role::Admin];

pub fn router() -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one))
        .route("/:id/status", patch(change_status))
        .route("/:id/inspector", post(assign_inspector))
        .route("/:id/notes", post(add_note))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    let customer = if ctx.role() == Role::Customer {
        ctx.principal_id()
    } else {
        if let Err(resp) = authz::require_role(&ctx, SCHEDULERS) {
            return resp;
        }
        let Some(customer) = body.customer.as_deref() else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "customer is required when staff create a booking",
            );
        };
        match customer.parse::<PrincipalId>() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id");
            }
        }
    };

    let vehicle: AggregateId = match body.vehicle.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vehicle id");
        }
    };

    let booking_id = match services.create_booking(
        customer,
        pitstop_vehicles::VehicleId::new(vehicle),
        body.scheduled_date,
        body.slot,
        body.service_description,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let booking = services.bookings.get(&booking_id).map(|row| dto::row_json(&row));
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "booking": booking,
        })),
    )
        .into_response()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let mut rows = services.bookings.list();
    if ctx.role() == Role::Customer {
        rows.retain(|row| row.customer == ctx.principal_id());
    }
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
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    let Some(row) = services.bookings.get(&BookingId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "booking not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, STAFF, row.customer) {
        return resp;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "booking": dto::row_json(&row),
        })),
    )
        .into_response()
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeBookingStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    if let Err(e) = services.change_booking_status(BookingId::new(agg), body.status) {
        return errors::service_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn assign_inspector(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignInspectorRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, SCHEDULERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    let inspector: PrincipalId = match body.inspector.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid inspector id");
        }
    };

    // Inspectors are service advisors by policy.
    match services.principals.get(&inspector) {
        Some(row) if row.role == Role::ServiceAdvisor => {}
        Some(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "inspector must be a service advisor",
            );
        }
        None => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "inspector not found");
        }
    }

    let command = BookingCommand::AssignInspector(AssignInspector {
        booking_id: BookingId::new(agg),
        inspector,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Booking>(agg, "booking", command, |id| {
        Booking::empty(BookingId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn add_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddNoteRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    let Some(row) = services.bookings.get(&BookingId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "booking not found");
    };

    // The customer and workshop staff share the note thread.
    if let Err(resp) = authz::require_role_or_owner(&ctx, STAFF, row.customer) {
        return resp;
    }

    let command = BookingCommand::AddNote(AddNote {
        booking_id: BookingId::new(agg),
        author: ctx.principal_id(),
        text: body.text,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Booking>(agg, "booking", command, |id| {
        Booking::empty(BookingId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::CREATED, Json(serde_json::json!({ "success": true }))).into_response()
}
