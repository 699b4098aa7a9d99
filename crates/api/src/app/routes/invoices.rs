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
use pitstop_bookings::BookingId;
use pitstop_core::AggregateId;
use pitstop_invoicing::{
    CancelInvoice, Invoice, InvoiceCommand, InvoiceId, IssueInvoice, MarkInvoicePaid,
    UpdateInvoice,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::AuthContext;

const BILLING: &[Role] = &[Role::Cashier, Role::Manager, Role::Admin];

const STAFF: &[Role] = &[
    Role::Technician,
    Role::ServiceAdvisor,
    Role::Manager,
    Role::Admin,
    Role::Cashier,
];

pub fn router() -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one).patch(update))
        .route("/:id/issue", post(issue))
        .route("/:id/pay", post(pay))
        .route("/:id/cancel", post(cancel))
        .route("/:id/print", get(print_view))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, BILLING) {
        return resp;
    }

    let booking: AggregateId = match body.booking.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    let invoice_id = match services.create_invoice(
        BookingId::new(booking),
        body.lines,
        body.labor_charges,
        body.tax,
        body.discount,
        body.notes,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let invoice = services
        .invoices
        .get(&invoice_id)
        .as_ref()
        .map(dto::invoice_to_json);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "invoice": invoice,
        })),
    )
        .into_response()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let mut rows = services.invoices.list();
    if ctx.role() == Role::Customer {
        rows.retain(|row| row.customer == ctx.principal_id());
    }
    if let Some(status) = &query.status {
        rows.retain(|row| row.status.as_str() == status);
    }
    rows.sort_by(|a, b| a.reference.cmp(&b.reference));

    let items: Vec<serde_json::Value> = rows.iter().map(dto::invoice_to_json).collect();
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
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let Some(row) = services.invoices.get(&InvoiceId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, STAFF, row.customer) {
        return resp;
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "invoice": dto::invoice_to_json(&row),
        })),
    )
        .into_response()
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateInvoiceRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, BILLING) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let command = InvoiceCommand::Update(UpdateInvoice {
        invoice_id: InvoiceId::new(agg),
        lines: body.lines,
        labor_charges: body.labor_charges,
        tax: body.tax,
        discount: body.discount,
        notes: body.notes,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Invoice>(agg, "invoice", command, |id| {
        Invoice::empty(InvoiceId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    let invoice = services
        .invoices
        .get(&InvoiceId::new(agg))
        .as_ref()
        .map(dto::invoice_to_json);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "invoice": invoice,
        })),
    )
        .into_response()
}

pub async fn issue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, BILLING) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let command = InvoiceCommand::Issue(IssueInvoice {
        invoice_id: InvoiceId::new(agg),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Invoice>(agg, "invoice", command, |id| {
        Invoice::empty(InvoiceId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn pay(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PayInvoiceRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, BILLING) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let command = InvoiceCommand::MarkPaid(MarkInvoicePaid {
        invoice_id: InvoiceId::new(agg),
        payment_method: body.payment_method,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Invoice>(agg, "invoice", command, |id| {
        Invoice::empty(InvoiceId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, BILLING) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let command = InvoiceCommand::Cancel(CancelInvoice {
        invoice_id: InvoiceId::new(agg),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Invoice>(agg, "invoice", command, |id| {
        Invoice::empty(InvoiceId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

/// Printable rendering of an invoice: the same data plus the customer and
/// booking references resolved, ready for a client to lay out.
pub async fn print_view(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let Some(row) = services.invoices.get(&InvoiceId::new(agg)) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found");
    };

    if let Err(resp) = authz::require_role_or_owner(&ctx, STAFF, row.customer) {
        return resp;
    }

    let customer = services
        .principals
        .get(&row.customer)
        .map(|p| serde_json::json!({ "reference": p.reference, "displayName": p.display_name }));
    let booking = services
        .bookings
        .get(&row.booking)
        .map(|b| serde_json::json!({ "reference": b.reference, "scheduledDate": b.scheduled_date }));

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "invoice": dto::invoice_to_json(&row),
            "customer": customer,
            "booking": booking,
        })),
    )
        .into_response()
}
