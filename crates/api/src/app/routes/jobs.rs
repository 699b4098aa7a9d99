use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;

use pitstop_auth::{Department, Role};
use pitstop_bookings::BookingId;
use pitstop_core::{AggregateId, PrincipalId};
use pitstop_jobs::{
    AppendWorkLog, AssignLabourer, ChangeJobStatus, Job, JobCommand, JobId, JobStatus,
    SubmitInspectionReport,
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
];

const SCHEDULERS: &[Role] = &[Role::ServiceAdvisor, Role::Manager, Role::Admin];

const WORKSHOP_FLOOR: &[Department] = &[
    Department::Mechanical,
    Department::Electrical,
    Department::Bodywork,
    Department::Painting,
];

pub fn router() -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one))
        .route("/:id/labourers", post(assign_labourer))
        .route("/:id/status", patch(change_status))
        .route("/:id/worklog", post(append_worklog))
        .route("/:id/inspection", post(submit_inspection))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateJobRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, SCHEDULERS) {
        return resp;
    }

    let booking: AggregateId = match body.booking.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
        }
    };

    let job_id = match services.create_job(BookingId::new(booking), body.description) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let job = services.jobs.get(&job_id).map(|row| dto::row_json(&row));
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "job": job,
        })),
    )
        .into_response()
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let mut rows = match &query.booking {
        Some(booking) => match booking.parse::<AggregateId>() {
            Ok(agg) => services.jobs.list_for_booking(BookingId::new(agg)),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id");
            }
        },
        None => services.jobs.list(),
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
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    match services.jobs.get(&JobId::new(agg)) {
        Some(row) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "job": dto::row_json(&row),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "job not found"),
    }
}

pub async fn assign_labourer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignLabourerRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, SCHEDULERS) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    let labourer: PrincipalId = match body.labourer.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid labourer id");
        }
    };

    match services.principals.get(&labourer) {
        Some(row) if row.role == Role::Technician => {}
        Some(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "labourers must be technicians",
            );
        }
        None => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "labourer not found");
        }
    }

    let command = JobCommand::AssignLabourer(AssignLabourer {
        job_id: JobId::new(agg),
        labourer,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Job>(agg, "job", command, |id| Job::empty(JobId::new(id))) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeJobStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };
    let job_id = JobId::new(agg);

    let Some(row) = services.jobs.get(&job_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "job not found");
    };

    // Technicians may only move jobs they are assigned to.
    if ctx.role() == Role::Technician && !row.is_assigned(ctx.principal_id()) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "not assigned to this job",
        );
    }

    // Starting work needs at least one labourer on the job.
    if body.status == JobStatus::Working
        && row.status == JobStatus::Pending
        && row.labourers.is_empty()
    {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invariant_violation",
            "job needs at least one assigned labourer before work starts",
        );
    }

    let command = JobCommand::ChangeStatus(ChangeJobStatus {
        job_id,
        status: body.status,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Job>(agg, "job", command, |id| Job::empty(JobId::new(id))) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn append_worklog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::WorkLogRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };
    let job_id = JobId::new(agg);

    let Some(row) = services.jobs.get(&job_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "job not found");
    };

    if ctx.role() == Role::Technician && !row.is_assigned(ctx.principal_id()) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "not assigned to this job",
        );
    }

    let command = JobCommand::AppendWorkLog(AppendWorkLog {
        job_id,
        labourer: ctx.principal_id(),
        description: body.description,
        hours: body.hours,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Job>(agg, "job", command, |id| Job::empty(JobId::new(id))) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::CREATED, Json(serde_json::json!({ "success": true }))).into_response()
}

pub async fn submit_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InspectionRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(&ctx, STAFF) {
        return resp;
    }

    // Inspections come from the workshop floor, not the front office.
    let department = services
        .principals
        .get(&ctx.principal_id())
        .and_then(|row| row.department);
    if let Err(resp) = authz::require_department(department, WORKSHOP_FLOOR) {
        return resp;
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    let command = JobCommand::SubmitInspection(SubmitInspectionReport {
        job_id: JobId::new(agg),
        phase: body.phase,
        inspector: ctx.principal_id(),
        findings: body.findings,
        approved: body.approved,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Job>(agg, "job", command, |id| Job::empty(JobId::new(id))) {
        return errors::dispatch_error_to_response(e);
    }

    (StatusCode::CREATED, Json(serde_json::json!({ "success": true }))).into_response()
}
