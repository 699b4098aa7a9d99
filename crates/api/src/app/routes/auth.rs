use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use pitstop_auth::Role;
use pitstop_identity::{
    CustomerDetails, EmployeeDetails, Principal, PrincipalCommand, Profile, UpdateProfile,
};
use pitstop_core::PrincipalId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::AuthContext;

/// Routes mounted behind the auth middleware (`/auth/me` and friends).
/// `register` and `login` are wired as public routes in `build_app`.
pub fn protected_router() -> Router {
    Router::new()
        .route("/me", get(me).patch(update_profile))
        .route("/me/password", post(change_password))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let role = body.role.unwrap_or(Role::Customer);

    let profile = if role.is_staff() {
        match body.department {
            Some(department) => Profile::Staff(EmployeeDetails {
                department,
                specializations: body.specializations.unwrap_or_default(),
            }),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "staff registration requires a department",
                );
            }
        }
    } else {
        Profile::Customer(CustomerDetails {
            phone: body.phone.unwrap_or_default(),
            address: body.address,
        })
    };

    let principal_id = match services.register_principal(
        &body.email,
        &body.password,
        body.display_name,
        role,
        profile,
    ) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    let principal = services
        .principals
        .get(&principal_id)
        .as_ref()
        .map(dto::principal_to_json);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "principal": principal,
        })),
    )
        .into_response()
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let (token, row) = match services.login(&body.email, &body.password) {
        Ok(outcome) => outcome,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "token": token,
            "principal": dto::principal_to_json(&row),
        })),
    )
        .into_response()
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.principals.get(&ctx.principal_id()) {
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

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    let command = PrincipalCommand::UpdateProfile(UpdateProfile {
        principal_id: ctx.principal_id(),
        display_name: body.display_name,
        profile: body.profile,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Principal>(
        ctx.principal_id().into(),
        "principal",
        command,
        |id| Principal::empty(PrincipalId::from(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    let principal = services
        .principals
        .get(&ctx.principal_id())
        .as_ref()
        .map(dto::principal_to_json);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "principal": principal,
        })),
    )
        .into_response()
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> axum::response::Response {
    if let Err(e) =
        services.change_password(ctx.principal_id(), &body.current_password, &body.new_password)
    {
        return errors::service_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}
