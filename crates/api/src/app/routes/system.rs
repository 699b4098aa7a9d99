use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::AuthContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "principal_id": ctx.principal_id().to_string(),
        "reference": ctx.reference(),
        "role": ctx.role().as_str(),
    }))
}
