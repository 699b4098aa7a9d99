//! HTTP application assembly: routes, services, and the auth layer.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use crate::middleware::{self, AuthState};

/// Build the full application router. Registration, login, and the health
/// check stay public; everything else sits behind the bearer-token layer.
pub fn build_app(jwt_secret: &[u8]) -> Router {
    let services = Arc::new(services::build_services(jwt_secret));

    let auth_state = AuthState {
        jwt: services.jwt_validator(),
        services: Arc::clone(&services),
    };

    let protected = routes::router()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(Extension(Arc::clone(&services)));

    let public = Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .layer(Extension(services));

    public.merge(protected)
}
