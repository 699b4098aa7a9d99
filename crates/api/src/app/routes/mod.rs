use axum::{Router, routing::get};

pub mod auth;
pub mod bookings;
pub mod goods;
pub mod inventory;
pub mod invoices;
pub mod jobs;
pub mod leave;
pub mod principals;
pub mod system;
pub mod vehicles;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::protected_router())
        .nest("/principals", principals::router())
        .nest("/vehicles", vehicles::router())
        .nest("/bookings", bookings::router())
        .nest("/jobs", jobs::router())
        .nest("/inventory", inventory::router())
        .nest("/goods-requests", goods::router())
        .nest("/invoices", invoices::router())
        .nest("/leave-requests", leave::router())
}
