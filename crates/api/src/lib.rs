//! HTTP API: router, auth middleware, DTOs, and request orchestration.

pub mod app;
pub mod authz;
pub mod context;
pub mod hashing;
pub mod middleware;
