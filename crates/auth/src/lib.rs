//! `pitstop-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod lockout;
pub mod password;
pub mod roles;
pub mod token;

pub use authorize::{require_department, require_role, require_role_or_owner};
pub use claims::JwtClaims;
pub use lockout::LoginThrottle;
pub use password::PasswordHasher;
pub use roles::{Department, Role};
pub use token::{Hs256JwtValidator, JwtValidator, TokenError};
