//! Route-level authorization guards.
//!
//! Thin wrappers over the policy functions in `pitstop-auth` that map
//! failures straight to HTTP responses, so handlers can `?` them.

use axum::response::Response;

use pitstop_auth::{Department, Role};
use pitstop_core::PrincipalId;

use crate::app::errors;
use crate::context::AuthContext;

pub fn require_role(ctx: &AuthContext, allowed: &[Role]) -> Result<(), Response> {
    pitstop_auth::require_role(ctx.role(), allowed).map_err(errors::domain_error_to_response)
}

/// Permits members of `allowed` and the resource owner.
pub fn require_role_or_owner(
    ctx: &AuthContext,
    allowed: &[Role],
    owner: PrincipalId,
) -> Result<(), Response> {
    pitstop_auth::require_role_or_owner(ctx.role(), allowed, ctx.principal_id(), owner)
        .map_err(errors::domain_error_to_response)
}

/// Staff-department gate; `department` is the acting principal's department
/// from the read model (None for customers).
pub fn require_department(
    department: Option<Department>,
    allowed: &[Department],
) -> Result<(), Response> {
    pitstop_auth::require_department(department, allowed).map_err(errors::domain_error_to_response)
}
