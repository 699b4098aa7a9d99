//! Declarative role checks for route guards.
//!
//! Pure policy functions:
//! - No IO
//! - No panics
//! - No business logic

use pitstop_core::{DomainError, PrincipalId};

use crate::roles::{Department, Role};

/// Fail with `Forbidden` unless `role` is in the allowed set.
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), DomainError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!(
            "role '{role}' is not permitted for this operation"
        )))
    }
}

/// Ownership-aware variant: permits if the role matches **or** the principal
/// owns the resource. The caller resolves the owning principal; this function
/// has no resource context of its own.
pub fn require_role_or_owner(
    role: Role,
    allowed: &[Role],
    principal: PrincipalId,
    owner: PrincipalId,
) -> Result<(), DomainError> {
    if principal == owner {
        return Ok(());
    }
    require_role(role, allowed)
}

/// Department-aware variant: the principal's department (staff only) must be
/// in the allowed set.
pub fn require_department(
    department: Option<Department>,
    allowed: &[Department],
) -> Result<(), DomainError> {
    match department {
        Some(dept) if allowed.contains(&dept) => Ok(()),
        Some(dept) => Err(DomainError::forbidden(format!(
            "department '{dept}' is not permitted for this operation"
        ))),
        None => Err(DomainError::forbidden(
            "operation restricted to staff with a department",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_in_set_is_permitted() {
        assert!(require_role(Role::Manager, &[Role::Manager, Role::Admin]).is_ok());
    }

    #[test]
    fn role_outside_set_is_forbidden() {
        let err = require_role(Role::Customer, &[Role::Manager]).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn owner_bypasses_role_check() {
        let owner = PrincipalId::new();
        assert!(require_role_or_owner(Role::Customer, &[Role::Admin], owner, owner).is_ok());

        let other = PrincipalId::new();
        assert!(require_role_or_owner(Role::Customer, &[Role::Admin], other, owner).is_err());
    }

    #[test]
    fn department_filter() {
        assert!(require_department(Some(Department::Mechanical), &[Department::Mechanical]).is_ok());
        assert!(require_department(Some(Department::Bodywork), &[Department::Mechanical]).is_err());
        assert!(require_department(None, &[Department::Mechanical]).is_err());
    }
}
