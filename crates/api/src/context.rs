use pitstop_auth::Role;
use pitstop_core::PrincipalId;

/// Authenticated request context.
///
/// Built by the auth middleware from the validated token and the live
/// principal record, so `role` reflects the record, not the mint-time claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    principal_id: PrincipalId,
    reference: String,
    role: Role,
}

impl AuthContext {
    pub fn new(principal_id: PrincipalId, reference: String, role: Role) -> Self {
        Self {
            principal_id,
            reference,
            role,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
