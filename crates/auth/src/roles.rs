use serde::{Deserialize, Serialize};

use pitstop_core::DomainError;

/// Workshop role.
///
/// Roles are a closed set: route guards and the role-keyed reference prefix
/// both depend on exhaustively matching them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Technician,
    ServiceAdvisor,
    Manager,
    Admin,
    Cashier,
}

impl Role {
    /// Reference-number prefix for principals of this role.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            Role::Customer => "C",
            Role::Technician => "T",
            Role::ServiceAdvisor => "SA",
            Role::Manager => "M",
            Role::Admin => "A",
            Role::Cashier => "CS",
        }
    }

    /// Staff roles carry employee details (department, specializations).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Customer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Technician => "technician",
            Role::ServiceAdvisor => "service_advisor",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "customer" => Ok(Role::Customer),
            "technician" => Ok(Role::Technician),
            "service_advisor" => Ok(Role::ServiceAdvisor),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workshop department for staff principals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Mechanical,
    Electrical,
    Bodywork,
    Painting,
    FrontDesk,
    Administration,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Mechanical => "mechanical",
            Department::Electrical => "electrical",
            Department::Bodywork => "bodywork",
            Department::Painting => "painting",
            Department::FrontDesk => "front_desk",
            Department::Administration => "administration",
        }
    }
}

impl core::fmt::Display for Department {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_prefix_is_role_keyed() {
        assert_eq!(Role::Customer.reference_prefix(), "C");
        assert_eq!(Role::ServiceAdvisor.reference_prefix(), "SA");
        assert_eq!(Role::Cashier.reference_prefix(), "CS");
    }

    #[test]
    fn parse_round_trips() {
        for role in [
            Role::Customer,
            Role::Technician,
            Role::ServiceAdvisor,
            Role::Manager,
            Role::Admin,
            Role::Cashier,
        ] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert!(Role::parse("janitor").is_err());
    }
}
