//! Principal identity lifecycle (registration, status, login throttle).

pub mod principal;

pub use principal::{
    ChangePassword, ChangeRole, ChangeStatus, CustomerDetails, EmployeeDetails, Principal,
    PrincipalCommand, PrincipalEvent, PrincipalRegistered, PrincipalStatus, Profile,
    RecordLoginFailure, RecordLoginSuccess, RegisterPrincipal, UpdateProfile,
};
