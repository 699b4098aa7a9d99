//! Principal aggregate (event-sourced).
//!
//! A principal is any authenticated actor: a customer or a member of staff.
//! Accounts are never hard-deleted; retirement is a status change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_auth::{Department, LoginThrottle, Role};
use pitstop_core::{Aggregate, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;

// ─────────────────────────────────────────────────────────────────────────────
// Status + profile
// ─────────────────────────────────────────────────────────────────────────────

/// Account status. `Terminated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Terminated,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Inactive => "inactive",
            PrincipalStatus::Suspended => "suspended",
            PrincipalStatus::Terminated => "terminated",
        }
    }
}

impl core::fmt::Display for PrincipalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomerDetails {
    pub phone: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDetails {
    pub department: Department,
    /// Skill tags, e.g. "engine", "diagnostics".
    pub specializations: Vec<String>,
}

/// Role-keyed profile data.
///
/// Modelled as a variant per kind rather than optional fields guarded by
/// runtime predicates: a customer cannot carry employee details by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Customer(CustomerDetails),
    Staff(EmployeeDetails),
}

impl Profile {
    pub fn matches_role(&self, role: Role) -> bool {
        match self {
            Profile::Customer(_) => !role.is_staff(),
            Profile::Staff(_) => role.is_staff(),
        }
    }

    pub fn department(&self) -> Option<Department> {
        match self {
            Profile::Customer(_) => None,
            Profile::Staff(details) => Some(details.department),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate root: Principal.
///
/// # Invariants
/// - `reference` prefix is keyed by the role at registration and immutable.
/// - Profile variant always matches the current role.
/// - `Terminated` accepts no further lifecycle changes.
#[derive(Debug, Clone)]
pub struct Principal {
    id: PrincipalId,
    reference: Option<ReferenceNumber>,
    email: String,
    display_name: String,
    password_hash: String,
    role: Role,
    profile: Option<Profile>,
    status: PrincipalStatus,
    throttle: LoginThrottle,
    last_login: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Principal {
    /// Create an empty, not-yet-registered instance for rehydration.
    pub fn empty(id: PrincipalId) -> Self {
        Self {
            id,
            reference: None,
            email: String::new(),
            display_name: String::new(),
            password_hash: String::new(),
            role: Role::Customer,
            profile: None,
            status: PrincipalStatus::Active,
            throttle: LoginThrottle::default(),
            last_login: None,
            version: 0,
            created: false,
        }
    }

    pub fn reference(&self) -> Option<&ReferenceNumber> {
        self.reference.as_ref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn status(&self) -> PrincipalStatus {
        self.status
    }

    pub fn throttle(&self) -> LoginThrottle {
        self.throttle
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.throttle.is_locked(now)
    }

    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_not_terminated(&self) -> Result<(), DomainError> {
        if self.status == PrincipalStatus::Terminated {
            return Err(DomainError::invariant("principal is terminated"));
        }
        Ok(())
    }
}

impl AggregateRoot for Principal {
    type Id = PrincipalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPrincipal {
    pub principal_id: PrincipalId,
    pub reference: ReferenceNumber,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub principal_id: PrincipalId,
    pub display_name: Option<String>,
    pub profile: Option<Profile>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub principal_id: PrincipalId,
    pub status: PrincipalStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRole {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub profile: Profile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePassword {
    pub principal_id: PrincipalId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLoginFailure {
    pub principal_id: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLoginSuccess {
    pub principal_id: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalCommand {
    Register(RegisterPrincipal),
    UpdateProfile(UpdateProfile),
    ChangeStatus(ChangeStatus),
    ChangeRole(ChangeRole),
    ChangePassword(ChangePassword),
    RecordLoginFailure(RecordLoginFailure),
    RecordLoginSuccess(RecordLoginSuccess),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRegistered {
    pub principal_id: PrincipalId,
    pub reference: ReferenceNumber,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalEvent {
    Registered(PrincipalRegistered),
    ProfileUpdated {
        principal_id: PrincipalId,
        display_name: Option<String>,
        profile: Option<Profile>,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        principal_id: PrincipalId,
        status: PrincipalStatus,
        occurred_at: DateTime<Utc>,
    },
    RoleChanged {
        principal_id: PrincipalId,
        role: Role,
        profile: Profile,
        occurred_at: DateTime<Utc>,
    },
    PasswordChanged {
        principal_id: PrincipalId,
        password_hash: String,
        occurred_at: DateTime<Utc>,
    },
    LoginFailed {
        principal_id: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
    LoginSucceeded {
        principal_id: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PrincipalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PrincipalEvent::Registered(_) => "principal.registered",
            PrincipalEvent::ProfileUpdated { .. } => "principal.profile_updated",
            PrincipalEvent::StatusChanged { .. } => "principal.status_changed",
            PrincipalEvent::RoleChanged { .. } => "principal.role_changed",
            PrincipalEvent::PasswordChanged { .. } => "principal.password_changed",
            PrincipalEvent::LoginFailed { .. } => "principal.login_failed",
            PrincipalEvent::LoginSucceeded { .. } => "principal.login_succeeded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PrincipalEvent::Registered(e) => e.occurred_at,
            PrincipalEvent::ProfileUpdated { occurred_at, .. }
            | PrincipalEvent::StatusChanged { occurred_at, .. }
            | PrincipalEvent::RoleChanged { occurred_at, .. }
            | PrincipalEvent::PasswordChanged { occurred_at, .. }
            | PrincipalEvent::LoginFailed { occurred_at, .. }
            | PrincipalEvent::LoginSucceeded { occurred_at, .. } => *occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Principal {
    type Command = PrincipalCommand;
    type Event = PrincipalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PrincipalEvent::Registered(e) => {
                self.id = e.principal_id;
                self.reference = Some(e.reference.clone());
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.password_hash = e.password_hash.clone();
                self.role = e.role;
                self.profile = Some(e.profile.clone());
                self.status = PrincipalStatus::Active;
                self.created = true;
            }
            PrincipalEvent::ProfileUpdated {
                display_name,
                profile,
                ..
            } => {
                if let Some(name) = display_name {
                    self.display_name = name.clone();
                }
                if let Some(profile) = profile {
                    self.profile = Some(profile.clone());
                }
            }
            PrincipalEvent::StatusChanged { status, .. } => {
                self.status = *status;
            }
            PrincipalEvent::RoleChanged { role, profile, .. } => {
                self.role = *role;
                self.profile = Some(profile.clone());
            }
            PrincipalEvent::PasswordChanged { password_hash, .. } => {
                self.password_hash = password_hash.clone();
            }
            PrincipalEvent::LoginFailed { occurred_at, .. } => {
                self.throttle = self.throttle.after_failure(*occurred_at);
            }
            PrincipalEvent::LoginSucceeded { occurred_at, .. } => {
                self.throttle = self.throttle.after_success();
                self.last_login = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PrincipalCommand::Register(cmd) => self.handle_register(cmd),
            PrincipalCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            PrincipalCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            PrincipalCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            PrincipalCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            PrincipalCommand::RecordLoginFailure(cmd) => self.handle_login_failure(cmd),
            PrincipalCommand::RecordLoginSuccess(cmd) => self.handle_login_success(cmd),
        }
    }
}

impl Principal {
    fn handle_register(&self, cmd: &RegisterPrincipal) -> Result<Vec<PrincipalEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("principal already registered"));
        }
        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        if !cmd.profile.matches_role(cmd.role) {
            return Err(DomainError::validation(format!(
                "profile kind does not match role '{}'",
                cmd.role
            )));
        }
        if cmd.reference.prefix() != cmd.role.reference_prefix() {
            return Err(DomainError::invariant(format!(
                "reference prefix '{}' does not match role '{}'",
                cmd.reference.prefix(),
                cmd.role
            )));
        }

        Ok(vec![PrincipalEvent::Registered(PrincipalRegistered {
            principal_id: cmd.principal_id,
            reference: cmd.reference.clone(),
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            password_hash: cmd.password_hash.clone(),
            role: cmd.role,
            profile: cmd.profile.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_not_terminated()?;

        if let Some(name) = &cmd.display_name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("display name cannot be empty"));
            }
        }
        if let Some(profile) = &cmd.profile {
            if !profile.matches_role(self.role) {
                return Err(DomainError::validation(format!(
                    "profile kind does not match role '{}'",
                    self.role
                )));
            }
        }
        if cmd.display_name.is_none() && cmd.profile.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        Ok(vec![PrincipalEvent::ProfileUpdated {
            principal_id: cmd.principal_id,
            display_name: cmd.display_name.clone(),
            profile: cmd.profile.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;

        if self.status == PrincipalStatus::Terminated {
            return Err(DomainError::invalid_transition(
                "principal",
                self.status.as_str(),
                cmd.status.as_str(),
            ));
        }
        if self.status == cmd.status {
            return Ok(vec![]);
        }

        Ok(vec![PrincipalEvent::StatusChanged {
            principal_id: cmd.principal_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_not_terminated()?;

        if !cmd.profile.matches_role(cmd.role) {
            return Err(DomainError::validation(format!(
                "profile kind does not match role '{}'",
                cmd.role
            )));
        }

        Ok(vec![PrincipalEvent::RoleChanged {
            principal_id: cmd.principal_id,
            role: cmd.role,
            profile: cmd.profile.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_not_terminated()?;

        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }

        Ok(vec![PrincipalEvent::PasswordChanged {
            principal_id: cmd.principal_id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_login_failure(&self, cmd: &RecordLoginFailure) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;

        Ok(vec![PrincipalEvent::LoginFailed {
            principal_id: cmd.principal_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_login_success(&self, cmd: &RecordLoginSuccess) -> Result<Vec<PrincipalEvent>, DomainError> {
        self.ensure_registered()?;

        Ok(vec![PrincipalEvent::LoginSucceeded {
            principal_id: cmd.principal_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_cmd(id: PrincipalId) -> RegisterPrincipal {
        RegisterPrincipal {
            principal_id: id,
            reference: ReferenceNumber::new("C", 1).unwrap(),
            email: "jo@example.com".into(),
            display_name: "Jo".into(),
            password_hash: "hash".into(),
            role: Role::Customer,
            profile: Profile::Customer(CustomerDetails::default()),
            occurred_at: Utc::now(),
        }
    }

    fn registered() -> Principal {
        let id = PrincipalId::new();
        let mut principal = Principal::empty(id);
        let events = principal
            .handle(&PrincipalCommand::Register(register_cmd(id)))
            .unwrap();
        for e in &events {
            principal.apply(e);
        }
        principal
    }

    #[test]
    fn register_requires_matching_reference_prefix() {
        let id = PrincipalId::new();
        let principal = Principal::empty(id);
        let mut cmd = register_cmd(id);
        cmd.reference = ReferenceNumber::new("T", 1).unwrap();

        let err = principal
            .handle(&PrincipalCommand::Register(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn register_rejects_staff_profile_for_customer_role() {
        let id = PrincipalId::new();
        let principal = Principal::empty(id);
        let mut cmd = register_cmd(id);
        cmd.profile = Profile::Staff(EmployeeDetails {
            department: Department::Mechanical,
            specializations: vec![],
        });

        let err = principal
            .handle(&PrincipalCommand::Register(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn five_login_failures_lock_the_account() {
        let mut principal = registered();
        let now = Utc::now();
        let id = *principal.id();

        for _ in 0..5 {
            let events = principal
                .handle(&PrincipalCommand::RecordLoginFailure(RecordLoginFailure {
                    principal_id: id,
                    occurred_at: now,
                }))
                .unwrap();
            for e in &events {
                principal.apply(e);
            }
        }

        assert!(principal.is_locked(now));

        // Success clears the lock.
        let events = principal
            .handle(&PrincipalCommand::RecordLoginSuccess(RecordLoginSuccess {
                principal_id: id,
                occurred_at: now,
            }))
            .unwrap();
        for e in &events {
            principal.apply(e);
        }
        assert!(!principal.is_locked(now));
        assert_eq!(principal.last_login(), Some(now));
    }

    #[test]
    fn terminated_is_terminal() {
        let mut principal = registered();
        let id = *principal.id();

        let events = principal
            .handle(&PrincipalCommand::ChangeStatus(ChangeStatus {
                principal_id: id,
                status: PrincipalStatus::Terminated,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            principal.apply(e);
        }

        let err = principal
            .handle(&PrincipalCommand::ChangeStatus(ChangeStatus {
                principal_id: id,
                status: PrincipalStatus::Active,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn same_status_change_is_a_no_op() {
        let principal = registered();
        let id = *principal.id();

        let events = principal
            .handle(&PrincipalCommand::ChangeStatus(ChangeStatus {
                principal_id: id,
                status: PrincipalStatus::Active,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }
}
