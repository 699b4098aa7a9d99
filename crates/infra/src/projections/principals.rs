use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_auth::{Department, LoginThrottle, Role};
use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_identity::{PrincipalEvent, PrincipalStatus, Profile};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "principal";

/// Queryable principal row.
///
/// Carries the password hash and throttle state because the login flow
/// reads this model before touching the aggregate; the API layer never
/// serializes those fields outward.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalRow {
    pub principal_id: PrincipalId,
    pub reference: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub status: PrincipalStatus,
    pub department: Option<Department>,
    pub profile: Profile,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub throttle: LoginThrottle,
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct PrincipalProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> PrincipalProjection<S>
where
    S: Store<PrincipalId, PrincipalRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &PrincipalId) -> Option<PrincipalRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<PrincipalRow> {
        self.store.list()
    }

    pub fn find_by_email(&self, email: &str) -> Option<PrincipalRow> {
        let needle = email.to_ascii_lowercase();
        self.store.list().into_iter().find(|row| row.email == needle)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: PrincipalEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            PrincipalEvent::Registered(e) => {
                self.store.upsert(
                    e.principal_id,
                    PrincipalRow {
                        principal_id: e.principal_id,
                        reference: e.reference.to_string(),
                        email: e.email,
                        display_name: e.display_name,
                        role: e.role,
                        status: PrincipalStatus::Active,
                        department: e.profile.department(),
                        profile: e.profile,
                        password_hash: e.password_hash,
                        throttle: LoginThrottle::default(),
                        last_login: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            PrincipalEvent::ProfileUpdated {
                principal_id,
                display_name,
                profile,
                ..
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    if let Some(display_name) = display_name {
                        row.display_name = display_name;
                    }
                    if let Some(profile) = profile {
                        row.department = profile.department();
                        row.profile = profile;
                    }
                    self.store.upsert(principal_id, row);
                }
            }
            PrincipalEvent::StatusChanged {
                principal_id,
                status,
                ..
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    row.status = status;
                    self.store.upsert(principal_id, row);
                }
            }
            PrincipalEvent::RoleChanged {
                principal_id,
                role,
                profile,
                ..
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    row.role = role;
                    row.department = profile.department();
                    row.profile = profile;
                    self.store.upsert(principal_id, row);
                }
            }
            PrincipalEvent::PasswordChanged {
                principal_id,
                password_hash,
                ..
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    row.password_hash = password_hash;
                    self.store.upsert(principal_id, row);
                }
            }
            PrincipalEvent::LoginFailed {
                principal_id,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    row.throttle = row.throttle.after_failure(occurred_at);
                    self.store.upsert(principal_id, row);
                }
            }
            PrincipalEvent::LoginSucceeded {
                principal_id,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&principal_id) {
                    row.throttle = row.throttle.after_success();
                    row.last_login = Some(occurred_at);
                    self.store.upsert(principal_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
