//! Uniqueness claims.
//!
//! Models a unique constraint as an atomic claim: the first caller to claim
//! `(scope, key)` wins, later callers get `AlreadyClaimed`. Used for email
//! addresses, vehicle registrations, booking day+slot occupancy and
//! per-employee leave days. Claiming replaces the read-check-then-write
//! pattern, so two concurrent writers cannot both pass the check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use pitstop_core::AggregateId;

#[derive(Debug, Error)]
pub enum UniqueError {
    #[error("'{key}' is already taken in scope '{scope}'")]
    AlreadyClaimed { scope: String, key: String },

    #[error("unique index unavailable: {0}")]
    Unavailable(String),
}

/// Atomic claim/release of unique keys, scoped by constraint name.
pub trait UniqueIndex: Send + Sync {
    /// Claim `key` within `scope` for `owner`. Re-claiming a key already
    /// held by the same owner is a no-op.
    fn claim(&self, scope: &str, key: &str, owner: AggregateId) -> Result<(), UniqueError>;

    /// Release a single key. Releasing an unclaimed key is a no-op.
    fn release(&self, scope: &str, key: &str) -> Result<(), UniqueError>;

    /// Release every key in `scope` held by `owner`.
    fn release_owner(&self, scope: &str, owner: AggregateId) -> Result<(), UniqueError>;

    /// Current owner of a key, if claimed.
    fn owner_of(&self, scope: &str, key: &str) -> Result<Option<AggregateId>, UniqueError>;
}

impl<U> UniqueIndex for Arc<U>
where
    U: UniqueIndex + ?Sized,
{
    fn claim(&self, scope: &str, key: &str, owner: AggregateId) -> Result<(), UniqueError> {
        (**self).claim(scope, key, owner)
    }

    fn release(&self, scope: &str, key: &str) -> Result<(), UniqueError> {
        (**self).release(scope, key)
    }

    fn release_owner(&self, scope: &str, owner: AggregateId) -> Result<(), UniqueError> {
        (**self).release_owner(scope, owner)
    }

    fn owner_of(&self, scope: &str, key: &str) -> Result<Option<AggregateId>, UniqueError> {
        (**self).owner_of(scope, key)
    }
}

/// In-memory unique index for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUniqueIndex {
    claims: Mutex<HashMap<(String, String), AggregateId>>,
}

impl InMemoryUniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), AggregateId>>, UniqueError> {
        self.claims
            .lock()
            .map_err(|_| UniqueError::Unavailable("lock poisoned".to_string()))
    }
}

impl UniqueIndex for InMemoryUniqueIndex {
    fn claim(&self, scope: &str, key: &str, owner: AggregateId) -> Result<(), UniqueError> {
        let mut claims = self.lock()?;
        match claims.get(&(scope.to_string(), key.to_string())) {
            Some(existing) if *existing == owner => Ok(()),
            Some(_) => Err(UniqueError::AlreadyClaimed {
                scope: scope.to_string(),
                key: key.to_string(),
            }),
            None => {
                claims.insert((scope.to_string(), key.to_string()), owner);
                Ok(())
            }
        }
    }

    fn release(&self, scope: &str, key: &str) -> Result<(), UniqueError> {
        let mut claims = self.lock()?;
        claims.remove(&(scope.to_string(), key.to_string()));
        Ok(())
    }

    fn release_owner(&self, scope: &str, owner: AggregateId) -> Result<(), UniqueError> {
        let mut claims = self.lock()?;
        claims.retain(|(s, _), o| s != scope || *o != owner);
        Ok(())
    }

    fn owner_of(&self, scope: &str, key: &str) -> Result<Option<AggregateId>, UniqueError> {
        let claims = self.lock()?;
        Ok(claims.get(&(scope.to_string(), key.to_string())).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let index = InMemoryUniqueIndex::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        index.claim("email", "x@y.test", a).unwrap();
        let err = index.claim("email", "x@y.test", b).unwrap_err();
        assert!(matches!(err, UniqueError::AlreadyClaimed { .. }));

        // Same owner may re-claim.
        index.claim("email", "x@y.test", a).unwrap();
    }

    #[test]
    fn scopes_are_independent() {
        let index = InMemoryUniqueIndex::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        index.claim("email", "shared", a).unwrap();
        index.claim("registration", "shared", b).unwrap();
    }

    #[test]
    fn release_frees_the_key() {
        let index = InMemoryUniqueIndex::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        index.claim("slot", "2026-09-01:morning", a).unwrap();
        index.release("slot", "2026-09-01:morning").unwrap();
        index.claim("slot", "2026-09-01:morning", b).unwrap();
    }

    #[test]
    fn release_owner_drops_all_their_keys_in_scope() {
        let index = InMemoryUniqueIndex::new();
        let owner = AggregateId::new();
        let other = AggregateId::new();

        index.claim("leave:emp1", "2026-09-01", owner).unwrap();
        index.claim("leave:emp1", "2026-09-02", owner).unwrap();
        index.claim("leave:emp2", "2026-09-01", other).unwrap();

        index.release_owner("leave:emp1", owner).unwrap();
        assert_eq!(index.owner_of("leave:emp1", "2026-09-01").unwrap(), None);
        assert_eq!(
            index.owner_of("leave:emp2", "2026-09-01").unwrap(),
            Some(other)
        );
    }
}
