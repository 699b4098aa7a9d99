use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::PrincipalId;

use crate::Role;

/// JWT claims model.
///
/// `iat`/`exp` are unix timestamps so standard JWT validation applies; the
/// helpers below expose them as `DateTime<Utc>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Role granted at mint time. Route guards re-check against the live
    /// principal record, so a stale role here can only narrow access.
    pub role: Role,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(sub: PrincipalId, role: Role, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
