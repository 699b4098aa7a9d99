//! Signed-credential mint/validate (HS256).

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use thiserror::Error;

use crate::claims::JwtClaims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to mint token: {0}")]
    Mint(String),
}

/// Validates an opaque bearer credential into claims.
///
/// Kept as a trait so the API layer can swap implementations in tests.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError>;
}

/// HS256 (shared-secret) mint + validate.
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint a signed token for the given claims.
    pub fn mint(&self, claims: &JwtClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Mint(e.to_string()))
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError> {
        decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pitstop_core::PrincipalId;

    use super::*;
    use crate::Role;

    #[test]
    fn mint_and_validate_round_trip() {
        let jwt = Hs256JwtValidator::new(b"test-secret");
        let claims = JwtClaims::new(
            PrincipalId::new(),
            Role::Manager,
            Utc::now(),
            Duration::minutes(10),
        );

        let token = jwt.mint(&claims).unwrap();
        let decoded = jwt.validate(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let jwt = Hs256JwtValidator::new(b"test-secret");
        let claims = JwtClaims::new(
            PrincipalId::new(),
            Role::Customer,
            Utc::now() - Duration::hours(2),
            Duration::minutes(10),
        );

        let token = jwt.mint(&claims).unwrap();
        assert_eq!(jwt.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let minter = Hs256JwtValidator::new(b"secret-a");
        let verifier = Hs256JwtValidator::new(b"secret-b");
        let claims = JwtClaims::new(
            PrincipalId::new(),
            Role::Admin,
            Utc::now(),
            Duration::minutes(10),
        );

        let token = minter.mint(&claims).unwrap();
        assert!(matches!(verifier.validate(&token), Err(TokenError::Invalid(_))));
    }
}
