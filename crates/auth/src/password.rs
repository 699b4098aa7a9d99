//! Password hashing seam.
//!
//! The hash algorithm is an external collaborator; domain and API code only
//! see this trait. Implementations are constructed at process start and
//! passed in explicitly.

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> String;

    fn verify(&self, plain: &str, hash: &str) -> bool;
}
