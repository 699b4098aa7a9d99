//! Per-prefix reference number sequences.
//!
//! Reference numbers (`BK00005`, `IV00012`, ...) come from a per-prefix
//! counter that must be atomic: two concurrent creates must never receive
//! the same number. Gaps are acceptable (a failed create after taking a
//! number simply burns it); duplicates are not.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use pitstop_core::ReferenceNumber;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("invalid reference prefix: {0}")]
    InvalidPrefix(String),

    #[error("sequence store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic per-prefix counter handing out reference numbers.
pub trait SequenceStore: Send + Sync {
    /// Take the next number for `prefix`. Each call returns a strictly
    /// greater sequence than any previous call with the same prefix.
    fn next(&self, prefix: &str) -> Result<ReferenceNumber, SequenceError>;
}

impl<S> SequenceStore for Arc<S>
where
    S: SequenceStore + ?Sized,
{
    fn next(&self, prefix: &str) -> Result<ReferenceNumber, SequenceError> {
        (**self).next(prefix)
    }
}

/// In-memory sequence store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn next(&self, prefix: &str) -> Result<ReferenceNumber, SequenceError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("lock poisoned".to_string()))?;

        let counter = counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;

        ReferenceNumber::new(prefix, *counter)
            .map_err(|e| SequenceError::InvalidPrefix(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_prefix_starts_at_one() {
        let store = InMemorySequenceStore::new();
        assert_eq!(store.next("BK").unwrap().to_string(), "BK00001");
        assert_eq!(store.next("BK").unwrap().to_string(), "BK00002");
        assert_eq!(store.next("IV").unwrap().to_string(), "IV00001");
    }

    #[test]
    fn concurrent_takers_never_collide() {
        let store = Arc::new(InMemorySequenceStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| store.next("JB").unwrap().sequence())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }

    #[test]
    fn bad_prefix_is_reported() {
        let store = InMemorySequenceStore::new();
        assert!(matches!(
            store.next("bk"),
            Err(SequenceError::InvalidPrefix(_))
        ));
    }
}
