//! Read-model projections.
//!
//! Each projection consumes published envelopes (JSON payloads), filters on
//! its aggregate type, and maintains a disposable row store. Delivery is
//! at-least-once, so every projection keeps a per-stream cursor and drops
//! duplicates or replays.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use pitstop_core::AggregateId;

pub mod bookings;
pub mod goods;
pub mod inventory;
pub mod invoices;
pub mod jobs;
pub mod leave;
pub mod principals;
pub mod vehicles;

pub use bookings::{BookingProjection, BookingRow};
pub use goods::{GoodsProjection, GoodsRow};
pub use inventory::{InventoryProjection, InventoryRow};
pub use invoices::{InvoiceProjection, InvoiceRow};
pub use jobs::{JobProjection, JobRow};
pub use leave::{LeaveProjection, LeaveRow};
pub use principals::{PrincipalProjection, PrincipalRow};
pub use vehicles::{VehicleProjection, VehicleRow};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection state unavailable")]
    Poisoned,
}

/// Per-stream sequence cursors, shared by all projections.
///
/// `check` decides whether an envelope should be applied; `advance` records
/// it afterwards. Duplicates and replays (sequence at or below the cursor)
/// are skipped silently, gaps are an error.
#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(true)` when the event is new and must be applied.
    pub fn check(&self, aggregate_id: AggregateId, sequence: u64) -> Result<bool, ProjectionError> {
        let cursors = self.cursors.read().map_err(|_| ProjectionError::Poisoned)?;
        let last = cursors.get(&aggregate_id).copied().unwrap_or(0);

        if sequence <= last {
            return Ok(false);
        }
        if sequence != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence,
            });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence: u64) -> Result<(), ProjectionError> {
        let mut cursors = self.cursors.write().map_err(|_| ProjectionError::Poisoned)?;
        cursors.insert(aggregate_id, sequence);
        Ok(())
    }

    pub fn reset(&self) -> Result<(), ProjectionError> {
        let mut cursors = self.cursors.write().map_err(|_| ProjectionError::Poisoned)?;
        cursors.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.check(id, 1).unwrap());
        cursors.advance(id, 1).unwrap();

        // Replay of 1 is a no-op, not an error.
        assert!(!cursors.check(id, 1).unwrap());

        // Jumping to 3 without 2 is a gap.
        assert!(matches!(
            cursors.check(id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
    }
}
