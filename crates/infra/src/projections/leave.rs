use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_leave::{LeaveEvent, LeaveRequestId, LeaveStatus, LeaveType};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "leave_request";

#[derive(Debug, Clone, Serialize)]
pub struct LeaveRow {
    pub request_id: LeaveRequestId,
    pub reference: String,
    pub employee: PrincipalId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub decided_by: Option<PrincipalId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRow {
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

pub struct LeaveProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> LeaveProjection<S>
where
    S: Store<LeaveRequestId, LeaveRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &LeaveRequestId) -> Option<LeaveRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<LeaveRow> {
        self.store.list()
    }

    pub fn list_for_employee(&self, employee: PrincipalId) -> Vec<LeaveRow> {
        self.store
            .list()
            .into_iter()
            .filter(|row| row.employee == employee)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: LeaveEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            LeaveEvent::Created(e) => {
                self.store.upsert(
                    e.request_id,
                    LeaveRow {
                        request_id: e.request_id,
                        reference: e.reference.to_string(),
                        employee: e.employee,
                        leave_type: e.leave_type,
                        start: e.start,
                        end: e.end,
                        reason: e.reason,
                        status: LeaveStatus::Pending,
                        decided_by: None,
                        decided_at: None,
                        rejection_reason: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            LeaveEvent::Approved {
                request_id,
                approver,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&request_id) {
                    row.status = LeaveStatus::Approved;
                    row.decided_by = Some(approver);
                    row.decided_at = Some(occurred_at);
                    self.store.upsert(request_id, row);
                }
            }
            LeaveEvent::Rejected {
                request_id,
                approver,
                reason,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&request_id) {
                    row.status = LeaveStatus::Rejected;
                    row.decided_by = Some(approver);
                    row.decided_at = Some(occurred_at);
                    row.rejection_reason = Some(reason);
                    self.store.upsert(request_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
