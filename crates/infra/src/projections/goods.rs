use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_goods::{GoodsEvent, GoodsRequestId, GoodsRequestLine, GoodsRequestStatus};
use pitstop_jobs::JobId;

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "goods_request";

#[derive(Debug, Clone, Serialize)]
pub struct GoodsRow {
    pub request_id: GoodsRequestId,
    pub reference: String,
    pub job: JobId,
    pub requester: PrincipalId,
    pub lines: Vec<GoodsRequestLine>,
    pub status: GoodsRequestStatus,
    pub decided_by: Option<PrincipalId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub released_by: Option<PrincipalId>,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct GoodsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> GoodsProjection<S>
where
    S: Store<GoodsRequestId, GoodsRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &GoodsRequestId) -> Option<GoodsRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<GoodsRow> {
        self.store.list()
    }

    pub fn list_for_requester(&self, requester: PrincipalId) -> Vec<GoodsRow> {
        self.store
            .list()
            .into_iter()
            .filter(|row| row.requester == requester)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: GoodsEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            GoodsEvent::Created(e) => {
                self.store.upsert(
                    e.request_id,
                    GoodsRow {
                        request_id: e.request_id,
                        reference: e.reference.to_string(),
                        job: e.job,
                        requester: e.requester,
                        lines: e.lines,
                        status: GoodsRequestStatus::Pending,
                        decided_by: None,
                        decided_at: None,
                        rejection_reason: None,
                        released_by: None,
                        released_at: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            GoodsEvent::Approved {
                request_id,
                approver,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&request_id) {
                    row.status = GoodsRequestStatus::Approved;
                    row.decided_by = Some(approver);
                    row.decided_at = Some(occurred_at);
                    self.store.upsert(request_id, row);
                }
            }
            GoodsEvent::Rejected {
                request_id,
                approver,
                reason,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&request_id) {
                    row.status = GoodsRequestStatus::Rejected;
                    row.decided_by = Some(approver);
                    row.decided_at = Some(occurred_at);
                    row.rejection_reason = Some(reason);
                    self.store.upsert(request_id, row);
                }
            }
            GoodsEvent::Released {
                request_id,
                released_by,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&request_id) {
                    row.status = GoodsRequestStatus::Released;
                    row.released_by = Some(released_by);
                    row.released_at = Some(occurred_at);
                    self.store.upsert(request_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
