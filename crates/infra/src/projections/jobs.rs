use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_bookings::BookingId;
use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_jobs::{
    InspectionPhase, InspectionReport, JobEvent, JobId, JobStatus, LabourerAssignment, WorkLogEntry,
};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "job";

#[derive(Debug, Clone, Serialize)]
pub struct JobRow {
    pub job_id: JobId,
    pub reference: String,
    pub booking: BookingId,
    pub description: String,
    pub status: JobStatus,
    pub labourers: Vec<LabourerAssignment>,
    pub work_log: Vec<WorkLogEntry>,
    pub pre_inspection: Option<InspectionReport>,
    pub post_inspection: Option<InspectionReport>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_hours: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    pub fn is_assigned(&self, labourer: PrincipalId) -> bool {
        self.labourers.iter().any(|l| l.labourer == labourer)
    }
}

pub struct JobProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> JobProjection<S>
where
    S: Store<JobId, JobRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &JobId) -> Option<JobRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<JobRow> {
        self.store.list()
    }

    pub fn list_for_booking(&self, booking: BookingId) -> Vec<JobRow> {
        self.store
            .list()
            .into_iter()
            .filter(|row| row.booking == booking)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: JobEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            JobEvent::Created(e) => {
                self.store.upsert(
                    e.job_id,
                    JobRow {
                        job_id: e.job_id,
                        reference: e.reference.to_string(),
                        booking: e.booking,
                        description: e.description,
                        status: JobStatus::Pending,
                        labourers: Vec::new(),
                        work_log: Vec::new(),
                        pre_inspection: None,
                        post_inspection: None,
                        started_at: None,
                        completed_at: None,
                        actual_hours: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            JobEvent::LabourerAssigned {
                job_id,
                labourer,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&job_id) {
                    if !row.is_assigned(labourer) {
                        row.labourers.push(LabourerAssignment {
                            labourer,
                            hours_worked: 0,
                            assigned_at: occurred_at,
                        });
                    }
                    self.store.upsert(job_id, row);
                }
            }
            JobEvent::StatusChanged {
                job_id,
                to,
                occurred_at,
                ..
            } => {
                if let Some(mut row) = self.store.get(&job_id) {
                    row.status = to;
                    match to {
                        JobStatus::Working if row.started_at.is_none() => {
                            row.started_at = Some(occurred_at);
                        }
                        JobStatus::Completed => {
                            row.completed_at = Some(occurred_at);
                            row.actual_hours =
                                Some(row.work_log.iter().map(|e| e.hours).sum());
                        }
                        _ => {}
                    }
                    self.store.upsert(job_id, row);
                }
            }
            JobEvent::WorkLogged {
                job_id,
                labourer,
                description,
                hours,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&job_id) {
                    row.work_log.push(WorkLogEntry {
                        labourer,
                        description,
                        hours,
                        occurred_at,
                    });
                    if let Some(assignment) =
                        row.labourers.iter_mut().find(|l| l.labourer == labourer)
                    {
                        assignment.hours_worked += hours;
                    }
                    self.store.upsert(job_id, row);
                }
            }
            JobEvent::InspectionSubmitted {
                job_id,
                phase,
                inspector,
                findings,
                approved,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&job_id) {
                    let report = InspectionReport {
                        inspector,
                        findings,
                        approved,
                        submitted_at: occurred_at,
                    };
                    match phase {
                        InspectionPhase::PreWork => row.pre_inspection = Some(report),
                        InspectionPhase::PostWork => row.post_inspection = Some(report),
                    }
                    self.store.upsert(job_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
