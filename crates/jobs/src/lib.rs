//! Workshop jobs under a booking.

pub mod job;

pub use job::{
    AppendWorkLog, AssignLabourer, ChangeJobStatus, CreateJob, InspectionPhase, InspectionReport,
    Job, JobCommand, JobCreated, JobEvent, JobId, JobStatus, LabourerAssignment,
    SubmitInspectionReport, WorkLogEntry,
};
