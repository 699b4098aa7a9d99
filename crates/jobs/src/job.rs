//! Job aggregate.
//!
//! A job is a discrete unit of work under a booking. Labourers accumulate
//! hours through an append-only work log; the inspection report has a
//! pre-work and a post-work phase, each approved independently. The first
//! move into working stamps `started_at`; completion stamps `completed_at`
//! and freezes `actual_hours` as the sum of logged hours.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_bookings::BookingId;
use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub AggregateId);

impl JobId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Job lifecycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Working,
    Completed,
    Cancelled,
    OnHold,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Working => "working",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::OnHold => "on_hold",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Allowed-transition table. The labourer precondition on
    /// pending → working is checked separately in `handle`.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Working | Cancelled)
                | (Working, Completed | OnHold | Cancelled)
                | (OnHold, Working | Cancelled)
        )
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labourer on the job with the hours logged against them so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabourerAssignment {
    pub labourer: PrincipalId,
    pub hours_worked: u32,
    pub assigned_at: DateTime<Utc>,
}

/// Append-only timed work record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLogEntry {
    pub labourer: PrincipalId,
    pub description: String,
    pub hours: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionPhase {
    PreWork,
    PostWork,
}

impl InspectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionPhase::PreWork => "pre_work",
            InspectionPhase::PostWork => "post_work",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub inspector: PrincipalId,
    pub findings: String,
    pub approved: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregate root: Job.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    reference: Option<ReferenceNumber>,
    booking: Option<BookingId>,
    description: String,
    status: JobStatus,
    labourers: BTreeMap<PrincipalId, LabourerAssignment>,
    work_log: Vec<WorkLogEntry>,
    pre_inspection: Option<InspectionReport>,
    post_inspection: Option<InspectionReport>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    actual_hours: Option<u32>,
    version: u64,
    created: bool,
}

impl Job {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: JobId) -> Self {
        Self {
            id,
            reference: None,
            booking: None,
            description: String::new(),
            status: JobStatus::Pending,
            labourers: BTreeMap::new(),
            work_log: Vec::new(),
            pre_inspection: None,
            post_inspection: None,
            started_at: None,
            completed_at: None,
            actual_hours: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> JobId {
        self.id
    }

    pub fn booking(&self) -> Option<BookingId> {
        self.booking
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn labourers(&self) -> impl Iterator<Item = &LabourerAssignment> {
        self.labourers.values()
    }

    pub fn is_assigned(&self, labourer: PrincipalId) -> bool {
        self.labourers.contains_key(&labourer)
    }

    pub fn work_log(&self) -> &[WorkLogEntry] {
        &self.work_log
    }

    pub fn inspection(&self, phase: InspectionPhase) -> Option<&InspectionReport> {
        match phase {
            InspectionPhase::PreWork => self.pre_inspection.as_ref(),
            InspectionPhase::PostWork => self.post_inspection.as_ref(),
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Frozen at completion; `None` while the job is still open.
    pub fn actual_hours(&self) -> Option<u32> {
        self.actual_hours
    }

    fn logged_hours(&self) -> u32 {
        self.work_log.iter().map(|e| e.hours).sum()
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        self.ensure_created()?;
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "job is {} and can no longer change",
                self.status
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJob {
    pub job_id: JobId,
    pub reference: ReferenceNumber,
    pub booking: BookingId,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignLabourer {
    pub job_id: JobId,
    pub labourer: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeJobStatus {
    pub job_id: JobId,
    pub status: JobStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendWorkLog {
    pub job_id: JobId,
    pub labourer: PrincipalId,
    pub description: String,
    pub hours: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitInspectionReport {
    pub job_id: JobId,
    pub phase: InspectionPhase,
    pub inspector: PrincipalId,
    pub findings: String,
    pub approved: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCommand {
    Create(CreateJob),
    AssignLabourer(AssignLabourer),
    ChangeStatus(ChangeJobStatus),
    AppendWorkLog(AppendWorkLog),
    SubmitInspection(SubmitInspectionReport),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub reference: ReferenceNumber,
    pub booking: BookingId,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEvent {
    Created(JobCreated),
    LabourerAssigned {
        job_id: JobId,
        labourer: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
        occurred_at: DateTime<Utc>,
    },
    WorkLogged {
        job_id: JobId,
        labourer: PrincipalId,
        description: String,
        hours: u32,
        occurred_at: DateTime<Utc>,
    },
    InspectionSubmitted {
        job_id: JobId,
        phase: InspectionPhase,
        inspector: PrincipalId,
        findings: String,
        approved: bool,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for JobEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobEvent::Created(_) => "job.created",
            JobEvent::LabourerAssigned { .. } => "job.labourer_assigned",
            JobEvent::StatusChanged { .. } => "job.status_changed",
            JobEvent::WorkLogged { .. } => "job.work_logged",
            JobEvent::InspectionSubmitted { .. } => "job.inspection_submitted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Created(e) => e.occurred_at,
            JobEvent::LabourerAssigned { occurred_at, .. }
            | JobEvent::StatusChanged { occurred_at, .. }
            | JobEvent::WorkLogged { occurred_at, .. }
            | JobEvent::InspectionSubmitted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Job {
    type Command = JobCommand;
    type Event = JobEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JobEvent::Created(e) => {
                self.id = e.job_id;
                self.reference = Some(e.reference.clone());
                self.booking = Some(e.booking);
                self.description = e.description.clone();
                self.status = JobStatus::Pending;
                self.created = true;
            }
            JobEvent::LabourerAssigned {
                labourer,
                occurred_at,
                ..
            } => {
                self.labourers.insert(
                    *labourer,
                    LabourerAssignment {
                        labourer: *labourer,
                        hours_worked: 0,
                        assigned_at: *occurred_at,
                    },
                );
            }
            JobEvent::StatusChanged { to, occurred_at, .. } => {
                self.status = *to;
                match to {
                    JobStatus::Working if self.started_at.is_none() => {
                        self.started_at = Some(*occurred_at);
                    }
                    JobStatus::Completed => {
                        self.completed_at = Some(*occurred_at);
                        self.actual_hours = Some(self.logged_hours());
                    }
                    _ => {}
                }
            }
            JobEvent::WorkLogged {
                labourer,
                description,
                hours,
                occurred_at,
                ..
            } => {
                self.work_log.push(WorkLogEntry {
                    labourer: *labourer,
                    description: description.clone(),
                    hours: *hours,
                    occurred_at: *occurred_at,
                });
                if let Some(assignment) = self.labourers.get_mut(labourer) {
                    assignment.hours_worked += hours;
                }
            }
            JobEvent::InspectionSubmitted {
                phase,
                inspector,
                findings,
                approved,
                occurred_at,
                ..
            } => {
                let report = InspectionReport {
                    inspector: *inspector,
                    findings: findings.clone(),
                    approved: *approved,
                    submitted_at: *occurred_at,
                };
                match phase {
                    InspectionPhase::PreWork => self.pre_inspection = Some(report),
                    InspectionPhase::PostWork => self.post_inspection = Some(report),
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JobCommand::Create(cmd) => self.handle_create(cmd),
            JobCommand::AssignLabourer(cmd) => self.handle_assign(cmd),
            JobCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            JobCommand::AppendWorkLog(cmd) => self.handle_work_log(cmd),
            JobCommand::SubmitInspection(cmd) => self.handle_inspection(cmd),
        }
    }
}

impl Job {
    fn handle_create(&self, cmd: &CreateJob) -> Result<Vec<JobEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("job already exists"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("job description is required"));
        }

        Ok(vec![JobEvent::Created(JobCreated {
            job_id: cmd.job_id,
            reference: cmd.reference.clone(),
            booking: cmd.booking,
            description: cmd.description.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignLabourer) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_open()?;

        if self.labourers.contains_key(&cmd.labourer) {
            return Ok(vec![]);
        }

        Ok(vec![JobEvent::LabourerAssigned {
            job_id: cmd.job_id,
            labourer: cmd.labourer,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_status(&self, cmd: &ChangeJobStatus) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_created()?;

        if !self.status.can_transition(cmd.status) {
            return Err(DomainError::invalid_transition(
                "job",
                self.status.as_str(),
                cmd.status.as_str(),
            ));
        }

        if self.status == JobStatus::Pending
            && cmd.status == JobStatus::Working
            && self.labourers.is_empty()
        {
            return Err(DomainError::invariant(
                "at least one labourer must be assigned before work starts",
            ));
        }

        Ok(vec![JobEvent::StatusChanged {
            job_id: cmd.job_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_work_log(&self, cmd: &AppendWorkLog) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_open()?;

        if !self.labourers.contains_key(&cmd.labourer) {
            return Err(DomainError::forbidden("labourer is not assigned to this job"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("work-log description is required"));
        }
        if cmd.hours == 0 {
            return Err(DomainError::validation("logged hours must be positive"));
        }

        Ok(vec![JobEvent::WorkLogged {
            job_id: cmd.job_id,
            labourer: cmd.labourer,
            description: cmd.description.trim().to_string(),
            hours: cmd.hours,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_inspection(
        &self,
        cmd: &SubmitInspectionReport,
    ) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_open()?;

        if cmd.findings.trim().is_empty() {
            return Err(DomainError::validation("inspection findings are required"));
        }
        // Post-work inspection only makes sense once work has started.
        if cmd.phase == InspectionPhase::PostWork && self.started_at.is_none() {
            return Err(DomainError::invariant(
                "post-work inspection requires the job to have started",
            ));
        }

        Ok(vec![JobEvent::InspectionSubmitted {
            job_id: cmd.job_id,
            phase: cmd.phase,
            inspector: cmd.inspector,
            findings: cmd.findings.trim().to_string(),
            approved: cmd.approved,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Job {
        let id = JobId::new(AggregateId::new());
        let mut job = Job::empty(id);
        let events = job
            .handle(&JobCommand::Create(CreateJob {
                job_id: id,
                reference: ReferenceNumber::new("JB", 1).unwrap(),
                booking: BookingId::new(AggregateId::new()),
                description: "Replace brake pads".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            job.apply(e);
        }
        job
    }

    fn assign(job: &mut Job, labourer: PrincipalId) {
        let events = job
            .handle(&JobCommand::AssignLabourer(AssignLabourer {
                job_id: job.id_typed(),
                labourer,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            job.apply(e);
        }
    }

    fn step(job: &mut Job, status: JobStatus) -> Result<(), DomainError> {
        let events = job.handle(&JobCommand::ChangeStatus(ChangeJobStatus {
            job_id: job.id_typed(),
            status,
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            job.apply(e);
        }
        Ok(())
    }

    fn log_work(job: &mut Job, labourer: PrincipalId, hours: u32) -> Result<(), DomainError> {
        let events = job.handle(&JobCommand::AppendWorkLog(AppendWorkLog {
            job_id: job.id_typed(),
            labourer,
            description: "turned wrenches".into(),
            hours,
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            job.apply(e);
        }
        Ok(())
    }

    #[test]
    fn work_cannot_start_without_a_labourer() {
        let mut job = created();
        let err = step(&mut job, JobStatus::Working).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        assign(&mut job, PrincipalId::new());
        step(&mut job, JobStatus::Working).unwrap();
        assert_eq!(job.status(), JobStatus::Working);
    }

    #[test]
    fn started_at_is_stamped_once() {
        let mut job = created();
        assign(&mut job, PrincipalId::new());

        step(&mut job, JobStatus::Working).unwrap();
        let first = job.started_at().unwrap();

        step(&mut job, JobStatus::OnHold).unwrap();
        step(&mut job, JobStatus::Working).unwrap();
        assert_eq!(job.started_at(), Some(first));
    }

    #[test]
    fn completion_freezes_actual_hours_from_the_log() {
        let mut job = created();
        let labourer = PrincipalId::new();
        assign(&mut job, labourer);
        step(&mut job, JobStatus::Working).unwrap();

        log_work(&mut job, labourer, 3).unwrap();
        log_work(&mut job, labourer, 2).unwrap();
        assert_eq!(job.actual_hours(), None);

        step(&mut job, JobStatus::Completed).unwrap();
        assert_eq!(job.actual_hours(), Some(5));
        assert!(job.completed_at().is_some());
    }

    #[test]
    fn only_assigned_labourers_may_log_work() {
        let mut job = created();
        assign(&mut job, PrincipalId::new());
        step(&mut job, JobStatus::Working).unwrap();

        let outsider = PrincipalId::new();
        let err = log_work(&mut job, outsider, 1).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn hours_accumulate_per_labourer() {
        let mut job = created();
        let a = PrincipalId::new();
        let b = PrincipalId::new();
        assign(&mut job, a);
        assign(&mut job, b);
        step(&mut job, JobStatus::Working).unwrap();

        log_work(&mut job, a, 4).unwrap();
        log_work(&mut job, b, 1).unwrap();
        log_work(&mut job, a, 2).unwrap();

        let hours: BTreeMap<_, _> = job
            .labourers()
            .map(|l| (l.labourer, l.hours_worked))
            .collect();
        assert_eq!(hours[&a], 6);
        assert_eq!(hours[&b], 1);
    }

    #[test]
    fn post_work_inspection_requires_a_started_job() {
        let mut job = created();
        let inspector = PrincipalId::new();

        let err = job
            .handle(&JobCommand::SubmitInspection(SubmitInspectionReport {
                job_id: job.id_typed(),
                phase: InspectionPhase::PostWork,
                inspector,
                findings: "all good".into(),
                approved: true,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let events = job
            .handle(&JobCommand::SubmitInspection(SubmitInspectionReport {
                job_id: job.id_typed(),
                phase: InspectionPhase::PreWork,
                inspector,
                findings: "worn pads".into(),
                approved: false,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            job.apply(e);
        }
        let report = job.inspection(InspectionPhase::PreWork).unwrap();
        assert!(!report.approved);
        assert_eq!(report.findings, "worn pads");
    }

    #[test]
    fn on_hold_resumes_but_terminal_states_do_not() {
        let mut job = created();
        assign(&mut job, PrincipalId::new());
        step(&mut job, JobStatus::Working).unwrap();
        step(&mut job, JobStatus::OnHold).unwrap();
        step(&mut job, JobStatus::Working).unwrap();
        step(&mut job, JobStatus::Completed).unwrap();

        let err = step(&mut job, JobStatus::Working).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
