//! Leave request aggregate.
//!
//! A request covers an inclusive [start, end] date range; `total_days` is
//! derived from the range, never stored independently. Approval and
//! rejection both stamp the deciding principal and are terminal. The
//! no-overlap rule across an employee's requests spans aggregates, so it
//! is enforced by the application layer with per-day uniqueness claims.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaveRequestId(pub AggregateId);

impl LeaveRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LeaveRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
    Compassionate,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Sick => "sick",
            LeaveType::Unpaid => "unpaid",
            LeaveType::Compassionate => "compassionate",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Rejected)
    }
}

impl core::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: LeaveRequest.
#[derive(Debug, Clone)]
pub struct LeaveRequest {
    id: LeaveRequestId,
    reference: Option<ReferenceNumber>,
    employee: Option<PrincipalId>,
    leave_type: LeaveType,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    reason: String,
    status: LeaveStatus,
    decided_by: Option<PrincipalId>,
    decided_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    version: u64,
    created: bool,
}

impl LeaveRequest {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: LeaveRequestId) -> Self {
        Self {
            id,
            reference: None,
            employee: None,
            leave_type: LeaveType::Annual,
            start: None,
            end: None,
            reason: String::new(),
            status: LeaveStatus::Pending,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LeaveRequestId {
        self.id
    }

    pub fn employee(&self) -> Option<PrincipalId> {
        self.employee
    }

    pub fn leave_type(&self) -> LeaveType {
        self.leave_type
    }

    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start.zip(self.end)
    }

    pub fn status(&self) -> LeaveStatus {
        self.status
    }

    pub fn decided_by(&self) -> Option<PrincipalId> {
        self.decided_by
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Inclusive day count of the range.
    pub fn total_days(&self) -> Option<u32> {
        let (start, end) = self.range()?;
        u32::try_from((end - start).num_days() + 1).ok()
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.status != LeaveStatus::Pending {
            return Err(DomainError::invalid_transition(
                "leave request",
                self.status.as_str(),
                "decided",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for LeaveRequest {
    type Id = LeaveRequestId;

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
pub struct CreateLeaveRequest {
    pub request_id: LeaveRequestId,
    pub reference: ReferenceNumber,
    pub employee: PrincipalId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveLeave {
    pub request_id: LeaveRequestId,
    pub approver: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectLeave {
    pub request_id: LeaveRequestId,
    pub approver: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveCommand {
    Create(CreateLeaveRequest),
    Approve(ApproveLeave),
    Reject(RejectLeave),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestCreated {
    pub request_id: LeaveRequestId,
    pub reference: ReferenceNumber,
    pub employee: PrincipalId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveEvent {
    Created(LeaveRequestCreated),
    Approved {
        request_id: LeaveRequestId,
        approver: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        request_id: LeaveRequestId,
        approver: PrincipalId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LeaveEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LeaveEvent::Created(_) => "leave.request_created",
            LeaveEvent::Approved { .. } => "leave.request_approved",
            LeaveEvent::Rejected { .. } => "leave.request_rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LeaveEvent::Created(e) => e.occurred_at,
            LeaveEvent::Approved { occurred_at, .. }
            | LeaveEvent::Rejected { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for LeaveRequest {
    type Command = LeaveCommand;
    type Event = LeaveEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LeaveEvent::Created(e) => {
                self.id = e.request_id;
                self.reference = Some(e.reference.clone());
                self.employee = Some(e.employee);
                self.leave_type = e.leave_type;
                self.start = Some(e.start);
                self.end = Some(e.end);
                self.reason = e.reason.clone();
                self.status = LeaveStatus::Pending;
                self.created = true;
            }
            LeaveEvent::Approved {
                approver,
                occurred_at,
                ..
            } => {
                self.status = LeaveStatus::Approved;
                self.decided_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
            }
            LeaveEvent::Rejected {
                approver,
                reason,
                occurred_at,
                ..
            } => {
                self.status = LeaveStatus::Rejected;
                self.decided_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LeaveCommand::Create(cmd) => self.handle_create(cmd),
            LeaveCommand::Approve(cmd) => self.handle_approve(cmd),
            LeaveCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl LeaveRequest {
    fn handle_create(&self, cmd: &CreateLeaveRequest) -> Result<Vec<LeaveEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("leave request already exists"));
        }
        if cmd.end < cmd.start {
            return Err(DomainError::validation(
                "leave end date is before the start date",
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a reason for leave is required"));
        }

        Ok(vec![LeaveEvent::Created(LeaveRequestCreated {
            request_id: cmd.request_id,
            reference: cmd.reference.clone(),
            employee: cmd.employee,
            leave_type: cmd.leave_type,
            start: cmd.start,
            end: cmd.end,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveLeave) -> Result<Vec<LeaveEvent>, DomainError> {
        self.ensure_pending()?;

        Ok(vec![LeaveEvent::Approved {
            request_id: cmd.request_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &RejectLeave) -> Result<Vec<LeaveEvent>, DomainError> {
        self.ensure_pending()?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection reason is required"));
        }

        Ok(vec![LeaveEvent::Rejected {
            request_id: cmd.request_id,
            approver: cmd.approver,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn created(start: NaiveDate, end: NaiveDate) -> Result<LeaveRequest, DomainError> {
        let id = LeaveRequestId::new(AggregateId::new());
        let mut request = LeaveRequest::empty(id);
        let events = request.handle(&LeaveCommand::Create(CreateLeaveRequest {
            request_id: id,
            reference: ReferenceNumber::new("LV", 1).unwrap(),
            employee: PrincipalId::new(),
            leave_type: LeaveType::Annual,
            start,
            end,
            reason: "family visit".into(),
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            request.apply(e);
        }
        Ok(request)
    }

    #[test]
    fn total_days_is_inclusive() {
        let request = created(date(2026, 9, 7), date(2026, 9, 11)).unwrap();
        assert_eq!(request.total_days(), Some(5));

        let single = created(date(2026, 9, 7), date(2026, 9, 7)).unwrap();
        assert_eq!(single.total_days(), Some(1));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = created(date(2026, 9, 11), date(2026, 9, 7)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approval_stamps_the_approver() {
        let mut request = created(date(2026, 9, 7), date(2026, 9, 8)).unwrap();
        let id = request.id_typed();
        let approver = PrincipalId::new();

        let events = request
            .handle(&LeaveCommand::Approve(ApproveLeave {
                request_id: id,
                approver,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            request.apply(e);
        }

        assert_eq!(request.status(), LeaveStatus::Approved);
        assert_eq!(request.decided_by(), Some(approver));
        assert!(request.decided_at().is_some());
    }

    #[test]
    fn rejection_requires_a_reason_and_is_terminal() {
        let mut request = created(date(2026, 9, 7), date(2026, 9, 8)).unwrap();
        let id = request.id_typed();
        let approver = PrincipalId::new();

        let err = request
            .handle(&LeaveCommand::Reject(RejectLeave {
                request_id: id,
                approver,
                reason: "".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let events = request
            .handle(&LeaveCommand::Reject(RejectLeave {
                request_id: id,
                approver,
                reason: "short staffed that week".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            request.apply(e);
        }
        assert_eq!(request.status(), LeaveStatus::Rejected);

        let err = request
            .handle(&LeaveCommand::Approve(ApproveLeave {
                request_id: id,
                approver,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
