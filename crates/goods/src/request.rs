//! Goods request aggregate.
//!
//! A goods request draws inventory for a job. The aggregate owns the
//! request lifecycle only; the stock side effects (reserve on approval,
//! issue on release) are coordinated against the inventory aggregates by
//! the application layer, which leaves the request pending when a
//! reservation fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;
use pitstop_inventory::ItemId;
use pitstop_jobs::JobId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsRequestId(pub AggregateId);

impl GoodsRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GoodsRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoodsRequestStatus {
    Pending,
    Approved,
    Rejected,
    Released,
}

impl GoodsRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoodsRequestStatus::Pending => "pending",
            GoodsRequestStatus::Approved => "approved",
            GoodsRequestStatus::Rejected => "rejected",
            GoodsRequestStatus::Released => "released",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GoodsRequestStatus::Rejected | GoodsRequestStatus::Released)
    }

    pub fn can_transition(&self, next: GoodsRequestStatus) -> bool {
        use GoodsRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected) | (Approved, Released)
        )
    }
}

impl core::fmt::Display for GoodsRequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested line: an inventory item and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsRequestLine {
    pub item: ItemId,
    pub quantity: u32,
}

/// Aggregate root: GoodsRequest.
#[derive(Debug, Clone)]
pub struct GoodsRequest {
    id: GoodsRequestId,
    reference: Option<ReferenceNumber>,
    job: Option<JobId>,
    requester: Option<PrincipalId>,
    lines: Vec<GoodsRequestLine>,
    status: GoodsRequestStatus,
    decided_by: Option<PrincipalId>,
    decided_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    released_by: Option<PrincipalId>,
    released_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl GoodsRequest {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: GoodsRequestId) -> Self {
        Self {
            id,
            reference: None,
            job: None,
            requester: None,
            lines: Vec::new(),
            status: GoodsRequestStatus::Pending,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            released_by: None,
            released_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GoodsRequestId {
        self.id
    }

    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    pub fn requester(&self) -> Option<PrincipalId> {
        self.requester
    }

    pub fn lines(&self) -> &[GoodsRequestLine] {
        &self.lines
    }

    pub fn status(&self) -> GoodsRequestStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_transition(&self, next: GoodsRequestStatus) -> Result<(), DomainError> {
        self.ensure_created()?;
        if !self.status.can_transition(next) {
            return Err(DomainError::invalid_transition(
                "goods request",
                self.status.as_str(),
                next.as_str(),
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for GoodsRequest {
    type Id = GoodsRequestId;

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
pub struct CreateGoodsRequest {
    pub request_id: GoodsRequestId,
    pub reference: ReferenceNumber,
    pub job: JobId,
    pub requester: PrincipalId,
    pub lines: Vec<GoodsRequestLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveGoodsRequest {
    pub request_id: GoodsRequestId,
    pub approver: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectGoodsRequest {
    pub request_id: GoodsRequestId,
    pub approver: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGoodsRequest {
    pub request_id: GoodsRequestId,
    pub released_by: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsCommand {
    Create(CreateGoodsRequest),
    Approve(ApproveGoodsRequest),
    Reject(RejectGoodsRequest),
    Release(ReleaseGoodsRequest),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsRequestCreated {
    pub request_id: GoodsRequestId,
    pub reference: ReferenceNumber,
    pub job: JobId,
    pub requester: PrincipalId,
    pub lines: Vec<GoodsRequestLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsEvent {
    Created(GoodsRequestCreated),
    Approved {
        request_id: GoodsRequestId,
        approver: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        request_id: GoodsRequestId,
        approver: PrincipalId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Released {
        request_id: GoodsRequestId,
        released_by: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for GoodsEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GoodsEvent::Created(_) => "goods.request_created",
            GoodsEvent::Approved { .. } => "goods.request_approved",
            GoodsEvent::Rejected { .. } => "goods.request_rejected",
            GoodsEvent::Released { .. } => "goods.request_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GoodsEvent::Created(e) => e.occurred_at,
            GoodsEvent::Approved { occurred_at, .. }
            | GoodsEvent::Rejected { occurred_at, .. }
            | GoodsEvent::Released { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for GoodsRequest {
    type Command = GoodsCommand;
    type Event = GoodsEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GoodsEvent::Created(e) => {
                self.id = e.request_id;
                self.reference = Some(e.reference.clone());
                self.job = Some(e.job);
                self.requester = Some(e.requester);
                self.lines = e.lines.clone();
                self.status = GoodsRequestStatus::Pending;
                self.created = true;
            }
            GoodsEvent::Approved {
                approver,
                occurred_at,
                ..
            } => {
                self.status = GoodsRequestStatus::Approved;
                self.decided_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
            }
            GoodsEvent::Rejected {
                approver,
                reason,
                occurred_at,
                ..
            } => {
                self.status = GoodsRequestStatus::Rejected;
                self.decided_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
            GoodsEvent::Released {
                released_by,
                occurred_at,
                ..
            } => {
                self.status = GoodsRequestStatus::Released;
                self.released_by = Some(*released_by);
                self.released_at = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GoodsCommand::Create(cmd) => self.handle_create(cmd),
            GoodsCommand::Approve(cmd) => self.handle_approve(cmd),
            GoodsCommand::Reject(cmd) => self.handle_reject(cmd),
            GoodsCommand::Release(cmd) => self.handle_release(cmd),
        }
    }
}

impl GoodsRequest {
    fn handle_create(&self, cmd: &CreateGoodsRequest) -> Result<Vec<GoodsEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("goods request already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "a goods request needs at least one line",
            ));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation(
                "requested quantities must be positive",
            ));
        }

        Ok(vec![GoodsEvent::Created(GoodsRequestCreated {
            request_id: cmd.request_id,
            reference: cmd.reference.clone(),
            job: cmd.job,
            requester: cmd.requester,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveGoodsRequest) -> Result<Vec<GoodsEvent>, DomainError> {
        self.ensure_transition(GoodsRequestStatus::Approved)?;

        Ok(vec![GoodsEvent::Approved {
            request_id: cmd.request_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &RejectGoodsRequest) -> Result<Vec<GoodsEvent>, DomainError> {
        self.ensure_transition(GoodsRequestStatus::Rejected)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection reason is required"));
        }

        Ok(vec![GoodsEvent::Rejected {
            request_id: cmd.request_id,
            approver: cmd.approver,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_release(&self, cmd: &ReleaseGoodsRequest) -> Result<Vec<GoodsEvent>, DomainError> {
        self.ensure_transition(GoodsRequestStatus::Released)?;

        Ok(vec![GoodsEvent::Released {
            request_id: cmd.request_id,
            released_by: cmd.released_by,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> GoodsRequest {
        let id = GoodsRequestId::new(AggregateId::new());
        let mut request = GoodsRequest::empty(id);
        let events = request
            .handle(&GoodsCommand::Create(CreateGoodsRequest {
                request_id: id,
                reference: ReferenceNumber::new("GR", 1).unwrap(),
                job: JobId::new(AggregateId::new()),
                requester: PrincipalId::new(),
                lines: vec![GoodsRequestLine {
                    item: ItemId::new(AggregateId::new()),
                    quantity: 2,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            request.apply(e);
        }
        request
    }

    fn run(request: &mut GoodsRequest, cmd: GoodsCommand) -> Result<(), DomainError> {
        let events = request.handle(&cmd)?;
        for e in &events {
            request.apply(e);
        }
        Ok(())
    }

    #[test]
    fn release_requires_prior_approval() {
        let mut request = created();
        let id = request.id_typed();
        let err = run(
            &mut request,
            GoodsCommand::Release(ReleaseGoodsRequest {
                request_id: id,
                released_by: PrincipalId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { entity: "goods request", .. }
        ));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let mut request = created();
        let id = request.id_typed();
        let err = run(
            &mut request,
            GoodsCommand::Reject(RejectGoodsRequest {
                request_id: id,
                approver: PrincipalId::new(),
                reason: "   ".into(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(request.status(), GoodsRequestStatus::Pending);
    }

    #[test]
    fn approve_then_release_is_the_happy_path() {
        let mut request = created();
        let id = request.id_typed();
        run(
            &mut request,
            GoodsCommand::Approve(ApproveGoodsRequest {
                request_id: id,
                approver: PrincipalId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(request.status(), GoodsRequestStatus::Approved);

        run(
            &mut request,
            GoodsCommand::Release(ReleaseGoodsRequest {
                request_id: id,
                released_by: PrincipalId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(request.status(), GoodsRequestStatus::Released);
        assert!(request.released_at().is_some());
    }

    #[test]
    fn released_and_rejected_are_terminal() {
        let mut rejected = created();
        let id = rejected.id_typed();
        run(
            &mut rejected,
            GoodsCommand::Reject(RejectGoodsRequest {
                request_id: id,
                approver: PrincipalId::new(),
                reason: "job cancelled".into(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        let err = run(
            &mut rejected,
            GoodsCommand::Approve(ApproveGoodsRequest {
                request_id: id,
                approver: PrincipalId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn empty_and_zero_quantity_lines_are_rejected() {
        let id = GoodsRequestId::new(AggregateId::new());
        let request = GoodsRequest::empty(id);

        let err = request
            .handle(&GoodsCommand::Create(CreateGoodsRequest {
                request_id: id,
                reference: ReferenceNumber::new("GR", 2).unwrap(),
                job: JobId::new(AggregateId::new()),
                requester: PrincipalId::new(),
                lines: vec![],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = request
            .handle(&GoodsCommand::Create(CreateGoodsRequest {
                request_id: id,
                reference: ReferenceNumber::new("GR", 2).unwrap(),
                job: JobId::new(AggregateId::new()),
                requester: PrincipalId::new(),
                lines: vec![GoodsRequestLine {
                    item: ItemId::new(AggregateId::new()),
                    quantity: 0,
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
