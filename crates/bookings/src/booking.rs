//! Booking aggregate.
//!
//! Lifecycle: pending → inspecting → working → completed, with cancellation
//! allowed from any non-terminal state. The transition table is the single
//! source of truth; callers never flip status fields directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;
use pitstop_vehicles::VehicleId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub AggregateId);

impl BookingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BookingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Workshop time slot within a day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Midday,
    Afternoon,
}

impl TimeSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "morning",
            TimeSlot::Midday => "midday",
            TimeSlot::Afternoon => "afternoon",
        }
    }
}

impl core::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Inspecting,
    Working,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Inspecting => "inspecting",
            BookingStatus::Working => "working",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Allowed-transition table.
    pub fn can_transition(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Inspecting | Cancelled)
                | (Inspecting, Working | Cancelled)
                | (Working, Completed | Cancelled)
        )
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only note on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingNote {
    pub author: PrincipalId,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: Booking.
#[derive(Debug, Clone)]
pub struct Booking {
    id: BookingId,
    reference: Option<ReferenceNumber>,
    customer: Option<PrincipalId>,
    vehicle: Option<VehicleId>,
    scheduled_date: Option<NaiveDate>,
    slot: Option<TimeSlot>,
    service_description: String,
    status: BookingStatus,
    inspector: Option<PrincipalId>,
    notes: Vec<BookingNote>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Booking {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: BookingId) -> Self {
        Self {
            id,
            reference: None,
            customer: None,
            vehicle: None,
            scheduled_date: None,
            slot: None,
            service_description: String::new(),
            status: BookingStatus::Pending,
            inspector: None,
            notes: Vec::new(),
            completed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BookingId {
        self.id
    }

    pub fn customer(&self) -> Option<PrincipalId> {
        self.customer
    }

    pub fn vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn inspector(&self) -> Option<PrincipalId> {
        self.inspector
    }

    pub fn notes(&self) -> &[BookingNote] {
        &self.notes
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        self.scheduled_date
    }

    pub fn slot(&self) -> Option<TimeSlot> {
        self.slot
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

impl AggregateRoot for Booking {
    type Id = BookingId;

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
pub struct CreateBooking {
    pub booking_id: BookingId,
    pub reference: ReferenceNumber,
    pub customer: PrincipalId,
    pub vehicle: VehicleId,
    pub scheduled_date: NaiveDate,
    pub slot: TimeSlot,
    pub service_description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignInspector {
    pub booking_id: BookingId,
    pub inspector: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBookingStatus {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNote {
    pub booking_id: BookingId,
    pub author: PrincipalId,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingCommand {
    Create(CreateBooking),
    AssignInspector(AssignInspector),
    ChangeStatus(ChangeBookingStatus),
    AddNote(AddNote),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub booking_id: BookingId,
    pub reference: ReferenceNumber,
    pub customer: PrincipalId,
    pub vehicle: VehicleId,
    pub scheduled_date: NaiveDate,
    pub slot: TimeSlot,
    pub service_description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    Created(BookingCreated),
    InspectorAssigned {
        booking_id: BookingId,
        inspector: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
        occurred_at: DateTime<Utc>,
    },
    NoteAdded {
        booking_id: BookingId,
        author: PrincipalId,
        text: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::Created(_) => "booking.created",
            BookingEvent::InspectorAssigned { .. } => "booking.inspector_assigned",
            BookingEvent::StatusChanged { .. } => "booking.status_changed",
            BookingEvent::NoteAdded { .. } => "booking.note_added",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::Created(e) => e.occurred_at,
            BookingEvent::InspectorAssigned { occurred_at, .. }
            | BookingEvent::StatusChanged { occurred_at, .. }
            | BookingEvent::NoteAdded { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Booking {
    type Command = BookingCommand;
    type Event = BookingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookingEvent::Created(e) => {
                self.id = e.booking_id;
                self.reference = Some(e.reference.clone());
                self.customer = Some(e.customer);
                self.vehicle = Some(e.vehicle);
                self.scheduled_date = Some(e.scheduled_date);
                self.slot = Some(e.slot);
                self.service_description = e.service_description.clone();
                self.status = BookingStatus::Pending;
                self.created = true;
            }
            BookingEvent::InspectorAssigned { inspector, .. } => {
                self.inspector = Some(*inspector);
            }
            BookingEvent::StatusChanged { to, occurred_at, .. } => {
                self.status = *to;
                if *to == BookingStatus::Completed {
                    self.completed_at = Some(*occurred_at);
                }
            }
            BookingEvent::NoteAdded {
                author,
                text,
                occurred_at,
                ..
            } => {
                self.notes.push(BookingNote {
                    author: *author,
                    text: text.clone(),
                    occurred_at: *occurred_at,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BookingCommand::Create(cmd) => self.handle_create(cmd),
            BookingCommand::AssignInspector(cmd) => self.handle_assign_inspector(cmd),
            BookingCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            BookingCommand::AddNote(cmd) => self.handle_add_note(cmd),
        }
    }
}

impl Booking {
    fn handle_create(&self, cmd: &CreateBooking) -> Result<Vec<BookingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("booking already exists"));
        }
        if cmd.service_description.trim().is_empty() {
            return Err(DomainError::validation("service description is required"));
        }

        Ok(vec![BookingEvent::Created(BookingCreated {
            booking_id: cmd.booking_id,
            reference: cmd.reference.clone(),
            customer: cmd.customer,
            vehicle: cmd.vehicle,
            scheduled_date: cmd.scheduled_date,
            slot: cmd.slot,
            service_description: cmd.service_description.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_inspector(&self, cmd: &AssignInspector) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_created()?;

        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot assign an inspector to a {} booking",
                self.status
            )));
        }

        Ok(vec![BookingEvent::InspectorAssigned {
            booking_id: cmd.booking_id,
            inspector: cmd.inspector,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_status(&self, cmd: &ChangeBookingStatus) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_created()?;

        if !self.status.can_transition(cmd.status) {
            return Err(DomainError::invalid_transition(
                "booking",
                self.status.as_str(),
                cmd.status.as_str(),
            ));
        }

        // Inspections need an inspector on record.
        if cmd.status == BookingStatus::Inspecting && self.inspector.is_none() {
            return Err(DomainError::invariant(
                "an inspector must be assigned before inspection starts",
            ));
        }

        Ok(vec![BookingEvent::StatusChanged {
            booking_id: cmd.booking_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_note(&self, cmd: &AddNote) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.text.trim().is_empty() {
            return Err(DomainError::validation("note text cannot be empty"));
        }

        Ok(vec![BookingEvent::NoteAdded {
            booking_id: cmd.booking_id,
            author: cmd.author,
            text: cmd.text.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Booking {
        let id = BookingId::new(AggregateId::new());
        let mut booking = Booking::empty(id);
        let events = booking
            .handle(&BookingCommand::Create(CreateBooking {
                booking_id: id,
                reference: ReferenceNumber::new("BK", 1).unwrap(),
                customer: PrincipalId::new(),
                vehicle: VehicleId::new(AggregateId::new()),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                slot: TimeSlot::Morning,
                service_description: "Full service".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            booking.apply(e);
        }
        booking
    }

    fn step(booking: &mut Booking, status: BookingStatus) -> Result<(), DomainError> {
        let events = booking.handle(&BookingCommand::ChangeStatus(ChangeBookingStatus {
            booking_id: booking.id_typed(),
            status,
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            booking.apply(e);
        }
        Ok(())
    }

    fn assign_inspector(booking: &mut Booking) {
        let events = booking
            .handle(&BookingCommand::AssignInspector(AssignInspector {
                booking_id: booking.id_typed(),
                inspector: PrincipalId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            booking.apply(e);
        }
    }

    #[test]
    fn pending_cannot_jump_to_working() {
        let mut booking = created();
        let err = step(&mut booking, BookingStatus::Working).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { entity: "booking", .. }
        ));
        assert_eq!(booking.status(), BookingStatus::Pending);
    }

    #[test]
    fn full_lifecycle_stamps_completed_at_only_at_the_end() {
        let mut booking = created();
        assign_inspector(&mut booking);

        step(&mut booking, BookingStatus::Inspecting).unwrap();
        assert!(booking.completed_at().is_none());

        step(&mut booking, BookingStatus::Working).unwrap();
        assert!(booking.completed_at().is_none());

        step(&mut booking, BookingStatus::Completed).unwrap();
        assert_eq!(booking.status(), BookingStatus::Completed);
        assert!(booking.completed_at().is_some());
    }

    #[test]
    fn inspection_requires_an_assigned_inspector() {
        let mut booking = created();
        let err = step(&mut booking, BookingStatus::Inspecting).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        let mut booking = created();
        step(&mut booking, BookingStatus::Cancelled).unwrap();

        for next in [
            BookingStatus::Pending,
            BookingStatus::Inspecting,
            BookingStatus::Working,
            BookingStatus::Completed,
        ] {
            let err = step(&mut booking, next).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn cancellation_allowed_from_any_active_state() {
        let mut booking = created();
        assign_inspector(&mut booking);
        step(&mut booking, BookingStatus::Inspecting).unwrap();
        step(&mut booking, BookingStatus::Cancelled).unwrap();
        assert_eq!(booking.status(), BookingStatus::Cancelled);
    }

    #[test]
    fn notes_are_append_only_and_stamped() {
        let mut booking = created();
        let author = PrincipalId::new();

        for text in ["first", "second"] {
            let events = booking
                .handle(&BookingCommand::AddNote(AddNote {
                    booking_id: booking.id_typed(),
                    author,
                    text: text.into(),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for e in &events {
                booking.apply(e);
            }
        }

        assert_eq!(booking.notes().len(), 2);
        assert_eq!(booking.notes()[0].text, "first");
        assert_eq!(booking.notes()[1].author, author);
    }
}
