//! Service wiring and cross-aggregate orchestration.
//!
//! `AppServices` owns the in-memory infrastructure (store, bus, dispatcher,
//! counters, uniqueness claims, projections) and the multi-step flows that
//! touch more than one aggregate: registration, login, slot claims, the
//! goods-request reservation saga, invoice creation, leave-day claims.
//!
//! Projections are fed synchronously after each commit; the bus stays
//! available for external subscribers, and projection cursors make a second
//! delivery of the same envelope a no-op.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use pitstop_auth::{Hs256JwtValidator, JwtClaims, JwtValidator, PasswordHasher, Role, TokenError};
use pitstop_bookings::{Booking, BookingCommand, BookingId, BookingStatus, ChangeBookingStatus};
use pitstop_core::{Aggregate, AggregateId, DomainError, PrincipalId};
use pitstop_events::{EventEnvelope, InMemoryEventBus};
use pitstop_goods::{
    ApproveGoodsRequest, GoodsCommand, GoodsRequest, GoodsRequestId, GoodsRequestStatus,
    ReleaseGoodsRequest,
};
use pitstop_identity::{
    Principal, PrincipalCommand, PrincipalStatus, Profile, RecordLoginFailure, RecordLoginSuccess,
    RegisterPrincipal,
};
use pitstop_infra::{
    CommandDispatcher, InMemoryEventStore, InMemorySequenceStore, InMemoryStore,
    InMemoryUniqueIndex, SequenceError, SequenceStore, UniqueError, UniqueIndex,
    command_dispatcher::DispatchError,
    event_store::StoredEvent,
    projections::{
        BookingProjection, BookingRow, GoodsProjection, GoodsRow, InventoryProjection,
        InventoryRow, InvoiceProjection, InvoiceRow, JobProjection, JobRow, LeaveProjection,
        LeaveRow, PrincipalProjection, PrincipalRow, VehicleProjection, VehicleRow,
    },
};
use pitstop_inventory::{
    InventoryItem, IssueStock, ItemCommand, ItemId, ReleaseReservation, ReserveStock,
    StockDirection,
};
use pitstop_invoicing::{CreateInvoice, Invoice, InvoiceCommand, InvoiceId, InvoiceLine};
use pitstop_jobs::{CreateJob, Job, JobCommand, JobId};
use pitstop_leave::{
    CreateLeaveRequest, LeaveCommand, LeaveRequest, LeaveRequestId, LeaveType, RejectLeave,
};
use pitstop_vehicles::{RegisterVehicle, Vehicle, VehicleCommand, VehicleId};

use crate::hashing::SaltedSha256Hasher;

pub type InMemoryBus = InMemoryEventBus<EventEnvelope<JsonValue>>;
pub type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryBus>>;

type Proj<P> = Arc<P>;
type RowStore<K, V> = Arc<InMemoryStore<K, V>>;

const TOKEN_TTL_HOURS: i64 = 12;

/// Failure from an orchestrated flow; handlers map it centrally.
#[derive(Debug)]
pub enum ServiceError {
    Dispatch(DispatchError),
    Domain(DomainError),
    Sequence(SequenceError),
    Unique(UniqueError),
    Token(TokenError),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        ServiceError::Dispatch(value)
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        ServiceError::Domain(value)
    }
}

impl From<SequenceError> for ServiceError {
    fn from(value: SequenceError) -> Self {
        ServiceError::Sequence(value)
    }
}

impl From<UniqueError> for ServiceError {
    fn from(value: UniqueError) -> Self {
        ServiceError::Unique(value)
    }
}

impl From<TokenError> for ServiceError {
    fn from(value: TokenError) -> Self {
        ServiceError::Token(value)
    }
}

pub struct AppServices {
    dispatcher: InMemoryDispatcher,
    sequences: Arc<InMemorySequenceStore>,
    unique: Arc<InMemoryUniqueIndex>,
    hasher: Arc<dyn PasswordHasher>,
    jwt: Arc<Hs256JwtValidator>,

    pub principals: Proj<PrincipalProjection<RowStore<PrincipalId, PrincipalRow>>>,
    pub vehicles: Proj<VehicleProjection<RowStore<VehicleId, VehicleRow>>>,
    pub bookings: Proj<BookingProjection<RowStore<BookingId, BookingRow>>>,
    pub jobs: Proj<JobProjection<RowStore<JobId, JobRow>>>,
    pub inventory: Proj<InventoryProjection<RowStore<ItemId, InventoryRow>>>,
    pub goods: Proj<GoodsProjection<RowStore<GoodsRequestId, GoodsRow>>>,
    pub invoices: Proj<InvoiceProjection<RowStore<InvoiceId, InvoiceRow>>>,
    pub leave: Proj<LeaveProjection<RowStore<LeaveRequestId, LeaveRow>>>,
}

pub fn build_services(jwt_secret: &[u8]) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryBus> = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus));

    AppServices {
        dispatcher,
        sequences: Arc::new(InMemorySequenceStore::new()),
        unique: Arc::new(InMemoryUniqueIndex::new()),
        hasher: Arc::new(SaltedSha256Hasher::new()),
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret)),
        principals: Arc::new(PrincipalProjection::new(Arc::new(InMemoryStore::new()))),
        vehicles: Arc::new(VehicleProjection::new(Arc::new(InMemoryStore::new()))),
        bookings: Arc::new(BookingProjection::new(Arc::new(InMemoryStore::new()))),
        jobs: Arc::new(JobProjection::new(Arc::new(InMemoryStore::new()))),
        inventory: Arc::new(InventoryProjection::new(Arc::new(InMemoryStore::new()))),
        goods: Arc::new(GoodsProjection::new(Arc::new(InMemoryStore::new()))),
        invoices: Arc::new(InvoiceProjection::new(Arc::new(InMemoryStore::new()))),
        leave: Arc::new(LeaveProjection::new(Arc::new(InMemoryStore::new()))),
    }
}

impl AppServices {
    pub fn jwt_validator(&self) -> Arc<dyn JwtValidator> {
        self.jwt.clone()
    }

    /// Dispatch one command and fold the committed events into every
    /// projection before returning.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: pitstop_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)?;
        self.project(&committed);
        Ok(committed)
    }

    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            let results = [
                self.principals.apply_envelope(&envelope),
                self.vehicles.apply_envelope(&envelope),
                self.bookings.apply_envelope(&envelope),
                self.jobs.apply_envelope(&envelope),
                self.inventory.apply_envelope(&envelope),
                self.goods.apply_envelope(&envelope),
                self.invoices.apply_envelope(&envelope),
                self.leave.apply_envelope(&envelope),
            ];
            for result in results {
                if let Err(e) = result {
                    tracing::warn!(
                        aggregate_id = %stored.aggregate_id,
                        sequence = stored.sequence_number,
                        error = %e,
                        "projection rejected committed event"
                    );
                }
            }
        }
    }

    // ── identity ─────────────────────────────────────────────────────────

    /// Register a principal: claim the email, take a role-keyed reference,
    /// then append. A failed append releases the claim; the reference
    /// number is burned (gaps are fine).
    pub fn register_principal(
        &self,
        email: &str,
        password: &str,
        display_name: String,
        role: Role,
        profile: Profile,
    ) -> Result<PrincipalId, ServiceError> {
        let email = email.trim().to_ascii_lowercase();
        let principal_id = PrincipalId::new();
        let aggregate_id: AggregateId = principal_id.into();

        self.unique
            .claim("email", &email, aggregate_id)
            .map_err(|e| self.conflict_or(e, "email address is already registered"))?;

        let reference = match self.sequences.next(role.reference_prefix()) {
            Ok(reference) => reference,
            Err(e) => {
                let _ = self.unique.release("email", &email);
                return Err(e.into());
            }
        };

        let command = PrincipalCommand::Register(RegisterPrincipal {
            principal_id,
            reference,
            email: email.clone(),
            display_name,
            password_hash: self.hasher.hash(password),
            role,
            profile,
            occurred_at: Utc::now(),
        });

        if let Err(e) = self.dispatch::<Principal>(aggregate_id, "principal", command, |id| {
            Principal::empty(PrincipalId::from(id))
        }) {
            let _ = self.unique.release("email", &email);
            return Err(e.into());
        }

        Ok(principal_id)
    }

    /// Password login. Failures and successes are recorded as events so the
    /// lockout counter survives restarts with the stream.
    pub fn login(&self, email: &str, password: &str) -> Result<(String, PrincipalRow), ServiceError> {
        let now = Utc::now();
        let email = email.trim().to_ascii_lowercase();

        let row = self
            .principals
            .find_by_email(&email)
            .ok_or(DomainError::Unauthenticated)?;

        if row.throttle.is_locked(now) {
            if let Some(until) = row.throttle.lock_until {
                return Err(DomainError::Locked { until }.into());
            }
        }
        if row.status != PrincipalStatus::Active {
            return Err(
                DomainError::forbidden(format!("account is {}", row.status.as_str())).into(),
            );
        }

        if !self.hasher.verify(password, &row.password_hash) {
            let command = PrincipalCommand::RecordLoginFailure(RecordLoginFailure {
                principal_id: row.principal_id,
                occurred_at: now,
            });
            self.dispatch::<Principal>(row.principal_id.into(), "principal", command, |id| {
                Principal::empty(PrincipalId::from(id))
            })?;
            return Err(DomainError::Unauthenticated.into());
        }

        let command = PrincipalCommand::RecordLoginSuccess(RecordLoginSuccess {
            principal_id: row.principal_id,
            occurred_at: now,
        });
        self.dispatch::<Principal>(row.principal_id.into(), "principal", command, |id| {
            Principal::empty(PrincipalId::from(id))
        })?;

        let claims = JwtClaims::new(row.principal_id, row.role, now, Duration::hours(TOKEN_TTL_HOURS));
        let token = self.jwt.mint(&claims)?;

        let row = self.principals.get(&row.principal_id).unwrap_or(row);
        Ok((token, row))
    }

    pub fn change_password(
        &self,
        principal_id: PrincipalId,
        current: &str,
        new: &str,
    ) -> Result<(), ServiceError> {
        let row = self
            .principals
            .get(&principal_id)
            .ok_or(DomainError::NotFound)?;

        if !self.hasher.verify(current, &row.password_hash) {
            return Err(DomainError::validation("current password does not match").into());
        }

        let command = PrincipalCommand::ChangePassword(pitstop_identity::ChangePassword {
            principal_id,
            password_hash: self.hasher.hash(new),
            occurred_at: Utc::now(),
        });
        self.dispatch::<Principal>(principal_id.into(), "principal", command, |id| {
            Principal::empty(PrincipalId::from(id))
        })?;
        Ok(())
    }

    // ── vehicles ─────────────────────────────────────────────────────────

    pub fn register_vehicle(
        &self,
        owner: PrincipalId,
        registration: &str,
        chassis_number: String,
        engine_number: String,
        make: String,
        model: String,
        year: u16,
        mileage: u32,
    ) -> Result<VehicleId, ServiceError> {
        let registration = registration.trim().to_uppercase();
        let vehicle_id = VehicleId::new(AggregateId::new());

        self.unique
            .claim("registration", &registration, vehicle_id.0)
            .map_err(|e| self.conflict_or(e, "registration number is already on file"))?;

        let reference = match self.sequences.next("VH") {
            Ok(reference) => reference,
            Err(e) => {
                let _ = self.unique.release("registration", &registration);
                return Err(e.into());
            }
        };

        let command = VehicleCommand::Register(RegisterVehicle {
            vehicle_id,
            reference,
            owner,
            registration: registration.clone(),
            chassis_number,
            engine_number,
            make,
            model,
            year,
            mileage,
            occurred_at: Utc::now(),
        });

        if let Err(e) = self.dispatch::<Vehicle>(vehicle_id.0, "vehicle", command, |id| {
            Vehicle::empty(VehicleId::new(id))
        }) {
            let _ = self.unique.release("registration", &registration);
            return Err(e.into());
        }

        Ok(vehicle_id)
    }

    // ── bookings ─────────────────────────────────────────────────────────

    /// Book a slot: the day+slot claim is taken before the append, so two
    /// racing customers cannot both book the same slot.
    pub fn create_booking(
        &self,
        customer: PrincipalId,
        vehicle: VehicleId,
        scheduled_date: NaiveDate,
        slot: pitstop_bookings::TimeSlot,
        service_description: String,
    ) -> Result<BookingId, ServiceError> {
        let vehicle_row = self.vehicles.get(&vehicle).ok_or(DomainError::NotFound)?;
        if vehicle_row.owner != customer {
            return Err(DomainError::validation("vehicle does not belong to this customer").into());
        }

        let booking_id = BookingId::new(AggregateId::new());
        let slot_key = slot_claim_key(scheduled_date, slot);

        self.unique
            .claim("slot", &slot_key, booking_id.0)
            .map_err(|e| self.conflict_or(e, "that day and slot is already booked"))?;

        let reference = match self.sequences.next("BK") {
            Ok(reference) => reference,
            Err(e) => {
                let _ = self.unique.release("slot", &slot_key);
                return Err(e.into());
            }
        };

        let command = BookingCommand::Create(pitstop_bookings::CreateBooking {
            booking_id,
            reference,
            customer,
            vehicle,
            scheduled_date,
            slot,
            service_description,
            occurred_at: Utc::now(),
        });

        if let Err(e) = self.dispatch::<Booking>(booking_id.0, "booking", command, |id| {
            Booking::empty(BookingId::new(id))
        }) {
            let _ = self.unique.release("slot", &slot_key);
            return Err(e.into());
        }

        Ok(booking_id)
    }

    /// Lifecycle move; cancellation frees the slot for rebooking.
    pub fn change_booking_status(
        &self,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ServiceError> {
        let row = self.bookings.get(&booking_id).ok_or(DomainError::NotFound)?;

        let command = BookingCommand::ChangeStatus(ChangeBookingStatus {
            booking_id,
            status,
            occurred_at: Utc::now(),
        });
        self.dispatch::<Booking>(booking_id.0, "booking", command, |id| {
            Booking::empty(BookingId::new(id))
        })?;

        if status == BookingStatus::Cancelled {
            let key = slot_claim_key(row.scheduled_date, row.slot);
            if let Err(e) = self.unique.release("slot", &key) {
                tracing::warn!(error = %e, "failed to release cancelled booking slot");
            }
        }

        Ok(())
    }

    // ── jobs ─────────────────────────────────────────────────────────────

    pub fn create_job(
        &self,
        booking: BookingId,
        description: String,
    ) -> Result<JobId, ServiceError> {
        if self.bookings.get(&booking).is_none() {
            return Err(DomainError::NotFound.into());
        }

        let job_id = JobId::new(AggregateId::new());
        let reference = self.sequences.next("JB")?;

        let command = JobCommand::Create(CreateJob {
            job_id,
            reference,
            booking,
            description,
            occurred_at: Utc::now(),
        });
        self.dispatch::<Job>(job_id.0, "job", command, |id| Job::empty(JobId::new(id)))?;

        Ok(job_id)
    }

    // ── inventory ────────────────────────────────────────────────────────

    pub fn create_item(
        &self,
        name: String,
        category: pitstop_inventory::InventoryCategory,
        unit_price: u64,
        initial_stock: u32,
        minimum: u32,
    ) -> Result<ItemId, ServiceError> {
        let item_id = ItemId::new(AggregateId::new());
        let reference = self.sequences.next("IN")?;

        let command = ItemCommand::Create(pitstop_inventory::CreateItem {
            item_id,
            reference,
            name,
            category,
            unit_price,
            initial_stock,
            minimum,
            occurred_at: Utc::now(),
        });
        self.dispatch::<InventoryItem>(item_id.0, "inventory_item", command, |id| {
            InventoryItem::empty(ItemId::new(id))
        })?;

        Ok(item_id)
    }

    /// Per-line partial success: committed lines stay committed, failures
    /// are collected. Deliberately different from the all-or-nothing
    /// single-item adjustment.
    pub fn bulk_adjust(
        &self,
        lines: Vec<(ItemId, StockDirection, u32)>,
    ) -> (Vec<JsonValue>, Vec<JsonValue>) {
        let now = Utc::now();
        let mut processed = Vec::new();
        let mut errors = Vec::new();

        for (item_id, direction, quantity) in lines {
            let command = ItemCommand::AdjustStock(pitstop_inventory::AdjustStock {
                item_id,
                direction,
                quantity,
                occurred_at: now,
            });
            let outcome = self.dispatch::<InventoryItem>(item_id.0, "inventory_item", command, |id| {
                InventoryItem::empty(ItemId::new(id))
            });

            let direction = serde_json::to_value(direction).unwrap_or(JsonValue::Null);
            match outcome {
                Ok(_) => processed.push(serde_json::json!({
                    "item": item_id.0.to_string(),
                    "direction": direction,
                    "quantity": quantity,
                })),
                Err(e) => errors.push(serde_json::json!({
                    "item": item_id.0.to_string(),
                    "direction": direction,
                    "quantity": quantity,
                    "message": dispatch_error_message(&e),
                })),
            }
        }

        (processed, errors)
    }

    // ── goods requests ───────────────────────────────────────────────────

    pub fn create_goods_request(
        &self,
        job: JobId,
        requester: PrincipalId,
        lines: Vec<pitstop_goods::GoodsRequestLine>,
    ) -> Result<GoodsRequestId, ServiceError> {
        if self.jobs.get(&job).is_none() {
            return Err(DomainError::NotFound.into());
        }
        for line in &lines {
            if self.inventory.get(&line.item).is_none() {
                return Err(DomainError::validation("request references an unknown item").into());
            }
        }

        let request_id = GoodsRequestId::new(AggregateId::new());
        let reference = self.sequences.next("GR")?;

        let command = GoodsCommand::Create(pitstop_goods::CreateGoodsRequest {
            request_id,
            reference,
            job,
            requester,
            lines,
            occurred_at: Utc::now(),
        });
        self.dispatch::<GoodsRequest>(request_id.0, "goods_request", command, |id| {
            GoodsRequest::empty(GoodsRequestId::new(id))
        })?;

        Ok(request_id)
    }

    /// Approval reserves stock per line. If any line comes up short, the
    /// earlier reservations are released and the request stays pending,
    /// reporting the offending item.
    pub fn approve_goods_request(
        &self,
        request_id: GoodsRequestId,
        approver: PrincipalId,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let row = self.goods.get(&request_id).ok_or(DomainError::NotFound)?;
        if row.status != GoodsRequestStatus::Pending {
            return Err(DomainError::invalid_transition(
                "goods_request",
                row.status.as_str(),
                GoodsRequestStatus::Approved.as_str(),
            )
            .into());
        }

        let mut reserved: Vec<(ItemId, u32)> = Vec::new();
        for line in &row.lines {
            let command = ItemCommand::Reserve(ReserveStock {
                item_id: line.item,
                quantity: line.quantity,
                occurred_at: now,
            });
            match self.dispatch::<InventoryItem>(line.item.0, "inventory_item", command, |id| {
                InventoryItem::empty(ItemId::new(id))
            }) {
                Ok(_) => reserved.push((line.item, line.quantity)),
                Err(e) => {
                    self.release_reservations(&reserved);
                    return Err(e.into());
                }
            }
        }

        let command = GoodsCommand::Approve(ApproveGoodsRequest {
            request_id,
            approver,
            occurred_at: now,
        });
        if let Err(e) = self.dispatch::<GoodsRequest>(request_id.0, "goods_request", command, |id| {
            GoodsRequest::empty(GoodsRequestId::new(id))
        }) {
            self.release_reservations(&reserved);
            return Err(e.into());
        }

        Ok(())
    }

    /// Release spends the reservations taken at approval: per line,
    /// reserved and on-hand both drop by the requested quantity. Every
    /// line is issued before the request itself moves to released, so a
    /// failed line leaves the request approved and retryable instead of
    /// terminally released with stock still on the shelf.
    pub fn release_goods_request(
        &self,
        request_id: GoodsRequestId,
        released_by: PrincipalId,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let row = self.goods.get(&request_id).ok_or(DomainError::NotFound)?;
        if row.status != GoodsRequestStatus::Approved {
            return Err(DomainError::invalid_transition(
                "goods_request",
                row.status.as_str(),
                GoodsRequestStatus::Released.as_str(),
            )
            .into());
        }

        let mut issued: Vec<(ItemId, u32)> = Vec::new();
        for line in &row.lines {
            let command = ItemCommand::Issue(IssueStock {
                item_id: line.item,
                quantity: line.quantity,
                occurred_at: now,
            });
            match self.dispatch::<InventoryItem>(line.item.0, "inventory_item", command, |id| {
                InventoryItem::empty(ItemId::new(id))
            }) {
                Ok(_) => issued.push((line.item, line.quantity)),
                Err(e) => {
                    self.restore_issued(&issued);
                    return Err(e.into());
                }
            }
        }

        let command = GoodsCommand::Release(ReleaseGoodsRequest {
            request_id,
            released_by,
            occurred_at: now,
        });
        if let Err(e) = self.dispatch::<GoodsRequest>(request_id.0, "goods_request", command, |id| {
            GoodsRequest::empty(GoodsRequestId::new(id))
        }) {
            self.restore_issued(&issued);
            return Err(e.into());
        }

        Ok(())
    }

    /// Undo `IssueStock` for lines issued by a release attempt that could
    /// not finish: put the units back on hand and re-reserve them, so the
    /// approved request still covers its quantities on retry.
    fn restore_issued(&self, issued: &[(ItemId, u32)]) {
        let now = Utc::now();
        for (item_id, quantity) in issued {
            let add = ItemCommand::AdjustStock(pitstop_inventory::AdjustStock {
                item_id: *item_id,
                direction: StockDirection::Add,
                quantity: *quantity,
                occurred_at: now,
            });
            let reserve = ItemCommand::Reserve(ReserveStock {
                item_id: *item_id,
                quantity: *quantity,
                occurred_at: now,
            });
            let outcome = self
                .dispatch::<InventoryItem>(item_id.0, "inventory_item", add, |id| {
                    InventoryItem::empty(ItemId::new(id))
                })
                .and_then(|_| {
                    self.dispatch::<InventoryItem>(item_id.0, "inventory_item", reserve, |id| {
                        InventoryItem::empty(ItemId::new(id))
                    })
                });
            if let Err(e) = outcome {
                tracing::error!(
                    item = %item_id.0,
                    error = ?e,
                    "failed to roll back issued stock"
                );
            }
        }
    }

    fn release_reservations(&self, reserved: &[(ItemId, u32)]) {
        let now = Utc::now();
        for (item_id, quantity) in reserved {
            let command = ItemCommand::ReleaseReservation(ReleaseReservation {
                item_id: *item_id,
                quantity: *quantity,
                occurred_at: now,
            });
            if let Err(e) =
                self.dispatch::<InventoryItem>(item_id.0, "inventory_item", command, |id| {
                    InventoryItem::empty(ItemId::new(id))
                })
            {
                tracing::error!(
                    item = %item_id.0,
                    error = ?e,
                    "failed to roll back stock reservation"
                );
            }
        }
    }

    // ── invoices ─────────────────────────────────────────────────────────

    /// Invoices come only from completed bookings, one per booking; the
    /// booking claim closes the race between two concurrent creates.
    pub fn create_invoice(
        &self,
        booking: BookingId,
        lines: Vec<InvoiceLine>,
        labor_charges: u64,
        tax: u64,
        discount: u64,
        notes: Option<String>,
    ) -> Result<InvoiceId, ServiceError> {
        let booking_row = self.bookings.get(&booking).ok_or(DomainError::NotFound)?;
        if booking_row.status != BookingStatus::Completed {
            return Err(DomainError::invariant("invoice requires a completed booking").into());
        }

        let invoice_id = InvoiceId::new(AggregateId::new());
        let booking_key = booking.0.to_string();

        self.unique
            .claim("invoice_booking", &booking_key, invoice_id.0)
            .map_err(|e| self.conflict_or(e, "booking is already invoiced"))?;

        let reference = match self.sequences.next("IV") {
            Ok(reference) => reference,
            Err(e) => {
                let _ = self.unique.release("invoice_booking", &booking_key);
                return Err(e.into());
            }
        };

        let command = InvoiceCommand::Create(CreateInvoice {
            invoice_id,
            reference,
            booking,
            customer: booking_row.customer,
            lines,
            labor_charges,
            tax,
            discount,
            notes,
            occurred_at: Utc::now(),
        });

        if let Err(e) = self.dispatch::<Invoice>(invoice_id.0, "invoice", command, |id| {
            Invoice::empty(InvoiceId::new(id))
        }) {
            let _ = self.unique.release("invoice_booking", &booking_key);
            return Err(e.into());
        }

        Ok(invoice_id)
    }

    // ── leave ────────────────────────────────────────────────────────────

    /// Every day in the range is claimed under a per-employee scope before
    /// the append, so overlapping pending/approved requests lose the claim
    /// race instead of both committing.
    pub fn create_leave_request(
        &self,
        employee: PrincipalId,
        leave_type: LeaveType,
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    ) -> Result<LeaveRequestId, ServiceError> {
        if end < start {
            return Err(DomainError::validation("end date precedes start date").into());
        }

        let request_id = LeaveRequestId::new(AggregateId::new());
        let scope = leave_claim_scope(employee);

        let mut day = start;
        loop {
            if let Err(e) = self.unique.claim(&scope, &day.to_string(), request_id.0) {
                let _ = self.unique.release_owner(&scope, request_id.0);
                return Err(match e {
                    UniqueError::AlreadyClaimed { key, .. } => ServiceError::Domain(
                        DomainError::conflict(format!("leave already requested for {key}")),
                    ),
                    other => other.into(),
                });
            }
            if day >= end {
                break;
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => {
                    let _ = self.unique.release_owner(&scope, request_id.0);
                    return Err(DomainError::validation("date range out of bounds").into());
                }
            };
        }

        let reference = match self.sequences.next("LV") {
            Ok(reference) => reference,
            Err(e) => {
                let _ = self.unique.release_owner(&scope, request_id.0);
                return Err(e.into());
            }
        };

        let command = LeaveCommand::Create(CreateLeaveRequest {
            request_id,
            reference,
            employee,
            leave_type,
            start,
            end,
            reason,
            occurred_at: Utc::now(),
        });

        if let Err(e) = self.dispatch::<LeaveRequest>(request_id.0, "leave_request", command, |id| {
            LeaveRequest::empty(LeaveRequestId::new(id))
        }) {
            let _ = self.unique.release_owner(&scope, request_id.0);
            return Err(e.into());
        }

        Ok(request_id)
    }

    /// Rejection frees the claimed days; approval keeps them, which is what
    /// enforces non-overlap going forward.
    pub fn reject_leave_request(
        &self,
        request_id: LeaveRequestId,
        approver: PrincipalId,
        reason: String,
    ) -> Result<(), ServiceError> {
        let row = self.leave.get(&request_id).ok_or(DomainError::NotFound)?;

        let command = LeaveCommand::Reject(RejectLeave {
            request_id,
            approver,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatch::<LeaveRequest>(request_id.0, "leave_request", command, |id| {
            LeaveRequest::empty(LeaveRequestId::new(id))
        })?;

        let scope = leave_claim_scope(row.employee);
        if let Err(e) = self.unique.release_owner(&scope, request_id.0) {
            tracing::warn!(error = %e, "failed to release rejected leave days");
        }

        Ok(())
    }

    fn conflict_or(&self, err: UniqueError, message: &str) -> ServiceError {
        match err {
            UniqueError::AlreadyClaimed { .. } => {
                ServiceError::Domain(DomainError::conflict(message))
            }
            other => ServiceError::Unique(other),
        }
    }
}

fn slot_claim_key(date: NaiveDate, slot: pitstop_bookings::TimeSlot) -> String {
    format!("{date}:{}", slot.as_str())
}

fn leave_claim_scope(employee: PrincipalId) -> String {
    format!("leave:{employee}")
}

fn dispatch_error_message(err: &DispatchError) -> String {
    match err {
        DispatchError::Domain(e) => e.to_string(),
        DispatchError::Concurrency(_) => "concurrent update, retry".to_string(),
        _ => "internal error".to_string(),
    }
}
