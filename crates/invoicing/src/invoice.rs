//! Invoice aggregate.
//!
//! Amounts are unsigned integers in minor currency units; every total is
//! computed with checked arithmetic and recomputed from the lines rather
//! than stored. An invoice belongs to exactly one booking. Once paid, only
//! the notes may change; paid and cancelled are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_bookings::BookingId;
use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    MobileMoney,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobileMoney => "mobile_money",
        }
    }
}

/// One billed line; the line total is always `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: u64,
}

impl InvoiceLine {
    pub fn line_total(&self) -> Result<u64, DomainError> {
        u64::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::validation("line total overflows"))
    }
}

/// Computed invoice amounts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: u64,
    pub tax: u64,
    pub discount: u64,
    pub total: u64,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    id: InvoiceId,
    reference: Option<ReferenceNumber>,
    booking: Option<BookingId>,
    customer: Option<PrincipalId>,
    lines: Vec<InvoiceLine>,
    labor_charges: u64,
    tax: u64,
    discount: u64,
    notes: Option<String>,
    status: InvoiceStatus,
    payment_method: Option<PaymentMethod>,
    paid_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            reference: None,
            booking: None,
            customer: None,
            lines: Vec::new(),
            labor_charges: 0,
            tax: 0,
            discount: 0,
            notes: None,
            status: InvoiceStatus::Draft,
            payment_method: None,
            paid_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn booking(&self) -> Option<BookingId> {
        self.booking
    }

    pub fn customer(&self) -> Option<PrincipalId> {
        self.customer
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Recompute all amounts from the current lines and charges.
    pub fn totals(&self) -> Result<InvoiceTotals, DomainError> {
        Self::compute_totals(&self.lines, self.labor_charges, self.tax, self.discount)
    }

    fn compute_totals(
        lines: &[InvoiceLine],
        labor_charges: u64,
        tax: u64,
        discount: u64,
    ) -> Result<InvoiceTotals, DomainError> {
        let mut items_total: u64 = 0;
        for line in lines {
            items_total = items_total
                .checked_add(line.line_total()?)
                .ok_or_else(|| DomainError::validation("invoice subtotal overflows"))?;
        }
        let subtotal = items_total
            .checked_add(labor_charges)
            .ok_or_else(|| DomainError::validation("invoice subtotal overflows"))?;
        let with_tax = subtotal
            .checked_add(tax)
            .ok_or_else(|| DomainError::validation("invoice total overflows"))?;
        let total = with_tax
            .checked_sub(discount)
            .ok_or_else(|| DomainError::validation("discount exceeds the invoice amount"))?;

        Ok(InvoiceTotals {
            subtotal,
            tax,
            discount,
            total,
        })
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

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
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub reference: ReferenceNumber,
    pub booking: BookingId,
    pub customer: PrincipalId,
    pub lines: Vec<InvoiceLine>,
    pub labor_charges: u64,
    pub tax: u64,
    pub discount: u64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `None` fields are untouched. On a paid invoice only
/// `notes` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub invoice_id: InvoiceId,
    pub lines: Option<Vec<InvoiceLine>>,
    pub labor_charges: Option<u64>,
    pub tax: Option<u64>,
    pub discount: Option<u64>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInvoicePaid {
    pub invoice_id: InvoiceId,
    pub payment_method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    Create(CreateInvoice),
    Update(UpdateInvoice),
    Issue(IssueInvoice),
    MarkPaid(MarkInvoicePaid),
    Cancel(CancelInvoice),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub reference: ReferenceNumber,
    pub booking: BookingId,
    pub customer: PrincipalId,
    pub lines: Vec<InvoiceLine>,
    pub labor_charges: u64,
    pub tax: u64,
    pub discount: u64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    Created(InvoiceCreated),
    Updated {
        invoice_id: InvoiceId,
        lines: Option<Vec<InvoiceLine>>,
        labor_charges: Option<u64>,
        tax: Option<u64>,
        discount: Option<u64>,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Issued {
        invoice_id: InvoiceId,
        occurred_at: DateTime<Utc>,
    },
    Paid {
        invoice_id: InvoiceId,
        payment_method: PaymentMethod,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        invoice_id: InvoiceId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::Created(_) => "invoice.created",
            InvoiceEvent::Updated { .. } => "invoice.updated",
            InvoiceEvent::Issued { .. } => "invoice.issued",
            InvoiceEvent::Paid { .. } => "invoice.paid",
            InvoiceEvent::Cancelled { .. } => "invoice.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::Created(e) => e.occurred_at,
            InvoiceEvent::Updated { occurred_at, .. }
            | InvoiceEvent::Issued { occurred_at, .. }
            | InvoiceEvent::Paid { occurred_at, .. }
            | InvoiceEvent::Cancelled { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::Created(e) => {
                self.id = e.invoice_id;
                self.reference = Some(e.reference.clone());
                self.booking = Some(e.booking);
                self.customer = Some(e.customer);
                self.lines = e.lines.clone();
                self.labor_charges = e.labor_charges;
                self.tax = e.tax;
                self.discount = e.discount;
                self.notes = e.notes.clone();
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::Updated {
                lines,
                labor_charges,
                tax,
                discount,
                notes,
                ..
            } => {
                if let Some(lines) = lines {
                    self.lines = lines.clone();
                }
                if let Some(labor_charges) = labor_charges {
                    self.labor_charges = *labor_charges;
                }
                if let Some(tax) = tax {
                    self.tax = *tax;
                }
                if let Some(discount) = discount {
                    self.discount = *discount;
                }
                if let Some(notes) = notes {
                    self.notes = Some(notes.clone());
                }
            }
            InvoiceEvent::Issued { .. } => {
                self.status = InvoiceStatus::Pending;
            }
            InvoiceEvent::Paid {
                payment_method,
                occurred_at,
                ..
            } => {
                self.status = InvoiceStatus::Paid;
                self.payment_method = Some(*payment_method);
                self.paid_at = Some(*occurred_at);
            }
            InvoiceEvent::Cancelled { .. } => {
                self.status = InvoiceStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::Create(cmd) => self.handle_create(cmd),
            InvoiceCommand::Update(cmd) => self.handle_update(cmd),
            InvoiceCommand::Issue(cmd) => self.handle_issue(cmd),
            InvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
            InvoiceCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.lines.is_empty() && cmd.labor_charges == 0 {
            return Err(DomainError::validation(
                "an invoice needs line items or labor charges",
            ));
        }
        // Totals must be computable before anything is recorded.
        Self::compute_totals(&cmd.lines, cmd.labor_charges, cmd.tax, cmd.discount)?;

        Ok(vec![InvoiceEvent::Created(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            reference: cmd.reference.clone(),
            booking: cmd.booking,
            customer: cmd.customer,
            lines: cmd.lines.clone(),
            labor_charges: cmd.labor_charges,
            tax: cmd.tax,
            discount: cmd.discount,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;

        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invariant("a cancelled invoice cannot change"));
        }

        let changes_amounts = cmd.lines.is_some()
            || cmd.labor_charges.is_some()
            || cmd.tax.is_some()
            || cmd.discount.is_some();
        if self.status == InvoiceStatus::Paid && changes_amounts {
            return Err(DomainError::invariant(
                "only notes may change on a paid invoice",
            ));
        }
        if !changes_amounts && cmd.notes.is_none() {
            return Ok(vec![]);
        }

        if changes_amounts {
            let lines = cmd.lines.as_deref().unwrap_or(&self.lines);
            Self::compute_totals(
                lines,
                cmd.labor_charges.unwrap_or(self.labor_charges),
                cmd.tax.unwrap_or(self.tax),
                cmd.discount.unwrap_or(self.discount),
            )?;
        }

        Ok(vec![InvoiceEvent::Updated {
            invoice_id: cmd.invoice_id,
            lines: cmd.lines.clone(),
            labor_charges: cmd.labor_charges,
            tax: cmd.tax,
            discount: cmd.discount,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::invalid_transition(
                "invoice",
                self.status.as_str(),
                InvoiceStatus::Pending.as_str(),
            ));
        }

        Ok(vec![InvoiceEvent::Issued {
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_mark_paid(&self, cmd: &MarkInvoicePaid) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;

        if !matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Pending) {
            return Err(DomainError::invalid_transition(
                "invoice",
                self.status.as_str(),
                InvoiceStatus::Paid.as_str(),
            ));
        }

        Ok(vec![InvoiceEvent::Paid {
            invoice_id: cmd.invoice_id,
            payment_method: cmd.payment_method,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;

        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(
                "invoice",
                self.status.as_str(),
                InvoiceStatus::Cancelled.as_str(),
            ));
        }

        Ok(vec![InvoiceEvent::Cancelled {
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Invoice {
        let id = InvoiceId::new(AggregateId::new());
        let mut invoice = Invoice::empty(id);
        let events = invoice
            .handle(&InvoiceCommand::Create(CreateInvoice {
                invoice_id: id,
                reference: ReferenceNumber::new("IV", 1).unwrap(),
                booking: BookingId::new(AggregateId::new()),
                customer: PrincipalId::new(),
                lines: vec![
                    InvoiceLine {
                        description: "Brake pads".into(),
                        quantity: 2,
                        unit_price: 50,
                    },
                    InvoiceLine {
                        description: "Brake fluid".into(),
                        quantity: 1,
                        unit_price: 30,
                    },
                ],
                labor_charges: 20,
                tax: 10,
                discount: 5,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
        invoice
    }

    fn run(invoice: &mut Invoice, cmd: InvoiceCommand) -> Result<(), DomainError> {
        let events = invoice.handle(&cmd)?;
        for e in &events {
            invoice.apply(e);
        }
        Ok(())
    }

    #[test]
    fn totals_add_items_and_labor_then_tax_minus_discount() {
        let invoice = created();
        let totals = invoice.totals().unwrap();
        assert_eq!(totals.subtotal, 150);
        assert_eq!(totals.total, 155);
    }

    #[test]
    fn marking_paid_requires_a_payment_method_and_stamps_paid_at() {
        let mut invoice = created();
        let id = invoice.id_typed();
        run(
            &mut invoice,
            InvoiceCommand::MarkPaid(MarkInvoicePaid {
                invoice_id: id,
                payment_method: PaymentMethod::Card,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.payment_method(), Some(PaymentMethod::Card));
        assert!(invoice.paid_at().is_some());
    }

    #[test]
    fn paid_invoice_rejects_item_edits_but_accepts_notes() {
        let mut invoice = created();
        let id = invoice.id_typed();
        run(
            &mut invoice,
            InvoiceCommand::MarkPaid(MarkInvoicePaid {
                invoice_id: id,
                payment_method: PaymentMethod::Cash,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = run(
            &mut invoice,
            InvoiceCommand::Update(UpdateInvoice {
                invoice_id: id,
                lines: Some(vec![InvoiceLine {
                    description: "extra".into(),
                    quantity: 1,
                    unit_price: 1,
                }]),
                labor_charges: None,
                tax: None,
                discount: None,
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        run(
            &mut invoice,
            InvoiceCommand::Update(UpdateInvoice {
                invoice_id: id,
                lines: None,
                labor_charges: None,
                tax: None,
                discount: None,
                notes: Some("settled in person".into()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(invoice.notes(), Some("settled in person"));
    }

    #[test]
    fn discount_larger_than_the_amount_is_rejected() {
        let id = InvoiceId::new(AggregateId::new());
        let invoice = Invoice::empty(id);
        let err = invoice
            .handle(&InvoiceCommand::Create(CreateInvoice {
                invoice_id: id,
                reference: ReferenceNumber::new("IV", 2).unwrap(),
                booking: BookingId::new(AggregateId::new()),
                customer: PrincipalId::new(),
                lines: vec![],
                labor_charges: 10,
                tax: 0,
                discount: 25,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut invoice = created();
        let id = invoice.id_typed();
        run(
            &mut invoice,
            InvoiceCommand::Cancel(CancelInvoice {
                invoice_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = run(
            &mut invoice,
            InvoiceCommand::MarkPaid(MarkInvoicePaid {
                invoice_id: id,
                payment_method: PaymentMethod::Cash,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn issue_moves_draft_to_pending_once() {
        let mut invoice = created();
        let id = invoice.id_typed();
        run(
            &mut invoice,
            InvoiceCommand::Issue(IssueInvoice {
                invoice_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Pending);

        let err = run(
            &mut invoice,
            InvoiceCommand::Issue(IssueInvoice {
                invoice_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
