use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_bookings::BookingId;
use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_invoicing::{InvoiceEvent, InvoiceId, InvoiceLine, InvoiceStatus, PaymentMethod};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "invoice";

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRow {
    pub invoice_id: InvoiceId,
    pub reference: String,
    pub booking: BookingId,
    pub customer: PrincipalId,
    pub lines: Vec<InvoiceLine>,
    pub labor_charges: u64,
    pub tax: u64,
    pub discount: u64,
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvoiceRow {
    /// Recomputed amounts; rows never store totals.
    pub fn subtotal(&self) -> u64 {
        let items: u64 = self
            .lines
            .iter()
            .map(|l| u64::from(l.quantity) * l.unit_price)
            .sum();
        items + self.labor_charges
    }

    pub fn total(&self) -> u64 {
        self.subtotal() + self.tax - self.discount
    }
}

pub struct InvoiceProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> InvoiceProjection<S>
where
    S: Store<InvoiceId, InvoiceRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &InvoiceId) -> Option<InvoiceRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<InvoiceRow> {
        self.store.list()
    }

    pub fn find_by_booking(&self, booking: BookingId) -> Option<InvoiceRow> {
        self.store
            .list()
            .into_iter()
            .find(|row| row.booking == booking)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            InvoiceEvent::Created(e) => {
                self.store.upsert(
                    e.invoice_id,
                    InvoiceRow {
                        invoice_id: e.invoice_id,
                        reference: e.reference.to_string(),
                        booking: e.booking,
                        customer: e.customer,
                        lines: e.lines,
                        labor_charges: e.labor_charges,
                        tax: e.tax,
                        discount: e.discount,
                        notes: e.notes,
                        status: InvoiceStatus::Draft,
                        payment_method: None,
                        paid_at: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            InvoiceEvent::Updated {
                invoice_id,
                lines,
                labor_charges,
                tax,
                discount,
                notes,
                ..
            } => {
                if let Some(mut row) = self.store.get(&invoice_id) {
                    if let Some(lines) = lines {
                        row.lines = lines;
                    }
                    if let Some(labor_charges) = labor_charges {
                        row.labor_charges = labor_charges;
                    }
                    if let Some(tax) = tax {
                        row.tax = tax;
                    }
                    if let Some(discount) = discount {
                        row.discount = discount;
                    }
                    if let Some(notes) = notes {
                        row.notes = Some(notes);
                    }
                    self.store.upsert(invoice_id, row);
                }
            }
            InvoiceEvent::Issued { invoice_id, .. } => {
                if let Some(mut row) = self.store.get(&invoice_id) {
                    row.status = InvoiceStatus::Pending;
                    self.store.upsert(invoice_id, row);
                }
            }
            InvoiceEvent::Paid {
                invoice_id,
                payment_method,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&invoice_id) {
                    row.status = InvoiceStatus::Paid;
                    row.payment_method = Some(payment_method);
                    row.paid_at = Some(occurred_at);
                    self.store.upsert(invoice_id, row);
                }
            }
            InvoiceEvent::Cancelled { invoice_id, .. } => {
                if let Some(mut row) = self.store.get(&invoice_id) {
                    row.status = InvoiceStatus::Cancelled;
                    self.store.upsert(invoice_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
