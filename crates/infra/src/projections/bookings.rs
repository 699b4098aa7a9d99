use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_bookings::{BookingEvent, BookingId, BookingNote, BookingStatus, TimeSlot};
use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_vehicles::VehicleId;

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "booking";

#[derive(Debug, Clone, Serialize)]
pub struct BookingRow {
    pub booking_id: BookingId,
    pub reference: String,
    pub customer: PrincipalId,
    pub vehicle: VehicleId,
    pub scheduled_date: NaiveDate,
    pub slot: TimeSlot,
    pub service_description: String,
    pub status: BookingStatus,
    pub inspector: Option<PrincipalId>,
    pub notes: Vec<BookingNote>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct BookingProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> BookingProjection<S>
where
    S: Store<BookingId, BookingRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &BookingId) -> Option<BookingRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<BookingRow> {
        self.store.list()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: BookingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            BookingEvent::Created(e) => {
                self.store.upsert(
                    e.booking_id,
                    BookingRow {
                        booking_id: e.booking_id,
                        reference: e.reference.to_string(),
                        customer: e.customer,
                        vehicle: e.vehicle,
                        scheduled_date: e.scheduled_date,
                        slot: e.slot,
                        service_description: e.service_description,
                        status: BookingStatus::Pending,
                        inspector: None,
                        notes: Vec::new(),
                        completed_at: None,
                        created_at: e.occurred_at,
                    },
                );
            }
            BookingEvent::InspectorAssigned {
                booking_id,
                inspector,
                ..
            } => {
                if let Some(mut row) = self.store.get(&booking_id) {
                    row.inspector = Some(inspector);
                    self.store.upsert(booking_id, row);
                }
            }
            BookingEvent::StatusChanged {
                booking_id,
                to,
                occurred_at,
                ..
            } => {
                if let Some(mut row) = self.store.get(&booking_id) {
                    row.status = to;
                    if to == BookingStatus::Completed {
                        row.completed_at = Some(occurred_at);
                    }
                    self.store.upsert(booking_id, row);
                }
            }
            BookingEvent::NoteAdded {
                booking_id,
                author,
                text,
                occurred_at,
            } => {
                if let Some(mut row) = self.store.get(&booking_id) {
                    row.notes.push(BookingNote {
                        author,
                        text,
                        occurred_at,
                    });
                    self.store.upsert(booking_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
