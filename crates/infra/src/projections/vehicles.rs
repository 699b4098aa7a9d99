use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_core::PrincipalId;
use pitstop_events::EventEnvelope;
use pitstop_vehicles::{VehicleEvent, VehicleId};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "vehicle";

#[derive(Debug, Clone, Serialize)]
pub struct VehicleRow {
    pub vehicle_id: VehicleId,
    pub reference: String,
    pub owner: PrincipalId,
    pub registration: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct VehicleProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> VehicleProjection<S>
where
    S: Store<VehicleId, VehicleRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &VehicleId) -> Option<VehicleRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<VehicleRow> {
        self.store.list()
    }

    pub fn find_by_registration(&self, registration: &str) -> Option<VehicleRow> {
        let needle = registration.trim().to_uppercase();
        self.store
            .list()
            .into_iter()
            .find(|row| row.registration == needle)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: VehicleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            VehicleEvent::Registered(e) => {
                self.store.upsert(
                    e.vehicle_id,
                    VehicleRow {
                        vehicle_id: e.vehicle_id,
                        reference: e.reference.to_string(),
                        owner: e.owner,
                        registration: e.registration,
                        chassis_number: e.chassis_number,
                        engine_number: e.engine_number,
                        make: e.make,
                        model: e.model,
                        year: e.year,
                        mileage: e.mileage,
                        created_at: e.occurred_at,
                    },
                );
            }
            VehicleEvent::MileageUpdated {
                vehicle_id, mileage, ..
            } => {
                if let Some(mut row) = self.store.get(&vehicle_id) {
                    row.mileage = mileage;
                    self.store.upsert(vehicle_id, row);
                }
            }
            VehicleEvent::OwnershipTransferred {
                vehicle_id,
                new_owner,
                ..
            } => {
                if let Some(mut row) = self.store.get(&vehicle_id) {
                    row.owner = new_owner;
                    self.store.upsert(vehicle_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
