use serde::Serialize;
use serde_json::Value as JsonValue;

use pitstop_events::EventEnvelope;
use pitstop_inventory::{InventoryCategory, ItemEvent, ItemId, StockDirection};

use crate::read_model::Store;

use super::{ProjectionError, StreamCursors};

pub const AGGREGATE_TYPE: &str = "inventory_item";

#[derive(Debug, Clone, Serialize)]
pub struct InventoryRow {
    pub item_id: ItemId,
    pub reference: String,
    pub name: String,
    pub category: InventoryCategory,
    pub unit_price: u64,
    pub on_hand: u32,
    pub reserved: u32,
    pub minimum: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl InventoryRow {
    pub fn available(&self) -> u32 {
        self.on_hand - self.reserved
    }

    pub fn is_low_stock(&self) -> bool {
        self.on_hand <= self.minimum
    }
}

pub struct InventoryProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> InventoryProjection<S>
where
    S: Store<ItemId, InventoryRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<InventoryRow> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<InventoryRow> {
        self.store.list()
    }

    pub fn list_low_stock(&self) -> Vec<InventoryRow> {
        self.store
            .list()
            .into_iter()
            .filter(|row| row.is_low_stock())
            .collect()
    }

    /// Case-insensitive substring search over item names.
    pub fn search(&self, term: &str) -> Vec<InventoryRow> {
        let needle = term.to_lowercase();
        self.store
            .list()
            .into_iter()
            .filter(|row| row.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.check(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: ItemEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            ItemEvent::Created(e) => {
                self.store.upsert(
                    e.item_id,
                    InventoryRow {
                        item_id: e.item_id,
                        reference: e.reference.to_string(),
                        name: e.name,
                        category: e.category,
                        unit_price: e.unit_price,
                        on_hand: e.initial_stock,
                        reserved: 0,
                        minimum: e.minimum,
                        created_at: e.occurred_at,
                    },
                );
            }
            ItemEvent::DetailsUpdated {
                item_id,
                name,
                category,
                unit_price,
                minimum,
                ..
            } => {
                if let Some(mut row) = self.store.get(&item_id) {
                    if let Some(name) = name {
                        row.name = name;
                    }
                    if let Some(category) = category {
                        row.category = category;
                    }
                    if let Some(unit_price) = unit_price {
                        row.unit_price = unit_price;
                    }
                    if let Some(minimum) = minimum {
                        row.minimum = minimum;
                    }
                    self.store.upsert(item_id, row);
                }
            }
            ItemEvent::StockAdjusted {
                item_id,
                direction,
                quantity,
                ..
            } => {
                if let Some(mut row) = self.store.get(&item_id) {
                    match direction {
                        StockDirection::Add => row.on_hand += quantity,
                        StockDirection::Subtract => row.on_hand -= quantity,
                    }
                    self.store.upsert(item_id, row);
                }
            }
            ItemEvent::StockReserved {
                item_id, quantity, ..
            } => {
                if let Some(mut row) = self.store.get(&item_id) {
                    row.reserved += quantity;
                    self.store.upsert(item_id, row);
                }
            }
            ItemEvent::ReservationReleased {
                item_id, quantity, ..
            } => {
                if let Some(mut row) = self.store.get(&item_id) {
                    row.reserved -= quantity;
                    self.store.upsert(item_id, row);
                }
            }
            ItemEvent::StockIssued {
                item_id, quantity, ..
            } => {
                if let Some(mut row) = self.store.get(&item_id) {
                    row.reserved -= quantity;
                    row.on_hand -= quantity;
                    self.store.upsert(item_id, row);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())
    }
}
