//! Inventory item aggregate and stock ledger.
//!
//! The ledger keeps three counters: `on_hand`, `reserved` and `minimum`.
//! Available stock is `on_hand - reserved`; any operation that would take a
//! counter negative or let `reserved` exceed `on_hand` is rejected before
//! any event is emitted. The low-stock flag is derived on read, never
//! stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ReferenceNumber};
use pitstop_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub AggregateId);

impl ItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryCategory {
    Parts,
    Tools,
    Fluids,
    Consumables,
}

impl InventoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryCategory::Parts => "parts",
            InventoryCategory::Tools => "tools",
            InventoryCategory::Fluids => "fluids",
            InventoryCategory::Consumables => "consumables",
        }
    }
}

impl core::fmt::Display for InventoryCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a manual stock adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    Add,
    Subtract,
}

/// Aggregate root: InventoryItem.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    id: ItemId,
    reference: Option<ReferenceNumber>,
    name: String,
    category: InventoryCategory,
    unit_price: u64,
    on_hand: u32,
    reserved: u32,
    minimum: u32,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            reference: None,
            name: String::new(),
            category: InventoryCategory::Parts,
            unit_price: 0,
            on_hand: 0,
            reserved: 0,
            minimum: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> InventoryCategory {
        self.category
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn on_hand(&self) -> u32 {
        self.on_hand
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Stock not yet spoken for by a reservation.
    pub fn available(&self) -> u32 {
        self.on_hand - self.reserved
    }

    /// Derived on read, never stored.
    pub fn is_low_stock(&self) -> bool {
        self.on_hand <= self.minimum
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

impl AggregateRoot for InventoryItem {
    type Id = ItemId;

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
pub struct CreateItem {
    pub item_id: ItemId,
    pub reference: ReferenceNumber,
    pub name: String,
    pub category: InventoryCategory,
    pub unit_price: u64,
    pub initial_stock: u32,
    pub minimum: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemDetails {
    pub item_id: ItemId,
    pub name: Option<String>,
    pub category: Option<InventoryCategory>,
    pub unit_price: Option<u64>,
    pub minimum: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: ItemId,
    pub direction: StockDirection,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub item_id: ItemId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub item_id: ItemId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub item_id: ItemId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCommand {
    Create(CreateItem),
    UpdateDetails(UpdateItemDetails),
    AdjustStock(AdjustStock),
    Reserve(ReserveStock),
    ReleaseReservation(ReleaseReservation),
    Issue(IssueStock),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: ItemId,
    pub reference: ReferenceNumber,
    pub name: String,
    pub category: InventoryCategory,
    pub unit_price: u64,
    pub initial_stock: u32,
    pub minimum: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    Created(ItemCreated),
    DetailsUpdated {
        item_id: ItemId,
        name: Option<String>,
        category: Option<InventoryCategory>,
        unit_price: Option<u64>,
        minimum: Option<u32>,
        occurred_at: DateTime<Utc>,
    },
    StockAdjusted {
        item_id: ItemId,
        direction: StockDirection,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    StockReserved {
        item_id: ItemId,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    ReservationReleased {
        item_id: ItemId,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    StockIssued {
        item_id: ItemId,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for ItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ItemEvent::Created(_) => "inventory.item_created",
            ItemEvent::DetailsUpdated { .. } => "inventory.details_updated",
            ItemEvent::StockAdjusted { .. } => "inventory.stock_adjusted",
            ItemEvent::StockReserved { .. } => "inventory.stock_reserved",
            ItemEvent::ReservationReleased { .. } => "inventory.reservation_released",
            ItemEvent::StockIssued { .. } => "inventory.stock_issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ItemEvent::Created(e) => e.occurred_at,
            ItemEvent::DetailsUpdated { occurred_at, .. }
            | ItemEvent::StockAdjusted { occurred_at, .. }
            | ItemEvent::StockReserved { occurred_at, .. }
            | ItemEvent::ReservationReleased { occurred_at, .. }
            | ItemEvent::StockIssued { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = ItemCommand;
    type Event = ItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ItemEvent::Created(e) => {
                self.id = e.item_id;
                self.reference = Some(e.reference.clone());
                self.name = e.name.clone();
                self.category = e.category;
                self.unit_price = e.unit_price;
                self.on_hand = e.initial_stock;
                self.reserved = 0;
                self.minimum = e.minimum;
                self.created = true;
            }
            ItemEvent::DetailsUpdated {
                name,
                category,
                unit_price,
                minimum,
                ..
            } => {
                if let Some(name) = name {
                    self.name = name.clone();
                }
                if let Some(category) = category {
                    self.category = *category;
                }
                if let Some(unit_price) = unit_price {
                    self.unit_price = *unit_price;
                }
                if let Some(minimum) = minimum {
                    self.minimum = *minimum;
                }
            }
            ItemEvent::StockAdjusted {
                direction,
                quantity,
                ..
            } => match direction {
                StockDirection::Add => self.on_hand += quantity,
                StockDirection::Subtract => self.on_hand -= quantity,
            },
            ItemEvent::StockReserved { quantity, .. } => {
                self.reserved += quantity;
            }
            ItemEvent::ReservationReleased { quantity, .. } => {
                self.reserved -= quantity;
            }
            ItemEvent::StockIssued { quantity, .. } => {
                self.reserved -= quantity;
                self.on_hand -= quantity;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ItemCommand::Create(cmd) => self.handle_create(cmd),
            ItemCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            ItemCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ItemCommand::Reserve(cmd) => self.handle_reserve(cmd),
            ItemCommand::ReleaseReservation(cmd) => self.handle_release(cmd),
            ItemCommand::Issue(cmd) => self.handle_issue(cmd),
        }
    }
}

impl InventoryItem {
    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<ItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inventory item already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("item name is required"));
        }

        Ok(vec![ItemEvent::Created(ItemCreated {
            item_id: cmd.item_id,
            reference: cmd.reference.clone(),
            name: cmd.name.trim().to_string(),
            category: cmd.category,
            unit_price: cmd.unit_price,
            initial_stock: cmd.initial_stock,
            minimum: cmd.minimum,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItemDetails) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;

        if let Some(name) = &cmd.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("item name cannot be blank"));
            }
        }
        if cmd.name.is_none()
            && cmd.category.is_none()
            && cmd.unit_price.is_none()
            && cmd.minimum.is_none()
        {
            return Ok(vec![]);
        }

        Ok(vec![ItemEvent::DetailsUpdated {
            item_id: cmd.item_id,
            name: cmd.name.as_ref().map(|n| n.trim().to_string()),
            category: cmd.category,
            unit_price: cmd.unit_price,
            minimum: cmd.minimum,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("adjustment quantity must be positive"));
        }
        if cmd.direction == StockDirection::Subtract && cmd.quantity > self.available() {
            return Err(DomainError::insufficient_stock(
                self.name.clone(),
                cmd.quantity,
                self.available(),
            ));
        }

        Ok(vec![ItemEvent::StockAdjusted {
            item_id: cmd.item_id,
            direction: cmd.direction,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        if cmd.quantity > self.available() {
            return Err(DomainError::insufficient_stock(
                self.name.clone(),
                cmd.quantity,
                self.available(),
            ));
        }

        Ok(vec![ItemEvent::StockReserved {
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;

        if cmd.quantity > self.reserved {
            return Err(DomainError::invariant(format!(
                "cannot release {} units, only {} reserved",
                cmd.quantity, self.reserved
            )));
        }

        Ok(vec![ItemEvent::ReservationReleased {
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;

        // Issue spends a prior reservation, never unreserved stock.
        if cmd.quantity > self.reserved {
            return Err(DomainError::invariant(format!(
                "cannot issue {} units, only {} reserved",
                cmd.quantity, self.reserved
            )));
        }

        Ok(vec![ItemEvent::StockIssued {
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn created(initial: u32, minimum: u32) -> InventoryItem {
        let id = ItemId::new(AggregateId::new());
        let mut item = InventoryItem::empty(id);
        let events = item
            .handle(&ItemCommand::Create(CreateItem {
                item_id: id,
                reference: ReferenceNumber::new("IN", 1).unwrap(),
                name: "Brake pad set".into(),
                category: InventoryCategory::Parts,
                unit_price: 5_000,
                initial_stock: initial,
                minimum,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    fn run(item: &mut InventoryItem, cmd: ItemCommand) -> Result<(), DomainError> {
        let events = item.handle(&cmd)?;
        for e in &events {
            item.apply(e);
        }
        Ok(())
    }

    #[test]
    fn subtract_beyond_available_fails_and_names_the_item() {
        let mut item = created(10, 2);
        let id = item.id_typed();

        let err = run(
            &mut item,
            ItemCommand::AdjustStock(AdjustStock {
                item_id: id,
                direction: StockDirection::Subtract,
                quantity: 11,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        match err {
            DomainError::InsufficientStock {
                item,
                requested,
                available,
            } => {
                assert_eq!(item, "Brake pad set");
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(item.on_hand(), 10);
    }

    #[test]
    fn reservation_shrinks_available_but_not_on_hand() {
        let mut item = created(10, 2);
        let id = item.id_typed();

        run(
            &mut item,
            ItemCommand::Reserve(ReserveStock {
                item_id: id,
                quantity: 6,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(item.on_hand(), 10);
        assert_eq!(item.available(), 4);

        let err = run(
            &mut item,
            ItemCommand::AdjustStock(AdjustStock {
                item_id: id,
                direction: StockDirection::Subtract,
                quantity: 5,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn issue_spends_the_reservation() {
        let mut item = created(10, 2);
        let id = item.id_typed();

        run(
            &mut item,
            ItemCommand::Reserve(ReserveStock {
                item_id: id,
                quantity: 4,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut item,
            ItemCommand::Issue(IssueStock {
                item_id: id,
                quantity: 4,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(item.on_hand(), 6);
        assert_eq!(item.reserved(), 0);
        assert_eq!(item.available(), 6);
    }

    #[test]
    fn issue_without_reservation_is_rejected() {
        let mut item = created(10, 2);
        let id = item.id_typed();
        let err = run(
            &mut item,
            ItemCommand::Issue(IssueStock {
                item_id: id,
                quantity: 1,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn low_stock_is_derived_from_the_counters() {
        let mut item = created(3, 5);
        let id = item.id_typed();
        assert!(item.is_low_stock());

        run(
            &mut item,
            ItemCommand::AdjustStock(AdjustStock {
                item_id: id,
                direction: StockDirection::Add,
                quantity: 10,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(!item.is_low_stock());
    }

    proptest! {
        // Random walks of accepted operations never break the counter
        // invariants: reserved <= on_hand, and rejected commands leave the
        // state untouched.
        #[test]
        fn counters_stay_consistent(ops in prop::collection::vec((0u8..5, 1u32..20), 1..64)) {
            let mut item = created(50, 5);
            let id = item.id_typed();

            for (kind, qty) in ops {
                let cmd = match kind {
                    0 => ItemCommand::AdjustStock(AdjustStock {
                        item_id: id,
                        direction: StockDirection::Add,
                        quantity: qty,
                        occurred_at: Utc::now(),
                    }),
                    1 => ItemCommand::AdjustStock(AdjustStock {
                        item_id: id,
                        direction: StockDirection::Subtract,
                        quantity: qty,
                        occurred_at: Utc::now(),
                    }),
                    2 => ItemCommand::Reserve(ReserveStock {
                        item_id: id,
                        quantity: qty,
                        occurred_at: Utc::now(),
                    }),
                    3 => ItemCommand::ReleaseReservation(ReleaseReservation {
                        item_id: id,
                        quantity: qty,
                        occurred_at: Utc::now(),
                    }),
                    _ => ItemCommand::Issue(IssueStock {
                        item_id: id,
                        quantity: qty,
                        occurred_at: Utc::now(),
                    }),
                };

                let before = (item.on_hand(), item.reserved());
                if run(&mut item, cmd).is_err() {
                    prop_assert_eq!((item.on_hand(), item.reserved()), before);
                }
                prop_assert!(item.reserved() <= item.on_hand());
            }
        }
    }
}
