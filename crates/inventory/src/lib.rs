//! Inventory items and the stock ledger.

pub mod item;

pub use item::{
    AdjustStock, CreateItem, InventoryCategory, InventoryItem, ItemCommand, ItemCreated, ItemEvent,
    ItemId, IssueStock, ReleaseReservation, ReserveStock, StockDirection, UpdateItemDetails,
};
