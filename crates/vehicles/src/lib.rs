//! Vehicle registry.

pub mod vehicle;

pub use vehicle::{
    RegisterVehicle, TransferOwnership, UpdateMileage, Vehicle, VehicleCommand, VehicleEvent,
    VehicleId, VehicleRegistered,
};
