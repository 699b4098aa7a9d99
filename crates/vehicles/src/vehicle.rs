//! Vehicle aggregate.
//!
//! Identifying attributes (registration plate, chassis and engine numbers)
//! are written once at registration and have no update command. Mileage is a
//! counter that may only move forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, PrincipalId, ReferenceNumber};
use pitstop_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub AggregateId);

impl VehicleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Vehicle.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    reference: Option<ReferenceNumber>,
    owner: Option<PrincipalId>,
    registration: String,
    chassis_number: String,
    engine_number: String,
    make: String,
    model: String,
    year: u16,
    mileage: u32,
    version: u64,
    created: bool,
}

impl Vehicle {
    /// Create an empty, not-yet-registered instance for rehydration.
    pub fn empty(id: VehicleId) -> Self {
        Self {
            id,
            reference: None,
            owner: None,
            registration: String::new(),
            chassis_number: String::new(),
            engine_number: String::new(),
            make: String::new(),
            model: String::new(),
            year: 0,
            mileage: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> VehicleId {
        self.id
    }

    pub fn owner(&self) -> Option<PrincipalId> {
        self.owner
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn mileage(&self) -> u32 {
        self.mileage
    }

    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

impl AggregateRoot for Vehicle {
    type Id = VehicleId;

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
pub struct RegisterVehicle {
    pub vehicle_id: VehicleId,
    pub reference: ReferenceNumber,
    pub owner: PrincipalId,
    pub registration: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMileage {
    pub vehicle_id: VehicleId,
    pub mileage: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOwnership {
    pub vehicle_id: VehicleId,
    pub new_owner: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleCommand {
    Register(RegisterVehicle),
    UpdateMileage(UpdateMileage),
    TransferOwnership(TransferOwnership),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRegistered {
    pub vehicle_id: VehicleId,
    pub reference: ReferenceNumber,
    pub owner: PrincipalId,
    pub registration: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleEvent {
    Registered(VehicleRegistered),
    MileageUpdated {
        vehicle_id: VehicleId,
        mileage: u32,
        occurred_at: DateTime<Utc>,
    },
    OwnershipTransferred {
        vehicle_id: VehicleId,
        previous_owner: PrincipalId,
        new_owner: PrincipalId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for VehicleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VehicleEvent::Registered(_) => "vehicle.registered",
            VehicleEvent::MileageUpdated { .. } => "vehicle.mileage_updated",
            VehicleEvent::OwnershipTransferred { .. } => "vehicle.ownership_transferred",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VehicleEvent::Registered(e) => e.occurred_at,
            VehicleEvent::MileageUpdated { occurred_at, .. }
            | VehicleEvent::OwnershipTransferred { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Vehicle {
    type Command = VehicleCommand;
    type Event = VehicleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VehicleEvent::Registered(e) => {
                self.id = e.vehicle_id;
                self.reference = Some(e.reference.clone());
                self.owner = Some(e.owner);
                self.registration = e.registration.clone();
                self.chassis_number = e.chassis_number.clone();
                self.engine_number = e.engine_number.clone();
                self.make = e.make.clone();
                self.model = e.model.clone();
                self.year = e.year;
                self.mileage = e.mileage;
                self.created = true;
            }
            VehicleEvent::MileageUpdated { mileage, .. } => {
                self.mileage = *mileage;
            }
            VehicleEvent::OwnershipTransferred { new_owner, .. } => {
                self.owner = Some(*new_owner);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VehicleCommand::Register(cmd) => self.handle_register(cmd),
            VehicleCommand::UpdateMileage(cmd) => self.handle_update_mileage(cmd),
            VehicleCommand::TransferOwnership(cmd) => self.handle_transfer(cmd),
        }
    }
}

impl Vehicle {
    fn handle_register(&self, cmd: &RegisterVehicle) -> Result<Vec<VehicleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("vehicle already registered"));
        }
        if cmd.registration.trim().is_empty() {
            return Err(DomainError::validation("registration number is required"));
        }
        if cmd.chassis_number.trim().is_empty() || cmd.engine_number.trim().is_empty() {
            return Err(DomainError::validation(
                "chassis and engine numbers are required",
            ));
        }

        Ok(vec![VehicleEvent::Registered(VehicleRegistered {
            vehicle_id: cmd.vehicle_id,
            reference: cmd.reference.clone(),
            owner: cmd.owner,
            registration: cmd.registration.trim().to_uppercase(),
            chassis_number: cmd.chassis_number.trim().to_uppercase(),
            engine_number: cmd.engine_number.trim().to_uppercase(),
            make: cmd.make.clone(),
            model: cmd.model.clone(),
            year: cmd.year,
            mileage: cmd.mileage,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_mileage(&self, cmd: &UpdateMileage) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_registered()?;

        // Odometers do not run backwards.
        if cmd.mileage < self.mileage {
            return Err(DomainError::invariant(format!(
                "mileage cannot decrease (current {}, requested {})",
                self.mileage, cmd.mileage
            )));
        }
        if cmd.mileage == self.mileage {
            return Ok(vec![]);
        }

        Ok(vec![VehicleEvent::MileageUpdated {
            vehicle_id: cmd.vehicle_id,
            mileage: cmd.mileage,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_transfer(&self, cmd: &TransferOwnership) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_registered()?;

        let previous_owner = self
            .owner
            .ok_or_else(|| DomainError::invariant("registered vehicle has no owner"))?;
        if previous_owner == cmd.new_owner {
            return Err(DomainError::validation(
                "new owner is the same as the current owner",
            ));
        }

        Ok(vec![VehicleEvent::OwnershipTransferred {
            vehicle_id: cmd.vehicle_id,
            previous_owner,
            new_owner: cmd.new_owner,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> Vehicle {
        let id = VehicleId::new(AggregateId::new());
        let mut vehicle = Vehicle::empty(id);
        let events = vehicle
            .handle(&VehicleCommand::Register(RegisterVehicle {
                vehicle_id: id,
                reference: ReferenceNumber::new("VH", 1).unwrap(),
                owner: PrincipalId::new(),
                registration: "kx61 abc".into(),
                chassis_number: "ch-1".into(),
                engine_number: "en-1".into(),
                make: "Toyota".into(),
                model: "Hilux".into(),
                year: 2019,
                mileage: 42_000,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            vehicle.apply(e);
        }
        vehicle
    }

    #[test]
    fn registration_is_normalised_to_uppercase() {
        let vehicle = registered();
        assert_eq!(vehicle.registration(), "KX61 ABC");
    }

    #[test]
    fn mileage_is_monotonically_non_decreasing() {
        let mut vehicle = registered();
        let id = vehicle.id_typed();

        let err = vehicle
            .handle(&VehicleCommand::UpdateMileage(UpdateMileage {
                vehicle_id: id,
                mileage: 41_000,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let events = vehicle
            .handle(&VehicleCommand::UpdateMileage(UpdateMileage {
                vehicle_id: id,
                mileage: 43_500,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            vehicle.apply(e);
        }
        assert_eq!(vehicle.mileage(), 43_500);
    }

    #[test]
    fn equal_mileage_update_is_a_no_op() {
        let vehicle = registered();
        let events = vehicle
            .handle(&VehicleCommand::UpdateMileage(UpdateMileage {
                vehicle_id: vehicle.id_typed(),
                mileage: 42_000,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn transfer_requires_a_different_owner() {
        let mut vehicle = registered();
        let id = vehicle.id_typed();
        let current = vehicle.owner().unwrap();

        let err = vehicle
            .handle(&VehicleCommand::TransferOwnership(TransferOwnership {
                vehicle_id: id,
                new_owner: current,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let new_owner = PrincipalId::new();
        let events = vehicle
            .handle(&VehicleCommand::TransferOwnership(TransferOwnership {
                vehicle_id: id,
                new_owner,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            vehicle.apply(e);
        }
        assert_eq!(vehicle.owner(), Some(new_owner));
    }
}
