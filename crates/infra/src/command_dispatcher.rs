//! Command execution pipeline.
//!
//! One consistent flow for every aggregate: load the stream, rehydrate,
//! let the aggregate decide, append with an optimistic concurrency check,
//! then publish. Events are persisted before publication, so a failed
//! publish leaves the command committed and retrying is safe
//! (at-least-once delivery; projections must be idempotent).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pitstop_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use pitstop_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    Concurrency(String),
    /// Deterministic domain failure, carried intact for error mapping.
    Domain(DomainError),
    /// Failed to deserialize historical payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append.
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Domain(value)
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run on the in-memory pair and a
/// durable backend can be swapped in without changing domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// The `make_aggregate` closure constructs the empty aggregate for
    /// rehydration (e.g. `|id| Booking::empty(BookingId(id))`), keeping the
    /// dispatcher ignorant of concrete aggregate constructors.
    ///
    /// The expected version is taken from the loaded stream, so a
    /// concurrent writer between load and append surfaces as
    /// `DispatchError::Concurrency` rather than a lost update.
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
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate without dispatching a command (query path).
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // The stream must be this aggregate's and strictly ordered, even if a
    // buggy backend says otherwise.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use pitstop_events::InMemoryEventBus;
    use pitstop_vehicles::{RegisterVehicle, UpdateMileage, Vehicle, VehicleCommand, VehicleId};

    use crate::event_store::InMemoryEventStore;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>
    {
        CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn register_cmd(id: VehicleId) -> VehicleCommand {
        VehicleCommand::Register(RegisterVehicle {
            vehicle_id: id,
            reference: pitstop_core::ReferenceNumber::new("VH", 1).unwrap(),
            owner: pitstop_core::PrincipalId::new(),
            registration: "AB12 CDE".into(),
            chassis_number: "ch".into(),
            engine_number: "en".into(),
            make: "Ford".into(),
            model: "Transit".into(),
            year: 2021,
            mileage: 10,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_and_rehydrates() {
        let dispatcher = dispatcher();
        let id = VehicleId::new(AggregateId::new());

        let committed = dispatcher
            .dispatch(id.0, "vehicle", register_cmd(id), |agg_id| {
                Vehicle::empty(VehicleId::new(agg_id))
            })
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);

        dispatcher
            .dispatch(
                id.0,
                "vehicle",
                VehicleCommand::UpdateMileage(UpdateMileage {
                    vehicle_id: id,
                    mileage: 500,
                    occurred_at: Utc::now(),
                }),
                |agg_id| Vehicle::empty(VehicleId::new(agg_id)),
            )
            .unwrap();

        let vehicle = dispatcher
            .load(id.0, |agg_id| Vehicle::empty(VehicleId::new(agg_id)))
            .unwrap();
        assert_eq!(vehicle.mileage(), 500);
    }

    #[test]
    fn domain_errors_pass_through_unflattened() {
        let dispatcher = dispatcher();
        let id = VehicleId::new(AggregateId::new());
        dispatcher
            .dispatch(id.0, "vehicle", register_cmd(id), |agg_id| {
                Vehicle::empty(VehicleId::new(agg_id))
            })
            .unwrap();

        let err = dispatcher
            .dispatch(
                id.0,
                "vehicle",
                VehicleCommand::UpdateMileage(UpdateMileage {
                    vehicle_id: id,
                    mileage: 1,
                    occurred_at: Utc::now(),
                }),
                |agg_id| Vehicle::empty(VehicleId::new(agg_id)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(DomainError::InvariantViolation(_))
        ));
    }
}
