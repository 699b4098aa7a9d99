//! Infrastructure: event store, command dispatch, counters, uniqueness
//! claims, read models and projections.
//!
//! Everything here is behind traits so tests and the dev server can run on
//! the in-memory implementations while a durable backend can be swapped in
//! without touching domain code.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod sequence;
pub mod unique;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{InMemoryStore, Store};
pub use sequence::{InMemorySequenceStore, SequenceError, SequenceStore};
pub use unique::{InMemoryUniqueIndex, UniqueError, UniqueIndex};
