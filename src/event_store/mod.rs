//! Event Store module
//!
//! Persistence layer for Event Sourcing: the append-only event log and the
//! snapshot store, each behind a trait with a PostgreSQL implementation.

mod error;
mod postgres;
mod store;

pub use error::EventStoreError;
pub use postgres::{PgEventStore, PgSnapshotStore};
pub use store::{Committed, EventStore, PendingEvent, Snapshot, SnapshotStore, StoredEvent};
