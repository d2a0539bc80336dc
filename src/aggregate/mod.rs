//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//! Every aggregate type implements [`Aggregate`]; the fold over its history
//! lives once in [`replay`] and is shared by all of them.

pub mod accommodation;
pub mod booking;
pub mod registry;
pub mod replay;

pub use accommodation::{AccommodationChanges, SleepingAccommodation};
pub use booking::Booking;
pub use registry::EventRegistry;
pub use replay::ReconstructionError;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::domain::DomainEvent;

/// Version of an aggregate that has never had an event applied
pub const INITIAL_VERSION: i64 = -1;

/// Aggregate trait that all aggregates must implement
pub trait Aggregate:
    std::fmt::Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The type of events this aggregate handles
    type Event: DomainEvent;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> Uuid;

    /// Version of the last applied event, [`INITIAL_VERSION`] when new
    fn version(&self) -> i64;

    /// Overwrite the version; only the replay engine calls this
    fn set_version(&mut self, version: i64);

    /// Apply an event to update the aggregate state.
    ///
    /// Must be a pure state transition: no I/O and no clock reads.
    fn apply(self, event: &Self::Event) -> Self;

    /// Check if the aggregate has never been persisted
    fn is_new(&self) -> bool {
        self.version() == INITIAL_VERSION
    }
}
