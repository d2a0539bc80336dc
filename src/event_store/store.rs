//! Event and snapshot store contracts
//!
//! Versions are 0-based and contiguous per aggregate. An aggregate without
//! events is at version -1, so the first append expects -1.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainEvent, OperationContext};

use super::EventStoreError;

/// Stored event from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub context: serde_json::Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Event about to be appended; the store assigns its version
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl PendingEvent {
    /// Serialize a domain event for appending
    pub fn from_domain<E: DomainEvent>(event: &E) -> Result<Self, EventStoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            payload: event.to_payload()?,
        })
    }
}

/// Result of a successful append
#[derive(Debug, Clone)]
pub struct Committed {
    /// Version of the last appended event
    pub new_version: i64,
    pub events: Vec<StoredEvent>,
}

/// Materialized aggregate state at `version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub state: serde_json::Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Append-only event log.
///
/// `append` is atomic: either the whole batch is committed with versions
/// `expected_version + 1 ..` or nothing is. Dropping the returned future
/// before it resolves commits nothing.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch, rejecting it if the stored latest version differs from `expected_version`
    async fn append(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        expected_version: i64,
        events: Vec<PendingEvent>,
        context: &OperationContext,
    ) -> Result<Committed, EventStoreError>;

    /// Events with a version greater than `after_version`, ascending
    async fn load(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Version of the newest event, `None` if the aggregate has no events
    async fn latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<i64>, EventStoreError>;

    /// Every aggregate of a type that has at least one event
    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<Uuid>, EventStoreError>;
}

/// Latest snapshot per aggregate
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>, EventStoreError>;

    /// Store a snapshot; an older version never replaces a newer one
    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccommodationEvent, AccommodationType, SleepingAccommodationCreated};

    #[test]
    fn test_pending_event_from_domain() {
        let accommodation_id = Uuid::new_v4();
        let event = AccommodationEvent::Created(SleepingAccommodationCreated {
            accommodation_id,
            name: "Attic".to_string(),
            accommodation_type: AccommodationType::Mattress,
            max_capacity: 2,
            created_at: Utc::now(),
        });

        let pending = PendingEvent::from_domain(&event).unwrap();

        assert_eq!(pending.event_type, "SleepingAccommodationCreated");
        assert_eq!(pending.payload["accommodation_id"], serde_json::json!(accommodation_id));
        assert_eq!(pending.payload["accommodation_type"], "mattress");
    }
}
