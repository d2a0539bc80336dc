//! Replay engine
//!
//! Reconstructs aggregates by folding their event history onto a snapshot
//! or an empty state. The fold is pure: replaying `snapshot@v + events(v..]`
//! yields exactly the state of replaying every event from the beginning.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{DomainError, DomainEvent};
use crate::event_store::{Snapshot, StoredEvent};

use super::{Aggregate, EventRegistry};

/// History could not be turned back into an aggregate.
///
/// These errors mean the stored history is corrupt or belongs to another
/// aggregate type. They are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructionError {
    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("Malformed payload for event type {event_type}: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid payload for event type {event_type}: {source}")]
    InvalidPayload {
        event_type: String,
        #[source]
        source: DomainError,
    },

    #[error("Event {event_id} belongs to aggregate type {found}, expected {expected}")]
    AggregateTypeMismatch {
        event_id: Uuid,
        expected: String,
        found: String,
    },

    #[error("Event for aggregate {found} cannot be applied to aggregate {expected}")]
    AggregateIdMismatch { expected: Uuid, found: Uuid },

    #[error("Version gap for aggregate {aggregate_id}: expected {expected}, found {found}")]
    VersionGap {
        aggregate_id: Uuid,
        expected: i64,
        found: i64,
    },

    #[error("Malformed snapshot for aggregate {aggregate_id}: {source}")]
    MalformedSnapshot {
        aggregate_id: Uuid,
        #[source]
        source: serde_json::Error,
    },
}

/// Fold a single event at `version` onto `aggregate`.
///
/// `version` must directly follow the aggregate's current version.
pub fn apply_event<A: Aggregate>(
    aggregate: A,
    event: &A::Event,
    version: i64,
) -> Result<A, ReconstructionError> {
    let expected = aggregate.version() + 1;
    if version != expected {
        return Err(ReconstructionError::VersionGap {
            aggregate_id: event.aggregate_id(),
            expected,
            found: version,
        });
    }

    if !aggregate.is_new() && event.aggregate_id() != aggregate.id() {
        return Err(ReconstructionError::AggregateIdMismatch {
            expected: aggregate.id(),
            found: event.aggregate_id(),
        });
    }

    let mut next = aggregate.apply(event);
    next.set_version(version);
    Ok(next)
}

/// Rebuild an aggregate from an optional baseline and the stored events after it
pub fn rebuild<A: Aggregate>(
    baseline: Option<A>,
    events: Vec<StoredEvent>,
    registry: &EventRegistry<A::Event>,
) -> Result<A, ReconstructionError> {
    let mut aggregate = baseline.unwrap_or_default();

    for stored in events {
        if stored.aggregate_type != A::aggregate_type() {
            return Err(ReconstructionError::AggregateTypeMismatch {
                event_id: stored.id,
                expected: A::aggregate_type().to_string(),
                found: stored.aggregate_type,
            });
        }

        let event = registry.decode(&stored.event_type, stored.payload)?;
        if event.aggregate_id() != stored.aggregate_id {
            return Err(ReconstructionError::AggregateIdMismatch {
                expected: stored.aggregate_id,
                found: event.aggregate_id(),
            });
        }

        aggregate = apply_event(aggregate, &event, stored.version)?;
    }

    Ok(aggregate)
}

/// Restore the aggregate captured in a snapshot
pub fn restore_snapshot<A: Aggregate>(snapshot: Snapshot) -> Result<A, ReconstructionError> {
    if snapshot.aggregate_type != A::aggregate_type() {
        return Err(ReconstructionError::AggregateTypeMismatch {
            event_id: Uuid::nil(),
            expected: A::aggregate_type().to_string(),
            found: snapshot.aggregate_type,
        });
    }

    let aggregate_id = snapshot.aggregate_id;
    let mut aggregate: A = serde_json::from_value(snapshot.state)
        .map_err(|source| ReconstructionError::MalformedSnapshot { aggregate_id, source })?;
    aggregate.set_version(snapshot.version);
    Ok(aggregate)
}

/// Capture an aggregate as a snapshot at its current version
pub fn take_snapshot<A: Aggregate>(aggregate: &A) -> Result<Snapshot, serde_json::Error> {
    Ok(Snapshot {
        aggregate_id: aggregate.id(),
        aggregate_type: A::aggregate_type().to_string(),
        state: serde_json::to_value(aggregate)?,
        version: aggregate.version(),
        created_at: Utc::now(),
    })
}
