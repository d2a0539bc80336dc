//! Projection errors

use uuid::Uuid;

use crate::aggregate::ReconstructionError;
use crate::event_store::EventStoreError;

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// The read model is behind by more than one version
    #[error("Out-of-order event for {aggregate_id}: read model expects version {expected}, got {found}")]
    OutOfOrder {
        aggregate_id: Uuid,
        expected: i64,
        found: i64,
    },

    /// A non-creation event arrived for a read model that does not exist
    #[error("No read model for {aggregate_id} to apply {event_type} to")]
    MissingReadModel { aggregate_id: Uuid, event_type: String },

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Projection {projection} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        projection: &'static str,
        attempts: u32,
        last_error: String,
    },
}

impl ProjectionError {
    /// Check if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProjectionError::Database(_)
                | ProjectionError::EventStore(_)
                | ProjectionError::OutOfOrder { .. }
                | ProjectionError::Lookup(_)
        )
    }
}
