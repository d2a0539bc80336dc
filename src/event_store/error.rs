//! Event and snapshot store errors

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// The aggregate moved past the version the writer decided on
    #[error("Version conflict on {aggregate_id}: writer expected {expected}, store is at {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Event payload or operation context could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}
