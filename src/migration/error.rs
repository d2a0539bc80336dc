//! Migration and rollback errors

use crate::domain::DomainError;
use crate::event_store::EventStoreError;
use crate::projection::ProjectionError;

/// A migration run could not proceed.
///
/// Failures of single rows do not abort a run; they are collected in the
/// [`MigrationReport`](super::MigrationReport).
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// Read models could not be checked
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Unknown aggregate type: {0}")]
    UnknownAggregateType(String),
}

/// A legacy row cannot be expressed as events
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
}

/// Rollback failed; nothing was deleted
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown aggregate type: {0}")]
    UnknownAggregateType(String),
}
