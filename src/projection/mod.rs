//! Projection module
//!
//! Updates read models from committed events. Read models are optimized for
//! queries and can always be rebuilt from the event store.

mod accommodation;
mod booking;
mod engine;
mod error;
mod postgres;
mod read_model;
mod retry;

pub use accommodation::AccommodationProjection;
pub use booking::{BookingProjection, UserDirectory};
pub use engine::{
    CatchUpReport, Projection, ProjectionEngine, ProjectionSink, ProjectionStatus,
};
pub use error::ProjectionError;
pub use postgres::{PgReadModelStore, PgUserDirectory};
pub use read_model::{
    AccommodationReadModel, BookingItemView, BookingReadModel, ReadModel, ReadModelStore,
};
pub use retry::RetryPolicy;
