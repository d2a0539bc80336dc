//! Migration module
//!
//! Moves pre-existing relational data into the event store and can remove
//! the event-sourced data of an aggregate type again.

mod error;
mod legacy;
mod postgres;
mod service;

pub use error::{ConversionError, MigrationError, RollbackError};
pub use legacy::{
    LegacyAccommodation, LegacyBooking, LegacyBookingItem, LegacyRow, LegacySource,
};
pub use postgres::{PgLegacySource, PgMaintenanceStore};
pub use service::{
    MaintenanceStore, MigrationCounts, MigrationReport, MigrationService, MigrationStatus,
    MigrationTarget, RollbackReport, RowFailure,
};
