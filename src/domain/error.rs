//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations raised by aggregate commands.
///
/// A command that fails with a `DomainError` produces no events.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// The departure date is not after the arrival date
    #[error("Invalid date range: {start} to {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Person counts must be strictly positive
    #[error("Person count must be positive, got {0}")]
    InvalidPersonCount(i32),

    /// An accommodation may appear only once per booking
    #[error("Accommodation {0} is already part of this booking")]
    DuplicateAccommodation(Uuid),

    /// The booking has no item for the given accommodation
    #[error("Accommodation {0} is not part of this booking")]
    AccommodationNotInBooking(Uuid),

    /// A booking needs at least one accommodation item
    #[error("A booking needs at least one accommodation")]
    EmptyBooking,

    /// Cancelled bookings are terminal
    #[error("Booking {0} is cancelled")]
    BookingCancelled(Uuid),

    /// Only pending bookings can be accepted
    #[error("Booking {0} is already accepted")]
    BookingAlreadyAccepted(Uuid),

    /// Accommodation is deactivated and cannot be booked or changed
    #[error("Sleeping accommodation {0} is not active")]
    AccommodationInactive(Uuid),

    /// Accommodation is already active
    #[error("Sleeping accommodation {0} is already active")]
    AccommodationAlreadyActive(Uuid),

    /// More persons than the accommodation can hold
    #[error("Capacity exceeded for {accommodation_id}: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        accommodation_id: Uuid,
        requested: i32,
        capacity: i32,
    },

    /// Capacity must be strictly positive
    #[error("Capacity must be positive, got {0}")]
    InvalidCapacity(i32),

    /// Name must not be blank
    #[error("Name must not be empty")]
    EmptyName,

    /// The command would not change anything
    #[error("No changes provided")]
    NoChanges,

    /// The aggregate does not exist yet
    #[error("Aggregate {0} has not been created")]
    NotCreated(Uuid),

    /// The aggregate already exists
    #[error("Aggregate {0} already exists")]
    AlreadyCreated(Uuid),
}
