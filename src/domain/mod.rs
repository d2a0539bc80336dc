//! Domain module
//!
//! Core domain types and business logic.

pub mod context;
pub mod error;
pub mod events;
pub mod stay;

pub use context::OperationContext;
pub use error::DomainError;
pub use events::{
    AccommodationEvent, BookingAccepted, BookingCancelled, BookingCreated, BookingDatesChanged,
    BookingEvent, BookingItemAdded, BookingItemPersonCountChanged, BookingItemRemoved,
    BookingNotesChanged, DomainEvent, EventPayload, SleepingAccommodationCreated,
    SleepingAccommodationDeactivated, SleepingAccommodationReactivated,
    SleepingAccommodationUpdated,
};
pub use stay::{AccommodationType, BookingItem, BookingStatus, DateRange};
