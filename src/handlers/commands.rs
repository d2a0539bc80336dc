//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::AccommodationChanges;
use crate::domain::{AccommodationType, BookingItem};

// =========================================================================
// Booking commands
// =========================================================================

/// Command to create a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingCommand {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<BookingItem>,
}

impl CreateBookingCommand {
    pub fn new(user_id: Uuid, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            booking_id: Uuid::new_v4(),
            user_id,
            start_date,
            end_date,
            notes: None,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, accommodation_id: Uuid, person_count: i32) -> Self {
        self.items.push(BookingItem {
            accommodation_id,
            person_count,
        });
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBookingItemCommand {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
    pub person_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveBookingItemCommand {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePersonCountCommand {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
    pub person_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeBookingDatesCommand {
    pub booking_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeBookingNotesCommand {
    pub booking_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptBookingCommand {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingCommand {
    pub booking_id: Uuid,
    pub reason: Option<String>,
}

// =========================================================================
// Sleeping accommodation commands
// =========================================================================

/// Command to register a sleeping accommodation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccommodationCommand {
    pub accommodation_id: Uuid,
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub max_capacity: i32,
}

impl CreateAccommodationCommand {
    pub fn new(
        name: impl Into<String>,
        accommodation_type: AccommodationType,
        max_capacity: i32,
    ) -> Self {
        Self {
            accommodation_id: Uuid::new_v4(),
            name: name.into(),
            accommodation_type,
            max_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAccommodationCommand {
    pub accommodation_id: Uuid,
    pub changes: AccommodationChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateAccommodationCommand {
    pub accommodation_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivateAccommodationCommand {
    pub accommodation_id: Uuid,
}

// =========================================================================
// Results
// =========================================================================

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub aggregate_id: Uuid,
    /// Aggregate version after the command
    pub version: i64,
    /// The events are committed but the read model has not caught up
    pub read_model_lagging: bool,
}
