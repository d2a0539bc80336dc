//! Legacy relational rows
//!
//! Accommodations and bookings as stored before event sourcing, and their
//! translation into an equivalent event history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Booking, SleepingAccommodation};
use crate::domain::{
    AccommodationEvent, AccommodationType, BookingAccepted, BookingCancelled, BookingEvent,
    BookingItem, BookingStatus, DateRange, SleepingAccommodationDeactivated,
};

use crate::projection::{AccommodationReadModel, BookingReadModel, ReadModel};

use super::{ConversionError, MigrationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAccommodation {
    pub id: Uuid,
    pub name: String,
    pub accommodation_type: String,
    pub max_capacity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBookingItem {
    pub accommodation_id: Uuid,
    pub person_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub items: Vec<LegacyBookingItem>,
    pub created_at: DateTime<Utc>,
}

/// Read access to the legacy tables
#[async_trait]
pub trait LegacySource: Send + Sync {
    async fn accommodations(&self) -> Result<Vec<LegacyAccommodation>, MigrationError>;

    async fn bookings(&self) -> Result<Vec<LegacyBooking>, MigrationError>;
}

/// A legacy row that can be replaced by an event history
pub trait LegacyRow: Send + Sync {
    type Aggregate: Aggregate;
    /// Read model the migrated aggregate is projected into
    type Model: ReadModel;

    fn id(&self) -> Uuid;

    /// Creation event followed by the events reaching the row's known state
    fn to_events(&self) -> Result<Vec<<Self::Aggregate as Aggregate>::Event>, ConversionError>;
}

impl LegacyRow for LegacyAccommodation {
    type Aggregate = SleepingAccommodation;
    type Model = AccommodationReadModel;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_events(&self) -> Result<Vec<AccommodationEvent>, ConversionError> {
        let accommodation_type: AccommodationType =
            self.accommodation_type
                .parse()
                .map_err(|_| ConversionError::UnknownValue {
                    field: "accommodation_type",
                    value: self.accommodation_type.clone(),
                })?;

        let mut events = vec![SleepingAccommodation::create_at(
            self.id,
            &self.name,
            accommodation_type,
            self.max_capacity,
            self.created_at,
        )?];

        if !self.is_active {
            events.push(AccommodationEvent::Deactivated(
                SleepingAccommodationDeactivated {
                    accommodation_id: self.id,
                    reason: None,
                    deactivated_at: self.created_at,
                },
            ));
        }

        Ok(events)
    }
}

impl LegacyRow for LegacyBooking {
    type Aggregate = Booking;
    type Model = BookingReadModel;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_events(&self) -> Result<Vec<BookingEvent>, ConversionError> {
        let status: BookingStatus =
            self.status
                .parse()
                .map_err(|_| ConversionError::UnknownValue {
                    field: "status",
                    value: self.status.clone(),
                })?;

        let dates = DateRange::new(self.start_date, self.end_date)?;
        let items = self
            .items
            .iter()
            .map(|item| BookingItem::new(item.accommodation_id, item.person_count))
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = vec![Booking::create_at(
            self.id,
            self.user_id,
            dates,
            self.notes.clone(),
            items,
            self.created_at,
        )?];

        match status {
            BookingStatus::Pending => {}
            BookingStatus::Accepted => events.push(BookingEvent::Accepted(BookingAccepted {
                booking_id: self.id,
                accepted_at: self.created_at,
            })),
            BookingStatus::Cancelled => events.push(BookingEvent::Cancelled(BookingCancelled {
                booking_id: self.id,
                reason: None,
                cancelled_at: self.created_at,
            })),
        }

        Ok(events)
    }
}
