//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system. Each event
//! is a plain payload struct; the enums below only group the payloads that
//! belong to one aggregate type. The stored event-type tag selects the
//! payload struct on the way back in (see [`EventRegistry`]).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::EventRegistry;

use super::{AccommodationType, BookingItem, DateRange, DomainError};

/// A payload struct that is persisted under a fixed event-type tag
pub trait EventPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const EVENT_TYPE: &'static str;

    /// Invariants a decoded payload must hold before it is applied
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Capability shared by the event enums of every aggregate type
pub trait DomainEvent: std::fmt::Debug + Clone + Send + Sync + Sized + 'static {
    /// Tag stored in the `event_type` column
    fn event_type(&self) -> &'static str;

    /// Identity of the aggregate the event belongs to
    fn aggregate_id(&self) -> Uuid;

    /// Serialize the payload (without the tag)
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Decoders for every event type of this aggregate
    fn registry() -> EventRegistry<Self>;
}

macro_rules! event_payload {
    ($($payload:ident => $tag:literal),+ $(,)?) => {
        $(
            impl EventPayload for $payload {
                const EVENT_TYPE: &'static str = $tag;
            }
        )+
    };
}

// =========================================================================
// Booking events
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<BookingItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAccepted {
    pub booking_id: Uuid,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancelled {
    pub booking_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDatesChanged {
    pub booking_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingNotesChanged {
    pub booking_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItemAdded {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
    pub person_count: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItemRemoved {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItemPersonCountChanged {
    pub booking_id: Uuid,
    pub accommodation_id: Uuid,
    pub person_count: i32,
    pub changed_at: DateTime<Utc>,
}

impl EventPayload for BookingCreated {
    const EVENT_TYPE: &'static str = "BookingCreated";

    fn validate(&self) -> Result<(), DomainError> {
        DateRange::new(self.start_date, self.end_date).map(|_| ())
    }
}

impl EventPayload for BookingDatesChanged {
    const EVENT_TYPE: &'static str = "BookingDatesChanged";

    fn validate(&self) -> Result<(), DomainError> {
        DateRange::new(self.start_date, self.end_date).map(|_| ())
    }
}

event_payload! {
    BookingAccepted => "BookingAccepted",
    BookingCancelled => "BookingCancelled",
    BookingNotesChanged => "BookingNotesChanged",
    BookingItemAdded => "BookingItemAdded",
    BookingItemRemoved => "BookingItemRemoved",
    BookingItemPersonCountChanged => "BookingItemPersonCountChanged",
}

/// Booking-related events
#[derive(Debug, Clone, PartialEq)]
pub enum BookingEvent {
    Created(BookingCreated),
    Accepted(BookingAccepted),
    Cancelled(BookingCancelled),
    DatesChanged(BookingDatesChanged),
    NotesChanged(BookingNotesChanged),
    ItemAdded(BookingItemAdded),
    ItemRemoved(BookingItemRemoved),
    ItemPersonCountChanged(BookingItemPersonCountChanged),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::Created(_) => BookingCreated::EVENT_TYPE,
            BookingEvent::Accepted(_) => BookingAccepted::EVENT_TYPE,
            BookingEvent::Cancelled(_) => BookingCancelled::EVENT_TYPE,
            BookingEvent::DatesChanged(_) => BookingDatesChanged::EVENT_TYPE,
            BookingEvent::NotesChanged(_) => BookingNotesChanged::EVENT_TYPE,
            BookingEvent::ItemAdded(_) => BookingItemAdded::EVENT_TYPE,
            BookingEvent::ItemRemoved(_) => BookingItemRemoved::EVENT_TYPE,
            BookingEvent::ItemPersonCountChanged(_) => BookingItemPersonCountChanged::EVENT_TYPE,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            BookingEvent::Created(e) => e.booking_id,
            BookingEvent::Accepted(e) => e.booking_id,
            BookingEvent::Cancelled(e) => e.booking_id,
            BookingEvent::DatesChanged(e) => e.booking_id,
            BookingEvent::NotesChanged(e) => e.booking_id,
            BookingEvent::ItemAdded(e) => e.booking_id,
            BookingEvent::ItemRemoved(e) => e.booking_id,
            BookingEvent::ItemPersonCountChanged(e) => e.booking_id,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            BookingEvent::Created(e) => serde_json::to_value(e),
            BookingEvent::Accepted(e) => serde_json::to_value(e),
            BookingEvent::Cancelled(e) => serde_json::to_value(e),
            BookingEvent::DatesChanged(e) => serde_json::to_value(e),
            BookingEvent::NotesChanged(e) => serde_json::to_value(e),
            BookingEvent::ItemAdded(e) => serde_json::to_value(e),
            BookingEvent::ItemRemoved(e) => serde_json::to_value(e),
            BookingEvent::ItemPersonCountChanged(e) => serde_json::to_value(e),
        }
    }

    fn registry() -> EventRegistry<Self> {
        EventRegistry::new()
            .register(BookingEvent::Created)
            .register(BookingEvent::Accepted)
            .register(BookingEvent::Cancelled)
            .register(BookingEvent::DatesChanged)
            .register(BookingEvent::NotesChanged)
            .register(BookingEvent::ItemAdded)
            .register(BookingEvent::ItemRemoved)
            .register(BookingEvent::ItemPersonCountChanged)
    }
}

// =========================================================================
// Sleeping accommodation events
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepingAccommodationCreated {
    pub accommodation_id: Uuid,
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub max_capacity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepingAccommodationUpdated {
    pub accommodation_id: Uuid,
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub max_capacity: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepingAccommodationDeactivated {
    pub accommodation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub deactivated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepingAccommodationReactivated {
    pub accommodation_id: Uuid,
    pub reactivated_at: DateTime<Utc>,
}

event_payload! {
    SleepingAccommodationCreated => "SleepingAccommodationCreated",
    SleepingAccommodationUpdated => "SleepingAccommodationUpdated",
    SleepingAccommodationDeactivated => "SleepingAccommodationDeactivated",
    SleepingAccommodationReactivated => "SleepingAccommodationReactivated",
}

/// Sleeping-accommodation-related events
#[derive(Debug, Clone, PartialEq)]
pub enum AccommodationEvent {
    Created(SleepingAccommodationCreated),
    Updated(SleepingAccommodationUpdated),
    Deactivated(SleepingAccommodationDeactivated),
    Reactivated(SleepingAccommodationReactivated),
}

impl DomainEvent for AccommodationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccommodationEvent::Created(_) => SleepingAccommodationCreated::EVENT_TYPE,
            AccommodationEvent::Updated(_) => SleepingAccommodationUpdated::EVENT_TYPE,
            AccommodationEvent::Deactivated(_) => SleepingAccommodationDeactivated::EVENT_TYPE,
            AccommodationEvent::Reactivated(_) => SleepingAccommodationReactivated::EVENT_TYPE,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            AccommodationEvent::Created(e) => e.accommodation_id,
            AccommodationEvent::Updated(e) => e.accommodation_id,
            AccommodationEvent::Deactivated(e) => e.accommodation_id,
            AccommodationEvent::Reactivated(e) => e.accommodation_id,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            AccommodationEvent::Created(e) => serde_json::to_value(e),
            AccommodationEvent::Updated(e) => serde_json::to_value(e),
            AccommodationEvent::Deactivated(e) => serde_json::to_value(e),
            AccommodationEvent::Reactivated(e) => serde_json::to_value(e),
        }
    }

    fn registry() -> EventRegistry<Self> {
        EventRegistry::new()
            .register(AccommodationEvent::Created)
            .register(AccommodationEvent::Updated)
            .register(AccommodationEvent::Deactivated)
            .register(AccommodationEvent::Reactivated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_booking() -> BookingEvent {
        BookingEvent::Created(BookingCreated {
            booking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 3).unwrap(),
            notes: Some("Late arrival".to_string()),
            items: vec![BookingItem::new(Uuid::new_v4(), 2).unwrap()],
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_payload_round_trip_is_identical() {
        let event = created_booking();
        let registry = BookingEvent::registry();

        let payload = event.to_payload().unwrap();
        let decoded = registry.decode(event.event_type(), payload.clone()).unwrap();

        assert_eq!(decoded, event);
        assert_eq!(decoded.to_payload().unwrap(), payload);
        assert_eq!(
            serde_json::to_string(&decoded.to_payload().unwrap()).unwrap(),
            serde_json::to_string(&payload).unwrap()
        );
    }

    #[test]
    fn test_payload_does_not_embed_tag() {
        let payload = created_booking().to_payload().unwrap();
        assert!(payload.get("type").is_none());
        assert!(payload.get("booking_id").is_some());
    }

    #[test]
    fn test_every_event_type_is_registered() {
        let booking = BookingEvent::registry();
        for tag in [
            "BookingCreated",
            "BookingAccepted",
            "BookingCancelled",
            "BookingDatesChanged",
            "BookingNotesChanged",
            "BookingItemAdded",
            "BookingItemRemoved",
            "BookingItemPersonCountChanged",
        ] {
            assert!(booking.contains(tag), "{} missing", tag);
        }

        let accommodation = AccommodationEvent::registry();
        assert_eq!(accommodation.len(), 4);
        assert!(!accommodation.contains("BookingCreated"));
    }

    #[test]
    fn test_accommodation_event_accessors() {
        let id = Uuid::new_v4();
        let event = AccommodationEvent::Deactivated(SleepingAccommodationDeactivated {
            accommodation_id: id,
            reason: None,
            deactivated_at: Utc::now(),
        });

        assert_eq!(event.event_type(), "SleepingAccommodationDeactivated");
        assert_eq!(event.aggregate_id(), id);
    }
}
