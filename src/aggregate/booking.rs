//! Booking Aggregate
//!
//! A reservation of one or more sleeping accommodations for a date range.
//! Commands validate against the current state and return the events they
//! would produce; state only changes when those events are applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    BookingAccepted, BookingCancelled, BookingCreated, BookingDatesChanged, BookingEvent,
    BookingItem, BookingItemAdded, BookingItemPersonCountChanged, BookingItemRemoved,
    BookingNotesChanged, BookingStatus, DateRange, DomainError,
};

use super::{Aggregate, INITIAL_VERSION};

/// Booking Aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: Uuid,

    /// User the booking is made for
    user_id: Uuid,

    dates: Option<DateRange>,

    status: BookingStatus,

    notes: Option<String>,

    /// Accommodation allocations, each accommodation at most once
    items: Vec<BookingItem>,

    version: i64,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Default for Booking {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            dates: None,
            status: BookingStatus::Pending,
            notes: None,
            items: Vec::new(),
            version: INITIAL_VERSION,
            created_at: None,
            updated_at: None,
        }
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn ensure_distinct(items: &[BookingItem]) -> Result<(), DomainError> {
    for (idx, item) in items.iter().enumerate() {
        if item.person_count <= 0 {
            return Err(DomainError::InvalidPersonCount(item.person_count));
        }
        if items[..idx]
            .iter()
            .any(|other| other.accommodation_id == item.accommodation_id)
        {
            return Err(DomainError::DuplicateAccommodation(item.accommodation_id));
        }
    }
    Ok(())
}

impl Booking {
    // =========================================================================
    // Commands
    // =========================================================================

    /// Produce the creation event for a new booking
    pub fn create(
        booking_id: Uuid,
        user_id: Uuid,
        dates: DateRange,
        notes: Option<String>,
        items: Vec<BookingItem>,
    ) -> Result<BookingEvent, DomainError> {
        Self::create_at(booking_id, user_id, dates, notes, items, Utc::now())
    }

    /// [`create`](Self::create) with an explicit creation time, for imported bookings
    pub fn create_at(
        booking_id: Uuid,
        user_id: Uuid,
        dates: DateRange,
        notes: Option<String>,
        items: Vec<BookingItem>,
        created_at: DateTime<Utc>,
    ) -> Result<BookingEvent, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyBooking);
        }
        ensure_distinct(&items)?;

        Ok(BookingEvent::Created(BookingCreated {
            booking_id,
            user_id,
            start_date: dates.start(),
            end_date: dates.end(),
            notes: normalize_notes(notes),
            items,
            created_at,
        }))
    }

    /// Allocate another accommodation to this booking
    pub fn add_item(
        &self,
        accommodation_id: Uuid,
        person_count: i32,
    ) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        let item = BookingItem::new(accommodation_id, person_count)?;
        if self.contains_accommodation(accommodation_id) {
            return Err(DomainError::DuplicateAccommodation(accommodation_id));
        }

        Ok(BookingEvent::ItemAdded(BookingItemAdded {
            booking_id: self.id,
            accommodation_id: item.accommodation_id,
            person_count: item.person_count,
            added_at: Utc::now(),
        }))
    }

    /// Release an accommodation from this booking
    pub fn remove_item(&self, accommodation_id: Uuid) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        if !self.contains_accommodation(accommodation_id) {
            return Err(DomainError::AccommodationNotInBooking(accommodation_id));
        }
        if self.items.len() == 1 {
            return Err(DomainError::EmptyBooking);
        }

        Ok(BookingEvent::ItemRemoved(BookingItemRemoved {
            booking_id: self.id,
            accommodation_id,
            removed_at: Utc::now(),
        }))
    }

    /// Change how many persons sleep in an allocated accommodation
    pub fn change_person_count(
        &self,
        accommodation_id: Uuid,
        person_count: i32,
    ) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        let current = self
            .items
            .iter()
            .find(|item| item.accommodation_id == accommodation_id)
            .ok_or(DomainError::AccommodationNotInBooking(accommodation_id))?;
        if person_count <= 0 {
            return Err(DomainError::InvalidPersonCount(person_count));
        }
        if current.person_count == person_count {
            return Err(DomainError::NoChanges);
        }

        Ok(BookingEvent::ItemPersonCountChanged(BookingItemPersonCountChanged {
            booking_id: self.id,
            accommodation_id,
            person_count,
            changed_at: Utc::now(),
        }))
    }

    pub fn change_dates(&self, dates: DateRange) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        if self.dates == Some(dates) {
            return Err(DomainError::NoChanges);
        }

        Ok(BookingEvent::DatesChanged(BookingDatesChanged {
            booking_id: self.id,
            start_date: dates.start(),
            end_date: dates.end(),
            changed_at: Utc::now(),
        }))
    }

    /// Replace the notes; blank notes clear them
    pub fn change_notes(&self, notes: Option<String>) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        let notes = normalize_notes(notes);
        if notes == self.notes {
            return Err(DomainError::NoChanges);
        }

        Ok(BookingEvent::NotesChanged(BookingNotesChanged {
            booking_id: self.id,
            notes,
            changed_at: Utc::now(),
        }))
    }

    pub fn accept(&self) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;
        if self.status == BookingStatus::Accepted {
            return Err(DomainError::BookingAlreadyAccepted(self.id));
        }

        Ok(BookingEvent::Accepted(BookingAccepted {
            booking_id: self.id,
            accepted_at: Utc::now(),
        }))
    }

    /// Cancel the booking; cancellation is terminal
    pub fn cancel(&self, reason: Option<String>) -> Result<BookingEvent, DomainError> {
        self.ensure_modifiable()?;

        Ok(BookingEvent::Cancelled(BookingCancelled {
            booking_id: self.id,
            reason: normalize_notes(reason),
            cancelled_at: Utc::now(),
        }))
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if self.is_new() {
            return Err(DomainError::NotCreated(self.id));
        }
        if self.status == BookingStatus::Cancelled {
            return Err(DomainError::BookingCancelled(self.id));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn dates(&self) -> Option<DateRange> {
        self.dates
    }

    pub fn nights(&self) -> i64 {
        self.dates.map(|d| d.nights()).unwrap_or(0)
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn items(&self) -> &[BookingItem] {
        &self.items
    }

    pub fn contains_accommodation(&self, accommodation_id: Uuid) -> bool {
        self.items
            .iter()
            .any(|item| item.accommodation_id == accommodation_id)
    }

    /// Persons over all allocated accommodations
    pub fn total_person_count(&self) -> i32 {
        self.items.iter().map(|item| item.person_count).sum()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for Booking {
    type Event = BookingEvent;

    fn aggregate_type() -> &'static str {
        "BookingAggregate"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(mut self, event: &Self::Event) -> Self {
        match event {
            BookingEvent::Created(e) => {
                self.id = e.booking_id;
                self.user_id = e.user_id;
                // Stored dates are checked by EventPayload::validate on decode
                self.dates = DateRange::new(e.start_date, e.end_date).ok();
                self.status = BookingStatus::Pending;
                self.notes = e.notes.clone();
                self.items = e.items.clone();
                self.created_at = Some(e.created_at);
                self.updated_at = Some(e.created_at);
            }

            BookingEvent::Accepted(e) => {
                self.status = BookingStatus::Accepted;
                self.updated_at = Some(e.accepted_at);
            }

            BookingEvent::Cancelled(e) => {
                self.status = BookingStatus::Cancelled;
                self.updated_at = Some(e.cancelled_at);
            }

            BookingEvent::DatesChanged(e) => {
                self.dates = DateRange::new(e.start_date, e.end_date).ok();
                self.updated_at = Some(e.changed_at);
            }

            BookingEvent::NotesChanged(e) => {
                self.notes = e.notes.clone();
                self.updated_at = Some(e.changed_at);
            }

            BookingEvent::ItemAdded(e) => {
                self.items.push(BookingItem {
                    accommodation_id: e.accommodation_id,
                    person_count: e.person_count,
                });
                self.updated_at = Some(e.added_at);
            }

            BookingEvent::ItemRemoved(e) => {
                self.items
                    .retain(|item| item.accommodation_id != e.accommodation_id);
                self.updated_at = Some(e.removed_at);
            }

            BookingEvent::ItemPersonCountChanged(e) => {
                if let Some(item) = self
                    .items
                    .iter_mut()
                    .find(|item| item.accommodation_id == e.accommodation_id)
                {
                    item.person_count = e.person_count;
                }
                self.updated_at = Some(e.changed_at);
            }
        }

        self
    }
}
