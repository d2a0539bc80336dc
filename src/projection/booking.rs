//! Booking projection
//!
//! Denormalizes bookings with the user's display name and the names of the
//! allocated accommodations.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::Booking;
use crate::domain::{BookingCreated, BookingEvent, BookingStatus};
use crate::event_store::StoredEvent;

use super::{
    AccommodationReadModel, BookingItemView, BookingReadModel, Projection, ProjectionError,
    ReadModelStore,
};

/// Source of user display names (the user table lives outside the core)
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ProjectionError>;
}

/// Projection of [`Booking`] events into [`BookingReadModel`]
pub struct BookingProjection {
    users: Arc<dyn UserDirectory>,
    accommodations: Arc<dyn ReadModelStore<AccommodationReadModel>>,
}

impl BookingProjection {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        accommodations: Arc<dyn ReadModelStore<AccommodationReadModel>>,
    ) -> Self {
        Self {
            users,
            accommodations,
        }
    }

    async fn item_view(
        &self,
        accommodation_id: Uuid,
        person_count: i32,
    ) -> Result<BookingItemView, ProjectionError> {
        let accommodation_name = self
            .accommodations
            .get(accommodation_id)
            .await?
            .map(|a| a.name);

        Ok(BookingItemView {
            accommodation_id,
            accommodation_name,
            person_count,
        })
    }

    async fn created(
        &self,
        event: &BookingCreated,
        envelope: &StoredEvent,
    ) -> Result<BookingReadModel, ProjectionError> {
        let user_name = self.users.display_name(event.user_id).await?;

        let mut items = Vec::with_capacity(event.items.len());
        for item in &event.items {
            items.push(self.item_view(item.accommodation_id, item.person_count).await?);
        }

        let mut model = BookingReadModel {
            id: event.booking_id,
            user_id: event.user_id,
            user_name,
            start_date: event.start_date,
            end_date: event.end_date,
            nights: 0,
            status: BookingStatus::Pending,
            notes: event.notes.clone(),
            items,
            total_persons: 0,
            version: envelope.version,
            created_at: event.created_at,
            updated_at: event.created_at,
        };
        model.refresh_totals();
        Ok(model)
    }
}

fn existing(
    current: Option<BookingReadModel>,
    envelope: &StoredEvent,
) -> Result<BookingReadModel, ProjectionError> {
    current.ok_or_else(|| ProjectionError::MissingReadModel {
        aggregate_id: envelope.aggregate_id,
        event_type: envelope.event_type.clone(),
    })
}

#[async_trait]
impl Projection for BookingProjection {
    type Aggregate = Booking;
    type Model = BookingReadModel;

    fn name(&self) -> &'static str {
        "bookings"
    }

    async fn apply(
        &self,
        current: Option<BookingReadModel>,
        event: &BookingEvent,
        envelope: &StoredEvent,
    ) -> Result<BookingReadModel, ProjectionError> {
        let model = match event {
            BookingEvent::Created(e) => self.created(e, envelope).await?,

            BookingEvent::Accepted(e) => {
                let mut model = existing(current, envelope)?;
                model.status = BookingStatus::Accepted;
                model.updated_at = e.accepted_at;
                model
            }

            BookingEvent::Cancelled(e) => {
                let mut model = existing(current, envelope)?;
                model.status = BookingStatus::Cancelled;
                model.updated_at = e.cancelled_at;
                model
            }

            BookingEvent::DatesChanged(e) => {
                let mut model = existing(current, envelope)?;
                model.start_date = e.start_date;
                model.end_date = e.end_date;
                model.updated_at = e.changed_at;
                model
            }

            BookingEvent::NotesChanged(e) => {
                let mut model = existing(current, envelope)?;
                model.notes = e.notes.clone();
                model.updated_at = e.changed_at;
                model
            }

            BookingEvent::ItemAdded(e) => {
                let mut model = existing(current, envelope)?;
                let view = self.item_view(e.accommodation_id, e.person_count).await?;
                model.items.push(view);
                model.updated_at = e.added_at;
                model
            }

            BookingEvent::ItemRemoved(e) => {
                let mut model = existing(current, envelope)?;
                model
                    .items
                    .retain(|item| item.accommodation_id != e.accommodation_id);
                model.updated_at = e.removed_at;
                model
            }

            BookingEvent::ItemPersonCountChanged(e) => {
                let mut model = existing(current, envelope)?;
                if let Some(item) = model
                    .items
                    .iter_mut()
                    .find(|item| item.accommodation_id == e.accommodation_id)
                {
                    item.person_count = e.person_count;
                }
                model.updated_at = e.changed_at;
                model
            }
        };

        let mut model = model;
        model.refresh_totals();
        Ok(model)
    }
}
