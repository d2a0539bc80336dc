//! Sleeping accommodation projection

use async_trait::async_trait;

use crate::aggregate::SleepingAccommodation;
use crate::domain::AccommodationEvent;
use crate::event_store::StoredEvent;

use super::{AccommodationReadModel, Projection, ProjectionError};

/// Projection of [`SleepingAccommodation`] events into [`AccommodationReadModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AccommodationProjection;

#[async_trait]
impl Projection for AccommodationProjection {
    type Aggregate = SleepingAccommodation;
    type Model = AccommodationReadModel;

    fn name(&self) -> &'static str {
        "accommodations"
    }

    async fn apply(
        &self,
        current: Option<AccommodationReadModel>,
        event: &AccommodationEvent,
        envelope: &StoredEvent,
    ) -> Result<AccommodationReadModel, ProjectionError> {
        if let AccommodationEvent::Created(e) = event {
            return Ok(AccommodationReadModel {
                id: e.accommodation_id,
                name: e.name.clone(),
                accommodation_type: e.accommodation_type,
                max_capacity: e.max_capacity,
                is_active: true,
                version: envelope.version,
                created_at: e.created_at,
                updated_at: e.created_at,
            });
        }

        let mut model = current.ok_or_else(|| ProjectionError::MissingReadModel {
            aggregate_id: envelope.aggregate_id,
            event_type: envelope.event_type.clone(),
        })?;

        match event {
            AccommodationEvent::Updated(e) => {
                model.name = e.name.clone();
                model.accommodation_type = e.accommodation_type;
                model.max_capacity = e.max_capacity;
                model.updated_at = e.updated_at;
            }
            AccommodationEvent::Deactivated(e) => {
                model.is_active = false;
                model.updated_at = e.deactivated_at;
            }
            AccommodationEvent::Reactivated(e) => {
                model.is_active = true;
                model.updated_at = e.reactivated_at;
            }
            AccommodationEvent::Created(_) => {}
        }

        Ok(model)
    }
}
