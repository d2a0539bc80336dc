//! Sleeping Accommodation Aggregate
//!
//! A bed, room, couch or similar place to sleep. Never deleted: deactivation
//! is the soft delete and can be undone by reactivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    AccommodationEvent, AccommodationType, DomainError, SleepingAccommodationCreated,
    SleepingAccommodationDeactivated, SleepingAccommodationReactivated,
    SleepingAccommodationUpdated,
};

use super::{Aggregate, INITIAL_VERSION};

/// Changes requested for an accommodation; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccommodationChanges {
    pub name: Option<String>,
    pub accommodation_type: Option<AccommodationType>,
    pub max_capacity: Option<i32>,
}

/// Sleeping Accommodation Aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepingAccommodation {
    id: Uuid,
    name: String,
    accommodation_type: AccommodationType,
    max_capacity: i32,
    is_active: bool,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Default for SleepingAccommodation {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            accommodation_type: AccommodationType::default(),
            max_capacity: 0,
            is_active: false,
            version: INITIAL_VERSION,
            created_at: None,
            updated_at: None,
        }
    }
}

fn validated_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::EmptyName);
    }
    Ok(name.to_string())
}

fn validated_capacity(max_capacity: i32) -> Result<i32, DomainError> {
    if max_capacity <= 0 {
        return Err(DomainError::InvalidCapacity(max_capacity));
    }
    Ok(max_capacity)
}

impl SleepingAccommodation {
    /// Produce the creation event for a new accommodation
    pub fn create(
        accommodation_id: Uuid,
        name: &str,
        accommodation_type: AccommodationType,
        max_capacity: i32,
    ) -> Result<AccommodationEvent, DomainError> {
        Self::create_at(accommodation_id, name, accommodation_type, max_capacity, Utc::now())
    }

    /// [`create`](Self::create) with an explicit creation time
    pub fn create_at(
        accommodation_id: Uuid,
        name: &str,
        accommodation_type: AccommodationType,
        max_capacity: i32,
        created_at: DateTime<Utc>,
    ) -> Result<AccommodationEvent, DomainError> {
        Ok(AccommodationEvent::Created(SleepingAccommodationCreated {
            accommodation_id,
            name: validated_name(name)?,
            accommodation_type,
            max_capacity: validated_capacity(max_capacity)?,
            created_at,
        }))
    }

    pub fn update(&self, changes: AccommodationChanges) -> Result<AccommodationEvent, DomainError> {
        self.ensure_created()?;
        if !self.is_active {
            return Err(DomainError::AccommodationInactive(self.id));
        }

        let name = match changes.name {
            Some(name) => validated_name(&name)?,
            None => self.name.clone(),
        };
        let accommodation_type = changes.accommodation_type.unwrap_or(self.accommodation_type);
        let max_capacity = match changes.max_capacity {
            Some(capacity) => validated_capacity(capacity)?,
            None => self.max_capacity,
        };

        if name == self.name
            && accommodation_type == self.accommodation_type
            && max_capacity == self.max_capacity
        {
            return Err(DomainError::NoChanges);
        }

        Ok(AccommodationEvent::Updated(SleepingAccommodationUpdated {
            accommodation_id: self.id,
            name,
            accommodation_type,
            max_capacity,
            updated_at: Utc::now(),
        }))
    }

    /// Deactivate the accommodation (soft delete)
    pub fn deactivate(&self, reason: Option<String>) -> Result<AccommodationEvent, DomainError> {
        self.ensure_created()?;
        if !self.is_active {
            return Err(DomainError::AccommodationInactive(self.id));
        }

        Ok(AccommodationEvent::Deactivated(SleepingAccommodationDeactivated {
            accommodation_id: self.id,
            reason,
            deactivated_at: Utc::now(),
        }))
    }

    pub fn reactivate(&self) -> Result<AccommodationEvent, DomainError> {
        self.ensure_created()?;
        if self.is_active {
            return Err(DomainError::AccommodationAlreadyActive(self.id));
        }

        Ok(AccommodationEvent::Reactivated(SleepingAccommodationReactivated {
            accommodation_id: self.id,
            reactivated_at: Utc::now(),
        }))
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if self.is_new() {
            return Err(DomainError::NotCreated(self.id));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accommodation_type(&self) -> AccommodationType {
        self.accommodation_type
    }

    pub fn max_capacity(&self) -> i32 {
        self.max_capacity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for SleepingAccommodation {
    type Event = AccommodationEvent;

    fn aggregate_type() -> &'static str {
        "SleepingAccommodationAggregate"
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
            AccommodationEvent::Created(e) => {
                self.id = e.accommodation_id;
                self.name = e.name.clone();
                self.accommodation_type = e.accommodation_type;
                self.max_capacity = e.max_capacity;
                self.is_active = true;
                self.created_at = Some(e.created_at);
                self.updated_at = Some(e.created_at);
            }

            AccommodationEvent::Updated(e) => {
                self.name = e.name.clone();
                self.accommodation_type = e.accommodation_type;
                self.max_capacity = e.max_capacity;
                self.updated_at = Some(e.updated_at);
            }

            AccommodationEvent::Deactivated(e) => {
                self.is_active = false;
                self.updated_at = Some(e.deactivated_at);
            }

            AccommodationEvent::Reactivated(e) => {
                self.is_active = true;
                self.updated_at = Some(e.reactivated_at);
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::replay::apply_event;

    fn room(capacity: i32) -> SleepingAccommodation {
        let event =
            SleepingAccommodation::create(Uuid::new_v4(), "Room A", AccommodationType::Room, capacity)
                .unwrap();
        apply_event(SleepingAccommodation::default(), &event, 0).unwrap()
    }

    #[test]
    fn test_create_accommodation() {
        let accommodation = room(4);

        assert_eq!(accommodation.name(), "Room A");
        assert_eq!(accommodation.max_capacity(), 4);
        assert!(accommodation.is_active());
        assert_eq!(accommodation.version(), 0);
    }

    #[test]
    fn test_create_validates_name_and_capacity() {
        assert_eq!(
            SleepingAccommodation::create(Uuid::new_v4(), "  ", AccommodationType::Bed, 1),
            Err(DomainError::EmptyName)
        );
        assert_eq!(
            SleepingAccommodation::create(Uuid::new_v4(), "Bunk", AccommodationType::Bed, 0),
            Err(DomainError::InvalidCapacity(0))
        );
    }

    #[test]
    fn test_update_accommodation() {
        let accommodation = room(4);
        assert_eq!(
            accommodation.update(AccommodationChanges {
                name: Some("Room A".to_string()),
                ..Default::default()
            }),
            Err(DomainError::NoChanges)
        );

        let event = accommodation
            .update(AccommodationChanges {
                max_capacity: Some(6),
                accommodation_type: Some(AccommodationType::Tent),
                ..Default::default()
            })
            .unwrap();
        let accommodation = apply_event(accommodation, &event, 1).unwrap();

        assert_eq!(accommodation.max_capacity(), 6);
        assert_eq!(accommodation.accommodation_type(), AccommodationType::Tent);
        assert_eq!(accommodation.name(), "Room A");
    }

    #[test]
    fn test_deactivate_and_reactivate() {
        let accommodation = room(2);
        assert_eq!(
            accommodation.reactivate(),
            Err(DomainError::AccommodationAlreadyActive(accommodation.id()))
        );

        let event = accommodation.deactivate(Some("Broken slats".to_string())).unwrap();
        let accommodation = apply_event(accommodation, &event, 1).unwrap();
        assert!(!accommodation.is_active());
        assert_eq!(
            accommodation.deactivate(None),
            Err(DomainError::AccommodationInactive(accommodation.id()))
        );
        assert!(accommodation
            .update(AccommodationChanges {
                max_capacity: Some(3),
                ..Default::default()
            })
            .is_err());

        let event = accommodation.reactivate().unwrap();
        let accommodation = apply_event(accommodation, &event, 2).unwrap();
        assert!(accommodation.is_active());
        assert_eq!(accommodation.version(), 2);
    }
}
