//! Query handlers
//!
//! Read-through access to read models: the cache answers first, the
//! read-model store fills misses. Queries never touch the event store.
//! A value read from the store is not cached when a projection invalidated
//! the cache while the read was in flight.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::ReadModelCache;
use crate::projection::{
    AccommodationReadModel, BookingReadModel, ProjectionError, ReadModelStore,
};

/// Booking queries
#[derive(Clone)]
pub struct BookingQueries {
    store: Arc<dyn ReadModelStore<BookingReadModel>>,
    cache: ReadModelCache<Uuid, BookingReadModel>,
}

impl BookingQueries {
    pub fn new(
        store: Arc<dyn ReadModelStore<BookingReadModel>>,
        cache: ReadModelCache<Uuid, BookingReadModel>,
    ) -> Self {
        Self { store, cache }
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Option<BookingReadModel>, ProjectionError> {
        if let Some(booking) = self.cache.get(&id) {
            return Ok(Some(booking));
        }

        let epoch = self.cache.epoch();
        let booking = self.store.get(id).await?;
        if let Some(booking) = &booking {
            self.cache.insert_if_current(id, booking.clone(), epoch);
        }
        Ok(booking)
    }

    /// Bookings of one user, earliest arrival first
    pub async fn bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingReadModel>, ProjectionError> {
        let mut bookings = self.list_bookings().await?;
        bookings.retain(|b| b.user_id == user_id);
        Ok(bookings)
    }

    /// All bookings, earliest arrival first
    pub async fn list_bookings(&self) -> Result<Vec<BookingReadModel>, ProjectionError> {
        let mut bookings = self.store.list().await?;
        bookings.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    /// Load every booking into the cache
    pub async fn warm_up(&self) -> Result<usize, ProjectionError> {
        let bookings = self.store.list().await?;
        Ok(self.cache.warm_up(bookings, |b| b.id))
    }
}

/// Sleeping accommodation queries
#[derive(Clone)]
pub struct AccommodationQueries {
    store: Arc<dyn ReadModelStore<AccommodationReadModel>>,
    cache: ReadModelCache<Uuid, AccommodationReadModel>,
}

impl AccommodationQueries {
    pub fn new(
        store: Arc<dyn ReadModelStore<AccommodationReadModel>>,
        cache: ReadModelCache<Uuid, AccommodationReadModel>,
    ) -> Self {
        Self { store, cache }
    }

    pub async fn get_accommodation(
        &self,
        id: Uuid,
    ) -> Result<Option<AccommodationReadModel>, ProjectionError> {
        if let Some(accommodation) = self.cache.get(&id) {
            return Ok(Some(accommodation));
        }

        let epoch = self.cache.epoch();
        let accommodation = self.store.get(id).await?;
        if let Some(accommodation) = &accommodation {
            self.cache.insert_if_current(id, accommodation.clone(), epoch);
        }
        Ok(accommodation)
    }

    /// Active accommodations ordered by name
    pub async fn list_active(&self) -> Result<Vec<AccommodationReadModel>, ProjectionError> {
        let mut accommodations = self.list_all().await?;
        accommodations.retain(|a| a.is_active);
        Ok(accommodations)
    }

    /// All accommodations ordered by name, inactive ones included
    pub async fn list_all(&self) -> Result<Vec<AccommodationReadModel>, ProjectionError> {
        let mut accommodations = self.store.list().await?;
        accommodations.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(accommodations)
    }

    pub async fn warm_up(&self) -> Result<usize, ProjectionError> {
        let accommodations = self.store.list().await?;
        Ok(self.cache.warm_up(accommodations, |a| a.id))
    }
}
