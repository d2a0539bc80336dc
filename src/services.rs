//! Service wiring
//!
//! Builds repositories, projection engines, handlers, queries and the
//! migration service on top of one set of stores. The same wiring serves
//! the PostgreSQL backend and the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Booking, SleepingAccommodation};
use crate::cache::ReadModelCache;
use crate::config::Config;
use crate::event_store::{EventStore, PgEventStore, PgSnapshotStore, SnapshotStore};
use crate::handlers::{AccommodationCommandHandler, BookingCommandHandler, Notifier};
use crate::memory::InMemoryStore;
use crate::migration::{
    LegacySource, MaintenanceStore, MigrationService, MigrationTarget, PgLegacySource,
    PgMaintenanceStore,
};
use crate::projection::{
    AccommodationProjection, AccommodationReadModel, BookingProjection, BookingReadModel,
    CatchUpReport, PgReadModelStore, PgUserDirectory, ProjectionEngine, ProjectionError, ReadModelStore,
    RetryPolicy, UserDirectory,
};
use crate::queries::{AccommodationQueries, BookingQueries};
use crate::repository::Repository;

/// Storage backends
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub bookings: Arc<dyn ReadModelStore<BookingReadModel>>,
    pub accommodations: Arc<dyn ReadModelStore<AccommodationReadModel>>,
    pub users: Arc<dyn UserDirectory>,
    pub legacy: Arc<dyn LegacySource>,
    pub maintenance: Arc<dyn MaintenanceStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            events: Arc::new(PgEventStore::new(pool.clone())),
            snapshots: Arc::new(PgSnapshotStore::new(pool.clone())),
            bookings: Arc::new(PgReadModelStore::<BookingReadModel>::new(pool.clone())),
            accommodations: Arc::new(PgReadModelStore::<AccommodationReadModel>::new(
                pool.clone(),
            )),
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            legacy: Arc::new(PgLegacySource::new(pool.clone())),
            maintenance: Arc::new(PgMaintenanceStore::new(pool)),
        }
    }

    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            events: Arc::new(store.clone()),
            snapshots: Arc::new(store.clone()),
            bookings: Arc::new(store.clone()),
            accommodations: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            legacy: Arc::new(store.clone()),
            maintenance: Arc::new(store.clone()),
        }
    }
}

/// Tunables of the write and read paths
#[derive(Debug, Clone)]
pub struct Settings {
    pub snapshot_interval: u64,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            snapshot_interval: config.snapshot_interval,
            retry: config.retry_policy(),
            cache_ttl: config.cache_ttl,
        }
    }
}

/// Everything the API and the binary need
#[derive(Clone)]
pub struct Services {
    pub events: Arc<dyn EventStore>,
    pub bookings: Arc<BookingCommandHandler>,
    pub accommodations: Arc<AccommodationCommandHandler>,
    pub booking_queries: BookingQueries,
    pub accommodation_queries: AccommodationQueries,
    pub booking_projection: Arc<ProjectionEngine<BookingProjection>>,
    pub accommodation_projection: Arc<ProjectionEngine<AccommodationProjection>>,
    pub migration: Arc<MigrationService>,
}

impl Services {
    pub fn build(stores: Stores, settings: &Settings, notifier: Arc<dyn Notifier>) -> Self {
        let booking_cache: ReadModelCache<Uuid, BookingReadModel> =
            ReadModelCache::new(settings.cache_ttl);
        let accommodation_cache: ReadModelCache<Uuid, AccommodationReadModel> =
            ReadModelCache::new(settings.cache_ttl);

        let accommodation_projection = Arc::new(
            ProjectionEngine::new(
                AccommodationProjection,
                stores.accommodations.clone(),
                settings.retry.clone(),
            )
            .with_cache(accommodation_cache.clone())
            .with_event_store(stores.events.clone()),
        );
        let booking_projection = Arc::new(
            ProjectionEngine::new(
                BookingProjection::new(stores.users.clone(), stores.accommodations.clone()),
                stores.bookings.clone(),
                settings.retry.clone(),
            )
            .with_cache(booking_cache.clone())
            .with_event_store(stores.events.clone()),
        );

        let accommodation_repository = Arc::new(
            Repository::<SleepingAccommodation>::new(
                stores.events.clone(),
                stores.snapshots.clone(),
                settings.snapshot_interval,
            )
            .with_projection(accommodation_projection.clone()),
        );
        let booking_repository = Arc::new(
            Repository::<Booking>::new(
                stores.events.clone(),
                stores.snapshots.clone(),
                settings.snapshot_interval,
            )
            .with_projection(booking_projection.clone()),
        );

        let migration = MigrationService::new(
            stores.legacy.clone(),
            stores.maintenance.clone(),
            MigrationTarget::new(accommodation_repository.clone(), stores.accommodations.clone()),
            MigrationTarget::new(booking_repository.clone(), stores.bookings.clone()),
        )
        .with_caches(accommodation_cache.clone(), booking_cache.clone());

        Self {
            events: stores.events.clone(),
            bookings: Arc::new(BookingCommandHandler::new(
                booking_repository,
                stores.accommodations.clone(),
                stores.users.clone(),
                notifier,
            )),
            accommodations: Arc::new(AccommodationCommandHandler::new(accommodation_repository)),
            booking_queries: BookingQueries::new(stores.bookings.clone(), booking_cache),
            accommodation_queries: AccommodationQueries::new(
                stores.accommodations.clone(),
                accommodation_cache,
            ),
            booking_projection,
            accommodation_projection,
            migration: Arc::new(migration),
        }
    }

    /// Bring read models up to date with the event store. Aggregates that
    /// cannot be caught up are listed in the report.
    pub async fn catch_up(&self) -> Result<CatchUpReport, ProjectionError> {
        // Accommodations first so booking read models can resolve their names
        let accommodations = self
            .accommodation_projection
            .catch_up_all(self.events.as_ref())
            .await?;
        let bookings = self
            .booking_projection
            .catch_up_all(self.events.as_ref())
            .await?;
        Ok(accommodations.merge(bookings))
    }

    /// Load all read models into the caches
    pub async fn warm_up(&self) -> Result<usize, ProjectionError> {
        let accommodations = self.accommodation_queries.warm_up().await?;
        let bookings = self.booking_queries.warm_up().await?;
        tracing::info!(accommodations, bookings, "Caches warmed up");
        Ok(accommodations + bookings)
    }
}
