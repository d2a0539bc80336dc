//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use bunkhouse::handlers::LogNotifier;
use bunkhouse::memory::InMemoryStore;
use bunkhouse::migration::{LegacyAccommodation, LegacyBooking, LegacyBookingItem};
use bunkhouse::projection::{ProjectionError, ReadModel, ReadModelStore, RetryPolicy};
use bunkhouse::{Services, Settings, Stores};

/// Connect to the test database, or `None` when `DATABASE_URL` is unset.
///
/// Applies the schema and empties every table.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    bunkhouse::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        r#"
        TRUNCATE TABLE events, snapshots, booking_read_models, accommodation_read_models,
            booking_items, bookings, sleeping_accommodations, users CASCADE
        "#,
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    Some(pool)
}

/// Retry policy that gives up fast
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub fn test_settings() -> Settings {
    Settings {
        retry: quick_retry(3),
        ..Settings::default()
    }
}

/// Services over a fresh in-memory backend
pub fn memory_services() -> (InMemoryStore, Services) {
    let store = InMemoryStore::new();
    let services = Services::build(
        Stores::in_memory(&store),
        &test_settings(),
        Arc::new(LogNotifier),
    );
    (store, services)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).expect("valid day")
}

pub fn legacy_accommodation(name: &str, max_capacity: i32) -> LegacyAccommodation {
    LegacyAccommodation {
        id: Uuid::new_v4(),
        name: name.to_string(),
        accommodation_type: "room".to_string(),
        max_capacity,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn legacy_booking(user_id: Uuid, accommodation_id: Uuid, status: &str) -> LegacyBooking {
    LegacyBooking {
        id: Uuid::new_v4(),
        user_id,
        start_date: day(10),
        end_date: day(12),
        status: status.to_string(),
        notes: None,
        items: vec![LegacyBookingItem {
            accommodation_id,
            person_count: 2,
        }],
        created_at: Utc::now(),
    }
}

/// Read-model store over `InMemoryStore` whose first `failures` upserts fail
pub struct FlakyStore {
    inner: InMemoryStore,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore, failures: u32) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl<R: ReadModel> ReadModelStore<R> for FlakyStore {
    async fn get(&self, id: Uuid) -> Result<Option<R>, ProjectionError> {
        ReadModelStore::<R>::get(&self.inner, id).await
    }

    async fn upsert(&self, model: &R) -> Result<bool, ProjectionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(ProjectionError::Lookup("connection reset".into()));
        }
        ReadModelStore::<R>::upsert(&self.inner, model).await
    }

    async fn list(&self) -> Result<Vec<R>, ProjectionError> {
        ReadModelStore::<R>::list(&self.inner).await
    }

    async fn count(&self) -> Result<u64, ProjectionError> {
        ReadModelStore::<R>::count(&self.inner).await
    }
}
