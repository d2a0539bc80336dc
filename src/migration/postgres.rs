//! PostgreSQL legacy source and maintenance store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    LegacyAccommodation, LegacyBooking, LegacyBookingItem, LegacySource, MaintenanceStore,
    MigrationError, RollbackError, RollbackReport,
};

type BookingRow = (
    Uuid,
    Uuid,
    NaiveDate,
    NaiveDate,
    String,
    Option<String>,
    DateTime<Utc>,
);

/// Legacy `sleeping_accommodations`, `bookings` and `booking_items` tables
#[derive(Debug, Clone)]
pub struct PgLegacySource {
    pool: PgPool,
}

impl PgLegacySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LegacySource for PgLegacySource {
    async fn accommodations(&self) -> Result<Vec<LegacyAccommodation>, MigrationError> {
        let rows: Vec<(Uuid, String, String, i32, bool, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, name, accommodation_type, max_capacity, is_active, created_at
            FROM sleeping_accommodations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, accommodation_type, max_capacity, is_active, created_at)| {
                    LegacyAccommodation {
                        id,
                        name,
                        accommodation_type,
                        max_capacity,
                        is_active,
                        created_at,
                    }
                },
            )
            .collect())
    }

    async fn bookings(&self) -> Result<Vec<LegacyBooking>, MigrationError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, start_date, end_date, status, notes, created_at
            FROM bookings
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let item_rows: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
            r#"
            SELECT booking_id, accommodation_id, person_count
            FROM booking_items
            ORDER BY booking_id, accommodation_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<LegacyBookingItem>> = HashMap::new();
        for (booking_id, accommodation_id, person_count) in item_rows {
            items.entry(booking_id).or_default().push(LegacyBookingItem {
                accommodation_id,
                person_count,
            });
        }

        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, start_date, end_date, status, notes, created_at)| LegacyBooking {
                    id,
                    user_id,
                    start_date,
                    end_date,
                    status,
                    notes,
                    items: items.remove(&id).unwrap_or_default(),
                    created_at,
                },
            )
            .collect())
    }
}

/// Deletes event-sourced data inside one transaction
#[derive(Debug, Clone)]
pub struct PgMaintenanceStore {
    pool: PgPool,
}

impl PgMaintenanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceStore for PgMaintenanceStore {
    async fn delete_aggregate_type(
        &self,
        aggregate_type: &str,
        read_model_table: &str,
    ) -> Result<RollbackReport, RollbackError> {
        let mut tx = self.pool.begin().await?;

        let events_deleted = sqlx::query("DELETE FROM events WHERE aggregate_type = $1")
            .bind(aggregate_type)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let snapshots_deleted = sqlx::query("DELETE FROM snapshots WHERE aggregate_type = $1")
            .bind(aggregate_type)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Table names come from ReadModel::TABLE constants, never from input
        let read_models_deleted = sqlx::query(&format!("DELETE FROM {}", read_model_table))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(RollbackReport {
            aggregate_type: aggregate_type.to_string(),
            events_deleted,
            snapshots_deleted,
            read_models_deleted,
        })
    }
}
