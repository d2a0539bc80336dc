//! PostgreSQL event and snapshot stores
//!
//! The `events` table carries a unique constraint on `(aggregate_id, version)`.
//! The version check inside the append transaction catches most conflicts;
//! the constraint catches the race between two transactions that both passed
//! the check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::aggregate::INITIAL_VERSION;
use crate::domain::OperationContext;

use super::{Committed, EventStore, EventStoreError, PendingEvent, Snapshot, SnapshotStore, StoredEvent};

const UNIQUE_VIOLATION: &str = "23505";

type EventRow = (
    Uuid,
    Uuid,
    String,
    String,
    serde_json::Value,
    serde_json::Value,
    i64,
    DateTime<Utc>,
);

fn into_stored_event(row: EventRow) -> StoredEvent {
    let (id, aggregate_id, aggregate_type, event_type, payload, context, version, created_at) = row;
    StoredEvent {
        id,
        aggregate_id,
        aggregate_type,
        event_type,
        payload,
        context,
        version,
        created_at,
    }
}

/// Event Store backed by the `events` table
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get current version of an aggregate inside the append transaction
    async fn current_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        let result: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM events WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id)
        .fetch_optional(&mut **tx)
        .await?
        .flatten();

        Ok(result.unwrap_or(INITIAL_VERSION))
    }
}

fn conflict_or_database(err: sqlx::Error, aggregate_id: Uuid, expected: i64) -> EventStoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: expected + 1,
            }
        }
        _ => EventStoreError::Database(err),
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        expected_version: i64,
        events: Vec<PendingEvent>,
        context: &OperationContext,
    ) -> Result<Committed, EventStoreError> {
        if events.is_empty() {
            return Ok(Committed {
                new_version: expected_version,
                events: Vec::new(),
            });
        }

        let context_json = serde_json::to_value(context)?;
        let mut tx = self.pool.begin().await?;

        let current_version = self.current_version(&mut tx, aggregate_id).await?;
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut stored = Vec::with_capacity(events.len());
        let mut version = expected_version;

        for event in events {
            version += 1;

            let created_at: DateTime<Utc> = sqlx::query_scalar(
                r#"
                INSERT INTO events (
                    id, aggregate_id, aggregate_type, event_type,
                    payload, context, version
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING created_at
                "#,
            )
            .bind(event.id)
            .bind(aggregate_id)
            .bind(aggregate_type)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(&context_json)
            .bind(version)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_or_database(e, aggregate_id, expected_version))?;

            stored.push(StoredEvent {
                id: event.id,
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                event_type: event.event_type,
                payload: event.payload,
                context: context_json.clone(),
                version,
                created_at,
            });
        }

        tx.commit()
            .await
            .map_err(|e| conflict_or_database(e, aggregate_id, expected_version))?;

        tracing::debug!(
            aggregate_type,
            %aggregate_id,
            new_version = version,
            count = stored.len(),
            "Events appended"
        );

        Ok(Committed {
            new_version: version,
            events: stored,
        })
    }

    async fn load(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_type, payload, context, version, created_at
            FROM events
            WHERE aggregate_id = $1 AND aggregate_type = $2 AND version > $3
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type)
        .bind(after_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_stored_event).collect())
    }

    async fn latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<i64>, EventStoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM events WHERE aggregate_id = $1 AND aggregate_type = $2
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<Uuid>, EventStoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT aggregate_id FROM events WHERE aggregate_type = $1
            "#,
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Snapshot Store backed by the `snapshots` table (one row per aggregate)
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn get_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row: Option<(serde_json::Value, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT payload, version, created_at
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(state, version, created_at)| Snapshot {
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            state,
            version,
            created_at,
        }))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_id, aggregate_type, payload, version, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_type, aggregate_id)
            DO UPDATE SET payload = EXCLUDED.payload, version = EXCLUDED.version, created_at = EXCLUDED.created_at
            WHERE snapshots.version < EXCLUDED.version
            "#,
        )
        .bind(snapshot.aggregate_id)
        .bind(&snapshot.aggregate_type)
        .bind(&snapshot.state)
        .bind(snapshot.version)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            "Snapshot saved for {} aggregate {} at version {}",
            snapshot.aggregate_type,
            snapshot.aggregate_id,
            snapshot.version
        );

        Ok(())
    }
}
