//! PostgreSQL read-model storage
//!
//! Every read-model table has the same shape: `id`, `version`, the model as
//! JSONB in `data` and `updated_at`. The upsert only overwrites an older
//! version, so a replayed or late event never rolls a model back.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ProjectionError, ReadModel, ReadModelStore, UserDirectory};

/// Read-model store for `R` in table `R::TABLE`
#[derive(Debug)]
pub struct PgReadModelStore<R> {
    pool: PgPool,
    _model: PhantomData<fn() -> R>,
}

impl<R> Clone for PgReadModelStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _model: PhantomData,
        }
    }
}

impl<R: ReadModel> PgReadModelStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _model: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ReadModel> ReadModelStore<R> for PgReadModelStore<R> {
    async fn get(&self, id: Uuid) -> Result<Option<R>, ProjectionError> {
        let data: Option<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT data FROM {} WHERE id = $1", R::TABLE))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        data.map(serde_json::from_value)
            .transpose()
            .map_err(ProjectionError::from)
    }

    async fn upsert(&self, model: &R) -> Result<bool, ProjectionError> {
        let data = serde_json::to_value(model)?;

        let rows_affected = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (id, version, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET version = EXCLUDED.version,
                data = EXCLUDED.data,
                updated_at = NOW()
            WHERE {table}.version < EXCLUDED.version
            "#,
            table = R::TABLE
        ))
        .bind(model.id())
        .bind(model.version())
        .bind(data)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tracing::debug!(
                table = R::TABLE,
                id = %model.id(),
                version = model.version(),
                "Read model already at this version or newer"
            );
        }

        Ok(rows_affected > 0)
    }

    async fn list(&self) -> Result<Vec<R>, ProjectionError> {
        let rows: Vec<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT data FROM {} ORDER BY id", R::TABLE))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|data| serde_json::from_value(data).map_err(ProjectionError::from))
            .collect()
    }

    async fn count(&self) -> Result<u64, ProjectionError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", R::TABLE))
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

/// User names from the `users` table
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ProjectionError> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(name)
    }
}
