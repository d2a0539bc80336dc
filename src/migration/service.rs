//! Migration Service
//!
//! One-way conversion of legacy rows into event histories, and the
//! destructive rollback that undoes it for one aggregate type.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Booking, SleepingAccommodation};
use crate::cache::ReadModelCache;
use crate::domain::OperationContext;
use crate::projection::{
    AccommodationReadModel, BookingReadModel, ProjectionStatus, ReadModel, ReadModelStore,
};
use crate::repository::Repository;

use super::{LegacyRow, LegacySource, MigrationError, RollbackError};

/// Rows removed by a rollback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub aggregate_type: String,
    pub events_deleted: u64,
    pub snapshots_deleted: u64,
    pub read_models_deleted: u64,
}

/// Destructive maintenance on the event-sourced tables
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Delete every event, snapshot and read model of an aggregate type in
    /// one atomic unit
    async fn delete_aggregate_type(
        &self,
        aggregate_type: &str,
        read_model_table: &str,
    ) -> Result<RollbackReport, RollbackError>;
}

/// Per aggregate type counts of one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub migrated: usize,
    /// Rows that already had an event history and a read model
    pub skipped: usize,
    /// Rows that had an event history but no read model, now projected
    pub repaired: usize,
    pub failed: usize,
    /// Rows whose read model could not be written; a re-run retries them
    pub projection_lagging: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub aggregate_type: &'static str,
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub accommodations: MigrationCounts,
    pub bookings: MigrationCounts,
    pub failures: Vec<RowFailure>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn migrated(&self) -> usize {
        self.accommodations.migrated + self.bookings.migrated
    }
}

/// Progress of the migration for one aggregate type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub aggregate_type: &'static str,
    pub legacy_rows: usize,
    /// Legacy rows that have an event history and a read model
    pub migrated_rows: usize,
    /// Aggregates of this type in the event store, migrated or not
    pub event_sourced: usize,
}

impl MigrationStatus {
    pub fn is_required(&self) -> bool {
        self.migrated_rows < self.legacy_rows
    }
}

/// Where the rows of one aggregate type end up: the repository that stores
/// their events and the store holding their read models
pub struct MigrationTarget<A: Aggregate, M: ReadModel> {
    pub repository: Arc<Repository<A>>,
    pub read_models: Arc<dyn ReadModelStore<M>>,
}

impl<A: Aggregate, M: ReadModel> MigrationTarget<A, M> {
    pub fn new(repository: Arc<Repository<A>>, read_models: Arc<dyn ReadModelStore<M>>) -> Self {
        Self {
            repository,
            read_models,
        }
    }
}

/// Migration Service
pub struct MigrationService {
    legacy: Arc<dyn LegacySource>,
    maintenance: Arc<dyn MaintenanceStore>,
    accommodations: MigrationTarget<SleepingAccommodation, AccommodationReadModel>,
    bookings: MigrationTarget<Booking, BookingReadModel>,
    accommodation_cache: Option<ReadModelCache<Uuid, AccommodationReadModel>>,
    booking_cache: Option<ReadModelCache<Uuid, BookingReadModel>>,
}

impl MigrationService {
    pub fn new(
        legacy: Arc<dyn LegacySource>,
        maintenance: Arc<dyn MaintenanceStore>,
        accommodations: MigrationTarget<SleepingAccommodation, AccommodationReadModel>,
        bookings: MigrationTarget<Booking, BookingReadModel>,
    ) -> Self {
        Self {
            legacy,
            maintenance,
            accommodations,
            bookings,
            accommodation_cache: None,
            booking_cache: None,
        }
    }

    /// Caches to clear after a rollback
    pub fn with_caches(
        mut self,
        accommodations: ReadModelCache<Uuid, AccommodationReadModel>,
        bookings: ReadModelCache<Uuid, BookingReadModel>,
    ) -> Self {
        self.accommodation_cache = Some(accommodations);
        self.booking_cache = Some(bookings);
        self
    }

    pub async fn status(&self, aggregate_type: &str) -> Result<MigrationStatus, MigrationError> {
        if aggregate_type == SleepingAccommodation::aggregate_type() {
            let rows = self.legacy.accommodations().await?;
            status_for(&self.accommodations, &rows).await
        } else if aggregate_type == Booking::aggregate_type() {
            let rows = self.legacy.bookings().await?;
            status_for(&self.bookings, &rows).await
        } else {
            Err(MigrationError::UnknownAggregateType(aggregate_type.to_string()))
        }
    }

    /// True while some legacy row has no event history or no read model
    pub async fn is_migration_required(&self) -> Result<bool, MigrationError> {
        for aggregate_type in [
            SleepingAccommodation::aggregate_type(),
            Booking::aggregate_type(),
        ] {
            if self.status(aggregate_type).await?.is_required() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Convert every legacy row without history and project rows whose read
    /// model is missing. Safe to re-run.
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        let mut context = OperationContext::new().with_source("migration");
        let run_id = context.ensure_correlation_id();
        tracing::info!(%run_id, "Migration started");

        let mut report = MigrationReport::default();

        // Accommodations first so booking read models can resolve their names
        let accommodations = self.legacy.accommodations().await?;
        report.accommodations = migrate_rows(
            &self.accommodations,
            &accommodations,
            &context,
            &mut report.failures,
        )
        .await;

        let bookings = self.legacy.bookings().await?;
        report.bookings =
            migrate_rows(&self.bookings, &bookings, &context, &mut report.failures).await;

        if report.is_complete() {
            tracing::info!(
                %run_id,
                accommodations = report.accommodations.migrated,
                bookings = report.bookings.migrated,
                skipped = report.accommodations.skipped + report.bookings.skipped,
                "Migration finished"
            );
        } else {
            tracing::warn!(
                %run_id,
                migrated = report.migrated(),
                failed = report.failures.len(),
                "Migration finished with failures, re-run after fixing the rows"
            );
        }

        Ok(report)
    }

    /// Delete all events, snapshots and read models of `aggregate_type`.
    ///
    /// Destructive; meant for recovering from a bad migration.
    pub async fn rollback(&self, aggregate_type: &str) -> Result<RollbackReport, RollbackError> {
        let table = if aggregate_type == SleepingAccommodation::aggregate_type() {
            AccommodationReadModel::TABLE
        } else if aggregate_type == Booking::aggregate_type() {
            BookingReadModel::TABLE
        } else {
            return Err(RollbackError::UnknownAggregateType(aggregate_type.to_string()));
        };

        tracing::warn!(aggregate_type, "Rolling back event-sourced data");
        let report = self
            .maintenance
            .delete_aggregate_type(aggregate_type, table)
            .await?;

        if table == AccommodationReadModel::TABLE {
            if let Some(cache) = &self.accommodation_cache {
                cache.invalidate_all();
            }
        } else if let Some(cache) = &self.booking_cache {
            cache.invalidate_all();
        }

        tracing::warn!(
            aggregate_type,
            events = report.events_deleted,
            snapshots = report.snapshots_deleted,
            read_models = report.read_models_deleted,
            "Rollback finished"
        );
        Ok(report)
    }
}

async fn status_for<R: LegacyRow>(
    target: &MigrationTarget<R::Aggregate, R::Model>,
    rows: &[R],
) -> Result<MigrationStatus, MigrationError> {
    let aggregate_type = R::Aggregate::aggregate_type();
    let store = target.repository.event_store();

    let mut migrated_rows = 0;
    for row in rows {
        if store.latest_version(row.id(), aggregate_type).await?.is_some()
            && target.read_models.get(row.id()).await?.is_some()
        {
            migrated_rows += 1;
        }
    }

    Ok(MigrationStatus {
        aggregate_type,
        legacy_rows: rows.len(),
        migrated_rows,
        event_sourced: store.aggregate_ids(aggregate_type).await?.len(),
    })
}

async fn migrate_rows<R: LegacyRow>(
    target: &MigrationTarget<R::Aggregate, R::Model>,
    rows: &[R],
    context: &OperationContext,
    failures: &mut Vec<RowFailure>,
) -> MigrationCounts {
    let aggregate_type = R::Aggregate::aggregate_type();
    let repository = &target.repository;
    let mut counts = MigrationCounts::default();

    for row in rows {
        let id = row.id();
        let mut fail = |error: String| {
            tracing::warn!(aggregate_type, %id, %error, "Legacy row not migrated");
            failures.push(RowFailure {
                aggregate_type,
                id,
                error,
            });
        };

        match repository.event_store().latest_version(id, aggregate_type).await {
            Ok(Some(_)) => {
                match repair_read_model(target, id).await {
                    Ok(Repair::NotNeeded) => counts.skipped += 1,
                    Ok(Repair::Projected) => counts.repaired += 1,
                    Ok(Repair::Lagging) => counts.projection_lagging += 1,
                    Err(e) => {
                        fail(e);
                        counts.failed += 1;
                    }
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                fail(e.to_string());
                counts.failed += 1;
                continue;
            }
        }

        let events = match row.to_events() {
            Ok(events) => events,
            Err(e) => {
                fail(e.to_string());
                counts.failed += 1;
                continue;
            }
        };

        match repository
            .save(&R::Aggregate::default(), events, context)
            .await
        {
            Ok(saved) => {
                counts.migrated += 1;
                if saved.projection.is_failed() {
                    counts.projection_lagging += 1;
                }
            }
            // Migrated concurrently by another run
            Err(e) if e.is_concurrency_conflict() => counts.skipped += 1,
            Err(e) => {
                fail(e.to_string());
                counts.failed += 1;
            }
        }
    }

    counts
}

enum Repair {
    NotNeeded,
    Projected,
    Lagging,
}

/// Project the history of an already migrated row if its read model is missing
async fn repair_read_model<A: Aggregate, M: ReadModel>(
    target: &MigrationTarget<A, M>,
    id: Uuid,
) -> Result<Repair, String> {
    if target
        .read_models
        .get(id)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Ok(Repair::NotNeeded);
    }

    let status = target
        .repository
        .reproject(id)
        .await
        .map_err(|e| e.to_string())?;
    match status {
        ProjectionStatus::Applied(_) => {
            tracing::info!(
                aggregate_type = A::aggregate_type(),
                %id,
                "Read model of migrated row rebuilt"
            );
            Ok(Repair::Projected)
        }
        ProjectionStatus::Failed(e) => {
            tracing::warn!(
                aggregate_type = A::aggregate_type(),
                %id,
                error = %e,
                "Read model of migrated row still missing"
            );
            Ok(Repair::Lagging)
        }
        ProjectionStatus::Skipped => Ok(Repair::Lagging),
    }
}
