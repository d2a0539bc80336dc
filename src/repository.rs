//! Aggregate repository
//!
//! Loads aggregates from the latest snapshot plus the events after it, and
//! saves the events a command produced with an optimistic version check.
//! Conflicts are returned to the caller as-is: whether to reload and retry is
//! a domain decision.

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{
    replay::{apply_event, rebuild, restore_snapshot, take_snapshot},
    Aggregate, EventRegistry, ReconstructionError, INITIAL_VERSION,
};
use crate::domain::{DomainEvent, OperationContext};
use crate::event_store::{
    EventStore, EventStoreError, PendingEvent, SnapshotStore, StoredEvent,
};
use crate::projection::{ProjectionSink, ProjectionStatus};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: Uuid,
    },

    #[error("Event for aggregate {found} cannot be saved with aggregate {expected}")]
    MixedAggregateIds { expected: Uuid, found: Uuid },
}

impl RepositoryError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, RepositoryError::EventStore(e) if e.is_concurrency_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::AggregateNotFound { .. })
    }
}

/// Outcome of [`Repository::save`]
#[derive(Debug)]
pub struct Saved<A> {
    /// The aggregate with the new events folded in
    pub aggregate: A,
    pub new_version: i64,
    pub events: Vec<StoredEvent>,
    pub projection: ProjectionStatus,
}

/// Whether going from `old_version` to `new_version` crosses a multiple of
/// `interval` events. An interval of 0 disables snapshots.
pub fn crosses_snapshot_threshold(old_version: i64, new_version: i64, interval: u64) -> bool {
    if interval == 0 || new_version <= old_version {
        return false;
    }
    let interval = interval as i64;
    (old_version + 1) / interval < (new_version + 1) / interval
}

/// Load/save orchestration for one aggregate type
pub struct Repository<A: Aggregate> {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    projections: Option<Arc<dyn ProjectionSink>>,
    snapshot_interval: u64,
    registry: EventRegistry<A::Event>,
}

impl<A: Aggregate> Repository<A> {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        snapshot_interval: u64,
    ) -> Self {
        Self {
            events,
            snapshots,
            projections: None,
            snapshot_interval,
            registry: <A::Event as DomainEvent>::registry(),
        }
    }

    /// Hand committed events to `sink` after every save
    pub fn with_projection(mut self, sink: Arc<dyn ProjectionSink>) -> Self {
        self.projections = Some(sink);
        self
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.events
    }

    /// Latest state, or `None` if the aggregate has neither snapshot nor events
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<A>, RepositoryError> {
        let baseline = match self.snapshots.get_latest(id, A::aggregate_type()).await? {
            Some(snapshot) => match restore_snapshot::<A>(snapshot) {
                Ok(aggregate) => Some(aggregate),
                Err(e) => {
                    tracing::warn!(
                        aggregate_type = A::aggregate_type(),
                        aggregate_id = %id,
                        error = %e,
                        "Ignoring unreadable snapshot, replaying full history"
                    );
                    None
                }
            },
            None => None,
        };

        let after = baseline.as_ref().map_or(INITIAL_VERSION, |a| a.version());
        let events = self.events.load(id, A::aggregate_type(), after).await?;

        if baseline.is_none() && events.is_empty() {
            return Ok(None);
        }

        let replayed = events.len();
        let aggregate = rebuild(baseline, events, &self.registry)?;

        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %id,
            version = aggregate.version(),
            replayed,
            "Aggregate loaded"
        );

        Ok(Some(aggregate))
    }

    pub async fn load(&self, id: Uuid) -> Result<A, RepositoryError> {
        self.get_by_id(id)
            .await?
            .ok_or(RepositoryError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            })
    }

    /// Append `new_events` produced against `aggregate`.
    ///
    /// The expected version is `aggregate.version()`, the version the command
    /// observed before producing its events.
    pub async fn save(
        &self,
        aggregate: &A,
        new_events: Vec<A::Event>,
        context: &OperationContext,
    ) -> Result<Saved<A>, RepositoryError> {
        let Some(first) = new_events.first() else {
            return Ok(Saved {
                aggregate: aggregate.clone(),
                new_version: aggregate.version(),
                events: Vec::new(),
                projection: ProjectionStatus::Skipped,
            });
        };

        let aggregate_id = if aggregate.is_new() {
            first.aggregate_id()
        } else {
            aggregate.id()
        };
        if let Some(foreign) = new_events
            .iter()
            .find(|e| e.aggregate_id() != aggregate_id)
        {
            return Err(RepositoryError::MixedAggregateIds {
                expected: aggregate_id,
                found: foreign.aggregate_id(),
            });
        }

        let expected_version = aggregate.version();
        let pending = new_events
            .iter()
            .map(PendingEvent::from_domain)
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self
            .events
            .append(
                aggregate_id,
                A::aggregate_type(),
                expected_version,
                pending,
                context,
            )
            .await?;

        let mut next = aggregate.clone();
        for (event, stored) in new_events.iter().zip(&committed.events) {
            next = apply_event(next, event, stored.version)?;
        }

        if crosses_snapshot_threshold(expected_version, committed.new_version, self.snapshot_interval) {
            self.write_snapshot(&next).await;
        }

        let projection = match &self.projections {
            Some(sink) => sink.dispatch(&committed.events).await,
            None => ProjectionStatus::Skipped,
        };
        if let ProjectionStatus::Failed(e) = &projection {
            tracing::warn!(
                aggregate_type = A::aggregate_type(),
                %aggregate_id,
                version = committed.new_version,
                error = %e,
                "Events committed but read model not updated"
            );
        }

        tracing::info!(
            aggregate_type = A::aggregate_type(),
            %aggregate_id,
            version = committed.new_version,
            events = committed.events.len(),
            "Aggregate saved"
        );

        Ok(Saved {
            aggregate: next,
            new_version: committed.new_version,
            events: committed.events,
            projection,
        })
    }

    /// Hand the whole history of `id` to the projection sink again. Events the
    /// read model already holds are skipped by the sink.
    pub async fn reproject(&self, id: Uuid) -> Result<ProjectionStatus, RepositoryError> {
        let Some(sink) = &self.projections else {
            return Ok(ProjectionStatus::Skipped);
        };
        let events = self
            .events
            .load(id, A::aggregate_type(), INITIAL_VERSION)
            .await?;
        if events.is_empty() {
            return Ok(ProjectionStatus::Skipped);
        }
        Ok(sink.dispatch(&events).await)
    }

    async fn write_snapshot(&self, aggregate: &A) {
        let result = match take_snapshot(aggregate) {
            Ok(snapshot) => self.snapshots.save(&snapshot).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(
                aggregate_type = A::aggregate_type(),
                aggregate_id = %aggregate.id(),
                version = aggregate.version(),
                error = %e,
                "Snapshot not written"
            );
        }
    }
}
