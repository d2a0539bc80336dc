//! Projection engine
//!
//! Feeds committed events into a [`Projection`] and stores the resulting read
//! models. An event is applied only if it is exactly the next version for the
//! read model; older versions are skipped. A gap is filled from the event
//! store when the engine has one, otherwise it is reported as
//! [`ProjectionError::OutOfOrder`] and retried with backoff.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventRegistry, INITIAL_VERSION};
use crate::cache::ReadModelCache;
use crate::domain::DomainEvent;
use crate::event_store::{EventStore, StoredEvent};

use super::{ProjectionError, ReadModel, ReadModelStore, RetryPolicy};

type EventOf<P> = <<P as Projection>::Aggregate as Aggregate>::Event;

/// State transition from one read-model version to the next
#[async_trait]
pub trait Projection: Send + Sync + 'static {
    type Aggregate: Aggregate;
    type Model: ReadModel;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Produce the next model. `current` is `None` only for the first event.
    async fn apply(
        &self,
        current: Option<Self::Model>,
        event: &EventOf<Self>,
        envelope: &StoredEvent,
    ) -> Result<Self::Model, ProjectionError>;
}

/// Outcome of handing committed events to the projections
#[derive(Debug)]
pub enum ProjectionStatus {
    /// No projection is attached
    Skipped,
    /// Number of events that changed a read model
    Applied(usize),
    /// The read model lags; the events themselves are committed
    Failed(ProjectionError),
}

impl ProjectionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProjectionStatus::Failed(_))
    }
}

/// Result of catching up read models with the event store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Events that changed a read model
    pub applied: usize,
    /// Aggregates whose read model is still behind
    pub failed: Vec<Uuid>,
}

impl CatchUpReport {
    pub fn merge(mut self, other: CatchUpReport) -> Self {
        self.applied += other.applied;
        self.failed.extend(other.failed);
        self
    }
}

/// Receiver of newly committed events
#[async_trait]
pub trait ProjectionSink: Send + Sync {
    async fn dispatch(&self, events: &[StoredEvent]) -> ProjectionStatus;
}

/// Applies events to one read-model type
pub struct ProjectionEngine<P: Projection> {
    projection: P,
    store: Arc<dyn ReadModelStore<P::Model>>,
    registry: EventRegistry<EventOf<P>>,
    retry: RetryPolicy,
    cache: Option<ReadModelCache<Uuid, P::Model>>,
    events: Option<Arc<dyn EventStore>>,
}

impl<P: Projection> ProjectionEngine<P> {
    pub fn new(projection: P, store: Arc<dyn ReadModelStore<P::Model>>, retry: RetryPolicy) -> Self {
        Self {
            projection,
            store,
            registry: <EventOf<P> as DomainEvent>::registry(),
            retry,
            cache: None,
            events: None,
        }
    }

    /// Invalidate entries of `cache` whenever a read model is written
    pub fn with_cache(mut self, cache: ReadModelCache<Uuid, P::Model>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Read events missing from a read model out of `events` instead of
    /// failing with [`ProjectionError::OutOfOrder`]
    pub fn with_event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn ReadModelStore<P::Model>> {
        &self.store
    }

    /// Apply events with retry. Returns how many events changed a read model.
    pub async fn project(&self, events: &[StoredEvent]) -> Result<usize, ProjectionError> {
        let max_attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_project(events).await {
                Ok(applied) => return Ok(applied),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_retry(attempt);
                    tracing::warn!(
                        projection = self.projection.name(),
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %e,
                        "Projection attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(
                        projection = self.projection.name(),
                        attempts = attempt,
                        error = %e,
                        "Projection retries exhausted, read model is lagging"
                    );
                    return Err(ProjectionError::RetriesExhausted {
                        projection: self.projection.name(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(
                        projection = self.projection.name(),
                        error = %e,
                        "Projection failed permanently"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Single attempt over all events, grouped per aggregate in version order
    async fn try_project(&self, events: &[StoredEvent]) -> Result<usize, ProjectionError> {
        let mut by_aggregate: BTreeMap<Uuid, Vec<&StoredEvent>> = BTreeMap::new();
        for event in events
            .iter()
            .filter(|e| e.aggregate_type == P::Aggregate::aggregate_type())
        {
            by_aggregate.entry(event.aggregate_id).or_default().push(event);
        }

        let mut applied = 0;
        for (aggregate_id, mut group) in by_aggregate {
            group.sort_by_key(|e| e.version);
            applied += self.project_aggregate(aggregate_id, &group).await?;
        }
        Ok(applied)
    }

    async fn project_aggregate(
        &self,
        aggregate_id: Uuid,
        events: &[&StoredEvent],
    ) -> Result<usize, ProjectionError> {
        let mut model = self.store.get(aggregate_id).await?;
        let mut applied = 0;

        for envelope in events {
            let mut current_version = model.as_ref().map_or(INITIAL_VERSION, |m| m.version());

            if envelope.version > current_version + 1 {
                if let Some(missing) = self
                    .missing_events(aggregate_id, current_version, envelope.version)
                    .await?
                {
                    for gap in &missing {
                        applied += self.apply_envelope(aggregate_id, &mut model, gap).await?;
                    }
                    current_version = model.as_ref().map_or(INITIAL_VERSION, |m| m.version());
                }
            }

            if envelope.version <= current_version {
                tracing::debug!(
                    projection = self.projection.name(),
                    %aggregate_id,
                    version = envelope.version,
                    "Event already projected, skipping"
                );
                continue;
            }
            if envelope.version != current_version + 1 {
                return Err(ProjectionError::OutOfOrder {
                    aggregate_id,
                    expected: current_version + 1,
                    found: envelope.version,
                });
            }

            applied += self.apply_envelope(aggregate_id, &mut model, envelope).await?;
        }

        Ok(applied)
    }

    /// Stored events strictly between `after` and `before`, or `None` without
    /// an event store to read them from
    async fn missing_events(
        &self,
        aggregate_id: Uuid,
        after: i64,
        before: i64,
    ) -> Result<Option<Vec<StoredEvent>>, ProjectionError> {
        let Some(event_store) = &self.events else {
            return Ok(None);
        };

        tracing::debug!(
            projection = self.projection.name(),
            %aggregate_id,
            after,
            before,
            "Read model behind, loading missing events"
        );
        let mut missing = event_store
            .load(aggregate_id, P::Aggregate::aggregate_type(), after)
            .await?;
        missing.retain(|e| e.version < before);
        Ok(Some(missing))
    }

    /// Apply one event on top of `model` and store the result. Returns 1 if
    /// the read model was written.
    async fn apply_envelope(
        &self,
        aggregate_id: Uuid,
        model: &mut Option<P::Model>,
        envelope: &StoredEvent,
    ) -> Result<usize, ProjectionError> {
        let event = self
            .registry
            .decode(&envelope.event_type, envelope.payload.clone())?;
        let mut next = self.projection.apply(model.clone(), &event, envelope).await?;
        next.set_version(envelope.version);

        let written = self.store.upsert(&next).await?;
        if written {
            *model = Some(next);
        } else {
            // A concurrent writer got there first; continue from its copy
            *model = self.store.get(aggregate_id).await?;
        }

        if let Some(cache) = &self.cache {
            cache.invalidate(&aggregate_id);
        }
        Ok(usize::from(written))
    }

    /// Apply every stored event the read model has not incorporated yet
    pub async fn catch_up(
        &self,
        event_store: &dyn EventStore,
        aggregate_id: Uuid,
    ) -> Result<usize, ProjectionError> {
        let after = self
            .store
            .get(aggregate_id)
            .await?
            .map_or(INITIAL_VERSION, |m| m.version());
        let events = event_store
            .load(aggregate_id, P::Aggregate::aggregate_type(), after)
            .await?;

        if events.is_empty() {
            return Ok(0);
        }
        self.project(&events).await
    }

    /// [`catch_up`](Self::catch_up) for every aggregate of the projected type.
    ///
    /// A failing aggregate is logged and recorded in the report; the others
    /// are still caught up. Only listing the aggregates can fail the call.
    pub async fn catch_up_all(
        &self,
        event_store: &dyn EventStore,
    ) -> Result<CatchUpReport, ProjectionError> {
        let mut report = CatchUpReport::default();
        for aggregate_id in event_store
            .aggregate_ids(P::Aggregate::aggregate_type())
            .await?
        {
            match self.catch_up(event_store, aggregate_id).await {
                Ok(applied) => report.applied += applied,
                Err(e) => {
                    tracing::warn!(
                        projection = self.projection.name(),
                        %aggregate_id,
                        error = %e,
                        "Read model could not be caught up"
                    );
                    report.failed.push(aggregate_id);
                }
            }
        }

        tracing::info!(
            projection = self.projection.name(),
            applied = report.applied,
            failed = report.failed.len(),
            "Projection caught up"
        );
        Ok(report)
    }
}

#[async_trait]
impl<P: Projection> ProjectionSink for ProjectionEngine<P> {
    async fn dispatch(&self, events: &[StoredEvent]) -> ProjectionStatus {
        match self.project(events).await {
            Ok(applied) => ProjectionStatus::Applied(applied),
            Err(e) => ProjectionStatus::Failed(e),
        }
    }
}
