//! Event sourcing properties on the in-memory backend

use std::sync::Arc;

use bunkhouse::aggregate::{
    AccommodationChanges, Aggregate, Booking, ReconstructionError, SleepingAccommodation,
};
use bunkhouse::domain::{
    AccommodationType, BookingAccepted, BookingCreated, BookingEvent, BookingItem, DateRange,
    OperationContext,
};
use bunkhouse::event_store::{EventStore, PendingEvent, SnapshotStore, StoredEvent};
use bunkhouse::memory::InMemoryStore;
use bunkhouse::projection::{
    AccommodationProjection, AccommodationReadModel, BookingReadModel, ProjectionEngine,
    ProjectionError, ProjectionStatus, ReadModelStore, RetryPolicy,
};
use bunkhouse::repository::{Repository, RepositoryError};
use chrono::Utc;
use uuid::Uuid;

mod common;

fn repository(store: &InMemoryStore, interval: u64) -> Repository<SleepingAccommodation> {
    Repository::new(Arc::new(store.clone()), Arc::new(store.clone()), interval)
}

/// Create an accommodation and rename it `renames` times
async fn history(
    repo: &Repository<SleepingAccommodation>,
    renames: usize,
) -> (SleepingAccommodation, Vec<StoredEvent>) {
    let ctx = OperationContext::new();
    let event =
        SleepingAccommodation::create(Uuid::new_v4(), "Bunk 0", AccommodationType::Bed, 2)
            .unwrap();
    let saved = repo
        .save(&SleepingAccommodation::default(), vec![event], &ctx)
        .await
        .unwrap();
    let mut aggregate = saved.aggregate;
    let mut events = saved.events;

    for n in 1..=renames {
        let event = aggregate
            .update(AccommodationChanges {
                name: Some(format!("Bunk {n}")),
                ..Default::default()
            })
            .unwrap();
        let saved = repo.save(&aggregate, vec![event], &ctx).await.unwrap();
        aggregate = saved.aggregate;
        events.extend(saved.events);
    }

    (aggregate, events)
}

#[tokio::test]
async fn test_versions_are_contiguous_from_zero() {
    let store = InMemoryStore::new();
    let repo = repository(&store, 100);
    let (aggregate, _) = history(&repo, 9).await;

    let versions: Vec<i64> = store
        .events_of(aggregate.id())
        .iter()
        .map(|e| e.version)
        .collect();
    assert_eq!(versions, (0..10).collect::<Vec<_>>());

    let loaded = repo.load(aggregate.id()).await.unwrap();
    assert_eq!(loaded.version(), 9);
    assert_eq!(loaded.name(), "Bunk 9");
}

#[tokio::test]
async fn test_load_with_and_without_snapshots_agree() {
    let store = InMemoryStore::new();
    let snapshotting = repository(&store, 3);
    let (aggregate, _) = history(&snapshotting, 7).await;

    assert_eq!(store.snapshot_count(SleepingAccommodation::aggregate_type()), 1);
    let snapshot = store
        .get_latest(aggregate.id(), SleepingAccommodation::aggregate_type())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.version, 5);

    let with_snapshot = snapshotting.load(aggregate.id()).await.unwrap();

    let plain_store = InMemoryStore::new();
    for event in store.events_of(aggregate.id()) {
        plain_store
            .append(
                event.aggregate_id,
                &event.aggregate_type,
                event.version - 1,
                vec![PendingEvent {
                    id: event.id,
                    event_type: event.event_type.clone(),
                    payload: event.payload.clone(),
                }],
                &OperationContext::new(),
            )
            .await
            .unwrap();
    }
    let without_snapshot = repository(&plain_store, 0).load(aggregate.id()).await.unwrap();

    assert_eq!(with_snapshot, without_snapshot);
    assert_eq!(with_snapshot, aggregate);
}

#[tokio::test]
async fn test_concurrent_saves_one_wins() {
    let store = InMemoryStore::new();
    let repo = repository(&store, 100);
    let (aggregate, _) = history(&repo, 0).await;

    let first = aggregate
        .update(AccommodationChanges {
            name: Some("Left".into()),
            ..Default::default()
        })
        .unwrap();
    let second = aggregate
        .update(AccommodationChanges {
            name: Some("Right".into()),
            ..Default::default()
        })
        .unwrap();

    let ctx = OperationContext::new();
    let (a, b) = tokio::join!(
        repo.save(&aggregate, vec![first], &ctx),
        repo.save(&aggregate, vec![second], &ctx),
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_concurrency_conflict()))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(store.events_of(aggregate.id()).len(), 2);
}

#[tokio::test]
async fn test_projection_is_idempotent() {
    let store = InMemoryStore::new();
    let repo = repository(&store, 100);
    let (aggregate, events) = history(&repo, 2).await;

    let engine = ProjectionEngine::new(
        AccommodationProjection,
        Arc::new(store.clone()),
        common::quick_retry(1),
    );

    assert_eq!(engine.project(&events).await.unwrap(), 3);
    let first: AccommodationReadModel =
        ReadModelStore::get(&store, aggregate.id()).await.unwrap().unwrap();

    assert_eq!(engine.project(&events).await.unwrap(), 0);
    assert_eq!(engine.project(&events[1..2]).await.unwrap(), 0);
    let second: AccommodationReadModel =
        ReadModelStore::get(&store, aggregate.id()).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(second.version, 2);
    assert_eq!(second.name, "Bunk 2");
}

#[tokio::test]
async fn test_projection_gap_is_repaired_by_catch_up() {
    let store = InMemoryStore::new();
    let repo = repository(&store, 100);
    let (aggregate, events) = history(&repo, 1).await;

    let engine = ProjectionEngine::new(
        AccommodationProjection,
        Arc::new(store.clone()),
        common::quick_retry(2),
    );

    let err = engine.project(&events[1..]).await.unwrap_err();
    assert!(matches!(
        err,
        ProjectionError::RetriesExhausted { attempts: 2, .. }
    ));
    let missing: Option<AccommodationReadModel> =
        ReadModelStore::get(&store, aggregate.id()).await.unwrap();
    assert!(missing.is_none());

    let applied = engine.catch_up(&store, aggregate.id()).await.unwrap();
    assert_eq!(applied, 2);
    let model: AccommodationReadModel =
        ReadModelStore::get(&store, aggregate.id()).await.unwrap().unwrap();
    assert_eq!(model.version, 1);
}

fn flaky_repository(
    store: &InMemoryStore,
    failures: u32,
    retry: RetryPolicy,
) -> Repository<SleepingAccommodation> {
    let flaky = Arc::new(common::FlakyStore::new(store.clone(), failures));
    let engine = ProjectionEngine::new(AccommodationProjection, flaky, retry)
        .with_event_store(Arc::new(store.clone()));
    repository(store, 100).with_projection(Arc::new(engine))
}

#[tokio::test]
async fn test_transient_projection_failure_is_retried() {
    let store = InMemoryStore::new();
    let repo = flaky_repository(&store, 2, common::quick_retry(3));

    let event =
        SleepingAccommodation::create(Uuid::new_v4(), "Loft", AccommodationType::Mattress, 2)
            .unwrap();
    let saved = repo
        .save(&SleepingAccommodation::default(), vec![event], &OperationContext::new())
        .await
        .unwrap();

    assert!(matches!(saved.projection, ProjectionStatus::Applied(1)));
    let model: Option<AccommodationReadModel> =
        ReadModelStore::get(&store, saved.aggregate.id()).await.unwrap();
    assert!(model.is_some());
}

#[tokio::test]
async fn test_exhausted_projection_keeps_events() {
    let store = InMemoryStore::new();
    let repo = flaky_repository(&store, u32::MAX, common::quick_retry(3));

    let event =
        SleepingAccommodation::create(Uuid::new_v4(), "Loft", AccommodationType::Mattress, 2)
            .unwrap();
    let saved = repo
        .save(&SleepingAccommodation::default(), vec![event], &OperationContext::new())
        .await
        .unwrap();

    match &saved.projection {
        ProjectionStatus::Failed(ProjectionError::RetriesExhausted { attempts, .. }) => {
            assert_eq!(*attempts, 3)
        }
        other => panic!("unexpected projection status {other:?}"),
    }
    assert_eq!(store.events_of(saved.aggregate.id()).len(), 1);
    assert_eq!(repo.load(saved.aggregate.id()).await.unwrap().name(), "Loft");
}

#[tokio::test]
async fn test_lagging_read_model_recovers_on_next_save() {
    let store = InMemoryStore::new();
    let repo = flaky_repository(&store, 3, common::quick_retry(3));
    let ctx = OperationContext::new();

    let event =
        SleepingAccommodation::create(Uuid::new_v4(), "Loft", AccommodationType::Mattress, 2)
            .unwrap();
    let first = repo
        .save(&SleepingAccommodation::default(), vec![event], &ctx)
        .await
        .unwrap();
    assert!(first.projection.is_failed());

    let event = first
        .aggregate
        .update(AccommodationChanges {
            name: Some("Hayloft".into()),
            ..Default::default()
        })
        .unwrap();
    let second = repo.save(&first.aggregate, vec![event], &ctx).await.unwrap();

    assert!(matches!(second.projection, ProjectionStatus::Applied(2)));
    let model: AccommodationReadModel = ReadModelStore::get(&store, first.aggregate.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.version, 1);
    assert_eq!(model.name, "Hayloft");
}

async fn append_unprojected(store: &InMemoryStore, aggregate_id: Uuid, event: &BookingEvent) {
    store
        .append(
            aggregate_id,
            Booking::aggregate_type(),
            -1,
            vec![PendingEvent::from_domain(event).unwrap()],
            &OperationContext::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_catch_up_continues_past_broken_aggregate() {
    let (store, services) = common::memory_services();

    let broken = Uuid::new_v4();
    append_unprojected(
        &store,
        broken,
        &BookingEvent::Accepted(BookingAccepted {
            booking_id: broken,
            accepted_at: Utc::now(),
        }),
    )
    .await;

    let healthy = Uuid::new_v4();
    let created = Booking::create(
        healthy,
        Uuid::new_v4(),
        DateRange::new(common::day(1), common::day(3)).unwrap(),
        None,
        vec![BookingItem::new(Uuid::new_v4(), 1).unwrap()],
    )
    .unwrap();
    append_unprojected(&store, healthy, &created).await;

    let report = services.catch_up().await.unwrap();

    assert_eq!(report.failed, vec![broken]);
    assert_eq!(report.applied, 1);
    let model: Option<BookingReadModel> = ReadModelStore::get(&store, healthy).await.unwrap();
    assert_eq!(model.unwrap().version, 0);
}

#[tokio::test]
async fn test_corrupt_stored_dates_fail_reconstruction() {
    let store = InMemoryStore::new();
    let id = Uuid::new_v4();
    let corrupt = BookingEvent::Created(BookingCreated {
        booking_id: id,
        user_id: Uuid::new_v4(),
        start_date: common::day(5),
        end_date: common::day(2),
        notes: None,
        items: vec![BookingItem::new(Uuid::new_v4(), 1).unwrap()],
        created_at: Utc::now(),
    });
    append_unprojected(&store, id, &corrupt).await;

    let repo: Repository<Booking> =
        Repository::new(Arc::new(store.clone()), Arc::new(store.clone()), 10);
    let result = repo.load(id).await;

    assert!(matches!(
        result,
        Err(RepositoryError::Reconstruction(ReconstructionError::InvalidPayload { .. }))
    ));
}
