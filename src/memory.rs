//! In-memory backend
//!
//! Implements every storage trait over one shared state so the full stack
//! (repository, projections, migration) runs without a database. Used by
//! tests and local experiments. Clones share state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::aggregate::INITIAL_VERSION;
use crate::domain::OperationContext;
use crate::event_store::{
    Committed, EventStore, EventStoreError, PendingEvent, Snapshot, SnapshotStore, StoredEvent,
};
use crate::migration::{
    LegacyAccommodation, LegacyBooking, LegacySource, MaintenanceStore, MigrationError,
    RollbackError, RollbackReport,
};
use crate::projection::{ProjectionError, ReadModel, ReadModelStore, UserDirectory};

#[derive(Debug, Default)]
struct State {
    /// Every committed event in commit order
    events: Vec<StoredEvent>,
    snapshots: HashMap<(String, Uuid), Snapshot>,
    /// Read models per table, stored as JSON like the database does
    read_models: HashMap<String, BTreeMap<Uuid, (i64, serde_json::Value)>>,
    users: HashMap<Uuid, String>,
    legacy_accommodations: Vec<LegacyAccommodation>,
    legacy_bookings: Vec<LegacyBooking>,
}

impl State {
    fn current_version(&self, aggregate_id: Uuid) -> i64 {
        self.events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(INITIAL_VERSION)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: Uuid, display_name: impl Into<String>) {
        self.state.write().users.insert(user_id, display_name.into());
    }

    pub fn add_legacy_accommodation(&self, row: LegacyAccommodation) {
        self.state.write().legacy_accommodations.push(row);
    }

    pub fn add_legacy_booking(&self, row: LegacyBooking) {
        self.state.write().legacy_bookings.push(row);
    }

    /// Number of events of an aggregate type
    pub fn event_count(&self, aggregate_type: &str) -> usize {
        self.state
            .read()
            .events
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type)
            .count()
    }

    pub fn snapshot_count(&self, aggregate_type: &str) -> usize {
        self.state
            .read()
            .snapshots
            .keys()
            .filter(|(t, _)| t == aggregate_type)
            .count()
    }

    /// Every stored event of an aggregate, ascending
    pub fn events_of(&self, aggregate_id: Uuid) -> Vec<StoredEvent> {
        let mut events: Vec<_> = self
            .state
            .read()
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        events
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
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
        let mut state = self.state.write();

        let current_version = state.current_version(aggregate_id);
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let created_at = Utc::now();
        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(expected_version + 1..)
            .map(|(event, version)| StoredEvent {
                id: event.id,
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                event_type: event.event_type,
                payload: event.payload,
                context: context_json.clone(),
                version,
                created_at,
            })
            .collect();

        state.events.extend(stored.iter().cloned());

        Ok(Committed {
            new_version: expected_version + stored.len() as i64,
            events: stored,
        })
    }

    async fn load(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut events: Vec<_> = self
            .state
            .read()
            .events
            .iter()
            .filter(|e| {
                e.aggregate_id == aggregate_id
                    && e.aggregate_type == aggregate_type
                    && e.version > after_version
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<i64>, EventStoreError> {
        Ok(self
            .state
            .read()
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.aggregate_type == aggregate_type)
            .map(|e| e.version)
            .max())
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<Uuid>, EventStoreError> {
        let mut ids: Vec<Uuid> = self
            .state
            .read()
            .events
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type)
            .map(|e| e.aggregate_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn get_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        Ok(self
            .state
            .read()
            .snapshots
            .get(&(aggregate_type.to_string(), aggregate_id))
            .cloned())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        let mut state = self.state.write();
        let key = (snapshot.aggregate_type.clone(), snapshot.aggregate_id);
        let newer = state
            .snapshots
            .get(&key)
            .map_or(true, |existing| existing.version < snapshot.version);
        if newer {
            state.snapshots.insert(key, snapshot.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl<R: ReadModel> ReadModelStore<R> for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<R>, ProjectionError> {
        let state = self.state.read();
        state
            .read_models
            .get(R::TABLE)
            .and_then(|table| table.get(&id))
            .map(|(_, data)| serde_json::from_value(data.clone()))
            .transpose()
            .map_err(ProjectionError::from)
    }

    async fn upsert(&self, model: &R) -> Result<bool, ProjectionError> {
        let data = serde_json::to_value(model)?;
        let mut state = self.state.write();
        let table = state.read_models.entry(R::TABLE.to_string()).or_default();

        if table
            .get(&model.id())
            .is_some_and(|(version, _)| *version >= model.version())
        {
            return Ok(false);
        }
        table.insert(model.id(), (model.version(), data));
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<R>, ProjectionError> {
        let state = self.state.read();
        state
            .read_models
            .get(R::TABLE)
            .map(|table| {
                table
                    .values()
                    .map(|(_, data)| serde_json::from_value(data.clone()).map_err(ProjectionError::from))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn count(&self) -> Result<u64, ProjectionError> {
        Ok(self
            .state
            .read()
            .read_models
            .get(R::TABLE)
            .map_or(0, |table| table.len() as u64))
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ProjectionError> {
        Ok(self.state.read().users.get(&user_id).cloned())
    }
}

#[async_trait]
impl LegacySource for InMemoryStore {
    async fn accommodations(&self) -> Result<Vec<LegacyAccommodation>, MigrationError> {
        Ok(self.state.read().legacy_accommodations.clone())
    }

    async fn bookings(&self) -> Result<Vec<LegacyBooking>, MigrationError> {
        Ok(self.state.read().legacy_bookings.clone())
    }
}

#[async_trait]
impl MaintenanceStore for InMemoryStore {
    async fn delete_aggregate_type(
        &self,
        aggregate_type: &str,
        read_model_table: &str,
    ) -> Result<RollbackReport, RollbackError> {
        let mut state = self.state.write();

        let before = state.events.len();
        state.events.retain(|e| e.aggregate_type != aggregate_type);
        let events_deleted = (before - state.events.len()) as u64;

        let before = state.snapshots.len();
        state.snapshots.retain(|(t, _), _| t != aggregate_type);
        let snapshots_deleted = (before - state.snapshots.len()) as u64;

        let read_models_deleted = state
            .read_models
            .remove(read_model_table)
            .map_or(0, |table| table.len() as u64);

        Ok(RollbackReport {
            aggregate_type: aggregate_type.to_string(),
            events_deleted,
            snapshots_deleted,
            read_models_deleted,
        })
    }
}
