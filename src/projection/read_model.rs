//! Read models
//!
//! Query-shaped projections of aggregate state. Every read model records the
//! aggregate version it has incorporated so projection stays idempotent.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccommodationType, BookingStatus};

use super::ProjectionError;

/// A versioned read model stored in its own table
pub trait ReadModel:
    std::fmt::Debug + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Table (or collection) holding this read model
    const TABLE: &'static str;

    fn id(&self) -> Uuid;

    /// Last aggregate version folded into this model
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);
}

/// Storage for one read-model type
#[async_trait]
pub trait ReadModelStore<R: ReadModel>: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<R>, ProjectionError>;

    /// Insert or replace the model unless the stored copy is at the same or a
    /// newer version. Returns whether the model was written.
    async fn upsert(&self, model: &R) -> Result<bool, ProjectionError>;

    async fn list(&self) -> Result<Vec<R>, ProjectionError>;

    async fn count(&self) -> Result<u64, ProjectionError>;
}

/// Accommodation allocation as shown to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItemView {
    pub accommodation_id: Uuid,
    pub accommodation_name: Option<String>,
    pub person_count: i32,
}

/// Booking with user name, nights and accommodation names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingReadModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: i64,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub items: Vec<BookingItemView>,
    pub total_persons: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingReadModel {
    /// Recompute the derived columns after a change
    pub fn refresh_totals(&mut self) {
        self.nights = (self.end_date - self.start_date).num_days();
        self.total_persons = self.items.iter().map(|item| item.person_count).sum();
    }
}

impl ReadModel for BookingReadModel {
    const TABLE: &'static str = "booking_read_models";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// Sleeping accommodation with its active flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccommodationReadModel {
    pub id: Uuid,
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub max_capacity: i32,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReadModel for AccommodationReadModel {
    const TABLE: &'static str = "accommodation_read_models";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
