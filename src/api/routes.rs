//! API Routes
//!
//! Read-only HTTP endpoints over the read models, plus migration status.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Booking, SleepingAccommodation};
use crate::error::AppError;
use crate::migration::MigrationStatus;
use crate::projection::{AccommodationReadModel, BookingReadModel};
use crate::services::Services;

/// Shared state of all routes
pub type AppState = Services;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct AccommodationsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    pub user_id: Uuid,
    pub bookings: Vec<BookingReadModel>,
}

#[derive(Debug, Serialize)]
pub struct AccommodationsResponse {
    pub accommodations: Vec<AccommodationReadModel>,
}

#[derive(Debug, Serialize)]
pub struct MigrationStatusResponse {
    pub migration_required: bool,
    pub aggregates: Vec<MigrationStatus>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/bookings/:booking_id", get(get_booking))
        .route("/users/:user_id/bookings", get(get_user_bookings))
        .route("/accommodations", get(list_accommodations))
        .route("/accommodations/:accommodation_id", get(get_accommodation))
        .route("/admin/migration", get(get_migration_status))
}

// =========================================================================
// Bookings
// =========================================================================

async fn get_booking(
    State(services): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingReadModel>, AppError> {
    services
        .booking_queries
        .get_booking(booking_id)
        .await?
        .map(Json)
        .ok_or(AppError::BookingNotFound(booking_id))
}

async fn get_user_bookings(
    State(services): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<BookingsResponse>, AppError> {
    let bookings = services.booking_queries.bookings_for_user(user_id).await?;
    Ok(Json(BookingsResponse { user_id, bookings }))
}

// =========================================================================
// Sleeping accommodations
// =========================================================================

async fn list_accommodations(
    State(services): State<AppState>,
    Query(query): Query<AccommodationsQuery>,
) -> Result<Json<AccommodationsResponse>, AppError> {
    let accommodations = if query.include_inactive {
        services.accommodation_queries.list_all().await?
    } else {
        services.accommodation_queries.list_active().await?
    };
    Ok(Json(AccommodationsResponse { accommodations }))
}

async fn get_accommodation(
    State(services): State<AppState>,
    Path(accommodation_id): Path<Uuid>,
) -> Result<Json<AccommodationReadModel>, AppError> {
    services
        .accommodation_queries
        .get_accommodation(accommodation_id)
        .await?
        .map(Json)
        .ok_or(AppError::AccommodationNotFound(accommodation_id))
}

// =========================================================================
// Admin
// =========================================================================

async fn get_migration_status(
    State(services): State<AppState>,
) -> Result<Json<MigrationStatusResponse>, AppError> {
    let mut aggregates = Vec::with_capacity(2);
    for aggregate_type in [
        SleepingAccommodation::aggregate_type(),
        Booking::aggregate_type(),
    ] {
        aggregates.push(services.migration.status(aggregate_type).await?);
    }

    Ok(Json(MigrationStatusResponse {
        migration_required: aggregates.iter().any(MigrationStatus::is_required),
        aggregates,
    }))
}
