//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Booking};
use crate::domain::DomainError;
use crate::migration::MigrationError;
use crate::projection::ProjectionError;
use crate::repository::RepositoryError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Sleeping accommodation not found: {0}")]
    AccommodationNotFound(Uuid),

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        if err.is_concurrency_conflict() {
            return AppError::VersionConflict;
        }
        match err {
            RepositoryError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } if aggregate_type == Booking::aggregate_type() => AppError::BookingNotFound(aggregate_id),
            RepositoryError::AggregateNotFound { aggregate_id, .. } => {
                AppError::AccommodationNotFound(aggregate_id)
            }
            other => AppError::Repository(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn domain_error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidDateRange { .. } => "invalid_date_range",
        DomainError::InvalidPersonCount(_) => "invalid_person_count",
        DomainError::DuplicateAccommodation(_) => "duplicate_accommodation",
        DomainError::AccommodationNotInBooking(_) => "accommodation_not_in_booking",
        DomainError::EmptyBooking => "empty_booking",
        DomainError::BookingCancelled(_) => "booking_cancelled",
        DomainError::BookingAlreadyAccepted(_) => "booking_already_accepted",
        DomainError::AccommodationInactive(_) => "accommodation_inactive",
        DomainError::AccommodationAlreadyActive(_) => "accommodation_already_active",
        DomainError::CapacityExceeded { .. } => "capacity_exceeded",
        DomainError::InvalidCapacity(_) => "invalid_capacity",
        DomainError::EmptyName => "empty_name",
        DomainError::NoChanges => "no_changes",
        DomainError::NotCreated(_) => "not_created",
        DomainError::AlreadyCreated(_) => "already_created",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.to_string()))
            }
            AppError::BookingNotFound(id) => {
                (StatusCode::NOT_FOUND, "booking_not_found", Some(id.to_string()))
            }
            AppError::AccommodationNotFound(id) => {
                (StatusCode::NOT_FOUND, "accommodation_not_found", Some(id.to_string()))
            }

            // 409 Conflict
            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),

            // Domain errors: rule violations are 422, malformed input 400
            AppError::Domain(domain_err) => {
                let status = match domain_err {
                    DomainError::InvalidDateRange { .. }
                    | DomainError::InvalidPersonCount(_)
                    | DomainError::InvalidCapacity(_)
                    | DomainError::EmptyName => StatusCode::BAD_REQUEST,
                    DomainError::NotCreated(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, domain_error_code(domain_err), Some(domain_err.to_string()))
            }

            // 500 Internal Server Error
            AppError::Repository(e) => {
                tracing::error!("Repository error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "repository_error", None)
            }
            AppError::Projection(e) => {
                tracing::error!("Read model error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "read_model_error", None)
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "migration_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::EventStoreError;

    #[test]
    fn test_conflict_maps_to_409() {
        let err: AppError = RepositoryError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        })
        .into();

        assert!(matches!(err, AppError::VersionConflict));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_keeps_aggregate_kind() {
        let id = Uuid::new_v4();
        let err: AppError = RepositoryError::AggregateNotFound {
            aggregate_type: "BookingAggregate",
            aggregate_id: id,
        }
        .into();
        assert!(matches!(err, AppError::BookingNotFound(found) if found == id));

        let err: AppError = RepositoryError::AggregateNotFound {
            aggregate_type: "SleepingAccommodationAggregate",
            aggregate_id: id,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_domain_rule_violation_is_422() {
        let err = AppError::Domain(DomainError::EmptyBooking);
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::Domain(DomainError::InvalidPersonCount(0));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
