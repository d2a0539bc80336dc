//! API integration tests over the in-memory backend

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

use bunkhouse::api;
use bunkhouse::domain::{AccommodationType, OperationContext};
use bunkhouse::handlers::{
    CreateAccommodationCommand, CreateBookingCommand, DeactivateAccommodationCommand,
};

mod common;

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let (_, services) = common::memory_services();
    let app = api::build_router(services);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_booking_lookup() {
    let (store, services) = common::memory_services();
    let ctx = OperationContext::new();
    let user_id = Uuid::new_v4();
    store.add_user(user_id, "Hazel");

    let room = services
        .accommodations
        .create(
            CreateAccommodationCommand::new("Attic", AccommodationType::Room, 3),
            &ctx,
        )
        .await
        .unwrap();
    let booking = services
        .bookings
        .create(
            CreateBookingCommand::new(user_id, common::day(1), common::day(4))
                .with_item(room.aggregate_id, 2),
            &ctx,
        )
        .await
        .unwrap();

    let app = api::build_router(services);

    let (status, body) = get(&app, &format!("/api/v1/bookings/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "booking_not_found");

    let (status, body) = get(&app, &format!("/api/v1/bookings/{}", booking.aggregate_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_name"], "Hazel");
    assert_eq!(body["total_persons"], 2);
    assert_eq!(body["status"], "pending");

    let (status, body) = get(&app, &format!("/api/v1/users/{user_id}/bookings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/api/v1/bookings/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_accommodation_listing() {
    let (_, services) = common::memory_services();
    let ctx = OperationContext::new();

    let couch = services
        .accommodations
        .create(
            CreateAccommodationCommand::new("Couch", AccommodationType::Couch, 1),
            &ctx,
        )
        .await
        .unwrap();
    services
        .accommodations
        .create(
            CreateAccommodationCommand::new("Annex", AccommodationType::Room, 4),
            &ctx,
        )
        .await
        .unwrap();
    services
        .accommodations
        .deactivate(
            DeactivateAccommodationCommand {
                accommodation_id: couch.aggregate_id,
                reason: None,
            },
            &ctx,
        )
        .await
        .unwrap();

    let app = api::build_router(services);

    let (status, body) = get(&app, "/api/v1/accommodations").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["accommodations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Annex"]);

    let (_, body) = get(&app, "/api/v1/accommodations?include_inactive=true").await;
    assert_eq!(body["accommodations"].as_array().unwrap().len(), 2);

    let (status, body) =
        get(&app, &format!("/api/v1/accommodations/{}", couch.aggregate_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn test_migration_status() {
    let (store, services) = common::memory_services();
    store.add_legacy_accommodation(common::legacy_accommodation("Loft", 2));

    let app = api::build_router(services.clone());
    let (status, body) = get(&app, "/api/v1/admin/migration").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["migration_required"], true);

    services.migration.migrate().await.unwrap();

    let (_, body) = get(&app, "/api/v1/admin/migration").await;
    assert_eq!(body["migration_required"], false);
    assert_eq!(body["aggregates"][0]["migrated_rows"], 1);
}
