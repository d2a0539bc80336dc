//! Handler tests
//!
//! Run the handlers end to end against the in-memory backend.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use uuid::Uuid;

    use crate::aggregate::AccommodationChanges;
    use crate::domain::{AccommodationType, BookingStatus, DomainError, OperationContext};
    use crate::error::AppError;
    use crate::handlers::{
        AcceptBookingCommand, AddBookingItemCommand, CancelBookingCommand,
        ChangeBookingDatesCommand, ChangeBookingNotesCommand, ChangePersonCountCommand,
        CreateAccommodationCommand, CreateBookingCommand, DeactivateAccommodationCommand,
        Notification, Notifier, NotifyError, ReactivateAccommodationCommand,
        RemoveBookingItemCommand, UpdateAccommodationCommand,
    };
    use crate::memory::InMemoryStore;
    use crate::services::{Services, Settings, Stores};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().push(notification.clone());
            if self.fail {
                return Err(NotifyError("mail server down".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        store: InMemoryStore,
        services: Services,
        notifier: Arc<RecordingNotifier>,
        user_id: Uuid,
    }

    fn fixture_with(notifier: RecordingNotifier) -> Fixture {
        let store = InMemoryStore::new();
        let notifier = Arc::new(notifier);
        let services = Services::build(
            Stores::in_memory(&store),
            &Settings::default(),
            notifier.clone(),
        );
        let user_id = Uuid::new_v4();
        store.add_user(user_id, "Ada");
        Fixture {
            store,
            services,
            notifier,
            user_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn ctx() -> OperationContext {
        OperationContext::new().with_source("test")
    }

    async fn accommodation(f: &Fixture, name: &str, capacity: i32) -> Uuid {
        let command = CreateAccommodationCommand::new(name, AccommodationType::Bed, capacity);
        f.services
            .accommodations
            .create(command, &ctx())
            .await
            .unwrap()
            .aggregate_id
    }

    async fn booking(f: &Fixture, accommodation_id: Uuid, persons: i32) -> Uuid {
        let command = CreateBookingCommand::new(f.user_id, day(1), day(4))
            .with_item(accommodation_id, persons);
        f.services
            .bookings
            .create(command, &ctx())
            .await
            .unwrap()
            .aggregate_id
    }

    // =========================================================================
    // Accommodations
    // =========================================================================

    #[tokio::test]
    async fn test_create_accommodation_projects_read_model() {
        let f = fixture();
        let id = accommodation(&f, "Bunk A", 2).await;

        let model = f
            .services
            .accommodation_queries
            .get_accommodation(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(model.name, "Bunk A");
        assert_eq!(model.version, 0);
        assert!(model.is_active);
    }

    #[tokio::test]
    async fn test_deactivate_and_reactivate_accommodation() {
        let f = fixture();
        let id = accommodation(&f, "Sofa", 1).await;

        let result = f
            .services
            .accommodations
            .deactivate(
                DeactivateAccommodationCommand {
                    accommodation_id: id,
                    reason: Some("springs broken".into()),
                },
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.version, 1);
        assert!(!result.read_model_lagging);

        let model = f.services.accommodation_queries.get_accommodation(id).await.unwrap().unwrap();
        assert!(!model.is_active);

        f.services
            .accommodations
            .reactivate(ReactivateAccommodationCommand { accommodation_id: id }, &ctx())
            .await
            .unwrap();
        let err = f
            .services
            .accommodations
            .reactivate(ReactivateAccommodationCommand { accommodation_id: id }, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AccommodationAlreadyActive(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_accommodation_is_not_found() {
        let f = fixture();
        let err = f
            .services
            .accommodations
            .reactivate(
                ReactivateAccommodationCommand {
                    accommodation_id: Uuid::new_v4(),
                },
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccommodationNotFound(_)));
    }

    #[tokio::test]
    async fn test_commands_invalidate_cached_read_models() {
        let f = fixture();
        let acc = accommodation(&f, "Bunk B", 2).await;
        let id = booking(&f, acc, 1).await;

        let queries = &f.services.accommodation_queries;
        assert_eq!(queries.get_accommodation(acc).await.unwrap().unwrap().name, "Bunk B");
        let cached = f.services.booking_queries.get_booking(id).await.unwrap().unwrap();
        assert_eq!(cached.notes, None);

        f.services
            .accommodations
            .update(
                UpdateAccommodationCommand {
                    accommodation_id: acc,
                    changes: AccommodationChanges {
                        name: Some("Bunk C".into()),
                        ..Default::default()
                    },
                },
                &ctx(),
            )
            .await
            .unwrap();
        f.services
            .bookings
            .change_notes(
                ChangeBookingNotesCommand {
                    booking_id: id,
                    notes: Some("late arrival".into()),
                },
                &ctx(),
            )
            .await
            .unwrap();

        let model = queries.get_accommodation(acc).await.unwrap().unwrap();
        assert_eq!(model.name, "Bunk C");
        assert_eq!(model.version, 1);
        let model = f.services.booking_queries.get_booking(id).await.unwrap().unwrap();
        assert_eq!(model.notes.as_deref(), Some("late arrival"));
        assert_eq!(model.version, 1);
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    #[tokio::test]
    async fn test_create_booking_denormalizes_names() {
        let f = fixture();
        let acc = accommodation(&f, "Attic", 2).await;
        let id = booking(&f, acc, 2).await;

        let model = f.services.booking_queries.get_booking(id).await.unwrap().unwrap();
        assert_eq!(model.user_name.as_deref(), Some("Ada"));
        assert_eq!(model.nights, 3);
        assert_eq!(model.total_persons, 2);
        assert_eq!(model.items[0].accommodation_name.as_deref(), Some("Attic"));
        assert_eq!(model.status, BookingStatus::Pending);

        assert_eq!(
            f.notifier.sent.lock().as_slice(),
            &[Notification::BookingCreated {
                booking_id: id,
                user_id: f.user_id
            }]
        );
    }

    #[tokio::test]
    async fn test_create_booking_checks_accommodation() {
        let f = fixture();
        let acc = accommodation(&f, "Cot", 1).await;

        let over = CreateBookingCommand::new(f.user_id, day(1), day(2)).with_item(acc, 2);
        let err = f.services.bookings.create(over, &ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::CapacityExceeded { requested: 2, capacity: 1, .. })
        ));

        let missing = CreateBookingCommand::new(f.user_id, day(1), day(2))
            .with_item(Uuid::new_v4(), 1);
        let err = f.services.bookings.create(missing, &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::AccommodationNotFound(_)));

        f.services
            .accommodations
            .deactivate(
                DeactivateAccommodationCommand {
                    accommodation_id: acc,
                    reason: None,
                },
                &ctx(),
            )
            .await
            .unwrap();
        let inactive = CreateBookingCommand::new(f.user_id, day(1), day(2)).with_item(acc, 1);
        let err = f.services.bookings.create(inactive, &ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AccommodationInactive(_))
        ));

        assert_eq!(f.store.event_count("BookingAggregate"), 0);
    }

    #[tokio::test]
    async fn test_create_booking_requires_known_user() {
        let f = fixture();
        let acc = accommodation(&f, "Attic", 2).await;

        let command = CreateBookingCommand::new(Uuid::new_v4(), day(1), day(2)).with_item(acc, 1);
        let err = f.services.bookings.create(command, &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_booking_lifecycle() {
        let f = fixture();
        let attic = accommodation(&f, "Attic", 2).await;
        let tent = accommodation(&f, "Tent", 3).await;
        let id = booking(&f, attic, 1).await;
        let handler = &f.services.bookings;

        handler
            .add_item(
                AddBookingItemCommand {
                    booking_id: id,
                    accommodation_id: tent,
                    person_count: 3,
                },
                &ctx(),
            )
            .await
            .unwrap();
        handler
            .change_person_count(
                ChangePersonCountCommand {
                    booking_id: id,
                    accommodation_id: attic,
                    person_count: 2,
                },
                &ctx(),
            )
            .await
            .unwrap();
        handler
            .change_dates(
                ChangeBookingDatesCommand {
                    booking_id: id,
                    start_date: day(2),
                    end_date: day(7),
                },
                &ctx(),
            )
            .await
            .unwrap();
        handler
            .change_notes(
                ChangeBookingNotesCommand {
                    booking_id: id,
                    notes: Some("  bringing a dog  ".into()),
                },
                &ctx(),
            )
            .await
            .unwrap();
        handler
            .remove_item(
                RemoveBookingItemCommand {
                    booking_id: id,
                    accommodation_id: attic,
                },
                &ctx(),
            )
            .await
            .unwrap();
        let result = handler
            .accept(AcceptBookingCommand { booking_id: id }, &ctx())
            .await
            .unwrap();
        assert_eq!(result.version, 6);

        let model = f.services.booking_queries.get_booking(id).await.unwrap().unwrap();
        assert_eq!(model.version, 6);
        assert_eq!(model.status, BookingStatus::Accepted);
        assert_eq!(model.nights, 5);
        assert_eq!(model.total_persons, 3);
        assert_eq!(model.notes.as_deref(), Some("bringing a dog"));
        assert_eq!(model.items.len(), 1);
        assert_eq!(model.items[0].accommodation_name.as_deref(), Some("Tent"));

        let versions: Vec<i64> = f.store.events_of(id).iter().map(|e| e.version).collect();
        assert_eq!(versions, (0..=6).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cancelled_booking_is_terminal() {
        let f = fixture();
        let acc = accommodation(&f, "Attic", 2).await;
        let id = booking(&f, acc, 1).await;

        f.services
            .bookings
            .cancel(
                CancelBookingCommand {
                    booking_id: id,
                    reason: Some("plans changed".into()),
                },
                &ctx(),
            )
            .await
            .unwrap();

        let err = f
            .services
            .bookings
            .accept(AcceptBookingCommand { booking_id: id }, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::BookingCancelled(_))));

        let model = f.services.booking_queries.get_booking(id).await.unwrap().unwrap();
        assert_eq!(model.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_booking() {
        let f = fixture_with(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let acc = accommodation(&f, "Attic", 2).await;
        let id = booking(&f, acc, 1).await;

        assert_eq!(f.notifier.sent.lock().len(), 1);
        assert_eq!(f.store.events_of(id).len(), 1);
    }
}
