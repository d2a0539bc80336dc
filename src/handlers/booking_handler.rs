//! Booking Handler
//!
//! Loads a booking, runs the command on it and saves the resulting event.
//! Accommodation rules that span aggregates are checked against the
//! accommodation read model.

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Booking};
use crate::domain::{BookingEvent, DateRange, DomainError, OperationContext};
use crate::error::AppError;
use crate::projection::{AccommodationReadModel, ReadModelStore, UserDirectory};
use crate::repository::{Repository, Saved};

use super::{
    AcceptBookingCommand, AddBookingItemCommand, CancelBookingCommand, ChangeBookingDatesCommand,
    ChangeBookingNotesCommand, ChangePersonCountCommand, CommandResult, CreateBookingCommand,
    Notification, Notifier, RemoveBookingItemCommand,
};

fn command_result(saved: &Saved<Booking>) -> CommandResult {
    CommandResult {
        aggregate_id: saved.aggregate.id(),
        version: saved.new_version,
        read_model_lagging: saved.projection.is_failed(),
    }
}

/// Handler for booking commands
pub struct BookingCommandHandler {
    repository: Arc<Repository<Booking>>,
    accommodations: Arc<dyn ReadModelStore<AccommodationReadModel>>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl BookingCommandHandler {
    pub fn new(
        repository: Arc<Repository<Booking>>,
        accommodations: Arc<dyn ReadModelStore<AccommodationReadModel>>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            accommodations,
            users,
            notifier,
        }
    }

    /// Execute the create booking command
    pub async fn create(
        &self,
        command: CreateBookingCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        if self.users.display_name(command.user_id).await?.is_none() {
            return Err(AppError::UserNotFound(command.user_id));
        }
        for item in &command.items {
            self.check_accommodation(item.accommodation_id, item.person_count)
                .await?;
        }

        let booking = match self.repository.get_by_id(command.booking_id).await? {
            Some(_) => return Err(DomainError::AlreadyCreated(command.booking_id).into()),
            None => Booking::default(),
        };

        let dates = DateRange::new(command.start_date, command.end_date)?;
        let event = Booking::create(
            command.booking_id,
            command.user_id,
            dates,
            command.notes,
            command.items,
        )?;

        let saved = self.repository.save(&booking, vec![event], context).await?;
        self.send(Notification::BookingCreated {
            booking_id: command.booking_id,
            user_id: command.user_id,
        })
        .await;

        Ok(command_result(&saved))
    }

    pub async fn add_item(
        &self,
        command: AddBookingItemCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        self.check_accommodation(command.accommodation_id, command.person_count)
            .await?;

        let saved = self
            .execute(command.booking_id, context, |booking| {
                booking.add_item(command.accommodation_id, command.person_count)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn remove_item(
        &self,
        command: RemoveBookingItemCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.booking_id, context, |booking| {
                booking.remove_item(command.accommodation_id)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn change_person_count(
        &self,
        command: ChangePersonCountCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        self.check_accommodation(command.accommodation_id, command.person_count)
            .await?;

        let saved = self
            .execute(command.booking_id, context, |booking| {
                booking.change_person_count(command.accommodation_id, command.person_count)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn change_dates(
        &self,
        command: ChangeBookingDatesCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let dates = DateRange::new(command.start_date, command.end_date)?;
        let saved = self
            .execute(command.booking_id, context, |booking| booking.change_dates(dates))
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn change_notes(
        &self,
        command: ChangeBookingNotesCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.booking_id, context, |booking| {
                booking.change_notes(command.notes)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn accept(
        &self,
        command: AcceptBookingCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.booking_id, context, Booking::accept)
            .await?;

        self.send(Notification::BookingAccepted {
            booking_id: command.booking_id,
            user_id: saved.aggregate.user_id(),
        })
        .await;
        Ok(command_result(&saved))
    }

    pub async fn cancel(
        &self,
        command: CancelBookingCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.booking_id, context, |booking| {
                booking.cancel(command.reason)
            })
            .await?;

        self.send(Notification::BookingCancelled {
            booking_id: command.booking_id,
            user_id: saved.aggregate.user_id(),
        })
        .await;
        Ok(command_result(&saved))
    }

    /// Load, decide, save. A concurrent change surfaces as a version conflict.
    async fn execute<F>(
        &self,
        booking_id: Uuid,
        context: &OperationContext,
        command: F,
    ) -> Result<Saved<Booking>, AppError>
    where
        F: FnOnce(&Booking) -> Result<BookingEvent, DomainError>,
    {
        let booking = self.repository.load(booking_id).await?;
        let event = command(&booking)?;
        Ok(self.repository.save(&booking, vec![event], context).await?)
    }

    /// The accommodation must exist, be active and hold `person_count` persons
    async fn check_accommodation(
        &self,
        accommodation_id: Uuid,
        person_count: i32,
    ) -> Result<(), AppError> {
        let accommodation = self
            .accommodations
            .get(accommodation_id)
            .await?
            .ok_or(AppError::AccommodationNotFound(accommodation_id))?;

        if !accommodation.is_active {
            return Err(DomainError::AccommodationInactive(accommodation_id).into());
        }
        if person_count > accommodation.max_capacity {
            return Err(DomainError::CapacityExceeded {
                accommodation_id,
                requested: person_count,
                capacity: accommodation.max_capacity,
            }
            .into());
        }
        Ok(())
    }

    async fn send(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(kind = notification.kind(), error = %e, "Notification not delivered");
        }
    }
}
