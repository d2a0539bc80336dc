//! Sleeping Accommodation Handler

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, SleepingAccommodation};
use crate::domain::{AccommodationEvent, DomainError, OperationContext};
use crate::error::AppError;
use crate::repository::{Repository, Saved};

use super::{
    CommandResult, CreateAccommodationCommand, DeactivateAccommodationCommand,
    ReactivateAccommodationCommand, UpdateAccommodationCommand,
};

fn command_result(saved: &Saved<SleepingAccommodation>) -> CommandResult {
    CommandResult {
        aggregate_id: saved.aggregate.id(),
        version: saved.new_version,
        read_model_lagging: saved.projection.is_failed(),
    }
}

/// Handler for sleeping accommodation commands
pub struct AccommodationCommandHandler {
    repository: Arc<Repository<SleepingAccommodation>>,
}

impl AccommodationCommandHandler {
    pub fn new(repository: Arc<Repository<SleepingAccommodation>>) -> Self {
        Self { repository }
    }

    pub async fn create(
        &self,
        command: CreateAccommodationCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        if self
            .repository
            .get_by_id(command.accommodation_id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyCreated(command.accommodation_id).into());
        }

        let event = SleepingAccommodation::create(
            command.accommodation_id,
            &command.name,
            command.accommodation_type,
            command.max_capacity,
        )?;
        let saved = self
            .repository
            .save(&SleepingAccommodation::default(), vec![event], context)
            .await?;

        tracing::info!(
            accommodation_id = %command.accommodation_id,
            name = %command.name,
            "Sleeping accommodation created"
        );
        Ok(command_result(&saved))
    }

    pub async fn update(
        &self,
        command: UpdateAccommodationCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.accommodation_id, context, |accommodation| {
                accommodation.update(command.changes)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn deactivate(
        &self,
        command: DeactivateAccommodationCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(command.accommodation_id, context, |accommodation| {
                accommodation.deactivate(command.reason)
            })
            .await?;
        Ok(command_result(&saved))
    }

    pub async fn reactivate(
        &self,
        command: ReactivateAccommodationCommand,
        context: &OperationContext,
    ) -> Result<CommandResult, AppError> {
        let saved = self
            .execute(
                command.accommodation_id,
                context,
                SleepingAccommodation::reactivate,
            )
            .await?;
        Ok(command_result(&saved))
    }

    async fn execute<F>(
        &self,
        accommodation_id: Uuid,
        context: &OperationContext,
        command: F,
    ) -> Result<Saved<SleepingAccommodation>, AppError>
    where
        F: FnOnce(&SleepingAccommodation) -> Result<AccommodationEvent, DomainError>,
    {
        let accommodation = self.repository.load(accommodation_id).await?;
        let event = command(&accommodation)?;
        Ok(self
            .repository
            .save(&accommodation, vec![event], context)
            .await?)
    }
}
