//! Command Handlers module
//!
//! CQRS Command handlers that orchestrate business operations.
//! Each handler loads aggregates through a repository and saves the events
//! their commands produce; projections run as part of the save.

mod accommodation_handler;
mod booking_handler;
mod commands;
mod notify;

#[cfg(test)]
mod tests;

pub use accommodation_handler::AccommodationCommandHandler;
pub use booking_handler::BookingCommandHandler;
pub use commands::*;
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
