//! Booking notifications
//!
//! Sent after a command has been committed. Delivery failures are logged
//! and never undo the command.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    BookingCreated { booking_id: Uuid, user_id: Uuid },
    BookingAccepted { booking_id: Uuid, user_id: Uuid },
    BookingCancelled { booking_id: Uuid, user_id: Uuid },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BookingCreated { .. } => "booking_created",
            Notification::BookingAccepted { .. } => "booking_accepted",
            Notification::BookingCancelled { .. } => "booking_cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(kind = notification.kind(), ?notification, "Notification");
        Ok(())
    }
}
