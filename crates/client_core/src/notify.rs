use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{error::OperationError, submission::Settlement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// User-facing toast emitted once per settled attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn for_settlement(settlement: &Settlement) -> Self {
        match settlement {
            Settlement::Success(_) => Self::success("Success!", "Image registered successfully!"),
            Settlement::Failure(OperationError::MissingUpload) => Self::failure(
                "Image not added",
                "Add an image and wait for its upload to finish before registering it",
            ),
            Settlement::Failure(OperationError::UploadFailed(_)) => Self::failure(
                "Upload failed",
                "An error occurred while uploading your image",
            ),
            Settlement::Failure(_) => Self::failure(
                "Registration failed",
                "An error occurred while trying to register your image",
            ),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Renders notifications as log lines.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(
                title = %notification.title,
                "notification: {}",
                notification.description
            ),
            NotificationKind::Failure => warn!(
                title = %notification.title,
                "notification: {}",
                notification.description
            ),
        }
    }
}

/// Fans notifications out to any number of subscribers.
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // No subscribers is fine; nobody is showing toasts.
        let _ = self.tx.send(notification);
    }
}
