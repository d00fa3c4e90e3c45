use crate::errors::ServiceError;
use crate::events::{Event, EventSender, Recipient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Free-form category, e.g. `order`, `payment`, `return`
    pub kind: String,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// Delivery channel for user-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_vendor(&self, vendor_id: Uuid, note: Notification) -> Result<(), ServiceError>;
    async fn notify_user(&self, user_id: Uuid, note: Notification) -> Result<(), ServiceError>;
    async fn notify_admin(&self, note: Notification) -> Result<(), ServiceError>;
}

/// Publishes notifications onto the domain event channel.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    events: Arc<EventSender>,
}

impl EventNotifier {
    pub fn new(events: Arc<EventSender>) -> Self {
        Self { events }
    }

    async fn publish(&self, recipient: Recipient, note: Notification) -> Result<(), ServiceError> {
        self.events
            .send(Event::Notification {
                recipient,
                title: note.title,
                message: note.message,
                kind: note.kind,
            })
            .await
            .map_err(ServiceError::InternalError)
    }
}

#[async_trait]
impl Notifier for EventNotifier {
    async fn notify_vendor(&self, vendor_id: Uuid, note: Notification) -> Result<(), ServiceError> {
        self.publish(Recipient::Vendor(vendor_id), note).await
    }

    async fn notify_user(&self, user_id: Uuid, note: Notification) -> Result<(), ServiceError> {
        self.publish(Recipient::User(user_id), note).await
    }

    async fn notify_admin(&self, note: Notification) -> Result<(), ServiceError> {
        self.publish(Recipient::Admin, note).await
    }
}

/// Sends a notification after the owning operation has committed.
/// Failures are logged and swallowed.
pub async fn notify_best_effort(notifier: &dyn Notifier, recipient: Recipient, note: Notification) {
    let result = match recipient {
        Recipient::Vendor(id) => notifier.notify_vendor(id, note).await,
        Recipient::User(id) => notifier.notify_user(id, note).await,
        Recipient::Admin => notifier.notify_admin(note).await,
    };
    if let Err(e) = result {
        warn!(error = %e, ?recipient, "notification delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify_vendor(&self, _: Uuid, _: Notification) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("smtp down".into()))
        }
        async fn notify_user(&self, _: Uuid, _: Notification) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("smtp down".into()))
        }
        async fn notify_admin(&self, _: Notification) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("smtp down".into()))
        }
    }

    #[tokio::test]
    async fn event_notifier_publishes_to_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let notifier = EventNotifier::new(Arc::new(EventSender::new(tx)));
        let vendor = Uuid::new_v4();

        notifier
            .notify_vendor(vendor, Notification::new("New order", "Order received", "order"))
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::Notification {
                recipient, kind, ..
            }) => {
                assert_eq!(recipient, Recipient::Vendor(vendor));
                assert_eq!(kind, "order");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        notify_best_effort(
            &FailingNotifier,
            Recipient::Admin,
            Notification::new("Return requested", "x", "return"),
        )
        .await;
    }
}
