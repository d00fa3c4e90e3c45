use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Vendor(Uuid),
    User(Uuid),
    Admin,
}

// Domain events published after a state change commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartUpdated(Uuid),
    CartCleared(Uuid),

    // Order events
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        vendor_id: Uuid,
    },
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentInitiated {
        transaction_id: Uuid,
        gateway_order_id: String,
    },
    PaymentVerified {
        transaction_id: Uuid,
        gateway_order_id: String,
    },
    PaymentFailed {
        gateway_order_id: String,
    },
    PayoutUpdated {
        transaction_id: Uuid,
        status: String,
    },

    // Return and refund events
    ReturnRequested(Uuid),
    ReturnStatusChanged {
        return_id: Uuid,
        old_status: String,
        new_status: String,
    },
    RefundCreated(Uuid),
    RefundStatusChanged {
        refund_id: Uuid,
        new_status: String,
    },

    // Outbound notification handed to the delivery channel
    Notification {
        recipient: Recipient,
        title: String,
        message: String,
        kind: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::Notification {
                recipient,
                title,
                message,
                kind,
            } => {
                info!(?recipient, %title, %kind, %message, "notification dispatched");
            }
            Event::OrderCreated {
                order_id,
                user_id,
                vendor_id,
            } => {
                info!(%order_id, %user_id, %vendor_id, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::PaymentFailed { gateway_order_id } => {
                warn!(%gateway_order_id, "payment verification failed");
            }
            other => info!(event = ?other, "event received"),
        }
    }

    info!("Event processing loop stopped");
}
