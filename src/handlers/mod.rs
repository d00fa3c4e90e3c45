pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
pub mod refunds;
pub mod returns;

use crate::{
    cache::TtlCache,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        cart::CartService,
        notifications::{EventNotifier, Notifier},
        orders::OrderService,
        payments::{PaymentGateway, PaymentService},
        refunds::RefundService,
        returns::ReturnService,
    },
};
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub returns: Arc<ReturnService>,
    pub refunds: Arc<RefundService>,
}

impl AppServices {
    /// Wires every service against one pool, one event channel and one
    /// notifier.
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        verified_cache: Arc<dyn TtlCache>,
    ) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(EventNotifier::new(event_sender.clone()));

        let cart = Arc::new(CartService::new(db_pool.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
            config.orders_page_limit_max,
            config.public_base_url.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            db_pool.clone(),
            gateway,
            orders.clone(),
            notifier.clone(),
            event_sender.clone(),
            verified_cache,
            config.payment_key_secret.clone(),
            config.currency.clone(),
            Duration::from_secs(config.verification_cache_ttl_secs),
        ));
        let returns = Arc::new(ReturnService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
        ));
        let refunds = Arc::new(RefundService::new(db_pool, event_sender, notifier));

        Self {
            cart,
            orders,
            payments,
            returns,
            refunds,
        }
    }
}
