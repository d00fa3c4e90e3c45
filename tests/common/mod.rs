#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use marketplace_api::{
    auth::{Account, AccountProfile, Actor, InMemoryAccountDirectory, ACTOR_ID_HEADER},
    cache::InMemoryTtlCache,
    config::AppConfig,
    db,
    entities::{
        order::{self, Entity as OrderEntity},
        product::{self, Entity as ProductEntity},
        OrderStatus, ProductModel,
    },
    events::{Event, EventSender},
    handlers::AppServices,
    services::{
        cart::{AddToCartInput, ShippingAddress},
        payments::{GatewayOrder, GatewayPayout, LocalGateway, PaymentGateway},
    },
    AppState,
};
use mockall::mock;
use rust_decimal::Decimal;
use sea_orm::{sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_KEY_SECRET: &str = "test_gateway_key_secret_0123456789";

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_payment_order(
            &self,
            amount_minor: i64,
            currency: &str,
            receipt: &str,
        ) -> anyhow::Result<GatewayOrder>;

        async fn create_payout(
            &self,
            vendor_id: Uuid,
            amount_minor: i64,
            currency: &str,
        ) -> anyhow::Result<GatewayPayout>;
    }
}

/// Application state over a fresh in-memory SQLite database, plus the
/// principals most scenarios need.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    events: Mutex<mpsc::Receiver<Event>>,
    seen: Mutex<Vec<Event>>,
    pub buyer: Actor,
    pub other_buyer: Actor,
    pub vendor_a: Actor,
    pub vendor_b: Actor,
    pub admin: Actor,
    pub staff: Actor,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(LocalGateway)).await
    }

    pub async fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
            TEST_KEY_SECRET.to_string(),
        );
        // a second pooled connection would open a different in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.orders_page_limit_max = 50;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(4096);
        let event_sender = Arc::new(EventSender::new(event_tx));

        let accounts = InMemoryAccountDirectory::new();
        let buyer = register(&accounts, Account::User, "buyer@example.com");
        let other_buyer = register(&accounts, Account::User, "other@example.com");
        let vendor_a = register(&accounts, Account::Vendor, "vendor-a@example.com");
        let vendor_b = register(&accounts, Account::Vendor, "vendor-b@example.com");
        let admin = register(&accounts, Account::Admin, "admin@example.com");
        let staff = register(&accounts, Account::Staff, "staff@example.com");

        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            event_sender.clone(),
            gateway,
            Arc::new(InMemoryTtlCache::new()),
        );

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            event_sender,
            accounts: Arc::new(accounts),
            services,
        };
        let router = marketplace_api::build_router(state.clone());

        Self {
            router,
            state,
            events: Mutex::new(event_rx),
            seen: Mutex::new(Vec::new()),
            buyer,
            other_buyer,
            vendor_a,
            vendor_b,
            admin,
            staff,
        }
    }

    pub async fn seed_product(
        &self,
        vendor_id: Uuid,
        name: &str,
        price: Decimal,
        discount: Decimal,
        stock: i32,
    ) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(vendor_id),
            name: Set(name.to_string()),
            price: Set(price),
            discount: Set(discount),
            stock: Set(stock),
            sales: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn product(&self, id: Uuid) -> ProductModel {
        ProductEntity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
    }

    /// Puts `quantity` of a product in the buyer's cart.
    pub async fn add_to_cart(&self, buyer: &Actor, product_id: Uuid, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(
                buyer.id,
                AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .expect("add to cart");
    }

    /// Moves an order straight to `status`, bypassing the workflow.
    pub async fn force_order_status(&self, order_id: Uuid, status: OrderStatus) {
        OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(status))
            .filter(order::Column::Id.eq(order_id))
            .exec(&*self.state.db)
            .await
            .expect("force order status");
    }

    /// Every event published so far, in publish order.
    pub async fn recorded_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut seen = self.seen.lock().await;
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen.clone()
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        actor: Option<&Actor>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_ID_HEADER, actor.id.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router is infallible")
    }

    pub async fn request_raw(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body)).expect("build request"))
            .await
            .expect("router is infallible")
    }
}

fn register(
    directory: &InMemoryAccountDirectory,
    kind: fn(AccountProfile) -> Account,
    email: &str,
) -> Actor {
    let account = kind(AccountProfile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
    });
    let actor = account.actor();
    directory.insert(account);
    actor
}

pub fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".to_string(),
        line1: "12 Lake Road".to_string(),
        line2: None,
        city: "Pune".to_string(),
        state: "MH".to_string(),
        postal_code: "411001".to_string(),
        country: "IN".to_string(),
        phone: "+919800000000".to_string(),
    }
}

pub async fn response_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json response")
    };
    (status, json)
}
