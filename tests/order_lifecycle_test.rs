//! Order state machine: fulfilment, cancellation and scoped listing.

mod common;

use assert_matches::assert_matches;
use common::{shipping_address, TestApp};
use marketplace_api::{
    entities::{OrderStatus, PaymentMethod, PaymentStatus},
    errors::{ErrorKind, ServiceError},
    events::Event,
    services::orders::{CheckoutRequest, OrderListQuery, OrderView},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn place_cod_order(app: &TestApp, vendor_id: Uuid, name: &str, qty: i32) -> OrderView {
    let product = app.seed_product(vendor_id, name, dec!(25), dec!(0), 20).await;
    app.add_to_cart(&app.buyer, product.id, qty).await;
    app.state
        .services
        .orders
        .create_orders_from_cart(
            app.buyer.id,
            CheckoutRequest {
                payment_method: PaymentMethod::Cod,
                shipping_address: Some(shipping_address()),
            },
        )
        .await
        .expect("checkout")
        .remove(0)
}

#[tokio::test]
async fn cancel_returns_stock_once() {
    let app = TestApp::new().await;
    let order = place_cod_order(&app, app.vendor_a.id, "Toaster", 3).await;
    let product_id = order.items[0].product_id;
    assert_eq!(app.product(product_id).await.stock, 17);

    let cancelled = app
        .state
        .services
        .orders
        .cancel_order(&app.buyer, order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let product = app.product(product_id).await;
    assert_eq!(product.stock, 20);
    assert_eq!(product.sales, 0);

    let again = app
        .state
        .services
        .orders
        .cancel_order(&app.buyer, order.id)
        .await
        .unwrap_err();
    assert_matches!(again, ServiceError::AlreadyCancelled(id) if id == order.id);
    assert_eq!(again.kind(), ErrorKind::Conflict);
    assert_eq!(app.product(product_id).await.stock, 20);

    let events = app.recorded_events().await;
    assert!(events.contains(&Event::OrderCancelled(order.id)));
}

#[tokio::test]
async fn shipped_orders_can_be_cancelled_but_delivered_cannot() {
    let app = TestApp::new().await;
    let shipped = place_cod_order(&app, app.vendor_a.id, "Blender", 1).await;
    app.force_order_status(shipped.id, OrderStatus::Shipped).await;
    app.state
        .services
        .orders
        .cancel_order(&app.vendor_a, shipped.id)
        .await
        .expect("shipped order cancels");

    let delivered = place_cod_order(&app, app.vendor_a.id, "Grinder", 1).await;
    app.force_order_status(delivered.id, OrderStatus::Delivered).await;
    let err = app
        .state
        .services
        .orders
        .cancel_order(&app.buyer, delivered.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Undeliverable(_));
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn strangers_cannot_touch_an_order() {
    let app = TestApp::new().await;
    let order = place_cod_order(&app, app.vendor_a.id, "Iron", 1).await;

    let by_other_buyer = app
        .state
        .services
        .orders
        .cancel_order(&app.other_buyer, order.id)
        .await
        .unwrap_err();
    assert_matches!(by_other_buyer, ServiceError::Forbidden(_));

    let by_other_vendor = app
        .state
        .services
        .orders
        .get_order(&app.vendor_b, order.id)
        .await
        .unwrap_err();
    assert_eq!(by_other_vendor.kind(), ErrorKind::Unauthorized);

    let missing = app
        .state
        .services
        .orders
        .get_order(&app.admin, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(missing, ServiceError::NotFound(_));
}

#[tokio::test]
async fn vendor_moves_order_forward_only() {
    let app = TestApp::new().await;
    let order = place_cod_order(&app, app.vendor_a.id, "Heater", 1).await;
    let orders = &app.state.services.orders;

    let shipped = orders
        .update_order_status(&app.vendor_a, order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let backwards = orders
        .update_order_status(&app.vendor_a, order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert_matches!(
        backwards,
        ServiceError::InvalidTransition { from, to } if from == "shipped" && to == "confirmed"
    );

    let by_buyer = orders
        .update_order_status(&app.buyer, order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert_matches!(by_buyer, ServiceError::Forbidden(_));

    let returned = orders
        .update_order_status(&app.admin, order.id, OrderStatus::Returned)
        .await
        .unwrap_err();
    assert_eq!(returned.kind(), ErrorKind::InvalidTransition);

    let delivered = orders
        .update_order_status(&app.vendor_a, order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);

    let events = app.recorded_events().await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::OrderStatusChanged { order_id, new_status, .. }
            if *order_id == order.id && new_status == "delivered"
    )));
}

#[tokio::test]
async fn status_update_to_cancelled_restocks() {
    let app = TestApp::new().await;
    let order = place_cod_order(&app, app.vendor_a.id, "Mixer", 4).await;
    let product_id = order.items[0].product_id;

    let cancelled = app
        .state
        .services
        .orders
        .update_order_status(&app.staff, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.product(product_id).await.stock, 20);
}

#[tokio::test]
async fn listing_is_scoped_paginated_and_searchable() {
    let app = TestApp::new().await;
    for i in 0..3 {
        place_cod_order(&app, app.vendor_a.id, &format!("Teapot {}", i), 1).await;
    }
    let candle = place_cod_order(&app, app.vendor_b.id, "Candle", 2).await;
    app.force_order_status(candle.id, OrderStatus::Shipped).await;

    let orders = &app.state.services.orders;

    let first_page = orders
        .get_orders(
            &app.buyer,
            OrderListQuery {
                page: Some(1),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_page.meta.count, 4);
    assert_eq!(first_page.meta.total_pages, 2);
    assert_eq!(first_page.meta.current_page, 1);
    assert_eq!(first_page.orders.len(), 2);
    assert!(first_page.meta.prev_url.is_none());
    let next = first_page.meta.next_url.expect("second page link");
    assert!(next.contains("/api/v1/orders"));
    assert!(next.contains("page=2"));
    assert!(first_page.orders[0].created_at >= first_page.orders[1].created_at);

    let vendor_view = orders
        .get_orders(&app.vendor_b, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(vendor_view.meta.count, 1);
    assert_eq!(vendor_view.orders[0].id, candle.id);

    let shipped = orders
        .get_orders(
            &app.admin,
            OrderListQuery {
                status: Some(OrderStatus::Shipped),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.meta.count, 1);

    let by_product = orders
        .get_orders(
            &app.buyer,
            OrderListQuery {
                search: Some("teapot".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_product.meta.count, 3);

    let by_city = orders
        .get_orders(
            &app.buyer,
            OrderListQuery {
                search: Some("Pune".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_city.meta.count, 4);

    let stranger = orders
        .get_orders(&app.other_buyer, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(stranger.meta.count, 0);
    assert_eq!(stranger.meta.total_pages, 0);
}

#[tokio::test]
async fn paid_orders_materialize_from_a_payment_session() {
    let app = TestApp::new().await;
    let lamp = app
        .seed_product(app.vendor_a.id, "Lamp", dec!(60), dec!(0), 3)
        .await;
    app.add_to_cart(&app.buyer, lamp.id, 1).await;
    app.state
        .services
        .cart
        .set_shipping(app.buyer.id, shipping_address())
        .await
        .unwrap();

    let orders = app
        .state
        .services
        .orders
        .create_orders_after_payment(app.buyer.id, "order_session_1".to_string())
        .await
        .unwrap();

    assert_eq!(orders[0].status, OrderStatus::Confirmed);
    assert_eq!(orders[0].payment_status, PaymentStatus::Paid);
    assert_eq!(orders[0].payment_session_id.as_deref(), Some("order_session_1"));
    assert_eq!(orders[0].shipping_address, Some(shipping_address()));
}
