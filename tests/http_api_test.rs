//! End-to-end requests through the axum router: caller identity, response
//! envelopes, error bodies and the signed payout webhook.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{response_json, shipping_address, MockGateway, TestApp, TEST_KEY_SECRET};
use marketplace_api::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    entities::TransactionStatus,
    handlers::payments::GATEWAY_SIGNATURE_HEADER,
    services::payments::{sign_payload, GatewayPayout},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sea_orm::DatabaseConnection;
use std::str::FromStr;
use tower::ServiceExt;

fn decimal(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal as string")).expect("decimal parses")
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let (status, body) = response_json(app.request(Method::GET, "/health", None, None).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn health_reports_database_down_without_driver_details() {
    let app = TestApp::new().await;
    let mut state = app.state.clone();
    state.db = Arc::new(DatabaseConnection::Disconnected);
    let router = marketplace_api::build_router(state);

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "down");
    assert_eq!(body["database_error"], "database unreachable");
}

#[tokio::test]
async fn order_search_treats_wildcards_literally() {
    let app = TestApp::new().await;
    let mug = app
        .seed_product(app.vendor_a.id, "Mug", dec!(50), dec!(0), 5)
        .await;
    app.add_to_cart(&app.buyer, mug.id, 1).await;
    let (status, _) = response_json(
        app.request(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(&app.buyer),
            Some(json!({
                "paymentMethod": "COD",
                "shippingAddress": shipping_address(),
            })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for (search, expected) in [("Mug", 1), ("%25", 0), ("M_g", 0), ("Mu%25", 0)] {
        let (status, body) = response_json(
            app.request(
                Method::GET,
                &format!("/api/v1/orders?search={}", search),
                Some(&app.buyer),
                None,
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["meta"]["count"], expected, "search {:?}", search);
    }
}

#[tokio::test]
async fn caller_identity_is_required_and_checked() {
    let app = TestApp::new().await;

    let (status, body) =
        response_json(app.request(Method::GET, "/api/v1/cart", None, None).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = response_json(
        app.request_raw(
            "/api/v1/orders/checkout",
            &[
                (ACTOR_ID_HEADER, &app.buyer.id.to_string()),
                (ACTOR_ROLE_HEADER, "admin"),
                ("content-type", "application/json"),
            ],
            br#"{"paymentMethod":"COD"}"#.to_vec(),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = response_json(
        app.request_raw(
            "/api/v1/cart/items",
            &[
                (ACTOR_ID_HEADER, "buyer@example.com"),
                ("content-type", "application/json"),
            ],
            br#"{"product_id":"00000000-0000-0000-0000-000000000000","quantity":1}"#.to_vec(),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "email identifies the buyer");
}

#[tokio::test]
async fn cart_to_order_over_http() {
    let app = TestApp::new().await;
    let radio = app
        .seed_product(app.vendor_a.id, "Radio", dec!(100), dec!(10), 5)
        .await;

    let (status, body) = response_json(
        app.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(&app.buyer),
            Some(json!({ "product_id": radio.id, "quantity": 2 })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(180));

    let (status, body) = response_json(
        app.request(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(&app.buyer),
            Some(json!({
                "paymentMethod": "COD",
                "shippingAddress": shipping_address(),
            })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["data"][0];
    assert_eq!(order["status"], "approved");
    assert_eq!(decimal(&order["totalAmount"]), dec!(180));
    let order_id = order["id"].as_str().expect("order id").to_string();

    let (status, body) = response_json(
        app.request(Method::GET, "/api/v1/orders?limit=1", Some(&app.vendor_a), None)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["count"], 1);
    assert_eq!(body["data"]["items"][0]["id"], order_id.as_str());

    let (status, body) = response_json(
        app.request(
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(&app.buyer),
            Some(json!({ "status": "shipped" })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = response_json(
        app.request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&app.buyer),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = response_json(
        app.request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&app.buyer),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
    assert_eq!(app.product(radio.id).await.stock, 5);
}

#[tokio::test]
async fn empty_cart_checkout_is_unprocessable() {
    let app = TestApp::new().await;
    let (status, body) = response_json(
        app.request(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(&app.buyer),
            Some(json!({
                "paymentMethod": "COD",
                "shippingAddress": shipping_address(),
            })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn payout_webhook_requires_a_valid_signature() {
    let mut gateway = MockGateway::new();
    gateway.expect_create_payout().returning(|_, _, _| {
        Ok(GatewayPayout {
            gateway_payout_id: "pout_http".to_string(),
            status: TransactionStatus::Processing,
        })
    });
    let app = TestApp::with_gateway(Arc::new(gateway)).await;

    let (status, _) = response_json(
        app.request(
            Method::POST,
            "/api/v1/payouts",
            Some(&app.admin),
            Some(json!({ "vendorId": app.vendor_b.id, "amount": "250.00" })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = br#"{"gatewayPayoutId":"pout_http","status":"success"}"#.to_vec();

    let (status, error) = response_json(
        app.request_raw(
            "/api/v1/payouts/webhook",
            &[(GATEWAY_SIGNATURE_HEADER, "deadbeef")],
            body.clone(),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "invalid_signature");

    let signature = sign_payload(TEST_KEY_SECRET, &body).unwrap();
    let (status, accepted) = response_json(
        app.request_raw(
            "/api/v1/payouts/webhook",
            &[(GATEWAY_SIGNATURE_HEADER, &signature)],
            body,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["data"]["status"], "success");
}
