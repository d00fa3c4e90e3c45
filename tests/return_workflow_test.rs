//! Returns and refunds: eligibility checks, the staff/admin workflow, and the
//! refund that follows an approval or a cancelled online order.

mod common;

use assert_matches::assert_matches;
use common::{shipping_address, TestApp};
use marketplace_api::{
    entities::{
        order::{self, Entity as OrderEntity},
        refund::Entity as RefundEntity,
        OrderStatus, PaymentMethod, PaymentStatus, RefundInitiator, RefundStatus, ReturnStatus,
    },
    errors::{ErrorKind, ServiceError},
    services::{
        orders::{CheckoutRequest, OrderView},
        refunds::UpdateRefundStatusRequest,
        returns::RequestReturnInput,
    },
};
use rust_decimal_macros::dec;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// COD order for 3 kettles at 40 each.
async fn kettle_order(app: &TestApp, status: OrderStatus) -> OrderView {
    let kettle = app
        .seed_product(app.vendor_a.id, "Kettle", dec!(40), dec!(0), 10)
        .await;
    app.add_to_cart(&app.buyer, kettle.id, 3).await;
    let order = app
        .state
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
        .unwrap()
        .remove(0);
    app.force_order_status(order.id, status).await;
    order
}

fn return_of(order: &OrderView, quantity: i32) -> RequestReturnInput {
    RequestReturnInput {
        order_id: order.id,
        product_id: order.items[0].product_id,
        quantity,
        reason: "Lid does not close".to_string(),
    }
}

#[tokio::test]
async fn quantity_is_checked_before_delivery() {
    let app = TestApp::new().await;
    let returns = &app.state.services.returns;

    for status in [OrderStatus::Approved, OrderStatus::Delivered] {
        let order = kettle_order(&app, status).await;
        let err = returns
            .request_return(&app.buyer, return_of(&order, 5))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::QuantityExceeded { requested: 5, purchased: 3 }
        );
    }
}

#[tokio::test]
async fn undelivered_orders_cannot_be_returned() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Shipped).await;

    let err = app
        .state
        .services
        .returns
        .request_return(&app.buyer, return_of(&order, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotDelivered(id) if id == order.id);
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn eligibility_errors() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Delivered).await;
    let returns = &app.state.services.returns;

    let unknown_order = returns
        .request_return(
            &app.buyer,
            RequestReturnInput {
                order_id: Uuid::new_v4(),
                ..return_of(&order, 1)
            },
        )
        .await
        .unwrap_err();
    assert_matches!(unknown_order, ServiceError::NotFound(_));

    let foreign_product = returns
        .request_return(
            &app.buyer,
            RequestReturnInput {
                product_id: Uuid::new_v4(),
                ..return_of(&order, 1)
            },
        )
        .await
        .unwrap_err();
    assert_matches!(foreign_product, ServiceError::ItemNotFound(_));

    let by_vendor = returns
        .request_return(&app.vendor_a, return_of(&order, 1))
        .await
        .unwrap_err();
    assert_matches!(by_vendor, ServiceError::Forbidden(_));

    let by_stranger = returns
        .request_return(&app.other_buyer, return_of(&order, 1))
        .await
        .unwrap_err();
    assert_matches!(by_stranger, ServiceError::Forbidden(_));

    let blank_reason = returns
        .request_return(
            &app.buyer,
            RequestReturnInput {
                reason: String::new(),
                ..return_of(&order, 1)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(blank_reason.kind(), ErrorKind::ValidationError);

    returns
        .request_return(&app.buyer, return_of(&order, 1))
        .await
        .expect("first return opens");
    let duplicate = returns
        .request_return(&app.buyer, return_of(&order, 2))
        .await
        .unwrap_err();
    assert_matches!(duplicate, ServiceError::Conflict(_));
}

#[tokio::test]
async fn full_return_flow_restocks_refunds_and_closes_the_order() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Delivered).await;
    let product_id = order.items[0].product_id;
    assert_eq!(app.product(product_id).await.stock, 7);
    let returns = &app.state.services.returns;

    let opened = returns
        .request_return(&app.buyer, return_of(&order, 2))
        .await
        .unwrap();
    assert_eq!(opened.status, ReturnStatus::Requested);
    assert_eq!(opened.refund_amount, dec!(80));
    assert_eq!(opened.vendor_id, app.vendor_a.id);

    let staff_only = returns
        .advance_return(&app.staff, opened.id, ReturnStatus::Approved)
        .await
        .unwrap_err();
    assert_matches!(staff_only, ServiceError::Forbidden(_));

    let skipped = returns
        .advance_return(&app.admin, opened.id, ReturnStatus::Inspected)
        .await
        .unwrap_err();
    assert_matches!(skipped, ServiceError::InvalidTransition { .. });

    returns
        .advance_return(&app.staff, opened.id, ReturnStatus::StaffApproved)
        .await
        .unwrap();
    returns
        .advance_return(&app.staff, opened.id, ReturnStatus::Inspected)
        .await
        .unwrap();
    let approved = returns
        .advance_return(&app.admin, opened.id, ReturnStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, ReturnStatus::Approved);
    assert_eq!(app.product(product_id).await.stock, 9);

    let refund_id = approved.refund_id.expect("approval opens a refund");
    let refund = RefundEntity::find_by_id(refund_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Initiated);
    assert_eq!(refund.initiated_by, RefundInitiator::Admin);
    assert_eq!(refund.amount, dec!(80));
    assert_eq!(refund.return_id, Some(opened.id));
    let stamped = OrderEntity::find_by_id(order.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stamped.refund_id, Some(refund_id));

    returns
        .advance_return(&app.admin, opened.id, ReturnStatus::RefundInitiated)
        .await
        .unwrap();
    let refund = RefundEntity::find_by_id(refund_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Processing);

    let received = returns
        .advance_return(&app.admin, opened.id, ReturnStatus::RefundReceived)
        .await
        .unwrap();
    assert_eq!(received.status, ReturnStatus::RefundReceived);
    let refund = RefundEntity::find_by_id(refund_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Completed);

    let order = app
        .state
        .services
        .orders
        .get_order(&app.buyer, order.id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Returned);

    let visible = returns.get_return(&app.vendor_a, opened.id).await.unwrap();
    assert_eq!(visible.status, ReturnStatus::RefundReceived);
    let hidden = returns
        .get_return(&app.vendor_b, opened.id)
        .await
        .unwrap_err();
    assert_matches!(hidden, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn rejected_returns_free_the_line_for_a_new_request() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Delivered).await;
    let returns = &app.state.services.returns;

    let first = returns
        .request_return(&app.buyer, return_of(&order, 1))
        .await
        .unwrap();
    returns
        .advance_return(&app.staff, first.id, ReturnStatus::StaffRejected)
        .await
        .unwrap();
    let rejected = returns
        .advance_return(&app.admin, first.id, ReturnStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.status, ReturnStatus::Rejected);
    assert!(rejected.refund_id.is_none());

    returns
        .request_return(&app.buyer, return_of(&order, 1))
        .await
        .expect("a rejected return does not block a new one");
}

#[tokio::test]
async fn completing_the_refund_closes_the_return() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Delivered).await;
    let returns = &app.state.services.returns;
    let refunds = &app.state.services.refunds;

    let opened = returns
        .request_return(&app.buyer, return_of(&order, 3))
        .await
        .unwrap();
    for (actor, step) in [
        (&app.staff, ReturnStatus::StaffApproved),
        (&app.staff, ReturnStatus::Inspected),
        (&app.admin, ReturnStatus::Approved),
    ] {
        returns.advance_return(actor, opened.id, step).await.unwrap();
    }
    let refund_id = returns
        .get_return(&app.admin, opened.id)
        .await
        .unwrap()
        .refund_id
        .unwrap();

    let update = |status| UpdateRefundStatusRequest {
        status,
        gateway_refund_id: Some("rfnd_1".to_string()),
    };
    let not_admin = refunds
        .update_refund_status(&app.staff, refund_id, update(RefundStatus::Processing))
        .await
        .unwrap_err();
    assert_matches!(not_admin, ServiceError::Forbidden(_));

    let skipped = refunds
        .update_refund_status(&app.admin, refund_id, update(RefundStatus::Completed))
        .await
        .unwrap_err();
    assert_matches!(skipped, ServiceError::InvalidTransition { .. });

    refunds
        .update_refund_status(&app.admin, refund_id, update(RefundStatus::Processing))
        .await
        .unwrap();
    let completed = refunds
        .update_refund_status(&app.admin, refund_id, update(RefundStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.status, RefundStatus::Completed);
    assert_eq!(completed.gateway_refund_id.as_deref(), Some("rfnd_1"));

    let closed = returns.get_return(&app.buyer, opened.id).await.unwrap();
    assert_eq!(closed.status, ReturnStatus::RefundReceived);
    let order = app
        .state
        .services
        .orders
        .get_order(&app.buyer, order.id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Returned);
}

#[tokio::test]
async fn refund_of_an_approved_return_cannot_be_rejected() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Delivered).await;
    let returns = &app.state.services.returns;

    let opened = returns
        .request_return(&app.buyer, return_of(&order, 2))
        .await
        .unwrap();
    for (actor, step) in [
        (&app.staff, ReturnStatus::StaffApproved),
        (&app.staff, ReturnStatus::Inspected),
        (&app.admin, ReturnStatus::Approved),
        (&app.admin, ReturnStatus::RefundInitiated),
    ] {
        returns.advance_return(actor, opened.id, step).await.unwrap();
    }
    let refund_id = returns
        .get_return(&app.admin, opened.id)
        .await
        .unwrap()
        .refund_id
        .unwrap();

    let err = app
        .state
        .services
        .refunds
        .update_refund_status(
            &app.admin,
            refund_id,
            UpdateRefundStatusRequest {
                status: RefundStatus::Rejected,
                gateway_refund_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    let refund = RefundEntity::find_by_id(refund_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Processing);
    let still_open = returns.get_return(&app.buyer, opened.id).await.unwrap();
    assert_eq!(still_open.status, ReturnStatus::RefundInitiated);
}

#[tokio::test]
async fn cancelled_online_order_can_be_refunded_once() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Confirmed).await;
    OrderEntity::update_many()
        .col_expr(order::Column::PaymentMethod, Expr::value(PaymentMethod::Online))
        .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .filter(order::Column::Id.eq(order.id))
        .exec(&*app.state.db)
        .await
        .unwrap();
    let refunds = &app.state.services.refunds;

    let too_early = refunds
        .request_order_refund(&app.buyer, order.id)
        .await
        .unwrap_err();
    assert_matches!(too_early, ServiceError::InvalidTransition { .. });

    app.state
        .services
        .orders
        .cancel_order(&app.buyer, order.id)
        .await
        .unwrap();
    let refund = refunds
        .request_order_refund(&app.buyer, order.id)
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Requested);
    assert_eq!(refund.initiated_by, RefundInitiator::User);
    assert_eq!(refund.amount, dec!(120));
    assert!(refund.return_id.is_none());

    let again = refunds
        .request_order_refund(&app.buyer, order.id)
        .await
        .unwrap_err();
    assert_matches!(again, ServiceError::Conflict(_));
}

#[tokio::test]
async fn cash_orders_have_nothing_to_refund() {
    let app = TestApp::new().await;
    let order = kettle_order(&app, OrderStatus::Approved).await;
    app.state
        .services
        .orders
        .cancel_order(&app.buyer, order.id)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .refunds
        .request_order_refund(&app.buyer, order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}
