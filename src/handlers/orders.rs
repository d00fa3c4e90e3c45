use crate::{
    auth::Actor,
    entities::RefundModel,
    services::orders::{CheckoutRequest, OrderListQuery, OrderView, UpdateOrderStatusRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/checkout", post(checkout))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/refund", post(request_refund))
}

/// Splits the caller's cart into one order per vendor.
async fn checkout(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<OrderView>>>), crate::errors::ServiceError> {
    let orders = state
        .services
        .orders
        .create_orders_from_cart(actor.id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(orders, "Orders placed")),
    ))
}

async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderView>> {
    let page = state.services.orders.get_orders(&actor, query).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: page.orders,
        meta: page.meta,
    })))
}

async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.get_order(&actor, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn update_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .update_order_status(&actor, id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn cancel_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.cancel_order(&actor, id).await?;
    Ok(Json(ApiResponse::with_message(order, "Order cancelled")))
}

async fn request_refund(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<RefundModel> {
    let refund = state
        .services
        .refunds
        .request_order_refund(&actor, id)
        .await?;
    Ok(Json(ApiResponse::with_message(refund, "Refund requested")))
}
