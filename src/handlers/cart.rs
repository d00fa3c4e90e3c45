use crate::{
    auth::Actor,
    services::cart::{AddToCartInput, CartView, DecrementCartItemInput, ShippingAddress},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/decrement", post(decrement_item))
        .route("/cart/items/:product_id", delete(remove_item))
        .route("/cart/shipping", put(set_shipping))
}

async fn get_cart(State(state): State<AppState>, actor: Actor) -> ApiResult<CartView> {
    let cart = state.services.cart.get_cart(actor.id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn add_item(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<AddToCartInput>,
) -> ApiResult<CartView> {
    let cart = state.services.cart.add_item(actor.id, payload).await?;
    Ok(Json(ApiResponse::with_message(cart, "Item added to cart")))
}

async fn decrement_item(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<DecrementCartItemInput>,
) -> ApiResult<CartView> {
    let cart = state.services.cart.decrement_item(actor.id, payload).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn remove_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
) -> ApiResult<CartView> {
    let cart = state.services.cart.remove_item(actor.id, product_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn clear_cart(State(state): State<AppState>, actor: Actor) -> ApiResult<CartView> {
    let cart = state.services.cart.clear(actor.id).await?;
    Ok(Json(ApiResponse::with_message(cart, "Cart cleared")))
}

async fn set_shipping(
    State(state): State<AppState>,
    actor: Actor,
    Json(address): Json<ShippingAddress>,
) -> ApiResult<CartView> {
    let cart = state.services.cart.set_shipping(actor.id, address).await?;
    Ok(Json(ApiResponse::success(cart)))
}
