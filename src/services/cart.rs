use crate::{
    db::{DbPool, UnitOfWork},
    entities::{cart, cart_item, Cart, CartItem, CartItemModel, CartModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Delivery address snapshot, stored on the cart and frozen onto orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "address line is required"))]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 3, max = 12, message = "postal code is invalid"))]
    pub postal_code: String,
    #[validate(length(min = 2, message = "country is required"))]
    pub country: String,
    #[validate(length(min = 7, max = 20, message = "phone number is invalid"))]
    pub phone: String,
}

impl ShippingAddress {
    pub(crate) fn to_json(&self) -> Result<String, ServiceError> {
        serde_json::to_string(self)
            .map_err(|e| ServiceError::InternalError(format!("encode shipping address: {}", e)))
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(raw)
            .map_err(|e| ServiceError::InternalError(format!("decode shipping address: {}", e)))
    }
}

/// Upper bound on the quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000, message = "quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecrementCartItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

/// Read model of a buyer's cart. An absent cart renders as an empty one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub user_id: Uuid,
    pub items: Vec<CartItemModel>,
    pub total_amount: Decimal,
    pub shipping: Option<ShippingAddress>,
}

impl CartView {
    fn empty(user_id: Uuid) -> Self {
        Self {
            cart_id: None,
            user_id,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            shipping: None,
        }
    }

    fn from_parts(cart: CartModel, items: Vec<CartItemModel>) -> Result<Self, ServiceError> {
        let shipping = cart
            .shipping
            .as_deref()
            .map(ShippingAddress::from_json)
            .transpose()?;
        Ok(Self {
            cart_id: Some(cart.id),
            user_id: cart.user_id,
            items,
            total_amount: cart.total_amount,
            shipping,
        })
    }
}

/// Buyer cart aggregate. Every mutation recomputes the cart total from its
/// line subtotals inside the same unit of work, so
/// `total_amount == Σ subtotal` at every rest point.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds `quantity` units of a product, creating the cart on first use.
    ///
    /// The unit price is refreshed from the catalog on every add (latest price
    /// wins). Stock is checked against the combined line quantity but not
    /// reserved; reservation happens at checkout.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::ValidationError)` - quantity below 1
    /// * `Err(ServiceError::NotFound)` - unknown product
    /// * `Err(ServiceError::OutOfStock)` - not enough stock for the line
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = add_item_in(uow.conn(), user_id, &input).await;
        let view = uow.finish(outcome).await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(user_id))
            .await;
        info!(%user_id, product_id = %input.product_id, quantity = input.quantity, "item added to cart");
        Ok(view)
    }

    /// Removes `quantity` units of a line; the line disappears at zero.
    #[instrument(skip(self))]
    pub async fn decrement_item(
        &self,
        user_id: Uuid,
        input: DecrementCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = decrement_item_in(uow.conn(), user_id, &input).await;
        let view = uow.finish(outcome).await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(user_id))
            .await;
        Ok(view)
    }

    /// Drops a line regardless of its quantity.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = remove_item_in(uow.conn(), user_id, product_id).await;
        let view = uow.finish(outcome).await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(user_id))
            .await;
        Ok(view)
    }

    /// Empties the cart. Calling it on an empty or absent cart is a no-op.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = clear_in(uow.conn(), user_id).await;
        let view = uow.finish(outcome).await?;

        self.event_sender
            .send_or_log(Event::CartCleared(user_id))
            .await;
        Ok(view)
    }

    /// Stores the pending shipping snapshot used by checkout.
    #[instrument(skip(self, address))]
    pub async fn set_shipping(
        &self,
        user_id: Uuid,
        address: ShippingAddress,
    ) -> Result<CartView, ServiceError> {
        address.validate()?;

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = async {
            let cart = find_or_create_cart(uow.conn(), user_id).await?;
            let mut active: cart::ActiveModel = cart.into();
            active.shipping = Set(Some(address.to_json()?));
            active.updated_at = Set(Utc::now());
            let cart = active.update(uow.conn()).await?;
            let items = load_items(uow.conn(), cart.id).await?;
            CartView::from_parts(cart, items)
        }
        .await;
        uow.finish(outcome).await
    }

    /// Returns the cart with its lines in insertion order.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        load_view(&*self.db, user_id).await
    }
}

pub(crate) async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<CartModel>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn find_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<CartModel, ServiceError> {
    if let Some(cart) = find_cart(conn, user_id).await? {
        return Ok(cart);
    }

    let now = Utc::now();
    let cart = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_amount: Set(Decimal::ZERO),
        shipping: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    info!(%user_id, cart_id = %cart.id, "created cart");
    Ok(cart)
}

pub(crate) async fn load_items<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<CartItemModel>, ServiceError> {
    Ok(CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Position)
        .all(conn)
        .await?)
}

async fn load_view<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<CartView, ServiceError> {
    match find_cart(conn, user_id).await? {
        Some(cart) => {
            let items = load_items(conn, cart.id).await?;
            CartView::from_parts(cart, items)
        }
        None => Ok(CartView::empty(user_id)),
    }
}

/// Rewrites `total_amount` as the sum of the current line subtotals.
async fn recalculate_totals<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
) -> Result<CartView, ServiceError> {
    let items = load_items(conn, cart.id).await?;
    let total: Decimal = items.iter().map(|i| i.subtotal).sum();

    let mut active: cart::ActiveModel = cart.into();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now());
    let cart = active.update(conn).await?;

    CartView::from_parts(cart, items)
}

async fn add_item_in<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    input: &AddToCartInput,
) -> Result<CartView, ServiceError> {
    let product = catalog::find_product(conn, input.product_id).await?;
    let unit_price = catalog::effective_unit_price(&product);
    let cart = find_or_create_cart(conn, user_id).await?;
    let items = load_items(conn, cart.id).await?;
    let now = Utc::now();

    match items.iter().find(|i| i.product_id == input.product_id) {
        Some(existing) => {
            let quantity = existing
                .quantity
                .checked_add(input.quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(|| {
                    ServiceError::invalid_field(
                        "quantity",
                        format!("a cart line holds at most {} units", MAX_LINE_QUANTITY),
                    )
                })?;
            if product.stock < quantity {
                return Err(ServiceError::OutOfStock(format!(
                    "{} has {} left, cart would hold {}",
                    product.name, product.stock, quantity
                )));
            }
            let mut line: cart_item::ActiveModel = existing.clone().into();
            line.quantity = Set(quantity);
            line.unit_price = Set(unit_price);
            line.subtotal = Set(unit_price * Decimal::from(quantity));
            line.updated_at = Set(now);
            line.update(conn).await?;
        }
        None => {
            if product.stock < input.quantity {
                return Err(ServiceError::OutOfStock(format!(
                    "{} has {} left, requested {}",
                    product.name, product.stock, input.quantity
                )));
            }
            let position = items.iter().map(|i| i.position).max().unwrap_or(0) + 1;
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                position: Set(position),
                quantity: Set(input.quantity),
                unit_price: Set(unit_price),
                subtotal: Set(unit_price * Decimal::from(input.quantity)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
        }
    }

    recalculate_totals(conn, cart).await
}

async fn decrement_item_in<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    input: &DecrementCartItemInput,
) -> Result<CartView, ServiceError> {
    let cart = find_cart(conn, user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart for buyer {} not found", user_id)))?;
    let line = find_line(conn, cart.id, input.product_id).await?;

    let remaining = line.quantity - input.quantity;
    if remaining < 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "cannot remove {} of {} units",
            input.quantity, line.quantity
        )));
    }

    if remaining == 0 {
        CartItem::delete_by_id(line.id).exec(conn).await?;
    } else {
        let unit_price = line.unit_price;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(remaining);
        active.subtotal = Set(unit_price * Decimal::from(remaining));
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }

    recalculate_totals(conn, cart).await
}

async fn remove_item_in<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartView, ServiceError> {
    let cart = find_cart(conn, user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart for buyer {} not found", user_id)))?;
    let line = find_line(conn, cart.id, product_id).await?;
    CartItem::delete_by_id(line.id).exec(conn).await?;
    recalculate_totals(conn, cart).await
}

/// Empties the buyer's cart inside the caller's transaction.
pub(crate) async fn clear_in<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<CartView, ServiceError> {
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(CartView::empty(user_id));
    };

    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    recalculate_totals(conn, cart).await
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemModel, ServiceError> {
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_address_requires_core_fields() {
        let address = ShippingAddress {
            name: "".into(),
            line1: "12 MG Road".into(),
            line2: None,
            city: "Pune".into(),
            state: "MH".into(),
            postal_code: "411001".into(),
            country: "IN".into(),
            phone: "9876543210".into(),
        };
        let err: ServiceError = address.validate().unwrap_err().into();
        assert_eq!(err.field_errors()[0].field, "name");
    }

    #[test]
    fn add_input_rejects_zero_quantity() {
        let input = AddToCartInput {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(input.validate().is_err());
    }
}
