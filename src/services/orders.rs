use crate::{
    auth::{Actor, Role},
    db::{DbPool, UnitOfWork},
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
        product, OrderStatus, PaymentMethod, PaymentStatus, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender, Recipient},
    services::{
        cart::{self as cart_svc, ShippingAddress},
        catalog,
        notifications::{notify_best_effort, Notification, Notifier},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, LikeExpr, Query},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;
use uuid::Uuid;
use validator::Validate;

const ORDERS_PATH: &str = "/api/v1/orders";
const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Request/Response types for the order service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct OrderListQuery {
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
    /// Matched against product names and the shipping address
    pub search: Option<String>,
}

/// An order together with its frozen line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vendor_id: Uuid,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub tracking_id: String,
    pub payment_id: Option<String>,
    pub payment_session_id: Option<String>,
    pub refund_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemModel>,
}

impl OrderView {
    pub(crate) fn assemble(
        order: OrderModel,
        items: Vec<OrderItemModel>,
    ) -> Result<Self, ServiceError> {
        let shipping_address = order
            .shipping_address
            .as_deref()
            .map(ShippingAddress::from_json)
            .transpose()?;
        Ok(Self {
            id: order.id,
            user_id: order.user_id,
            vendor_id: order.vendor_id,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            status: order.status,
            shipping_address,
            tracking_id: order.tracking_id,
            payment_id: order.payment_id,
            payment_session_id: order.payment_session_id,
            refund_id: order.refund_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub count: u64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub current_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub meta: PageMeta,
}

/// How newly materialized orders are stamped.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub shipping_address: Option<String>,
    pub payment_session_id: Option<String>,
    pub payment_id: Option<String>,
}

impl Placement {
    /// Checkout before (or without) online payment.
    fn for_checkout(method: PaymentMethod, shipping_address: String) -> Self {
        let (status, payment_status) = match method {
            PaymentMethod::Cod => (OrderStatus::Approved, PaymentStatus::Pending),
            PaymentMethod::Online => (OrderStatus::Pending, PaymentStatus::Initiating),
        };
        Self {
            payment_method: method,
            payment_status,
            status,
            shipping_address: Some(shipping_address),
            payment_session_id: None,
            payment_id: None,
        }
    }

    /// Orders created once the gateway payment has been verified.
    pub(crate) fn paid_online(payment_session_id: String, payment_id: Option<String>) -> Self {
        Self {
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Paid,
            status: OrderStatus::Confirmed,
            shipping_address: None,
            payment_session_id: Some(payment_session_id),
            payment_id,
        }
    }
}

/// Service for the vendor-split order lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    page_limit_max: u64,
    public_base_url: String,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
        page_limit_max: u64,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            page_limit_max: page_limit_max.max(1),
            public_base_url: public_base_url.into(),
        }
    }

    /// Converts the buyer's cart into one order per vendor.
    ///
    /// All-or-nothing: orders, stock decrements and the cart clear commit
    /// together or not at all. Vendors are notified after commit.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::ValidationError)` - no shipping address on the request or the cart
    /// * `Err(ServiceError::EmptyCart)` - nothing to check out
    /// * `Err(ServiceError::OutOfStock)` - a conditional stock decrement matched no row
    #[instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    pub async fn create_orders_from_cart(
        &self,
        buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let shipping = match request.shipping_address {
            Some(address) => {
                address.validate()?;
                address
            }
            None => cart_svc::find_cart(&*self.db_pool, buyer_id)
                .await?
                .and_then(|c| c.shipping)
                .map(|raw| ShippingAddress::from_json(&raw))
                .transpose()?
                .ok_or_else(|| {
                    ServiceError::invalid_field("shippingAddress", "shipping address is required")
                })?,
        };
        let placement = Placement::for_checkout(request.payment_method, shipping.to_json()?);

        let uow = UnitOfWork::begin(&self.db_pool).await?;
        let outcome = create_orders_in(uow.conn(), buyer_id, placement).await;
        let orders = uow.finish(outcome).await.map_err(|e| {
            warn!(error = %e, buyer_id = %buyer_id, "checkout aborted");
            e
        })?;

        info!(buyer_id = %buyer_id, orders = orders.len(), "checkout completed");
        self.announce_created(&orders).await;
        Ok(orders)
    }

    /// Materializes paid orders for a verified online payment session.
    #[instrument(skip(self))]
    pub async fn create_orders_after_payment(
        &self,
        buyer_id: Uuid,
        payment_session_id: String,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let uow = UnitOfWork::begin(&self.db_pool).await?;
        let outcome = create_orders_in(
            uow.conn(),
            buyer_id,
            Placement::paid_online(payment_session_id, None),
        )
        .await;
        let orders = uow.finish(outcome).await?;

        self.announce_created(&orders).await;
        Ok(orders)
    }

    /// Publishes creation events and notifies each vendor.
    pub(crate) async fn announce_created(&self, orders: &[OrderView]) {
        for order in orders {
            self.event_sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id,
                    user_id: order.user_id,
                    vendor_id: order.vendor_id,
                })
                .await;
            notify_best_effort(
                &*self.notifier,
                Recipient::Vendor(order.vendor_id),
                Notification::new(
                    "New order",
                    format!(
                        "Order {} received for {}",
                        order.tracking_id, order.total_amount
                    ),
                    "order",
                ),
            )
            .await;
        }
    }

    /// Cancels an order and returns its stock.
    ///
    /// Buyers may cancel only their own orders, vendors only orders placed
    /// with them; staff and admins may cancel any order.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let uow = UnitOfWork::begin(&self.db_pool).await?;
        let outcome = cancel_order_in(uow.conn(), actor, order_id).await;
        let order = uow.finish(outcome).await?;

        info!(order_id = %order_id, "order cancelled");
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        notify_best_effort(
            &*self.notifier,
            Recipient::Vendor(order.vendor_id),
            Notification::new(
                "Order cancelled",
                format!("Order {} was cancelled", order.tracking_id),
                "order",
            ),
        )
        .await;
        if actor.role != Role::User {
            notify_best_effort(
                &*self.notifier,
                Recipient::User(order.user_id),
                Notification::new(
                    "Order cancelled",
                    format!("Your order {} was cancelled", order.tracking_id),
                    "order",
                ),
            )
            .await;
        }
        Ok(order)
    }

    /// Moves an order forward through fulfilment.
    ///
    /// `cancelled` is routed through [`OrderService::cancel_order`] so stock is
    /// returned; `returned` is only reachable through the return workflow.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderView, ServiceError> {
        if new_status == OrderStatus::Cancelled {
            return self.cancel_order(actor, order_id).await;
        }
        if actor.role == Role::User {
            return Err(ServiceError::Forbidden(
                "buyers may only cancel their orders".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        ensure_can_access(actor, &order)?;

        let old_status = order.status;
        if !old_status.can_advance_to(new_status) {
            return Err(ServiceError::invalid_transition(old_status, new_status));
        }

        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
        if new_status == OrderStatus::Delivered && order.payment_method == PaymentMethod::Cod {
            update = update.col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid));
        }
        let result = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(old_status))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to update order status");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} changed concurrently",
                order_id
            )));
        }

        let view = load_view(db, order_id).await?;
        info!(order_id = %order_id, from = %old_status, to = %new_status, "order status updated");

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        notify_best_effort(
            &*self.notifier,
            Recipient::User(view.user_id),
            Notification::new(
                "Order update",
                format!("Order {} is now {}", view.tracking_id, new_status),
                "order",
            ),
        )
        .await;
        Ok(view)
    }

    /// Fetches a single order with items, scoped to the caller.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        ensure_can_access(actor, &order)?;
        let items = load_items(db, &[order.id]).await?.remove(&order.id).unwrap_or_default();
        OrderView::assemble(order, items)
    }

    /// Lists orders visible to the caller, newest first.
    #[instrument(skip(self, query), fields(actor_id = %actor.id))]
    pub async fn get_orders(
        &self,
        actor: &Actor,
        query: OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        query.validate()?;
        let db = &*self.db_pool;
        let page = query.page.unwrap_or(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, self.page_limit_max);

        let mut condition = Condition::all();
        match actor.role {
            Role::User => condition = condition.add(order::Column::UserId.eq(actor.id)),
            Role::Vendor => condition = condition.add(order::Column::VendorId.eq(actor.id)),
            Role::Staff | Role::Admin => {}
        }
        if let Some(status) = query.status {
            condition = condition.add(order::Column::Status.eq(status));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = contains_pattern(term);
            let matching_items = Query::select()
                .column(order_item::Column::OrderId)
                .from(OrderItemEntity)
                .and_where(order_item::Column::ProductName.like(pattern.clone()))
                .to_owned();
            condition = condition.add(
                Condition::any()
                    .add(order::Column::ShippingAddress.like(pattern))
                    .add(order::Column::Id.in_subquery(matching_items)),
            );
        }

        let paginator = OrderEntity::find()
            .filter(condition)
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(db, limit);

        let count = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, limit, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items = load_items(db, &ids).await?;
        let orders = orders
            .into_iter()
            .map(|o| {
                let lines = items.remove(&o.id).unwrap_or_default();
                OrderView::assemble(o, lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_pages = count.div_ceil(limit);
        let link = |target: u64| self.page_url(target, limit, &query);
        let meta = PageMeta {
            count,
            prev_url: if page > 1 { link(page - 1)? } else { None },
            next_url: if page < total_pages { link(page + 1)? } else { None },
            current_page: page,
            total_pages,
        };

        info!(count, page, limit, returned = orders.len(), "orders listed");
        Ok(OrderPage { orders, meta })
    }

    fn page_url(
        &self,
        page: u64,
        limit: u64,
        query: &OrderListQuery,
    ) -> Result<Option<String>, ServiceError> {
        let mut url = Url::parse(&self.public_base_url)
            .and_then(|base| base.join(ORDERS_PATH))
            .map_err(|e| ServiceError::InternalError(format!("invalid public base url: {}", e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("limit", &limit.to_string());
            if let Some(status) = query.status {
                pairs.append_pair("status", &status.to_string());
            }
            if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
                pairs.append_pair("search", search);
            }
        }
        Ok(Some(url.into()))
    }
}

/// Caller may see or act on this order.
pub(crate) fn ensure_can_access(actor: &Actor, order: &OrderModel) -> Result<(), ServiceError> {
    let allowed = match actor.role {
        Role::Admin | Role::Staff => true,
        Role::Vendor => order.vendor_id == actor.id,
        Role::User => order.user_id == actor.id,
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "order {} does not belong to caller",
            order.id
        )))
    }
}

pub(crate) async fn load_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn load_view<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<OrderView, ServiceError> {
    let order = load_order(conn, order_id).await?;
    let items = load_items(conn, &[order_id])
        .await?
        .remove(&order_id)
        .unwrap_or_default();
    OrderView::assemble(order, items)
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItemModel>>, ServiceError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids.iter().copied()))
        .order_by_asc(order_item::Column::ProductName)
        .all(conn)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row);
    }
    Ok(grouped)
}

const LIKE_ESCAPE: char = '\\';

/// `%term%` with the term's own wildcards matched literally.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape(LIKE_ESCAPE)
}

fn tracking_id() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TRK-{}", &raw[..10])
}

/// Groups the buyer's cart by vendor, creates one order per group with
/// conditional stock decrements, then clears the cart. Runs inside the
/// caller's unit of work; any error leaves nothing behind once rolled back.
pub(crate) async fn create_orders_in<C: ConnectionTrait>(
    conn: &C,
    buyer_id: Uuid,
    placement: Placement,
) -> Result<Vec<OrderView>, ServiceError> {
    let cart = cart_svc::find_cart(conn, buyer_id)
        .await?
        .ok_or(ServiceError::EmptyCart(buyer_id))?;
    let lines = cart_svc::load_items(conn, cart.id).await?;
    if lines.is_empty() {
        return Err(ServiceError::EmptyCart(buyer_id));
    }

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    // Vendor groups in the order their first item was added to the cart
    let mut groups: Vec<(Uuid, Vec<_>)> = Vec::new();
    for line in &lines {
        let product = products.get(&line.product_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} not found", line.product_id))
        })?;
        match groups.iter_mut().find(|(vendor, _)| *vendor == product.vendor_id) {
            Some((_, members)) => members.push((line, product)),
            None => groups.push((product.vendor_id, vec![(line, product)])),
        }
    }

    let shipping_address = placement
        .shipping_address
        .clone()
        .or_else(|| cart.shipping.clone());
    let now = Utc::now();
    let mut created = Vec::with_capacity(groups.len());

    for (vendor_id, members) in groups {
        let order_id = Uuid::new_v4();
        let total: Decimal = members.iter().map(|(line, _)| line.subtotal).sum();

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(buyer_id),
            vendor_id: Set(vendor_id),
            total_amount: Set(total),
            payment_method: Set(placement.payment_method),
            payment_status: Set(placement.payment_status),
            status: Set(placement.status),
            shipping_address: Set(shipping_address.clone()),
            tracking_id: Set(tracking_id()),
            payment_id: Set(placement.payment_id.clone()),
            payment_session_id: Set(placement.payment_session_id.clone()),
            refund_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        let mut items = Vec::with_capacity(members.len());
        for (line, product) in members {
            if !catalog::try_decrement_stock(conn, product.id, line.quantity).await? {
                return Err(ServiceError::OutOfStock(format!(
                    "{} cannot supply {} units",
                    product.name, line.quantity
                )));
            }
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                subtotal: Set(line.unit_price * Decimal::from(line.quantity)),
            }
            .insert(conn)
            .await?;
            items.push(item);
        }

        created.push(OrderView::assemble(order, items)?);
    }

    cart_svc::clear_in(conn, buyer_id).await?;
    Ok(created)
}

/// Online pre-payment orders of the buyer not yet tied to a gateway payment.
pub(crate) async fn awaiting_payment_in<C: ConnectionTrait>(
    conn: &C,
    buyer_id: Uuid,
) -> Result<Vec<OrderModel>, ServiceError> {
    Ok(OrderEntity::find()
        .filter(order::Column::UserId.eq(buyer_id))
        .filter(order::Column::PaymentMethod.eq(PaymentMethod::Online))
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Initiating))
        .filter(order::Column::Status.eq(OrderStatus::Pending))
        .filter(order::Column::PaymentSessionId.is_null())
        .order_by_asc(order::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Ties awaiting orders to a gateway payment session. Fails with `Conflict`
/// if any of them was linked or changed in the meantime.
pub(crate) async fn link_payment_session_in<C: ConnectionTrait>(
    conn: &C,
    order_ids: &[Uuid],
    payment_session_id: &str,
) -> Result<(), ServiceError> {
    let result = OrderEntity::update_many()
        .col_expr(order::Column::PaymentSessionId, Expr::value(payment_session_id))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.is_in(order_ids.iter().copied()))
        .filter(order::Column::PaymentSessionId.is_null())
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Initiating))
        .filter(order::Column::Status.eq(OrderStatus::Pending))
        .exec(conn)
        .await?;
    if result.rows_affected != order_ids.len() as u64 {
        return Err(ServiceError::Conflict(
            "orders awaiting payment changed while the payment was created".to_string(),
        ));
    }
    Ok(())
}

/// Number of orders already tied to a payment session, whatever their state.
pub(crate) async fn count_linked_in<C: ConnectionTrait>(
    conn: &C,
    payment_session_id: &str,
) -> Result<u64, ServiceError> {
    Ok(OrderEntity::find()
        .filter(order::Column::PaymentSessionId.eq(payment_session_id))
        .count(conn)
        .await?)
}

/// `initiating -> paid` for the live orders of a session; they become `confirmed`.
pub(crate) async fn settle_payment_in<C: ConnectionTrait>(
    conn: &C,
    payment_session_id: &str,
    payment_id: &str,
) -> Result<Vec<OrderView>, ServiceError> {
    OrderEntity::update_many()
        .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Confirmed))
        .col_expr(order::Column::PaymentId, Expr::value(payment_id))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::PaymentSessionId.eq(payment_session_id))
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Initiating))
        .filter(order::Column::Status.eq(OrderStatus::Pending))
        .exec(conn)
        .await?;

    let settled: Vec<Uuid> = OrderEntity::find()
        .filter(order::Column::PaymentSessionId.eq(payment_session_id))
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .order_by_asc(order::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect();
    let mut views = Vec::with_capacity(settled.len());
    for id in settled {
        views.push(load_view(conn, id).await?);
    }
    Ok(views)
}

/// `initiating -> failed` for every order of a session.
pub(crate) async fn fail_payment_in<C: ConnectionTrait>(
    conn: &C,
    payment_session_id: &str,
) -> Result<u64, ServiceError> {
    let result = OrderEntity::update_many()
        .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Failed))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::PaymentSessionId.eq(payment_session_id))
        .filter(order::Column::PaymentStatus.eq(PaymentStatus::Initiating))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn cancel_order_in<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    order_id: Uuid,
) -> Result<OrderView, ServiceError> {
    let order = load_order(conn, order_id).await?;
    ensure_can_access(actor, &order)?;

    match order.status {
        OrderStatus::Cancelled => return Err(ServiceError::AlreadyCancelled(order_id)),
        OrderStatus::Delivered => return Err(ServiceError::Undeliverable(order_id)),
        OrderStatus::Returned => {
            return Err(ServiceError::invalid_transition(
                order.status,
                OrderStatus::Cancelled,
            ))
        }
        _ => {}
    }

    // Claim the transition first so a concurrent cancel cannot restock twice
    let claimed = OrderEntity::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(order.status))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(ServiceError::AlreadyCancelled(order_id));
    }

    let view = load_view(conn, order_id).await?;
    for item in &view.items {
        catalog::increment_stock(conn, item.product_id, item.quantity).await?;
    }
    Ok(view)
}
