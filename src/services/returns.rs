use crate::{
    auth::{Actor, Role},
    db::{DbPool, UnitOfWork},
    entities::{
        order::{self, Entity as OrderEntity},
        refund::{self, Entity as RefundEntity},
        return_item::{self, Entity as ReturnItemEntity, Model as ReturnItemModel},
        return_request::{self, Entity as ReturnEntity, Model as ReturnModel},
        OrderStatus, RefundInitiator, RefundStatus, ReturnStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender, Recipient},
    services::{
        catalog,
        notifications::{notify_best_effort, Notification, Notifier},
        orders as order_svc,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestReturnInput {
    pub order_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 1000, message = "reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceReturnInput {
    pub status: ReturnStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub vendor_id: Uuid,
    pub status: ReturnStatus,
    pub reason: String,
    pub refund_id: Option<Uuid>,
    /// Σ item subtotals; the amount an approval refunds
    pub refund_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ReturnItemModel>,
}

impl ReturnView {
    fn assemble(ret: ReturnModel, items: Vec<ReturnItemModel>) -> Self {
        Self {
            id: ret.id,
            order_id: ret.order_id,
            user_id: ret.user_id,
            vendor_id: ret.vendor_id,
            status: ret.status,
            reason: ret.reason,
            refund_id: ret.refund_id,
            refund_amount: items.iter().map(|i| i.subtotal).sum(),
            created_at: ret.created_at,
            updated_at: ret.updated_at,
            items,
        }
    }
}

/// Return workflow hanging off delivered orders.
#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
}

impl ReturnService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifier,
        }
    }

    /// Opens a return for one line of a delivered order.
    ///
    /// Checks run in this order: order exists, product is on the order,
    /// quantity fits the purchase, order is delivered, no other open return
    /// covers the same line.
    #[instrument(skip(self, input), fields(actor_id = %actor.id, order_id = %input.order_id))]
    pub async fn request_return(
        &self,
        actor: &Actor,
        input: RequestReturnInput,
    ) -> Result<ReturnView, ServiceError> {
        input.validate()?;

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = request_return_in(uow.conn(), actor, &input).await;
        let view = uow.finish(outcome).await?;

        info!(return_id = %view.id, "return requested");
        self.event_sender
            .send_or_log(Event::ReturnRequested(view.id))
            .await;
        notify_best_effort(
            &*self.notifier,
            Recipient::Admin,
            Notification::new(
                "Return requested",
                format!(
                    "Return {} for order {}: {}",
                    view.id, view.order_id, view.reason
                ),
                "return",
            ),
        )
        .await;
        Ok(view)
    }

    /// Moves a return along its workflow.
    ///
    /// Approval restocks the returned units and opens a refund in the same
    /// unit of work; `refund_received` completes the refund and marks the
    /// order returned.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn advance_return(
        &self,
        actor: &Actor,
        return_id: Uuid,
        next: ReturnStatus,
    ) -> Result<ReturnView, ServiceError> {
        match actor.role {
            Role::Admin => {}
            Role::Staff if next.is_staff_step() => {}
            Role::Staff => {
                return Err(ServiceError::Forbidden(format!(
                    "only admins may set {}",
                    next
                )))
            }
            Role::Vendor | Role::User => {
                return Err(ServiceError::Forbidden(
                    "returns are managed by staff".to_string(),
                ))
            }
        }

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = advance_return_in(uow.conn(), return_id, next).await;
        let (previous, view) = uow.finish(outcome).await?;

        info!(return_id = %return_id, from = %previous, to = %next, "return advanced");
        self.event_sender
            .send_or_log(Event::ReturnStatusChanged {
                return_id,
                old_status: previous.to_string(),
                new_status: next.to_string(),
            })
            .await;
        if next == ReturnStatus::Approved {
            if let Some(refund_id) = view.refund_id {
                self.event_sender
                    .send_or_log(Event::RefundCreated(refund_id))
                    .await;
            }
        }
        notify_best_effort(
            &*self.notifier,
            Recipient::User(view.user_id),
            Notification::new(
                "Return update",
                format!("Your return {} is now {}", view.id, next),
                "return",
            ),
        )
        .await;
        Ok(view)
    }

    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_return(&self, actor: &Actor, return_id: Uuid) -> Result<ReturnView, ServiceError> {
        let view = load_view(&*self.db, return_id).await?;
        let allowed = match actor.role {
            Role::Admin | Role::Staff => true,
            Role::Vendor => view.vendor_id == actor.id,
            Role::User => view.user_id == actor.id,
        };
        if !allowed {
            return Err(ServiceError::Forbidden(format!(
                "return {} does not belong to caller",
                return_id
            )));
        }
        Ok(view)
    }
}

async fn load_return<C: ConnectionTrait>(
    conn: &C,
    return_id: Uuid,
) -> Result<ReturnModel, ServiceError> {
    ReturnEntity::find_by_id(return_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_id)))
}

async fn load_view<C: ConnectionTrait>(conn: &C, return_id: Uuid) -> Result<ReturnView, ServiceError> {
    let ret = load_return(conn, return_id).await?;
    let items = ReturnItemEntity::find()
        .filter(return_item::Column::ReturnId.eq(return_id))
        .order_by_asc(return_item::Column::ProductId)
        .all(conn)
        .await?;
    Ok(ReturnView::assemble(ret, items))
}

async fn request_return_in<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    input: &RequestReturnInput,
) -> Result<ReturnView, ServiceError> {
    let order = order_svc::load_view(conn, input.order_id).await?;
    let allowed = match actor.role {
        Role::User => order.user_id == actor.id,
        Role::Admin | Role::Staff => true,
        Role::Vendor => false,
    };
    if !allowed {
        return Err(ServiceError::Forbidden(
            "only the buyer may request a return".to_string(),
        ));
    }

    let line = order
        .items
        .iter()
        .find(|i| i.product_id == input.product_id)
        .ok_or_else(|| {
            ServiceError::ItemNotFound(format!(
                "Product {} is not part of order {}",
                input.product_id, input.order_id
            ))
        })?;
    if input.quantity > line.quantity {
        return Err(ServiceError::QuantityExceeded {
            requested: input.quantity,
            purchased: line.quantity,
        });
    }
    if order.status != OrderStatus::Delivered {
        return Err(ServiceError::NotDelivered(order.id));
    }

    let open_returns = Query::select()
        .column(return_request::Column::Id)
        .from(ReturnEntity)
        .and_where(return_request::Column::OrderId.eq(order.id))
        .and_where(return_request::Column::Status.ne(ReturnStatus::Rejected))
        .to_owned();
    let duplicates = ReturnItemEntity::find()
        .filter(return_item::Column::ProductId.eq(input.product_id))
        .filter(return_item::Column::ReturnId.in_subquery(open_returns))
        .count(conn)
        .await?;
    if duplicates > 0 {
        return Err(ServiceError::Conflict(format!(
            "An open return already covers product {} on order {}",
            input.product_id, order.id
        )));
    }

    let now = Utc::now();
    let return_id = Uuid::new_v4();
    let ret = return_request::ActiveModel {
        id: Set(return_id),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        vendor_id: Set(order.vendor_id),
        status: Set(ReturnStatus::Requested),
        reason: Set(input.reason.clone()),
        refund_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    let item = return_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        return_id: Set(return_id),
        product_id: Set(line.product_id),
        quantity: Set(input.quantity),
        price: Set(line.price),
        subtotal: Set(line.price * Decimal::from(input.quantity)),
    }
    .insert(conn)
    .await?;

    Ok(ReturnView::assemble(ret, vec![item]))
}

async fn advance_return_in<C: ConnectionTrait>(
    conn: &C,
    return_id: Uuid,
    next: ReturnStatus,
) -> Result<(ReturnStatus, ReturnView), ServiceError> {
    let view = load_view(conn, return_id).await?;
    let previous = view.status;
    if !previous.can_transition_to(next) {
        return Err(ServiceError::invalid_transition(previous, next));
    }

    let now = Utc::now();
    let claimed = ReturnEntity::update_many()
        .col_expr(return_request::Column::Status, Expr::value(next))
        .col_expr(return_request::Column::UpdatedAt, Expr::value(now))
        .filter(return_request::Column::Id.eq(return_id))
        .filter(return_request::Column::Status.eq(previous))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Return {} changed concurrently",
            return_id
        )));
    }

    match next {
        ReturnStatus::Approved => approve_in(conn, &view).await?,
        ReturnStatus::RefundInitiated => {
            let refund_id = refund_of(&view)?;
            move_refund_in(conn, refund_id, RefundStatus::Processing).await?;
        }
        ReturnStatus::RefundReceived => {
            let refund_id = refund_of(&view)?;
            move_refund_in(conn, refund_id, RefundStatus::Completed).await?;
            mark_order_returned(conn, view.order_id).await?;
        }
        _ => {}
    }

    Ok((previous, load_view(conn, return_id).await?))
}

fn refund_of(view: &ReturnView) -> Result<Uuid, ServiceError> {
    view.refund_id.ok_or_else(|| {
        ServiceError::InternalError(format!("approved return {} has no refund", view.id))
    })
}

/// Restocks the returned units and opens the admin refund.
async fn approve_in<C: ConnectionTrait>(conn: &C, view: &ReturnView) -> Result<(), ServiceError> {
    for item in &view.items {
        catalog::increment_stock(conn, item.product_id, item.quantity).await?;
    }

    let now = Utc::now();
    let refund = refund::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(view.order_id),
        return_id: Set(Some(view.id)),
        user_id: Set(view.user_id),
        amount: Set(view.refund_amount),
        status: Set(RefundStatus::Initiated),
        initiated_by: Set(RefundInitiator::Admin),
        gateway_refund_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    ReturnEntity::update_many()
        .col_expr(return_request::Column::RefundId, Expr::value(refund.id))
        .filter(return_request::Column::Id.eq(view.id))
        .exec(conn)
        .await?;
    OrderEntity::update_many()
        .col_expr(order::Column::RefundId, Expr::value(refund.id))
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(view.order_id))
        .exec(conn)
        .await?;

    info!(refund_id = %refund.id, amount = %refund.amount, "refund opened for approved return");
    Ok(())
}

/// Moves a refund forward; already being at `target` is accepted.
pub(crate) async fn move_refund_in<C: ConnectionTrait>(
    conn: &C,
    refund_id: Uuid,
    target: RefundStatus,
) -> Result<(), ServiceError> {
    let refund = RefundEntity::find_by_id(refund_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Refund {} not found", refund_id)))?;

    if refund.status == target {
        return Ok(());
    }
    if !refund.status.can_transition_to(target) {
        warn!(%refund_id, from = %refund.status, to = %target, "refund cannot follow return");
        return Err(ServiceError::invalid_transition(refund.status, target));
    }

    let mut active: refund::ActiveModel = refund.into();
    active.status = Set(target);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

pub(crate) async fn mark_order_returned<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    let result = OrderEntity::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Returned))
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(OrderStatus::Delivered))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        let order = order_svc::load_order(conn, order_id).await?;
        if order.status != OrderStatus::Returned {
            return Err(ServiceError::invalid_transition(
                order.status,
                OrderStatus::Returned,
            ));
        }
    }
    Ok(())
}
