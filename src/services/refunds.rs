use crate::{
    auth::{Actor, Role},
    db::{DbPool, UnitOfWork},
    entities::{
        order::{self, Entity as OrderEntity},
        refund::{self, Entity as RefundEntity, Model as RefundModel},
        return_request::{self, Entity as ReturnEntity},
        OrderStatus, PaymentMethod, PaymentStatus, RefundInitiator, RefundStatus, ReturnStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender, Recipient},
    services::{
        notifications::{notify_best_effort, Notification, Notifier},
        orders as order_svc,
        returns::mark_order_returned,
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRefundStatusRequest {
    pub status: RefundStatus,
    #[serde(default)]
    pub gateway_refund_id: Option<String>,
}

#[derive(Clone)]
pub struct RefundService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
}

impl RefundService {
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

    /// Admin or gateway driven refund progress.
    ///
    /// Completing a return-backed refund closes the return as
    /// `refund_received` and marks the order `returned`. Such a refund can
    /// no longer be rejected.
    #[instrument(skip(self, request), fields(actor_id = %actor.id, status = %request.status))]
    pub async fn update_refund_status(
        &self,
        actor: &Actor,
        refund_id: Uuid,
        request: UpdateRefundStatusRequest,
    ) -> Result<RefundModel, ServiceError> {
        actor.require_admin()?;

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = update_refund_status_in(uow.conn(), refund_id, &request).await;
        let refund = uow.finish(outcome).await?;

        info!(%refund_id, status = %refund.status, "refund status updated");
        self.event_sender
            .send_or_log(Event::RefundStatusChanged {
                refund_id,
                new_status: refund.status.to_string(),
            })
            .await;
        notify_best_effort(
            &*self.notifier,
            Recipient::User(refund.user_id),
            Notification::new(
                "Refund update",
                format!("Refund of {} is now {}", refund.amount, refund.status),
                "refund",
            ),
        )
        .await;
        Ok(refund)
    }

    /// Buyer asks for their money back on a cancelled order paid online.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn request_order_refund(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<RefundModel, ServiceError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = request_order_refund_in(uow.conn(), actor, order_id).await;
        let refund = uow.finish(outcome).await?;

        info!(refund_id = %refund.id, %order_id, "order refund requested");
        self.event_sender
            .send_or_log(Event::RefundCreated(refund.id))
            .await;
        notify_best_effort(
            &*self.notifier,
            Recipient::Admin,
            Notification::new(
                "Refund requested",
                format!("Refund of {} requested for order {}", refund.amount, order_id),
                "refund",
            ),
        )
        .await;
        Ok(refund)
    }
}

async fn update_refund_status_in<C: ConnectionTrait>(
    conn: &C,
    refund_id: Uuid,
    request: &UpdateRefundStatusRequest,
) -> Result<RefundModel, ServiceError> {
    let refund = RefundEntity::find_by_id(refund_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Refund {} not found", refund_id)))?;

    let previous = refund.status;
    if !previous.can_transition_to(request.status) {
        return Err(ServiceError::invalid_transition(previous, request.status));
    }
    // The goods are already back in stock once a return is approved
    if request.status == RefundStatus::Rejected && refund.return_id.is_some() {
        return Err(ServiceError::invalid_transition(previous, request.status));
    }

    let mut active: refund::ActiveModel = refund.clone().into();
    active.status = Set(request.status);
    if let Some(gateway_refund_id) = request.gateway_refund_id.clone() {
        active.gateway_refund_id = Set(Some(gateway_refund_id));
    }
    active.updated_at = Set(Utc::now());
    let refund = active.update(conn).await?;

    if refund.status == RefundStatus::Completed {
        if let Some(return_id) = refund.return_id {
            ReturnEntity::update_many()
                .col_expr(
                    return_request::Column::Status,
                    Expr::value(ReturnStatus::RefundReceived),
                )
                .col_expr(return_request::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(return_request::Column::Id.eq(return_id))
                .filter(return_request::Column::Status.is_in([
                    ReturnStatus::Approved,
                    ReturnStatus::RefundInitiated,
                ]))
                .exec(conn)
                .await?;
            mark_order_returned(conn, refund.order_id).await?;
        }
    }

    Ok(refund)
}

async fn request_order_refund_in<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    order_id: Uuid,
) -> Result<RefundModel, ServiceError> {
    let order = order_svc::load_order(conn, order_id).await?;
    let allowed = match actor.role {
        Role::User => order.user_id == actor.id,
        Role::Admin | Role::Staff => true,
        Role::Vendor => false,
    };
    if !allowed {
        return Err(ServiceError::Forbidden(
            "only the buyer may request a refund".to_string(),
        ));
    }

    if order.status != OrderStatus::Cancelled {
        return Err(ServiceError::invalid_transition(
            order.status,
            "refund_requested",
        ));
    }
    if order.payment_method != PaymentMethod::Online || order.payment_status != PaymentStatus::Paid
    {
        return Err(ServiceError::invalid_field(
            "orderId",
            "only orders paid online can be refunded",
        ));
    }

    let existing = RefundEntity::find()
        .filter(refund::Column::OrderId.eq(order_id))
        .count(conn)
        .await?;
    if order.refund_id.is_some() || existing > 0 {
        return Err(ServiceError::Conflict(format!(
            "Order {} already has a refund",
            order_id
        )));
    }

    let now = Utc::now();
    let refund = refund::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        return_id: Set(None),
        user_id: Set(order.user_id),
        amount: Set(order.total_amount),
        status: Set(RefundStatus::Requested),
        initiated_by: Set(RefundInitiator::User),
        gateway_refund_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    OrderEntity::update_many()
        .col_expr(order::Column::RefundId, Expr::value(refund.id))
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(order_id))
        .exec(conn)
        .await?;

    Ok(refund)
}
