/*!
 * Payment confirmation gate
 *
 * Online payments are verified here before any order is materialized. The
 * gateway callback carries `(gatewayOrderId, gatewayPaymentId, signature)`;
 * the signature is recomputed locally with the shared key and compared in
 * constant time. The `transactions` row is the single source of truth for
 * whether a payment has been confirmed.
 */

use crate::{
    auth::Actor,
    cache::TtlCache,
    db::{DbPool, UnitOfWork},
    entities::{
        order::{self, Entity as OrderEntity},
        payment_transaction::{self, Entity as PaymentTransaction, Model as TransactionModel},
        OrderStatus, TransactionKind, TransactionStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender, Recipient},
    services::{
        notifications::{notify_best_effort, Notification, Notifier},
        orders::{self as order_svc, OrderService, OrderView, Placement},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

const VERIFIED_CACHE_PREFIX: &str = "payment:verified:";

/// Payment order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

/// Payout accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayout {
    pub gateway_payout_id: String,
    pub status: TransactionStatus,
}

/// Outbound calls to the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub transaction_id: Uuid,
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "gatewayOrderId is required"))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, message = "gatewayPaymentId is required"))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    /// True when this call found the payment already verified.
    pub already_verified: bool,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePayoutRequest {
    pub vendor_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PayoutUpdate {
    #[validate(length(min = 1, message = "gatewayPayoutId is required"))]
    pub gateway_payout_id: String,
    pub status: TransactionStatus,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<OrderService>,
    notifier: Arc<dyn Notifier>,
    event_sender: Arc<EventSender>,
    verified_cache: Arc<dyn TtlCache>,
    key_secret: String,
    currency: String,
    cache_ttl: Duration,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<OrderService>,
        notifier: Arc<dyn Notifier>,
        event_sender: Arc<EventSender>,
        verified_cache: Arc<dyn TtlCache>,
        key_secret: impl Into<String>,
        currency: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            orders,
            notifier,
            event_sender,
            verified_cache,
            key_secret: key_secret.into(),
            currency: currency.into(),
            cache_ttl,
        }
    }

    /// Creates a gateway payment order and records it as `initiated`.
    ///
    /// Online orders the buyer already checked out are tied to the new
    /// payment, whose amount must then equal what they owe. Nothing is
    /// written locally when the gateway call fails.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn initiate_payment(
        &self,
        buyer_id: Uuid,
        request: InitiatePaymentRequest,
    ) -> Result<PaymentInitiation, ServiceError> {
        let amount_minor = to_minor_units(request.amount)?;
        let awaiting = order_svc::awaiting_payment_in(&*self.db, buyer_id).await?;
        if !awaiting.is_empty() {
            let due: Decimal = awaiting.iter().map(|o| o.total_amount).sum();
            if !same_money(due, request.amount) {
                return Err(ServiceError::invalid_field(
                    "amount",
                    format!("{} is due on orders awaiting payment", due),
                ));
            }
        }
        let transaction_id = Uuid::new_v4();
        let receipt = format!("rcpt_{}", &transaction_id.simple().to_string()[..12]);

        let gateway_order = self
            .gateway
            .create_payment_order(amount_minor, &self.currency, &receipt)
            .await
            .map_err(|e| {
                error!(error = %e, buyer_id = %buyer_id, "gateway rejected payment order");
                ServiceError::GatewayError(e.to_string())
            })?;

        let now = Utc::now();
        let txn = payment_transaction::ActiveModel {
            id: Set(transaction_id),
            account_id: Set(buyer_id),
            kind: Set(TransactionKind::Payment),
            amount: Set(request.amount),
            currency: Set(self.currency.clone()),
            gateway_order_id: Set(Some(gateway_order.gateway_order_id.clone())),
            gateway_payment_id: Set(None),
            gateway_payout_id: Set(None),
            status: Set(TransactionStatus::Initiated),
            verified_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order_ids: Vec<Uuid> = awaiting.iter().map(|o| o.id).collect();

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = record_payment_in(
            uow.conn(),
            txn,
            &order_ids,
            &gateway_order.gateway_order_id,
        )
        .await;
        uow.finish(outcome).await?;

        info!(
            %transaction_id,
            gateway_order_id = %gateway_order.gateway_order_id,
            linked_orders = order_ids.len(),
            "payment initiated"
        );
        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                transaction_id,
                gateway_order_id: gateway_order.gateway_order_id.clone(),
            })
            .await;

        Ok(PaymentInitiation {
            transaction_id,
            gateway_order_id: gateway_order.gateway_order_id,
            amount: request.amount,
            amount_minor,
            currency: self.currency.clone(),
        })
    }

    /// Verifies a gateway payment callback and materializes the buyer's orders.
    ///
    /// Idempotent: once a transaction is `success` every further call with a
    /// valid signature returns the orders created by the first one.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::InvalidSignature)` - HMAC mismatch; the transaction is marked failed
    /// * `Err(ServiceError::NotFound)` - no payment transaction for the gateway order id
    /// * `Err(ServiceError::Forbidden)` - the payment belongs to another buyer; nothing is changed
    /// * `Err(ServiceError::InvalidTransition)` - the transaction already failed or was cancelled
    /// * `Err(ServiceError::ValidationError)` - the paid amount differs from the orders it would settle
    #[instrument(skip(self, request), fields(gateway_order_id = %request.gateway_order_id))]
    pub async fn verify_payment(
        &self,
        buyer_id: Uuid,
        request: VerifyPaymentRequest,
    ) -> Result<PaymentVerification, ServiceError> {
        request.validate()?;
        let gateway_order_id = request.gateway_order_id.as_str();

        let payload = format!("{}|{}", gateway_order_id, request.gateway_payment_id);
        if !verify_hex_signature(&self.key_secret, payload.as_bytes(), &request.signature)? {
            warn!(buyer_id = %buyer_id, "payment signature mismatch");
            match find_payment(&*self.db, gateway_order_id).await {
                Ok(txn) if txn.account_id != buyer_id => {
                    return Err(ServiceError::Forbidden(
                        "payment belongs to another buyer".to_string(),
                    ))
                }
                Ok(_) | Err(ServiceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            self.mark_failed(buyer_id, gateway_order_id).await?;
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    gateway_order_id: gateway_order_id.to_string(),
                })
                .await;
            return Err(ServiceError::InvalidSignature);
        }

        let cache_key = format!("{}{}", VERIFIED_CACHE_PREFIX, gateway_order_id);
        match self.verified_cache.get(&cache_key).await {
            Ok(Some(_)) => {
                info!("payment already verified (cached)");
                return self.replay(buyer_id, gateway_order_id).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "verification cache unavailable"),
        }

        let txn = find_payment(&*self.db, gateway_order_id).await?;
        if txn.account_id != buyer_id {
            return Err(ServiceError::Forbidden(
                "payment belongs to another buyer".to_string(),
            ));
        }
        match txn.status {
            TransactionStatus::Success => return self.replay(buyer_id, gateway_order_id).await,
            status if status.is_terminal() => {
                return Err(ServiceError::invalid_transition(
                    status,
                    TransactionStatus::Success,
                ))
            }
            _ => {}
        }

        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = materialize_in(
            uow.conn(),
            &txn,
            buyer_id,
            gateway_order_id,
            &request.gateway_payment_id,
        )
        .await;
        let created = uow.finish(outcome).await.map_err(|e| {
            error!(
                error = %e,
                transaction_id = %txn.id,
                "payment verified but orders could not be materialized; transaction left for reconciliation"
            );
            e
        })?;

        let Some((orders, freshly_created)) = created else {
            // A concurrent verification claimed the transaction first
            return self.replay(buyer_id, gateway_order_id).await;
        };

        if let Err(e) = self
            .verified_cache
            .insert(&cache_key, &txn.id.to_string(), self.cache_ttl)
            .await
        {
            warn!(error = %e, "failed to cache payment verification");
        }

        info!(transaction_id = %txn.id, orders = orders.len(), "payment verified");
        self.event_sender
            .send_or_log(Event::PaymentVerified {
                transaction_id: txn.id,
                gateway_order_id: gateway_order_id.to_string(),
            })
            .await;
        if freshly_created {
            self.orders.announce_created(&orders).await;
        } else {
            for order in &orders {
                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id: order.id,
                        old_status: OrderStatus::Pending.to_string(),
                        new_status: order.status.to_string(),
                    })
                    .await;
            }
        }
        notify_best_effort(
            &*self.notifier,
            Recipient::User(buyer_id),
            Notification::new(
                "Payment received",
                format!("Payment of {} {} confirmed", txn.amount, txn.currency),
                "payment",
            ),
        )
        .await;

        Ok(PaymentVerification {
            transaction_id: txn.id,
            status: TransactionStatus::Success,
            already_verified: false,
            orders,
        })
    }

    /// Requests a vendor payout. Admin only.
    #[instrument(skip(self, request), fields(actor_id = %actor.id, vendor_id = %request.vendor_id))]
    pub async fn initiate_payout(
        &self,
        actor: &Actor,
        request: InitiatePayoutRequest,
    ) -> Result<TransactionModel, ServiceError> {
        actor.require_admin()?;
        let amount_minor = to_minor_units(request.amount)?;

        let payout = self
            .gateway
            .create_payout(request.vendor_id, amount_minor, &self.currency)
            .await
            .map_err(|e| {
                error!(error = %e, "gateway rejected payout");
                ServiceError::GatewayError(e.to_string())
            })?;

        let now = Utc::now();
        let txn = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(request.vendor_id),
            kind: Set(TransactionKind::Payout),
            amount: Set(request.amount),
            currency: Set(self.currency.clone()),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            gateway_payout_id: Set(Some(payout.gateway_payout_id)),
            status: Set(payout.status),
            verified_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(transaction_id = %txn.id, status = %txn.status, "payout initiated");
        Ok(txn)
    }

    /// Applies a payout status webhook. Status only moves forward; an exact
    /// repeat of the current status is ignored.
    #[instrument(skip(self, update), fields(gateway_payout_id = %update.gateway_payout_id, status = %update.status))]
    pub async fn apply_payout_update(
        &self,
        update: PayoutUpdate,
    ) -> Result<TransactionModel, ServiceError> {
        update.validate()?;
        let db = &*self.db;

        let txn = PaymentTransaction::find()
            .filter(payment_transaction::Column::GatewayPayoutId.eq(update.gateway_payout_id.as_str()))
            .filter(payment_transaction::Column::Kind.eq(TransactionKind::Payout))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payout {} not found", update.gateway_payout_id))
            })?;

        if txn.status == update.status {
            info!("duplicate payout update ignored");
            return Ok(txn);
        }
        if !txn.status.can_transition_to(update.status) {
            return Err(ServiceError::invalid_transition(txn.status, update.status));
        }

        let result = PaymentTransaction::update_many()
            .col_expr(payment_transaction::Column::Status, Expr::value(update.status))
            .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payment_transaction::Column::Id.eq(txn.id))
            .filter(payment_transaction::Column::Status.eq(txn.status))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Payout {} changed concurrently",
                update.gateway_payout_id
            )));
        }

        let txn = PaymentTransaction::find_by_id(txn.id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", txn.id)))?;

        self.event_sender
            .send_or_log(Event::PayoutUpdated {
                transaction_id: txn.id,
                status: txn.status.to_string(),
            })
            .await;
        if txn.status.is_terminal() {
            notify_best_effort(
                &*self.notifier,
                Recipient::Vendor(txn.account_id),
                Notification::new(
                    "Payout update",
                    format!("Payout of {} {} is {}", txn.amount, txn.currency, txn.status),
                    "payout",
                ),
            )
            .await;
        }
        Ok(txn)
    }

    /// Checks a webhook body against its hex HMAC-SHA256 signature.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), ServiceError> {
        if verify_hex_signature(&self.key_secret, body, signature)? {
            Ok(())
        } else {
            Err(ServiceError::InvalidSignature)
        }
    }

    /// Marks the buyer's pending payment failed, along with any orders waiting
    /// on it. Settled transactions are left alone.
    async fn mark_failed(&self, buyer_id: Uuid, gateway_order_id: &str) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let outcome = fail_payment_in(uow.conn(), buyer_id, gateway_order_id).await;
        let (failed, orders) = uow.finish(outcome).await?;
        if failed {
            info!(orders, "payment transaction marked failed");
        }
        Ok(())
    }

    /// Answers a repeat verification with the orders the first one created.
    async fn replay(
        &self,
        buyer_id: Uuid,
        gateway_order_id: &str,
    ) -> Result<PaymentVerification, ServiceError> {
        let db = &*self.db;
        let txn = find_payment(db, gateway_order_id).await?;
        if txn.account_id != buyer_id {
            return Err(ServiceError::Forbidden(
                "payment belongs to another buyer".to_string(),
            ));
        }

        let ids: Vec<Uuid> = OrderEntity::find()
            .filter(order::Column::PaymentSessionId.eq(gateway_order_id))
            .order_by_asc(order::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            orders.push(order_svc::load_view(db, id).await?);
        }

        Ok(PaymentVerification {
            transaction_id: txn.id,
            status: txn.status,
            already_verified: true,
            orders,
        })
    }
}

async fn find_payment<C: ConnectionTrait>(
    conn: &C,
    gateway_order_id: &str,
) -> Result<TransactionModel, ServiceError> {
    PaymentTransaction::find()
        .filter(payment_transaction::Column::GatewayOrderId.eq(gateway_order_id))
        .filter(payment_transaction::Column::Kind.eq(TransactionKind::Payment))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Payment for gateway order {} not found", gateway_order_id))
        })
}

async fn record_payment_in<C: ConnectionTrait>(
    conn: &C,
    txn: payment_transaction::ActiveModel,
    order_ids: &[Uuid],
    gateway_order_id: &str,
) -> Result<(), ServiceError> {
    txn.insert(conn).await?;
    if !order_ids.is_empty() {
        order_svc::link_payment_session_in(conn, order_ids, gateway_order_id).await?;
    }
    Ok(())
}

async fn fail_payment_in<C: ConnectionTrait>(
    conn: &C,
    buyer_id: Uuid,
    gateway_order_id: &str,
) -> Result<(bool, u64), ServiceError> {
    let result = PaymentTransaction::update_many()
        .col_expr(
            payment_transaction::Column::Status,
            Expr::value(TransactionStatus::Failed),
        )
        .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(payment_transaction::Column::GatewayOrderId.eq(gateway_order_id))
        .filter(payment_transaction::Column::AccountId.eq(buyer_id))
        .filter(payment_transaction::Column::Status.is_in([
            TransactionStatus::Initiated,
            TransactionStatus::Processing,
        ]))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok((false, 0));
    }
    let orders = order_svc::fail_payment_in(conn, gateway_order_id).await?;
    Ok((true, orders))
}

/// Money amounts compared at the currency's minor unit.
fn same_money(a: Decimal, b: Decimal) -> bool {
    a.round_dp(2) == b.round_dp(2)
}

/// Claims the transaction (`initiated|processing -> success`) and settles the
/// orders it pays for: orders linked at initiation become paid, otherwise the
/// cart is materialized. The paid amount must cover exactly those orders.
/// `None` means another verification claimed it first; the flag is true when
/// the orders were created by this call.
async fn materialize_in<C: ConnectionTrait>(
    conn: &C,
    txn: &TransactionModel,
    buyer_id: Uuid,
    gateway_order_id: &str,
    gateway_payment_id: &str,
) -> Result<Option<(Vec<OrderView>, bool)>, ServiceError> {
    let now = Utc::now();
    let claimed = PaymentTransaction::update_many()
        .col_expr(
            payment_transaction::Column::Status,
            Expr::value(TransactionStatus::Success),
        )
        .col_expr(
            payment_transaction::Column::GatewayPaymentId,
            Expr::value(gateway_payment_id),
        )
        .col_expr(payment_transaction::Column::VerifiedAt, Expr::value(now))
        .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(now))
        .filter(payment_transaction::Column::Id.eq(txn.id))
        .filter(payment_transaction::Column::Status.is_in([
            TransactionStatus::Initiated,
            TransactionStatus::Processing,
        ]))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Ok(None);
    }

    let (orders, freshly_created) = if order_svc::count_linked_in(conn, gateway_order_id).await? > 0 {
        let settled = order_svc::settle_payment_in(conn, gateway_order_id, gateway_payment_id).await?;
        if settled.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "orders paid by {} were cancelled before the payment settled",
                gateway_order_id
            )));
        }
        (settled, false)
    } else {
        let placement = Placement::paid_online(
            gateway_order_id.to_string(),
            Some(gateway_payment_id.to_string()),
        );
        (order_svc::create_orders_in(conn, buyer_id, placement).await?, true)
    };

    let total: Decimal = orders.iter().map(|o| o.total_amount).sum();
    if !same_money(total, txn.amount) {
        return Err(ServiceError::invalid_field(
            "amount",
            format!("paid {} but the orders total {}", txn.amount, total),
        ));
    }
    Ok(Some((orders, freshly_created)))
}

/// `amount × 100`, rounded half away from zero, as an integer.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::invalid_field("amount", "amount must be positive"));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::invalid_field("amount", "amount is too large"))
}

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key: {}", e)))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signature the gateway attaches to a completed payment.
pub fn payment_signature(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
) -> Result<String, ServiceError> {
    sign_payload(
        secret,
        format!("{}|{}", gateway_order_id, gateway_payment_id).as_bytes(),
    )
}

/// Constant-time comparison of `signature` (hex) against the payload's MAC.
fn verify_hex_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool, ServiceError> {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return Ok(false);
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key: {}", e)))?;
    mac.update(payload);
    Ok(mac.verify_slice(&provided).is_ok())
}

/// In-process gateway that accepts every request and mints its own ids.
///
/// Used when no provider is wired in, e.g. local runs.
#[derive(Debug, Default, Clone)]
pub struct LocalGateway;

#[async_trait]
impl PaymentGateway for LocalGateway {
    async fn create_payment_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<GatewayOrder> {
        Ok(GatewayOrder {
            gateway_order_id: format!("order_{}", Uuid::new_v4().simple()),
            amount_minor,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        })
    }

    async fn create_payout(
        &self,
        _vendor_id: Uuid,
        _amount_minor: i64,
        _currency: &str,
    ) -> anyhow::Result<GatewayPayout> {
        Ok(GatewayPayout {
            gateway_payout_id: format!("pout_{}", Uuid::new_v4().simple()),
            status: TransactionStatus::Processing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    const SECRET: &str = "test_secret_key_123";

    #[test]
    fn matching_signature_verifies() {
        let sig = payment_signature(SECRET, "order_abc", "pay_xyz").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_hex_signature(SECRET, b"order_abc|pay_xyz", &sig).unwrap());
    }

    #[test]
    fn tampered_payload_or_key_fails() {
        let sig = payment_signature(SECRET, "order_abc", "pay_xyz").unwrap();
        assert!(!verify_hex_signature(SECRET, b"order_abc|pay_other", &sig).unwrap());
        assert!(!verify_hex_signature("another_secret_key", b"order_abc|pay_xyz", &sig).unwrap());
    }

    #[test]
    fn non_hex_signature_is_a_mismatch_not_an_error() {
        assert!(!verify_hex_signature(SECRET, b"x|y", "not-hex!").unwrap());
    }

    #[rstest]
    #[case(dec!(1), 100)]
    #[case(dec!(499.99), 49_999)]
    #[case(dec!(0.005), 1)]
    #[case(dec!(10.004), 1_000)]
    fn minor_units_round_half_up(#[case] amount: Decimal, #[case] expected: i64) {
        assert_eq!(to_minor_units(amount).unwrap(), expected);
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    fn non_positive_amounts_are_rejected(#[case] amount: Decimal) {
        assert_matches!(
            to_minor_units(amount),
            Err(ServiceError::ValidationError(fields)) if fields[0].field == "amount"
        );
    }
}
