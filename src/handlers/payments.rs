use crate::{
    auth::Actor,
    entities::PaymentTransactionModel,
    errors::ServiceError,
    services::payments::{
        InitiatePaymentRequest, InitiatePayoutRequest, PaymentInitiation, PaymentVerification,
        PayoutUpdate, VerifyPaymentRequest,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use tracing::warn;

/// Header carrying the hex HMAC-SHA256 of a payout webhook body.
pub const GATEWAY_SIGNATURE_HEADER: &str = "x-gateway-signature";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(initiate_payment))
        .route("/payments/verify", post(verify_payment))
        .route("/payouts", post(initiate_payout))
        .route("/payouts/webhook", post(payout_webhook))
}

async fn initiate_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentInitiation>>), ServiceError> {
    let initiation = state
        .services
        .payments
        .initiate_payment(actor.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(initiation))))
}

async fn verify_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<VerifyPaymentRequest>,
) -> ApiResult<PaymentVerification> {
    let verification = state
        .services
        .payments
        .verify_payment(actor.id, payload)
        .await?;
    Ok(Json(ApiResponse::success(verification)))
}

async fn initiate_payout(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<InitiatePayoutRequest>,
) -> ApiResult<PaymentTransactionModel> {
    let payout = state
        .services
        .payments
        .initiate_payout(&actor, payload)
        .await?;
    Ok(Json(ApiResponse::success(payout)))
}

/// Gateway callback. The signature covers the raw body, so it is checked
/// before the body is parsed.
async fn payout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<PaymentTransactionModel> {
    let signature = headers
        .get(GATEWAY_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::InvalidSignature)?;
    state
        .services
        .payments
        .verify_webhook_signature(&body, signature)?;

    let update: PayoutUpdate = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "malformed payout webhook body");
        ServiceError::invalid_field("body", "malformed payout update")
    })?;
    let txn = state.services.payments.apply_payout_update(update).await?;
    Ok(Json(ApiResponse::success(txn)))
}
