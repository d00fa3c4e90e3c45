use crate::{
    auth::Actor,
    entities::RefundModel,
    services::refunds::UpdateRefundStatusRequest,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::patch,
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new().route("/refunds/:id/status", patch(update_refund_status))
}

async fn update_refund_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRefundStatusRequest>,
) -> ApiResult<RefundModel> {
    let refund = state
        .services
        .refunds
        .update_refund_status(&actor, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(refund)))
}
