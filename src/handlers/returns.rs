use crate::{
    auth::Actor,
    services::returns::{AdvanceReturnInput, RequestReturnInput, ReturnView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/returns", post(create_return))
        .route("/returns/:id", get(get_return))
        .route("/returns/:id/status", patch(advance_return))
}

async fn create_return(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RequestReturnInput>,
) -> Result<(StatusCode, Json<ApiResponse<ReturnView>>), crate::errors::ServiceError> {
    let created = state.services.returns.request_return(&actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(created, "Return requested")),
    ))
}

async fn get_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnView> {
    let found = state.services.returns.get_return(&actor, id).await?;
    Ok(Json(ApiResponse::success(found)))
}

async fn advance_return(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceReturnInput>,
) -> ApiResult<ReturnView> {
    let updated = state
        .services
        .returns
        .advance_return(&actor, id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
