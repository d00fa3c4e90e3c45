use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-checkable error category shared by every service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidTransition,
    OutOfStock,
    InvalidSignature,
    ValidationError,
    Unauthorized,
    GatewayError,
    InternalError,
}

/// A single per-field validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error body returned by the HTTP layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("Order {0} has been delivered and cannot be cancelled; request a return instead")]
    Undeliverable(Uuid),

    #[error("Order {0} has not been delivered")]
    NotDelivered(Uuid),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Cart for buyer {0} is empty")]
    EmptyCart(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Requested quantity {requested} exceeds purchased quantity {purchased}")]
    QuantityExceeded { requested: i32, purchased: i32 },

    #[error("Payment signature does not match")]
    InvalidSignature,

    #[error("Validation error: {}", summarize(.0))]
    ValidationError(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::ValidationError(fields)
    }
}

impl ServiceError {
    /// Shorthand for a validation failure on a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::ValidationError(vec![FieldError::new(field, message)])
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::ItemNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) | Self::AlreadyCancelled(_) => ErrorKind::Conflict,
            Self::InvalidTransition { .. } | Self::Undeliverable(_) | Self::NotDelivered(_) => {
                ErrorKind::InvalidTransition
            }
            Self::OutOfStock(_) => ErrorKind::OutOfStock,
            Self::InvalidSignature => ErrorKind::InvalidSignature,
            Self::EmptyCart(_)
            | Self::InvalidQuantity(_)
            | Self::QuantityExceeded { .. }
            | Self::ValidationError(_) => ErrorKind::ValidationError,
            Self::Unauthorized(_) | Self::Forbidden(_) => ErrorKind::Unauthorized,
            Self::GatewayError(_) => ErrorKind::GatewayError,
            Self::DatabaseError(_) | Self::InternalError(_) => ErrorKind::InternalError,
        }
    }

    /// Per-field problems, empty unless this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::ValidationError(fields) => fields,
            _ => &[],
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::EmptyCart(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::InvalidTransition => StatusCode::CONFLICT,
                ErrorKind::OutOfStock => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::InvalidSignature => StatusCode::BAD_REQUEST,
                ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::GatewayError => StatusCode::BAD_GATEWAY,
                ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message suitable for HTTP responses. Internal errors get a generic message.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            kind: self.kind(),
            message: self.response_message(),
            fields: self.field_errors().to_vec(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
