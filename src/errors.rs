use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Every fallible operation in the crate reports one of these kinds.
/// The HTTP mapping lives in the `ResponseError` impl below and nowhere else.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Missing or unknown token, or a credential mismatch at login.
    #[error("Try to login again")]
    Auth,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("'{0}' is not a valid id")]
    InvalidId(String),

    #[error("store failure: {0}")]
    Persistence(String),

    /// Order placement persisted the order but the link step failed, so the
    /// owner's order list does not reference it. The order is retrievable and
    /// the link can be retried to convergence via `POST /orders/{id}/relink`.
    #[error("order {order_id} was created but could not be linked to its owner: {reason}")]
    OrderUnlinked { order_id: String, reason: String },
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict(_)
            | ApiError::NotFound(_)
            | ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::Persistence(_) | ApiError::OrderUnlinked { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        let body = match self {
            ApiError::OrderUnlinked { order_id, .. } => json!({
                "error": self.to_string(),
                "orderId": order_id,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
