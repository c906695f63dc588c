use crate::entities::OrderStatus;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Order {order_id} is {status}, cannot {action}")]
    InvalidState {
        order_id: i32,
        status: OrderStatus,
        action: &'static str,
    },

    #[error("Invoice {invoice_id} is {status}, cannot {action}")]
    InvalidInvoiceState {
        invoice_id: i32,
        status: crate::entities::InvoiceStatus,
        action: &'static str,
    },

    #[error("Pickup code attempts exceeded for order {order_id}")]
    AttemptsExceeded { order_id: i32 },

    #[error("Pickup code was sent recently, retry in {retry_after_secs}s")]
    ResendTooSoon { retry_after_secs: i64 },

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Forbidden".to_string(),
                )
            }
            AppError::InvalidState { .. } | AppError::InvalidInvoiceState { .. } => {
                log::warn!("{self}");
                (
                    actix_web::http::StatusCode::CONFLICT,
                    "INVALID_STATE",
                    self.to_string(),
                )
            }
            AppError::AttemptsExceeded { .. } => {
                log::warn!("{self}");
                (
                    actix_web::http::StatusCode::TOO_MANY_REQUESTS,
                    "ATTEMPTS_EXCEEDED",
                    self.to_string(),
                )
            }
            AppError::ResendTooSoon { .. } => (
                actix_web::http::StatusCode::TOO_MANY_REQUESTS,
                "RESEND_TOO_SOON",
                self.to_string(),
            ),
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "EXTERNAL_API_ERROR",
                    msg.clone(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}
