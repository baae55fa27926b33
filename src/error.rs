//! Error taxonomy shared by adapters and handlers, and its HTTP mapping.

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("push delivery failed: {0}")]
    PushDelivery(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("blocking task failed")]
    Blocking(#[from] BlockingError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Message safe to hand back to the caller. Server-side failures are
    /// collapsed to a generic phrase; the detail only goes to the log.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(m) | AppError::Unauthorized(m) | AppError::NotFound(m) => m.clone(),
            AppError::PushDelivery(_) => "failed to deliver push notification".to_owned(),
            AppError::Database(_) | AppError::Pool(_) | AppError::Blocking(_) | AppError::Internal(_) => {
                "internal server error".to_owned()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PushDelivery(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Pool(_) | AppError::Blocking(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("request failed: {}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            status: "error",
            message: self.public_message(),
        })
    }
}

/// Builds the canonical error envelope for failures raised outside handlers
/// (JSON body, query string and path extractors).
pub fn error_envelope(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorBody {
        status: "error",
        message: message.into(),
    })
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    error_envelope(StatusCode::BAD_REQUEST, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::validation("Search query is required"), StatusCode::BAD_REQUEST)]
    #[case(AppError::unauthorized("user not found"), StatusCode::UNAUTHORIZED)]
    #[case(AppError::not_found("Vendor not found"), StatusCode::NOT_FOUND)]
    #[case(AppError::PushDelivery("gateway returned 500".into()), StatusCode::BAD_GATEWAY)]
    #[case(AppError::Database(diesel::result::Error::NotFound), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_errors_to_status(#[case] err: AppError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[actix_web::test]
    async fn renders_error_envelope() {
        let resp = AppError::validation("vendor_id is required").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "vendor_id is required");
    }

    #[actix_web::test]
    async fn hides_database_detail() {
        let err = AppError::Database(diesel::result::Error::QueryBuilderError("secret detail".into()));
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "internal server error");
    }
}
