use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snaplink_core::StorageError;
use snaplink_redirector::RedirectorError;
use snaplink_shortener::ShortenerError;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// The request body could not be read.
    BadRequest(StatusCode, String),
    InvalidUrl(String),
    NotFound(String),
    /// A backend did not answer in time.
    Unavailable,
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(status, _) => *status,
            AppError::InvalidUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::BadRequest(_, message) | AppError::InvalidUrl(message) => message.clone(),
            AppError::NotFound(short_id) => format!("short url not found: {short_id}"),
            AppError::Unavailable => "service temporarily unavailable".to_string(),
            AppError::Internal => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

fn from_storage(err: StorageError) -> AppError {
    match err {
        StorageError::Timeout(message) => {
            error!(error = %message, "store timed out");
            AppError::Unavailable
        }
        other => {
            error!(error = %other, "store failure");
            AppError::Internal
        }
    }
}

impl From<ShortenerError> for AppError {
    fn from(err: ShortenerError) -> Self {
        match err {
            ShortenerError::InvalidUrl(message) => AppError::InvalidUrl(message),
            ShortenerError::IdentifierSpaceExhausted { attempts } => {
                error!(attempts, "could not allocate a short id");
                AppError::Internal
            }
            ShortenerError::Storage(e) => from_storage(e),
        }
    }
}

impl From<RedirectorError> for AppError {
    fn from(err: RedirectorError) -> Self {
        match err {
            RedirectorError::NotFound(short_id) => AppError::NotFound(short_id),
            RedirectorError::Storage(e) => from_storage(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.status(), rejection.body_text())
    }
}
