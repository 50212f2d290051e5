use axum::{
    Json,
    extract::multipart::MultipartRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// The chain stays in the server log; clients only see the fixed message.
    #[error("error processing file")]
    Internal(#[from] anyhow::Error),
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!(
            "expected multipart/form-data: {}",
            rejection.body_text()
        ))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("rejected request: {msg}");
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Internal(err) => {
                tracing::error!("error processing file: {err:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody {
            message: self.to_string(),
            status: "error",
        });
        (status, body).into_response()
    }
}
