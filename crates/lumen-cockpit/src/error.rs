//! HTTP mapping of bridge errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lumen_types::BridgeError;
use serde::Serialize;

/// Error body returned by the request front-end: `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// A [`BridgeError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BridgeError::UnknownCommand(_) => StatusCode::NOT_FOUND,
            BridgeError::ConnectionFailed(_) | BridgeError::Transport(_) | BridgeError::Broker(_) => {
                StatusCode::BAD_GATEWAY
            }
            BridgeError::Encode { .. }
            | BridgeError::Render(_)
            | BridgeError::Serialization(_)
            | BridgeError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
