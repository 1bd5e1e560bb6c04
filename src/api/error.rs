//! HTTP error mapping for the roster API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::access::AccessError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    Access(AccessError),
    Store(StoreError),
    BadRequest(String),
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Storage(inner) => ApiError::Store(inner),
            other => ApiError::Access(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Access(err) => {
                let status = match err {
                    AccessError::InvalidToken => StatusCode::UNAUTHORIZED,
                    AccessError::UserNotFound
                    | AccessError::StudentNotFound
                    | AccessError::ClassNotFound => StatusCode::NOT_FOUND,
                    AccessError::Forbidden(_)
                    | AccessError::NotAssignedToClass
                    | AccessError::OutsideAllowedWindow { .. } => StatusCode::FORBIDDEN,
                    AccessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Store(err) => match err {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                StoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                StoreError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                StoreError::Database(_) | StoreError::Hash(_) => {
                    tracing::error!("Storage error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
