use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::convert::Infallible;

use crate::api::Envelope;
use crate::error::ApiError;

/// Wrapper for API responses that automatically adds the success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub path: String,
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(path: impl Into<String>, data: T) -> Self {
        Self {
            path: path.into(),
            data,
            status_code: None,
        }
    }

    pub fn with_status(path: impl Into<String>, data: T, status_code: StatusCode) -> Self {
        Self {
            path: path.into(),
            data,
            status_code: Some(status_code),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                return ApiError::internal(format!("failed to serialize response data: {}", e))
                    .into_response_at(&self.path);
            }
        };

        (status, Json(Envelope::success(self.path, status.as_u16(), data_value))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Full request path as the client sent it, even inside nested routers.
#[derive(Debug, Clone)]
pub struct RequestPath(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestPath {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = match parts.extensions.get::<OriginalUri>() {
            Some(OriginalUri(uri)) => uri.path().to_string(),
            None => parts.uri.path().to_string(),
        };
        Ok(RequestPath(path))
    }
}
