// HTTP API Error Types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::api::Envelope;
use crate::auth::session::SessionError;
use crate::auth::token::TokenError;
use crate::cache::CacheError;
use crate::database::accounts::AccountError;
use crate::database::record::RecordError;
use crate::database::repository::RepositoryError;
use crate::filter::error::FilterError;

/// Every failure a request can end in. The error translator middleware turns these into
/// the standard envelope; handlers only ever classify.
#[derive(Debug, Clone)]
pub enum ApiError {
    // 400 Bad Request
    Validation(Value),
    NotFound(String),
    AlreadyExists(String),
    UserNotFound(String),
    TokenStillValid,

    // 401 Unauthorized
    AuthMissing,
    AuthInvalid,
    AuthExpired,
    AuthFailed,

    // 403 Forbidden
    PermissionDenied,

    // 404 Not Found (routing only; missing records are 400)
    RouteNotFound,

    // 429 Too Many Requests
    TooManyRequests,

    // 500 Internal Server Error
    RetrieveFailed(String),
    SaveFailed(String),
    CacheInvalidationFailed(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::NotFound(_)
            | ApiError::AlreadyExists(_)
            | ApiError::UserNotFound(_)
            | ApiError::TokenStillValid => StatusCode::BAD_REQUEST,
            ApiError::AuthMissing
            | ApiError::AuthInvalid
            | ApiError::AuthExpired
            | ApiError::AuthFailed => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::RetrieveFailed(_)
            | ApiError::SaveFailed(_)
            | ApiError::CacheInvalidationFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing sentinel text, used as the envelope `message`.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "request invalid",
            ApiError::NotFound(_) => "data not found",
            ApiError::AlreadyExists(_) => "data already exists",
            ApiError::UserNotFound(_) => "user not found",
            ApiError::TokenStillValid => "token is valid",
            ApiError::AuthMissing => "authorization is empty",
            ApiError::AuthInvalid => "authorization header is invalid",
            ApiError::AuthExpired => "authorization token is expired",
            ApiError::AuthFailed => "authentication failed",
            ApiError::PermissionDenied => "permission is denied",
            ApiError::RouteNotFound => "path not found",
            ApiError::TooManyRequests => "too many request",
            ApiError::RetrieveFailed(_) => "failed to retrieve data",
            ApiError::SaveFailed(_) => "failed to save data",
            ApiError::CacheInvalidationFailed(_) => "failed to delete data in cache",
            ApiError::Internal(_) => "internal server error",
        }
    }

    /// Envelope `data`: a field map for validation failures, a plain string otherwise.
    /// Storage and cache details stay in the logs.
    pub fn data(&self) -> Value {
        match self {
            ApiError::Validation(detail) => detail.clone(),
            ApiError::NotFound(detail)
            | ApiError::AlreadyExists(detail)
            | ApiError::UserNotFound(detail) => Value::String(detail.clone()),
            ApiError::Internal(fault) => Value::String(fault.clone()),
            _ => Value::Null,
        }
    }

    /// Detail worth logging but not worth sending.
    pub fn log_detail(&self) -> Option<&str> {
        match self {
            ApiError::RetrieveFailed(detail)
            | ApiError::SaveFailed(detail)
            | ApiError::CacheInvalidationFailed(detail)
            | ApiError::Internal(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn to_envelope(&self, path: impl Into<String>) -> Envelope {
        Envelope::new(path, self.status_code().as_u16(), self.message(), self.data())
    }

    /// Render the envelope directly, for layers that sit outside the error translator.
    pub fn into_response_at(self, path: &str) -> Response {
        let status = self.status_code();
        let envelope = self.to_envelope(path);
        let mut response = (status, Json(envelope)).into_response();
        response.extensions_mut().insert(RenderedError);
        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(detail: impl Into<String>) -> Self {
        ApiError::Validation(Value::String(detail.into()))
    }

    pub fn validation_fields(field_errors: BTreeMap<String, String>) -> Self {
        ApiError::Validation(json!(field_errors))
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        ApiError::NotFound(detail.into())
    }

    pub fn internal(fault: impl Into<String>) -> Self {
        ApiError::Internal(fault.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.log_detail() {
            Some(detail) => write!(f, "{}: {}", self.message(), detail),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

/// Marker for responses whose envelope already carries the request path.
#[derive(Debug, Clone, Copy)]
pub struct RenderedError;

impl IntoResponse for ApiError {
    /// The path is unknown here; the error translator fills it in from the stashed error.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = self.to_envelope("");
        let mut response = (status, Json(envelope)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotAnObject => ApiError::validation(err.to_string()),
            RecordError::Fields(field_errors) => ApiError::validation_fields(field_errors),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(detail) => ApiError::NotFound(detail),
            RepositoryError::AlreadyExists(detail) => ApiError::AlreadyExists(detail),
            RepositoryError::Filter(err) => err.into(),
            RepositoryError::Record(err) => err.into(),
            RepositoryError::Retrieve(err) => ApiError::RetrieveFailed(err.to_string()),
            RepositoryError::Save(err) => ApiError::SaveFailed(err.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::AuthExpired,
            TokenError::InvalidSignature | TokenError::WrongKind => ApiError::AuthInvalid,
            TokenError::Encoding(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::RetrieveFailed(err.to_string())
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::CacheInvalidationFailed(err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials => ApiError::AuthFailed,
            AccountError::Storage(err) => ApiError::RetrieveFailed(err.to_string()),
        }
    }
}
