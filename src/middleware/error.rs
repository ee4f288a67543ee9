use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;

use crate::error::ApiError;

/// Central error translator. Handlers and inner layers return `ApiError`, which travels
/// in the response extensions; here it is logged and re-rendered with the request path.
pub async fn translate_errors(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let response = next.run(request).await;

    let Some(error) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };

    if error.is_server_error() {
        tracing::error!(%method, %path, status = error.status_code().as_u16(), "{}", error);
    } else {
        tracing::warn!(%method, %path, status = error.status_code().as_u16(), "{}", error);
    }

    error.into_response_at(&path)
}

/// Panic handler for `CatchPanicLayer::custom`; the fault message becomes a 500 envelope.
pub fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let fault = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(fault = %fault, "request handler panicked");
    ApiError::internal(fault).into_response()
}

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panic_message_is_kept() {
        let response = recover_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match response.extensions().get::<ApiError>() {
            Some(ApiError::Internal(fault)) => assert_eq!(fault, "boom"),
            other => panic!("unexpected error extension: {:?}", other),
        }
    }
}
