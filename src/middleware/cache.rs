use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::api::format::refresh_timestamp;
use crate::error::ApiError;
use crate::state::AppState;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Cache-aside for entity routes: writes drop the resource family, GETs are served from
/// the cache when possible and stored on a 200.
pub async fn cache_aside(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let redis = &state.config.redis;
    let path = request.uri().path().to_string();

    if !redis.enabled || is_excluded(&redis.excluded_paths, &path) {
        return next.run(request).await;
    }

    match *request.method() {
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
            invalidate_then_run(&state, &path, request, next).await
        }
        Method::GET => lookup_or_store(&state, &path, request, next).await,
        _ => next.run(request).await,
    }
}

async fn invalidate_then_run(state: &AppState, path: &str, request: Request, next: Next) -> Response {
    let Some(pattern) = family_pattern(path) else {
        return next.run(request).await;
    };

    match state.cache.delete_pattern(&pattern).await {
        Ok(deleted) => tracing::debug!(pattern = %pattern, deleted, "cache invalidated"),
        Err(err) => {
            return ApiError::CacheInvalidationFailed(err.to_string()).into_response();
        }
    }

    let response = next.run(request).await;

    // A read racing the write may have re-cached the old body in between.
    if response.status().is_success() {
        if let Err(err) = state.cache.delete_pattern(&pattern).await {
            tracing::warn!(pattern = %pattern, error = %err, "post-write cache invalidation failed");
        }
    }
    response
}

async fn lookup_or_store(state: &AppState, path: &str, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let limit = state.config.api.max_request_size_bytes;
    let body = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => return ApiError::validation(format!("request body unreadable: {}", err)).into_response(),
    };

    let base = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.to_string());
    let key = cache_key(&base, &body);
    let request = Request::from_parts(parts, Body::from(body));

    match state.cache.get(&key).await {
        Ok(Some(cached)) => match refresh_timestamp(&cached) {
            Ok(fresh) => {
                tracing::debug!(key = %key, "cache hit");
                return cached_response(fresh, "HIT");
            }
            Err(err) => tracing::warn!(key = %key, error = %err, "undecodable cache entry"),
        },
        Ok(None) => {}
        Err(err) => tracing::warn!(key = %key, error = %err, "cache lookup failed"),
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => return ApiError::internal(format!("response body unreadable: {}", err)).into_response(),
    };

    if let Err(err) = state.cache.set(&key, &bytes).await {
        tracing::warn!(key = %key, error = %err, "cache store failed");
    }
    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

fn cached_response(body: Vec<u8>, status: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::HeaderName::from_static(CACHE_STATUS_HEADER), HeaderValue::from_static(status)),
        ],
        body,
    )
        .into_response()
}

pub fn is_excluded(excluded: &[String], path: &str) -> bool {
    excluded.iter().any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
}

/// `/v1/m_notes/5` -> `/v1/m_notes*`; paths without a segment are not invalidated.
pub fn family_pattern(path: &str) -> Option<String> {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(format!("/{}*", segments.join("/")))
}

/// Path and query, plus `:id=N` when the body carries a numeric id.
pub fn cache_key(path_and_query: &str, body: &Bytes) -> String {
    let id = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("id").and_then(Value::as_i64));
    match id {
        Some(id) => format!("{}:id={}", path_and_query, id),
        None => path_and_query.to_string(),
    }
}
