use axum::extract::State;
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, RequestPath};
use crate::state::AppState;

/// GET /v1/health/public - liveness, never touches a dependency
pub async fn public(RequestPath(path): RequestPath) -> ApiResult<Value> {
    Ok(ApiResponse::success(
        path,
        json!({ "status": "UP", "version": env!("CARGO_PKG_VERSION") }),
    ))
}

/// GET /v1/health/status - database and cache reachability
pub async fn status(State(state): State<AppState>, RequestPath(path): RequestPath) -> ApiResult<Value> {
    let database = match &state.pool {
        Some(pool) => match DatabaseManager::health_check(pool).await {
            Ok(()) => "UP",
            Err(err) => {
                tracing::warn!(error = %err, "database health check failed");
                "DOWN"
            }
        },
        None => "UNCONFIGURED",
    };

    let cache = match state.cache.ping().await {
        Ok(()) => "UP",
        Err(err) => {
            tracing::warn!(error = %err, "cache health check failed");
            "DOWN"
        }
    };

    Ok(ApiResponse::success(
        path,
        json!({
            "status": if database != "DOWN" && cache == "UP" { "UP" } else { "DEGRADED" },
            "database": database,
            "cache": cache,
            "environment": state.config.environment,
        }),
    ))
}
