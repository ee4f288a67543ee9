use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{auth, entity, health, EntityState};
use crate::middleware::{
    cache_aside, rate_limit, recover_panic, require_authority, route_not_found, session_binder,
    translate_errors,
};
use crate::state::AppState;

/// Full application router. Layers run outermost first: trace, rate limit, CORS,
/// compression, body limit, error translator, panic recovery, session binder, role
/// gate, response cache, then the handler.
pub fn create_app(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", get(auth::logout))
        .route("/v1/auth/refresh_token", post(auth::refresh_token))
        .route("/v1/health/public", get(health::public))
        .route("/v1/health/status", get(health::status))
        .with_state(state.clone());

    for repository in &state.repositories {
        let prefix = repository.descriptor().route_prefix();
        let routes = entity::routes(EntityState {
            repository: repository.clone(),
            accounts: state.accounts.clone(),
            config: state.config.clone(),
        });
        app = app.nest(&prefix, routes);
    }

    app.fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), cache_aside))
        .layer(from_fn_with_state(state.clone(), require_authority))
        .layer(from_fn_with_state(state.clone(), session_binder))
        .layer(CatchPanicLayer::custom(recover_panic))
        .layer(from_fn(translate_errors))
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.security))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}
