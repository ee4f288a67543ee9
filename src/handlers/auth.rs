// handlers/auth.rs - login, logout and token refresh under /v1/auth

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::auth::TokenKind;
use crate::database::record::is_email;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, RequestPath};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = BTreeMap::new();

        let username_len = self.username.chars().count();
        if !(2..=32).contains(&username_len) {
            errors.insert("username".to_string(), "length must be between 2 and 32".to_string());
        } else if !is_email(&self.username) {
            errors.insert("username".to_string(), "must be a valid email".to_string());
        }

        let password_len = self.password.chars().count();
        if !(2..=64).contains(&password_len) {
            errors.insert("password".to_string(), "length must be between 2 and 64".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_fields(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in milliseconds, as configured.
    pub expired_in: String,
}

type AuthResult<T> = Result<(CookieJar, ApiResponse<T>), ApiError>;

fn parse_body<T: serde::de::DeserializeOwned>(payload: Result<Json<Value>, JsonRejection>) -> Result<T, ApiError> {
    let Json(value) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    serde_json::from_value(value).map_err(|e| ApiError::validation(e.to_string()))
}

/// Reuses the caller's session id when present so a refresh keeps the same session.
fn bind_session(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    let name = state.config.auth.session_cookie_name.clone();
    if let Some(existing) = jar.get(&name) {
        let id = existing.value().to_string();
        return (jar, id);
    }
    let id = Uuid::new_v4().to_string();
    let cookie = Cookie::build((name, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.is_production());
    (jar.add(cookie), id)
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    RequestPath(path): RequestPath,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> AuthResult<TokenResponse> {
    let body: LoginRequest = parse_body(payload)?;
    body.validate()?;

    let authorities = state.accounts.authenticate(&body.username, &body.password).await?;
    let token = state.tokens.issue(&body.username, &authorities, TokenKind::Access)?;
    let refresh_token = state.tokens.issue(&body.username, &authorities, TokenKind::Refresh)?;

    let (jar, session_id) = bind_session(&state, jar);
    if let Err(err) = state.sessions.put(&session_id, &token).await {
        tracing::error!(error = %err, "failed to save token to session");
    }
    tracing::info!(subject = %body.username, "login succeeded");

    let response = TokenResponse {
        token,
        refresh_token,
        expired_in: state.config.auth.token_expired_ms.to_string(),
    };
    Ok((jar, ApiResponse::success(path, response)))
}

/// GET /v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    RequestPath(path): RequestPath,
    jar: CookieJar,
) -> AuthResult<Value> {
    let name = state.config.auth.session_cookie_name.clone();
    if let Some(session) = jar.get(&name) {
        state.sessions.remove(session.value()).await?;
    }
    let jar = jar.remove(Cookie::build(name).path("/"));
    Ok((jar, ApiResponse::success(path, Value::Null)))
}

/// POST /v1/auth/refresh_token
pub async fn refresh_token(
    State(state): State<AppState>,
    RequestPath(path): RequestPath,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> AuthResult<TokenResponse> {
    let body: RefreshRequest = parse_body(payload)?;
    if body.refresh_token.is_empty() {
        let mut errors = BTreeMap::new();
        errors.insert("refresh_token".to_string(), "is required".to_string());
        return Err(ApiError::validation_fields(errors));
    }

    if state.tokens.verify(&body.refresh_token, TokenKind::Access).is_ok() {
        return Err(ApiError::TokenStillValid);
    }
    let claims = state
        .tokens
        .verify(&body.refresh_token, TokenKind::Refresh)
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let token = state.tokens.issue(&claims.sub, &claims.authorities, TokenKind::Access)?;
    let (jar, session_id) = bind_session(&state, jar);
    if let Err(err) = state.sessions.put(&session_id, &token).await {
        tracing::error!(error = %err, "failed to save token to session");
    }

    let response = TokenResponse {
        token,
        refresh_token: body.refresh_token,
        expired_in: state.config.auth.token_expired_ms.to_string(),
    };
    Ok((jar, ApiResponse::success(path, response)))
}
