use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{Claims, TokenKind};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller attached to the request by the session binder
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub subject: String,
    pub authorities: Vec<String>,
}

impl AuthUser {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            authorities: claims.authorities,
        }
    }
}

/// Marks requests that passed because the session binder is switched off.
#[derive(Clone, Copy, Debug)]
pub struct AuthBypass;

/// Session binder: the bearer token must equal the token stored for the caller's session
/// and must verify as a live access token.
pub async fn session_binder(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = &state.config.auth;

    if !auth.jwt_enabled {
        request.extensions_mut().insert(AuthBypass);
        return Ok(next.run(request).await);
    }

    let path = request.uri().path();
    if auth.whitelist_paths.iter().any(|prefix| path.starts_with(prefix.as_str())) {
        return Ok(next.run(request).await);
    }

    let bearer = extract_bearer(request.headers()).ok_or_else(|| {
        tracing::debug!("bearer token is missing");
        ApiError::AuthMissing
    })?;

    let jar = CookieJar::from_headers(request.headers());
    let session_id = jar
        .get(&auth.session_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            tracing::debug!("session cookie is missing");
            ApiError::AuthMissing
        })?;

    let stored = state.sessions.get(&session_id).await?.ok_or_else(|| {
        tracing::debug!("session holds no token");
        ApiError::AuthMissing
    })?;

    if stored.as_bytes() != bearer.as_bytes() {
        tracing::debug!("session token and header token differ");
        return Err(ApiError::AuthInvalid);
    }

    let claims = state.tokens.verify(&bearer, TokenKind::Access)?;
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Role gate for entity families that need a specific authority. Runs before the
/// response cache so cached bodies are never served to unauthorised callers.
pub async fn require_authority(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let required = entity_segment(request.uri().path()).and_then(|name| {
        state
            .repositories
            .iter()
            .map(|repo| repo.descriptor())
            .find(|descriptor| descriptor.name == name)
            .and_then(|descriptor| descriptor.required_authority)
    });

    let Some(authority) = required else {
        return Ok(next.run(request).await);
    };

    if request.extensions().get::<AuthBypass>().is_some() {
        return Ok(next.run(request).await);
    }

    match request.extensions().get::<AuthUser>() {
        Some(user) if user.has_authority(authority) => Ok(next.run(request).await),
        Some(user) => {
            tracing::debug!(subject = %user.subject, authority, "missing required authority");
            Err(ApiError::PermissionDenied)
        }
        None => Err(ApiError::AuthMissing),
    }
}

/// `/v1/m_user/5` -> `m_user`.
fn entity_segment(path: &str) -> Option<&str> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("v1"), Some(name)) if !name.is_empty() => Some(name),
        _ => None,
    }
}
