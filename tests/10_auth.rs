mod common;

use axum::http::{Method, StatusCode};
use common::{open_config, test_config, Session, TestApp, ADMIN_EMAIL, USER_EMAIL};
use notes_api::auth::TokenKind;
use serde_json::json;

#[tokio::test]
async fn login_issues_token_pair() {
    let app = TestApp::new(test_config());
    let response = app
        .call(Method::POST, "/v1/auth/login", Some(json!({"username": ADMIN_EMAIL, "password": "secret"})), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "success");
    assert_eq!(response.body["path"], "/v1/auth/login");
    assert_eq!(response.body["data"]["expired_in"], "60000");
    assert!(response.session_cookie().unwrap().starts_with("notes_session="));

    let token = response.body["data"]["token"].as_str().unwrap();
    let refresh = response.body["data"]["refresh_token"].as_str().unwrap();
    assert!(!token.is_empty());

    let access = app.state.tokens.verify(token, TokenKind::Access).unwrap();
    assert_eq!(access.sub, ADMIN_EMAIL);
    assert_eq!(access.authorities, vec!["ROLE_ADMIN".to_string()]);

    let refresh = app.state.tokens.verify(refresh, TokenKind::Refresh).unwrap();
    assert_eq!(refresh.exp - refresh.iat, 3 * (access.exp - access.iat));
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_bad_input() {
    let app = TestApp::new(test_config());

    let response = app
        .call(Method::POST, "/v1/auth/login", Some(json!({"username": ADMIN_EMAIL, "password": "wrong"})), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "authentication failed");
    assert_eq!(response.body["path"], "/v1/auth/login");

    let response = app
        .call(Method::POST, "/v1/auth/login", Some(json!({"username": "x", "password": "secret"})), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "request invalid");
    assert_eq!(response.body["data"]["username"], "length must be between 2 and 32");
}

#[tokio::test]
async fn protected_routes_need_header_and_session() {
    let app = TestApp::new(test_config());

    let response = app.call(Method::GET, "/v1/m_notes", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "authorization is empty");
    assert_eq!(response.body["path"], "/v1/m_notes");

    let session = app.login(ADMIN_EMAIL).await;
    let response = app.call(Method::GET, "/v1/m_notes", None, Some(&session)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn token_must_match_its_own_session() {
    let app = TestApp::new(test_config());
    let first = app.login(ADMIN_EMAIL).await;
    let second = app.login(USER_EMAIL).await;

    let crossed = Session { token: first.token.clone(), refresh_token: first.refresh_token.clone(), cookie: second.cookie.clone() };
    let response = app.call(Method::GET, "/v1/m_notes", None, Some(&crossed)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "authorization header is invalid");
}

#[tokio::test]
async fn refresh_rejects_live_access_token() {
    let app = TestApp::new(test_config());
    let session = app.login(ADMIN_EMAIL).await;

    let response = app
        .call(Method::POST, "/v1/auth/refresh_token", Some(json!({"refresh_token": session.token})), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "token is valid");
}

#[tokio::test]
async fn refresh_rebinds_the_session() {
    let app = TestApp::new(test_config());
    let session = app.login(ADMIN_EMAIL).await;

    let response = app
        .call(
            Method::POST,
            "/v1/auth/refresh_token",
            Some(json!({"refresh_token": session.refresh_token})),
            Some(&session),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["refresh_token"], session.refresh_token.as_str());

    let renewed = Session {
        token: response.body["data"]["token"].as_str().unwrap().to_string(),
        ..session
    };
    let response = app.call(Method::GET, "/v1/m_notes", None, Some(&renewed)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_garbage() {
    let app = TestApp::new(test_config());
    let response = app
        .call(Method::POST, "/v1/auth/refresh_token", Some(json!({"refresh_token": "not.a.token"})), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "request invalid");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new(test_config());
    let session = app.login(ADMIN_EMAIL).await;

    let response = app.call(Method::GET, "/v1/auth/logout", None, Some(&session)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.call(Method::GET, "/v1/m_notes", None, Some(&session)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "authorization is empty");
}

#[tokio::test]
async fn admin_entities_are_role_gated() {
    let app = TestApp::new(test_config());
    let user = app.login(USER_EMAIL).await;
    let admin = app.login(ADMIN_EMAIL).await;

    let response = app.call(Method::GET, "/v1/m_role", None, Some(&user)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.message(), "permission is denied");

    let response = app.call(Method::GET, "/v1/m_role", None, Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);

    // Cached by the admin request above; still refused.
    let response = app.call(Method::GET, "/v1/m_role", None, Some(&user)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.call(Method::GET, "/v1/m_notes", None, Some(&user)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn mutations_are_stamped_with_the_caller() {
    let app = TestApp::new(test_config());
    let user = app.login(USER_EMAIL).await;

    let response = app
        .call(Method::POST, "/v1/m_notes", Some(json!({"title": "mine", "content": "text"})), Some(&user))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["createdBy"], 2);
}

#[tokio::test]
async fn disabled_binder_lets_everything_through() {
    let app = TestApp::new(open_config());

    let response = app.call(Method::GET, "/v1/m_user", None, None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .call(Method::POST, "/v1/m_notes", Some(json!({"title": "anon"})), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["createdBy"], 0);
}

#[tokio::test]
async fn health_and_fallback() {
    let app = TestApp::new(test_config());

    let response = app.call(Method::GET, "/v1/health/public", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "UP");

    let response = app.call(Method::GET, "/v1/health/status", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["cache"], "UP");
    assert_eq!(response.body["data"]["database"], "UNCONFIGURED");

    let open = TestApp::new(open_config());
    let response = open.call(Method::GET, "/v1/nothing/here", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.message(), "path not found");
    assert_eq!(response.body["path"], "/v1/nothing/here");
}
