#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use notes_api::api::format::now_timestamp;
use notes_api::auth::{hash_password, MemorySessionStore};
use notes_api::cache::{Cache, CacheError, MemoryCache};
use notes_api::config::{AppConfig, Environment};
use notes_api::database::models::{EntityDescriptor, ENTITIES};
use notes_api::database::page::{self, Page, PageRequest};
use notes_api::database::{AccountError, AccountStore, EntityRepository, RecordInput, RepositoryError};
use notes_api::filter::Filter;
use notes_api::{create_app, AppState};

pub const ADMIN_EMAIL: &str = "admin@mail.com";
pub const USER_EMAIL: &str = "user@mail.com";
pub const PASSWORD: &str = "secret";

/// Rows kept in insertion order, stamped the way the PostgreSQL repository stamps them.
pub struct MemoryRepository {
    descriptor: &'static EntityDescriptor,
    rows: Mutex<BTreeMap<i64, Map<String, Value>>>,
    next_id: AtomicI64,
}

impl MemoryRepository {
    pub fn new(descriptor: &'static EntityDescriptor) -> Self {
        Self { descriptor, rows: Mutex::new(BTreeMap::new()), next_id: AtomicI64::new(1) }
    }

    fn stamp(record: &mut Map<String, Value>, by: &str, on: &str, actor: i64) {
        record.insert(by.to_string(), json!(actor));
        record.insert(on.to_string(), json!(now_timestamp()));
    }
}

#[async_trait]
impl EntityRepository for MemoryRepository {
    fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    async fn get_by_id(&self, id: i64) -> Result<Value, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        rows.get(&id)
            .cloned()
            .map(Value::Object)
            .ok_or_else(|| RepositoryError::not_found(self.descriptor, id))
    }

    async fn get_page(&self, request: &PageRequest) -> Result<Page<Value>, RepositoryError> {
        // Same field validation as the SQL path; ordering and predicates are not emulated.
        let mut filter = Filter::compile(self.descriptor, &request.sort, &request.filters, &request.search)?;
        filter.limit(request.size, request.offset())?;

        let rows = self.rows.lock().unwrap();
        let content: Vec<Value> = rows
            .values()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .cloned()
            .map(Value::Object)
            .collect();
        Ok(page::assemble(content, rows.len() as i64, request.page, request.size, !request.sort.is_empty()))
    }

    async fn create(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let id = match input.id {
            Some(id) if rows.contains_key(&id) => return Err(RepositoryError::already_exists(self.descriptor, id)),
            Some(id) => id,
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        let mut record = input.to_json();
        record.insert("id".to_string(), json!(id));
        record.insert("isDelete".to_string(), json!(false));
        Self::stamp(&mut record, "createdBy", "createdOn", actor);
        rows.insert(id, record.clone());
        Ok(Value::Object(record))
    }

    async fn update(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError> {
        let id = input.id.ok_or_else(|| RepositoryError::NotFound("id is required".to_string()))?;
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| RepositoryError::not_found(self.descriptor, id))?;
        for (key, value) in input.to_json() {
            if key != "id" {
                record.insert(key, value);
            }
        }
        Self::stamp(record, "modifiedBy", "modifiedOn", actor);
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, id: i64, _actor: i64) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::not_found(self.descriptor, id))
    }

    async fn soft_delete(&self, id: i64, actor: i64) -> Result<Value, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| RepositoryError::not_found(self.descriptor, id))?;
        record.insert("isDelete".to_string(), json!(true));
        Self::stamp(record, "deletedBy", "deletedOn", actor);
        Ok(Value::Object(record.clone()))
    }
}

struct Account {
    id: i64,
    password_digest: String,
    role: &'static str,
}

/// Two accounts: an administrator (id 1) and a plain user (id 2).
pub struct MemoryAccounts {
    accounts: HashMap<&'static str, Account>,
}

impl Default for MemoryAccounts {
    fn default() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(ADMIN_EMAIL, Account { id: 1, password_digest: hash_password(PASSWORD), role: "ROLE_ADMIN" });
        accounts.insert(USER_EMAIL, Account { id: 2, password_digest: hash_password(PASSWORD), role: "ROLE_USER" });
        Self { accounts }
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Vec<String>, AccountError> {
        match self.accounts.get(username) {
            Some(account) if account.password_digest == hash_password(password) => Ok(vec![account.role.to_string()]),
            _ => Err(AccountError::InvalidCredentials),
        }
    }

    async fn find_user_id(&self, email: &str) -> Result<Option<i64>, AccountError> {
        Ok(self.accounts.get(email).map(|a| a.id))
    }
}

/// Cache whose every operation fails, as if the cache server were unreachable.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Err(CacheError::OperationFailed("SCAN failed".to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.auth.token_expired_ms = 60_000;
    config.redis.enabled = true;
    config.limiter.enabled = false;
    config
}

pub fn open_config() -> AppConfig {
    let mut config = test_config();
    config.auth.jwt_enabled = false;
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub cache: MemoryCache,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        let cache = MemoryCache::new();
        Self::with_cache(config, cache.clone(), Arc::new(cache))
    }

    /// The router talks to `backend`; `cache` is what the test inspects.
    pub fn with_cache(config: AppConfig, cache: MemoryCache, backend: Arc<dyn Cache>) -> Self {
        let repositories: Vec<Arc<dyn EntityRepository>> = ENTITIES
            .iter()
            .copied()
            .map(|d| Arc::new(MemoryRepository::new(d)) as Arc<dyn EntityRepository>)
            .collect();
        let state = AppState::new(
            config,
            Arc::new(MemorySessionStore::new(Duration::from_secs(3600))),
            Arc::new(MemoryAccounts::default()),
            backend,
            repositories,
        );
        let router = create_app(state.clone());
        Self { router, state, cache }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>, session: Option<&Session>) -> TestResponse {
        self.send(request(method, uri, body, session)).await
    }

    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .call(Method::POST, "/v1/auth/login", Some(json!({"username": username, "password": PASSWORD})), None)
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        let cookie = response.session_cookie().expect("login sets a session cookie");
        Session {
            token: response.body["data"]["token"].as_str().unwrap().to_string(),
            refresh_token: response.body["data"]["refresh_token"].as_str().unwrap().to_string(),
            cookie,
        }
    }

    pub fn repository(&self, table: &str) -> Arc<dyn EntityRepository> {
        self.state
            .repositories
            .iter()
            .find(|r| r.descriptor().table == table)
            .cloned()
            .unwrap()
    }

    /// Creates `n` notes titled `note 1..n`.
    pub async fn seed_notes(&self, n: usize, session: Option<&Session>) {
        for i in 1..=n {
            let response = self
                .call(
                    Method::POST,
                    "/v1/m_notes",
                    Some(json!({"title": format!("note {}", i), "content": format!("body {}", i)})),
                    session,
                )
                .await;
            assert_eq!(response.status, StatusCode::OK, "seed failed: {}", response.body);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub refresh_token: String,
    /// `name=value` pair ready for a Cookie header.
    pub cookie: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn session_cookie(&self) -> Option<String> {
        let raw = self.headers.get(header::SET_COOKIE)?.to_str().ok()?;
        raw.split(';').next().map(|pair| pair.trim().to_string())
    }

    pub fn cache_status(&self) -> Option<&str> {
        self.headers.get("x-cache").and_then(|v| v.to_str().ok())
    }
}

pub fn request(method: Method, uri: &str, body: Option<Value>, session: Option<&Session>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder
            .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
            .header(header::COOKIE, session.cookie.clone());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
