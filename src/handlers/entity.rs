// handlers/entity.rs - generic CRUD handlers mounted once per entity kind under /v1/<entity>

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{AccountStore, EntityRepository, Page, PageRequest, RecordInput};
use crate::error::ApiError;
use crate::filter::{filter_where::is_clean_search, FilterCondition, FilterError, SortDirective};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestPath};

#[derive(Clone)]
pub struct EntityState {
    pub repository: Arc<dyn EntityRepository>,
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<AppConfig>,
}

/// Router for one entity family; nested by the app under `/v1/<entity>`.
pub fn routes(state: EntityState) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/header", get(header))
        .route("/delete/:id", put(soft_delete))
        .route("/:id", get(get_one).put(update).delete(delete))
        .with_state(state)
}

/// Raw list parameters; every value is validated by `ListParams::into_request`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "_page")]
    pub page: Option<String>,
    #[serde(rename = "_size")]
    pub size: Option<String>,
    #[serde(rename = "_sort")]
    pub sort: Option<String>,
    #[serde(rename = "_filter")]
    pub filter: Option<String>,
    #[serde(rename = "_q")]
    pub q: Option<String>,
}

impl ListParams {
    pub fn into_request(self, default_size: i64) -> Result<PageRequest, ApiError> {
        let page = parse_number("_page", self.page.as_deref(), 0)?;
        if page < 0 {
            return Err(ApiError::validation("_page must not be negative"));
        }
        let size = parse_number("_size", self.size.as_deref(), default_size)?;
        if size <= 0 {
            return Err(ApiError::validation("_size must be greater than zero"));
        }

        let sort: Vec<SortDirective> = parse_json("_sort", self.sort.as_deref())?;
        let filters: Vec<FilterCondition> = parse_json("_filter", self.filter.as_deref())?;

        let search = self.q.unwrap_or_default();
        if !is_clean_search(&search) {
            return Err(FilterError::InvalidSearch.into());
        }

        Ok(PageRequest { page, size, sort, filters, search })
    }
}

fn parse_number(param: &str, raw: Option<&str>, default: i64) -> Result<i64, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::validation(format!("{} must be a number", param))),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(param: &'static str, raw: Option<&str>) -> Result<Vec<T>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| FilterError::Json { param, source }.into()),
    }
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation(format!("invalid id: {}", raw))),
    }
}

fn body_value(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

/// Audit stamp for mutations: the id of the user named by the token subject, or 0 when
/// no caller is attached (session binder switched off).
async fn resolve_actor(accounts: &dyn AccountStore, user: Option<&AuthUser>) -> Result<i64, ApiError> {
    let Some(user) = user else {
        return Ok(0);
    };
    accounts
        .find_user_id(&user.subject)
        .await?
        .ok_or_else(|| ApiError::UserNotFound(user.subject.clone()))
}

/// GET /v1/<entity>?_page=&_size=&_sort=&_filter=&_q=
pub async fn list(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<Value>> {
    let Query(params) = params.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let request = params.into_request(state.config.api.default_page_size)?;
    let page = state.repository.get_page(&request).await?;
    Ok(ApiResponse::success(path, page))
}

/// GET /v1/<entity>/header - field name to type tag
pub async fn header(State(state): State<EntityState>, RequestPath(path): RequestPath) -> ApiResult<Map<String, Value>> {
    Ok(ApiResponse::success(path, state.repository.descriptor().field_types()))
}

/// GET /v1/<entity>/:id
pub async fn get_one(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let record = state.repository.get_by_id(id).await?;
    Ok(ApiResponse::success(path, record))
}

/// POST /v1/<entity>
pub async fn create(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    user: Option<Extension<AuthUser>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let body = body_value(payload)?;
    let input = RecordInput::from_json(state.repository.descriptor(), &body)?;
    let actor = resolve_actor(state.accounts.as_ref(), user.as_deref()).await?;
    let record = state.repository.create(input, actor).await?;
    tracing::info!(entity = state.repository.descriptor().name, actor, "record created");
    Ok(ApiResponse::success(path, record))
}

/// PUT /v1/<entity>/:id - the path id wins over any id in the body
pub async fn update(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let mut body = body_value(payload)?;
    if let Some(object) = body.as_object_mut() {
        object.remove("id");
    }
    let input = RecordInput::from_json(state.repository.descriptor(), &body)?.with_id(id);
    let actor = resolve_actor(state.accounts.as_ref(), user.as_deref()).await?;
    let record = state.repository.update(input, actor).await?;
    Ok(ApiResponse::success(path, record))
}

/// PUT /v1/<entity>/delete/:id
pub async fn soft_delete(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let actor = resolve_actor(state.accounts.as_ref(), user.as_deref()).await?;
    let record = state.repository.soft_delete(id, actor).await?;
    Ok(ApiResponse::success(path, record))
}

/// DELETE /v1/<entity>/:id
pub async fn delete(
    State(state): State<EntityState>,
    RequestPath(path): RequestPath,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let actor = resolve_actor(state.accounts.as_ref(), user.as_deref()).await?;
    state.repository.delete(id, actor).await?;
    Ok(ApiResponse::success(path, json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::MatchMode;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "_page" => params.page = value,
                "_size" => params.size = value,
                "_sort" => params.sort = value,
                "_filter" => params.filter = value,
                "_q" => params.q = value,
                _ => unreachable!(),
            }
        }
        params
    }

    #[test]
    fn defaults_apply() {
        let request = ListParams::default().into_request(10).unwrap();
        assert_eq!(request.page, 0);
        assert_eq!(request.size, 10);
        assert!(request.sort.is_empty());
        assert!(request.filters.is_empty());
        assert_eq!(request.search, "");
    }

    #[test]
    fn parses_sort_and_filter_json() {
        let request = params(&[
            ("_page", "1"),
            ("_size", "2"),
            ("_sort", r#"[{"id":"title","desc":true}]"#),
            ("_filter", r#"[{"id":"title","value":"x","matchMode":"EQUALS"}]"#),
            ("_q", "hello world 42"),
        ])
        .into_request(10)
        .unwrap();
        assert_eq!(request.offset(), 2);
        assert!(request.sort[0].desc);
        assert_eq!(request.filters[0].match_mode, MatchMode::Equals);
        assert_eq!(request.search, "hello world 42");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(params(&[("_page", "-1")]).into_request(10).is_err());
        assert!(params(&[("_size", "0")]).into_request(10).is_err());
        assert!(params(&[("_size", "abc")]).into_request(10).is_err());
        assert!(params(&[("_sort", "{not json")]).into_request(10).is_err());

        let err = params(&[("_q", "drop;table")]).into_request(10).unwrap_err();
        assert_eq!(err.data(), Value::String("global search must not contains special character".into()));
    }

    #[test]
    fn ids_must_be_positive_numbers() {
        assert_eq!(parse_id("5").unwrap(), 5);
        assert!(parse_id("0").is_err());
        assert!(parse_id("abc").is_err());
    }
}
