// PostgreSQL-backed repository checks. Skipped unless DATABASE_URL points at a scratch
// database the tests may create `m_notes` in.

use serde_json::json;
use sqlx::PgPool;

use notes_api::config::DatabaseConfig;
use notes_api::database::models::catalog::M_NOTES;
use notes_api::database::{DatabaseManager, EntityRepository, PageRequest, PgRepository, RecordInput, RepositoryError};
use notes_api::filter::{FilterCondition, MatchMode, SortDirective};

const NOTES_DDL: &str = "CREATE TABLE IF NOT EXISTS m_notes (
    id BIGSERIAL PRIMARY KEY,
    title VARCHAR(200),
    content TEXT,
    created_by BIGINT NOT NULL,
    created_on TIMESTAMP NOT NULL,
    modified_by BIGINT,
    modified_on TIMESTAMP,
    deleted_by BIGINT,
    deleted_on TIMESTAMP,
    is_delete BOOLEAN NOT NULL DEFAULT FALSE
)";

async fn pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig { url, max_connections: 2, connection_timeout: 5 };
    let pool = DatabaseManager::connect(&config).await.expect("connect");
    sqlx::query(NOTES_DDL).execute(&pool).await.expect("create m_notes");
    Some(pool)
}

fn note(title: &str, content: &str) -> RecordInput {
    RecordInput::from_json(&M_NOTES, &json!({"title": title, "content": content})).unwrap()
}

fn field_filter(field: &str, value: &str, match_mode: MatchMode) -> FilterCondition {
    serde_json::from_value(json!({"id": field, "value": value, "matchMode": match_mode})).unwrap()
}

fn title_filter(value: &str, match_mode: MatchMode) -> FilterCondition {
    field_filter("title", value, match_mode)
}

#[tokio::test]
async fn crud_round_trip() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let repo = PgRepository::new(&M_NOTES, pool);

    let created = repo.create(note("repo-crud", "first"), 7).await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["createdBy"], 7);
    assert_eq!(created["isDelete"], false);

    let fetched = repo.get_by_id(id).await.unwrap();
    assert_eq!(fetched["content"], "first");

    let partial = RecordInput::from_json(&M_NOTES, &json!({"title": "repo-crud-edited"})).unwrap().with_id(id);
    let updated = repo.update(partial, 8).await.unwrap();
    assert_eq!(updated["title"], "repo-crud-edited");
    assert_eq!(updated["content"], "first");
    assert_eq!(updated["createdBy"], 7);
    assert_eq!(updated["modifiedBy"], 8);

    let duplicate = note("dup", "dup").with_id(id);
    assert!(matches!(repo.create(duplicate, 7).await, Err(RepositoryError::AlreadyExists(_))));

    repo.delete(id, 8).await.unwrap();
    assert!(matches!(repo.get_by_id(id).await, Err(RepositoryError::NotFound(_))));
    assert!(matches!(repo.delete(id, 8).await, Err(RepositoryError::NotFound(_))));
}

#[tokio::test]
async fn soft_delete_twice_succeeds() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let repo = PgRepository::new(&M_NOTES, pool);
    let id = repo.create(note("repo-soft", "x"), 1).await.unwrap()["id"].as_i64().unwrap();

    let first = repo.soft_delete(id, 2).await.unwrap();
    let second = repo.soft_delete(id, 3).await.unwrap();
    assert_eq!(first["isDelete"], true);
    assert_eq!(second["isDelete"], true);
    assert_eq!(second["deletedBy"], 3);

    // Soft-deleted rows stay readable.
    assert_eq!(repo.get_by_id(id).await.unwrap()["isDelete"], true);
    repo.delete(id, 3).await.unwrap();

    assert!(matches!(repo.soft_delete(id, 3).await, Err(RepositoryError::NotFound(_))));
}

#[tokio::test]
async fn paged_query_with_filter_and_sort() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let repo = PgRepository::new(&M_NOTES, pool);
    let marker = format!("repo-page-{}", std::process::id());

    let mut ids = Vec::new();
    for i in 0..5 {
        let created = repo.create(note(&format!("{} {}", marker, i), "paged"), 1).await.unwrap();
        ids.push(created["id"].as_i64().unwrap());
    }

    let request = PageRequest {
        page: 0,
        size: 2,
        sort: vec![SortDirective { id: "id".to_string(), desc: true }],
        filters: vec![title_filter(&marker, MatchMode::Contains)],
        search: String::new(),
    };
    let page = repo.get_page(&request).await.unwrap();
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.number_of_elements, 2);
    assert!(page.first && !page.last);
    assert_eq!(page.content[0]["id"], ids[4]);

    let exact = PageRequest {
        page: 0,
        size: 10,
        filters: vec![title_filter(&format!("{} 3", marker), MatchMode::Equals)],
        ..Default::default()
    };
    let page = repo.get_page(&exact).await.unwrap();
    assert_eq!(page.total_elements, 1);

    let unknown = PageRequest {
        page: 0,
        size: 10,
        sort: vec![SortDirective { id: "nope".to_string(), desc: false }],
        ..Default::default()
    };
    assert!(matches!(repo.get_page(&unknown).await, Err(RepositoryError::Filter(_))));

    ids.push(repo.create(note(&format!("{} blank", marker), ""), 1).await.unwrap()["id"].as_i64().unwrap());

    // An empty EQUALS value matches only empty columns.
    let empty_equals = PageRequest {
        page: 0,
        size: 10,
        filters: vec![
            title_filter(&marker, MatchMode::Contains),
            field_filter("content", "", MatchMode::Equals),
        ],
        ..Default::default()
    };
    let page = repo.get_page(&empty_equals).await.unwrap();
    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content[0]["content"], "");

    // An empty CONTAINS value matches every row.
    let empty_contains = PageRequest {
        page: 0,
        size: 10,
        filters: vec![
            title_filter(&marker, MatchMode::Contains),
            field_filter("content", "", MatchMode::Contains),
        ],
        ..Default::default()
    };
    assert_eq!(repo.get_page(&empty_contains).await.unwrap().total_elements, 6);

    for id in ids {
        repo.delete(id, 1).await.unwrap();
    }
}

#[tokio::test]
async fn equals_filter_matches_returned_timestamp() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let repo = PgRepository::new(&M_NOTES, pool);
    let marker = format!("repo-stamp-{}", std::process::id());
    let created = repo.create(note(&marker, "stamped"), 1).await.unwrap();
    let id = created["id"].as_i64().unwrap();
    let created_on = created["createdOn"].as_str().unwrap().to_string();

    let request = PageRequest {
        page: 0,
        size: 10,
        filters: vec![
            title_filter(&marker, MatchMode::Equals),
            field_filter("createdOn", &created_on, MatchMode::Equals),
        ],
        ..Default::default()
    };
    let page = repo.get_page(&request).await.unwrap();
    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content[0]["id"], id);

    repo.delete(id, 1).await.unwrap();
}
