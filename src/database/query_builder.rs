use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, query::Query, Executor, Postgres, Row};

use crate::api::format::SQL_TIMESTAMP_FORMAT;
use crate::database::models::{EntityDescriptor, FieldDescriptor, FieldType};
use crate::database::record::RecordInput;
use crate::filter::types::{SqlParam, SqlResult};
use crate::filter::Filter;

/// SQL for one entity. Rows always come back as a single JSON column named `row`, keyed
/// by external field names and already in wire format.
pub struct QueryBuilder<'a> {
    descriptor: &'a EntityDescriptor,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(descriptor: &'a EntityDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn projection(&self) -> String {
        self.descriptor
            .all_fields()
            .map(|f| format!("{} AS \"{}\"", column_expr(f), f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn select_by_id(&self, id: i64) -> SqlResult {
        let inner = format!(
            "SELECT {} FROM \"{}\" WHERE \"id\" = $1",
            self.projection(),
            self.descriptor.table
        );
        SqlResult { query: wrap_json(&inner), params: vec![SqlParam::Int(Some(id))] }
    }

    pub fn select_page(&self, filter: &Filter<'_>) -> SqlResult {
        let inner = filter.to_sql(&self.projection());
        SqlResult { query: wrap_json(&inner.query), params: inner.params }
    }

    pub fn exists(&self, id: i64) -> SqlResult {
        SqlResult {
            query: format!("SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE \"id\" = $1) AS found", self.descriptor.table),
            params: vec![SqlParam::Int(Some(id))],
        }
    }

    pub fn insert(&self, input: &RecordInput, actor: i64, now: NaiveDateTime) -> SqlResult {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut params = Vec::new();

        if let Some(id) = input.id {
            params.push(SqlParam::Int(Some(id)));
            columns.push("\"id\"".to_string());
            values.push(format!("${}", params.len()));
        }
        for (field, param) in &input.values {
            params.push(param.clone());
            columns.push(format!("\"{}\"", field.column));
            values.push(bind_expr(field, params.len()));
        }
        for (column, param) in [
            ("created_by", SqlParam::Int(Some(actor))),
            ("created_on", SqlParam::Timestamp(Some(now))),
            ("is_delete", SqlParam::Bool(Some(false))),
        ] {
            params.push(param);
            columns.push(format!("\"{}\"", column));
            values.push(format!("${}", params.len()));
        }

        let write = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
            self.descriptor.table,
            columns.join(", "),
            values.join(", ")
        );
        SqlResult { query: self.returning_json(&write), params }
    }

    /// Copies the present mutable fields and stamps modification; id and creation audit
    /// columns are never part of the SET list.
    pub fn update(&self, id: i64, input: &RecordInput, actor: i64, now: NaiveDateTime) -> SqlResult {
        let mut params = vec![SqlParam::Int(Some(id))];
        let mut assignments = Vec::new();

        for (field, param) in &input.values {
            params.push(param.clone());
            assignments.push(format!("\"{}\" = {}", field.column, bind_expr(field, params.len())));
        }
        params.push(SqlParam::Int(Some(actor)));
        assignments.push(format!("\"modified_by\" = ${}", params.len()));
        params.push(SqlParam::Timestamp(Some(now)));
        assignments.push(format!("\"modified_on\" = ${}", params.len()));

        let write = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = $1 RETURNING *",
            self.descriptor.table,
            assignments.join(", ")
        );
        SqlResult { query: self.returning_json(&write), params }
    }

    pub fn soft_delete(&self, id: i64, actor: i64, now: NaiveDateTime) -> SqlResult {
        let write = format!(
            "UPDATE \"{}\" SET \"is_delete\" = TRUE, \"deleted_by\" = $2, \"deleted_on\" = $3 WHERE \"id\" = $1 RETURNING *",
            self.descriptor.table
        );
        SqlResult {
            query: self.returning_json(&write),
            params: vec![
                SqlParam::Int(Some(id)),
                SqlParam::Int(Some(actor)),
                SqlParam::Timestamp(Some(now)),
            ],
        }
    }

    pub fn delete(&self, id: i64) -> SqlResult {
        SqlResult {
            query: format!("DELETE FROM \"{}\" WHERE \"id\" = $1", self.descriptor.table),
            params: vec![SqlParam::Int(Some(id))],
        }
    }

    fn returning_json(&self, write: &str) -> String {
        format!(
            "WITH written AS ({}) {}",
            write,
            wrap_json(&format!("SELECT {} FROM written", self.projection()))
        )
    }
}

fn wrap_json(inner: &str) -> String {
    format!("SELECT row_to_json(t) AS row FROM ({}) t", inner)
}

fn column_expr(field: &FieldDescriptor) -> String {
    match field.kind {
        FieldType::Timestamp => format!("to_char(\"{}\", '{}')", field.column, SQL_TIMESTAMP_FORMAT),
        FieldType::Binary => format!("replace(encode(\"{}\", 'base64'), chr(10), '')", field.column),
        _ => format!("\"{}\"", field.column),
    }
}

fn bind_expr(field: &FieldDescriptor, index: usize) -> String {
    match field.kind {
        FieldType::Binary => format!("decode(${}, 'base64')", index),
        _ => format!("${}", index),
    }
}

pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = match p {
            SqlParam::Text(v) => q.bind(v.clone()),
            SqlParam::Int(v) => q.bind(*v),
            SqlParam::Bool(v) => q.bind(*v),
            SqlParam::Timestamp(v) => q.bind(*v),
        };
    }
    q
}

pub async fn fetch_records<'e, E>(executor: E, sql: &SqlResult) -> Result<Vec<Value>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_all(executor)
        .await?;
    rows.iter().map(|row| row.try_get::<Value, _>("row")).collect()
}

pub async fn fetch_optional_record<'e, E>(executor: E, sql: &SqlResult) -> Result<Option<Value>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_optional(executor)
        .await?;
    row.map(|r| r.try_get::<Value, _>("row")).transpose()
}

pub async fn fetch_count<'e, E>(executor: E, sql: &SqlResult) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_one(executor)
        .await?;
    row.try_get::<i64, _>("count")
}

pub async fn fetch_exists<'e, E>(executor: E, sql: &SqlResult) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = bind_params(sqlx::query(&sql.query), &sql.params)
        .fetch_one(executor)
        .await?;
    row.try_get::<bool, _>("found")
}

pub async fn execute<'e, E>(executor: E, sql: &SqlResult) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = bind_params(sqlx::query(&sql.query), &sql.params)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
