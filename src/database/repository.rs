use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use crate::database::models::EntityDescriptor;
use crate::database::page::{self, Page, PageRequest};
use crate::database::query_builder::{self, QueryBuilder};
use crate::database::record::{RecordError, RecordInput};
use crate::filter::{Filter, FilterError};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("retrieve failed: {0}")]
    Retrieve(sqlx::Error),

    #[error("save failed: {0}")]
    Save(sqlx::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &EntityDescriptor, id: i64) -> Self {
        RepositoryError::NotFound(format!("{} with id {} not found", entity.name, id))
    }

    pub fn already_exists(entity: &EntityDescriptor, id: i64) -> Self {
        RepositoryError::AlreadyExists(format!("{} with id {} already exists", entity.name, id))
    }
}

/// Uniform CRUD and paged access to one entity kind. Records travel as JSON objects keyed
/// by external field names.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    fn descriptor(&self) -> &'static EntityDescriptor;

    async fn get_by_id(&self, id: i64) -> Result<Value, RepositoryError>;

    async fn get_page(&self, request: &PageRequest) -> Result<Page<Value>, RepositoryError>;

    async fn create(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError>;

    /// `input.id` must be set; it selects the row and is never written.
    async fn update(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError>;

    async fn delete(&self, id: i64, actor: i64) -> Result<(), RepositoryError>;

    /// Idempotent: repeating it on the same row succeeds and re-stamps deleted-by/-on.
    async fn soft_delete(&self, id: i64, actor: i64) -> Result<Value, RepositoryError>;
}

/// PostgreSQL implementation shared by every entity kind.
pub struct PgRepository {
    descriptor: &'static EntityDescriptor,
    pool: PgPool,
}

impl PgRepository {
    pub fn new(descriptor: &'static EntityDescriptor, pool: PgPool) -> Self {
        Self { descriptor, pool }
    }

    fn builder(&self) -> QueryBuilder<'static> {
        QueryBuilder::new(self.descriptor)
    }

    /// Whole seconds, so stored audit times equal their wire form.
    fn now() -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

#[async_trait]
impl EntityRepository for PgRepository {
    fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    async fn get_by_id(&self, id: i64) -> Result<Value, RepositoryError> {
        let sql = self.builder().select_by_id(id);
        query_builder::fetch_optional_record(&self.pool, &sql)
            .await
            .map_err(RepositoryError::Retrieve)?
            .ok_or_else(|| RepositoryError::not_found(self.descriptor, id))
    }

    /// Count and fetch share one read-only repeatable-read snapshot, so the totals always
    /// describe the content they are returned with.
    async fn get_page(&self, request: &PageRequest) -> Result<Page<Value>, RepositoryError> {
        let mut filter = Filter::compile(self.descriptor, &request.sort, &request.filters, &request.search)?;
        let count_sql = filter.to_count_sql();
        filter.limit(request.size, request.offset())?;
        let page_sql = self.builder().select_page(&filter);

        let mut tx = self.pool.begin().await.map_err(RepositoryError::Retrieve)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::Retrieve)?;
        let total = query_builder::fetch_count(&mut *tx, &count_sql)
            .await
            .map_err(RepositoryError::Retrieve)?;
        let content = query_builder::fetch_records(&mut *tx, &page_sql)
            .await
            .map_err(RepositoryError::Retrieve)?;
        tx.commit().await.map_err(RepositoryError::Retrieve)?;

        tracing::debug!(entity = self.descriptor.name, total, rows = content.len(), "page fetched");
        Ok(page::assemble(content, total, request.page, request.size, !request.sort.is_empty()))
    }

    async fn create(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError> {
        if let Some(id) = input.id {
            let exists = query_builder::fetch_exists(&self.pool, &self.builder().exists(id))
                .await
                .map_err(RepositoryError::Retrieve)?;
            if exists {
                return Err(RepositoryError::already_exists(self.descriptor, id));
            }
        }
        let sql = self.builder().insert(&input, actor, Self::now());
        query_builder::fetch_optional_record(&self.pool, &sql)
            .await
            .map_err(RepositoryError::Save)?
            .ok_or_else(|| RepositoryError::Save(sqlx::Error::RowNotFound))
    }

    async fn update(&self, input: RecordInput, actor: i64) -> Result<Value, RepositoryError> {
        let id = input
            .id
            .ok_or_else(|| RepositoryError::NotFound(format!("{} id is required", self.descriptor.name)))?;
        let sql = self.builder().update(id, &input, actor, Self::now());
        query_builder::fetch_optional_record(&self.pool, &sql)
            .await
            .map_err(RepositoryError::Save)?
            .ok_or_else(|| RepositoryError::not_found(self.descriptor, id))
    }

    async fn delete(&self, id: i64, actor: i64) -> Result<(), RepositoryError> {
        let affected = query_builder::execute(&self.pool, &self.builder().delete(id))
            .await
            .map_err(RepositoryError::Save)?;
        if affected == 0 {
            return Err(RepositoryError::not_found(self.descriptor, id));
        }
        tracing::info!(entity = self.descriptor.name, id, actor, "record deleted");
        Ok(())
    }

    async fn soft_delete(&self, id: i64, actor: i64) -> Result<Value, RepositoryError> {
        let sql = self.builder().soft_delete(id, actor, Self::now());
        query_builder::fetch_optional_record(&self.pool, &sql)
            .await
            .map_err(RepositoryError::Save)?
            .ok_or_else(|| RepositoryError::not_found(self.descriptor, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn audit_time_is_whole_seconds() {
        assert_eq!(PgRepository::now().nanosecond(), 0);
    }
}
