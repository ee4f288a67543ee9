use crate::database::models::EntityDescriptor;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{sanitize_search, FilterWhere, FilterWhereInfo};
use super::types::{FilterCondition, FilterOrderInfo, SortDirective, SqlResult};

/// Compiled list predicate for one entity: ordering, conditions, global search and
/// pagination, rendered to parameterized SQL on demand.
pub struct Filter<'a> {
    descriptor: &'a EntityDescriptor,
    order: Option<FilterOrderInfo>,
    conditions: Vec<FilterWhereInfo>,
    search: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<'a> Filter<'a> {
    pub fn new(descriptor: &'a EntityDescriptor) -> Self {
        Self {
            descriptor,
            order: None,
            conditions: vec![],
            search: String::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn compile(
        descriptor: &'a EntityDescriptor,
        sort: &[SortDirective],
        filters: &[FilterCondition],
        search: &str,
    ) -> Result<Self, FilterError> {
        let mut filter = Self::new(descriptor);
        filter.order(sort)?.where_clause(filters)?.search(search);
        Ok(filter)
    }

    pub fn order(&mut self, sorts: &[SortDirective]) -> Result<&mut Self, FilterError> {
        self.order = FilterOrder::validate_and_parse(self.descriptor, sorts)?;
        Ok(self)
    }

    pub fn where_clause(&mut self, filters: &[FilterCondition]) -> Result<&mut Self, FilterError> {
        let mut conditions = Vec::with_capacity(filters.len());
        for condition in filters {
            let field = self
                .descriptor
                .field(&condition.id)
                .ok_or_else(|| FilterError::UnknownFilterField(condition.id.clone()))?;
            conditions.push(FilterWhereInfo {
                column: field.column.to_string(),
                condition: condition.clone(),
            });
        }
        self.conditions = conditions;
        Ok(self)
    }

    /// Special characters are stripped here even though callers reject them first.
    pub fn search(&mut self, term: &str) -> &mut Self {
        self.search = sanitize_search(term).trim().to_string();
        self
    }

    pub fn limit(&mut self, limit: i64, offset: i64) -> Result<&mut Self, FilterError> {
        if limit <= 0 {
            return Err(FilterError::InvalidLimit("size must be greater than zero".to_string()));
        }
        if offset < 0 {
            return Err(FilterError::InvalidOffset("offset must be non-negative".to_string()));
        }
        self.limit = Some(limit);
        self.offset = Some(offset);
        Ok(self)
    }

    /// `SELECT <projection> FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT .. OFFSET ..]`.
    pub fn to_sql(&self, projection: &str) -> SqlResult {
        let where_result = self.to_where_sql();
        let order_clause = FilterOrder::generate(self.order.as_ref());
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", projection),
            format!("FROM \"{}\"", self.descriptor.table),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params: where_result.params }
    }

    pub fn to_where_sql(&self) -> SqlResult {
        let columns: Vec<&str> = self.descriptor.string_fields().map(|f| f.column).collect();
        let search = (!self.search.is_empty()).then(|| (columns.as_slice(), self.search.as_str()));
        let (query, params) = FilterWhere::generate(&self.conditions, search, 0);
        SqlResult { query, params }
    }

    /// Same predicate as [`Filter::to_sql`] without ordering or pagination.
    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.descriptor.table)
        } else {
            format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.descriptor.table, where_result.query
            )
        };
        SqlResult { query, params: where_result.params }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => format!("LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), _) => format!("LIMIT {}", limit),
            _ => String::new(),
        }
    }
}
