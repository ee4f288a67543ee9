use crate::database::models::EntityDescriptor;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection, SortDirective};

pub struct FilterOrder;

impl FilterOrder {
    /// Only the first directive is honored; the rest are accepted and ignored.
    pub fn validate_and_parse(
        descriptor: &EntityDescriptor,
        sorts: &[SortDirective],
    ) -> Result<Option<FilterOrderInfo>, FilterError> {
        let Some(first) = sorts.first() else {
            return Ok(None);
        };
        if sorts.len() > 1 {
            tracing::debug!(ignored = sorts.len() - 1, "only the first sort directive is applied");
        }
        let field = descriptor
            .field(&first.id)
            .ok_or_else(|| FilterError::UnknownSortField(first.id.clone()))?;
        let sort = if first.desc { SortDirection::Desc } else { SortDirection::Asc };
        Ok(Some(FilterOrderInfo { column: field.column.to_string(), sort }))
    }

    pub fn generate(info: Option<&FilterOrderInfo>) -> String {
        match info {
            Some(i) => format!("ORDER BY \"{}\" {}", i.column, i.sort.to_sql()),
            None => String::new(),
        }
    }
}
