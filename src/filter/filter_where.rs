use super::types::{FilterCondition, FilterMode, MatchMode, SqlParam};

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub condition: FilterCondition,
}

/// Builds the WHERE body. Conditions are always joined with AND and every match mode
/// other than EQUALS is a case-insensitive substring match.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
    clauses: Vec<String>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            clauses: vec![],
        }
    }

    pub fn generate(
        conditions: &[FilterWhereInfo],
        search: Option<(&[&str], &str)>,
        starting_param_index: usize,
    ) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new(starting_param_index);
        for info in conditions {
            filter_where.push_condition(info);
        }
        if let Some((columns, term)) = search {
            filter_where.push_search(columns, term);
        }
        filter_where.build()
    }

    fn push_condition(&mut self, info: &FilterWhereInfo) {
        let condition = &info.condition;
        if condition.mode == FilterMode::Or {
            tracing::debug!(field = %condition.id, "OR mode is combined with AND");
        }
        let quoted_column = format!("\"{}\"", info.column);
        let value = condition.value_text();
        let clause = match condition.match_mode {
            MatchMode::Equals => format!("{}::text = {}", quoted_column, self.param(value)),
            other => {
                if other != MatchMode::Contains {
                    tracing::debug!(field = %condition.id, mode = ?other, "match mode applied as CONTAINS");
                }
                let pattern = format!("%{}%", escape_like(&value));
                format!("COALESCE({}::text, '') ILIKE {}", quoted_column, self.param(pattern))
            }
        };
        self.clauses.push(clause);
    }

    fn push_search(&mut self, columns: &[&str], term: &str) {
        if columns.is_empty() || term.is_empty() {
            return;
        }
        let placeholder = self.param(format!("%{}%", term));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|c| format!("COALESCE(\"{}\", '') ILIKE {}", c, placeholder))
            .collect();
        self.clauses.push(format!("({})", alternatives.join(" OR ")));
    }

    fn build(self) -> (String, Vec<SqlParam>) {
        (self.clauses.join(" AND "), self.param_values)
    }

    fn param(&mut self, value: String) -> String {
        self.param_values.push(SqlParam::text(value));
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Keep only ASCII letters, digits and whitespace.
pub fn sanitize_search(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

pub fn is_clean_search(term: &str) -> bool {
    term.chars().all(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
