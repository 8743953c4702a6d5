//! Transaction filter builder for constructing dynamic SQL queries

use chrono::NaiveDate;

use crate::models::Direction;

/// Builder for ledger query filters
///
/// The same filter drives `list_transactions`, `count_transactions` and
/// `summary`, so all three agree on which rows they see.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter<'query> {
    pub direction: Option<Direction>,
    pub category: Option<&'query str>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub needs_review: Option<bool>,
    pub source_file: Option<&'query str>,
    pub limit: Option<i64>,
}

/// SQL components and parameters produced by a filter
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// LIMIT clause (empty if unbounded)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(mut self, direction: Option<Direction>) -> Self {
        self.direction = direction;
        self
    }

    pub fn category(mut self, category: Option<&'query str>) -> Self {
        self.category = category;
        self
    }

    /// Inclusive on both ends
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn needs_review(mut self, value: Option<bool>) -> Self {
        self.needs_review = value;
        self
    }

    pub fn source_file(mut self, file: Option<&'query str>) -> Self {
        self.source_file = file;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    /// Build the filter components
    pub fn build(&self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(direction) = self.direction {
            conditions.push("direction = ?");
            params.push(Box::new(direction.as_str()));
        }

        if let Some(category) = self.category {
            if !category.trim().is_empty() {
                conditions.push("category = ?");
                params.push(Box::new(category.trim().to_lowercase()));
            }
        }

        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("occurred_at >= ? AND occurred_at <= ?");
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        if let Some(review) = self.needs_review {
            conditions.push("needs_review = ?");
            params.push(Box::new(review));
        }

        if let Some(file) = self.source_file {
            conditions.push("source_file = ?");
            params.push(Box::new(file.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = match self.limit {
            Some(n) if n > 0 => {
                params.push(Box::new(n));
                "LIMIT ?".to_string()
            }
            _ => String::new(),
        };

        FilterResult {
            where_clause,
            limit_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
