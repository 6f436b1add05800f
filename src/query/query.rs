use serde_json::{Map, Value};

use super::error::QueryError;
use super::predicate;
use super::types::{OrderInfo, SortDirection};

/// Immutable descriptor of which rows an operation targets.
///
/// Conditions added through [`Query::where_clause`] compose by conjunction,
/// left to right; each call returns a new descriptor and leaves the input
/// untouched, so filters can narrow a query without coordinating with each
/// other.
#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    conditions: Vec<Value>,
    order: Vec<OrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
    include_deleted: bool,
}

impl Query {
    pub fn create(table: impl Into<String>) -> Result<Self, QueryError> {
        let table = table.into();
        validate_identifier(&table).map_err(|_| QueryError::InvalidTableName(table.clone()))?;
        Ok(Self {
            table,
            conditions: vec![],
            order: vec![],
            limit: None,
            offset: None,
            include_deleted: false,
        })
    }

    /// Conjoin a condition with the existing tree.
    ///
    /// A condition is a JSON object: either field/value pairs (implicit
    /// equality), field/operator-object pairs (`{"id": {"$gte": "3"}}`) or a
    /// logical operator (`{"$or": [...]}`).
    pub fn where_clause(mut self, condition: Value) -> Result<Self, QueryError> {
        if !condition.is_object() {
            return Err(QueryError::InvalidCondition(
                "WHERE condition must be a JSON object".to_string(),
            ));
        }
        self.conditions.push(condition);
        Ok(self)
    }

    pub fn order(mut self, column: impl Into<String>, direction: SortDirection) -> Result<Self, QueryError> {
        let column = column.into();
        validate_identifier(&column).map_err(|_| QueryError::InvalidColumn(column.clone()))?;
        self.order.push(OrderInfo { column, direction });
        Ok(self)
    }

    pub fn limit(mut self, limit: i64, offset: Option<i64>) -> Result<Self, QueryError> {
        if limit < 0 {
            return Err(QueryError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(QueryError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    /// Opt this query into seeing soft-deleted rows. Without it, a table
    /// with soft delete enabled narrows every query to active rows.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Value] {
        &self.conditions
    }

    pub fn ordering(&self) -> &[OrderInfo] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Evaluate the condition tree against a single row
    pub fn matches(&self, item: &Map<String, Value>) -> Result<bool, QueryError> {
        for condition in &self.conditions {
            if !predicate::matches(condition, item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn validate_identifier(name: &str) -> Result<(), ()> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(())?;
    if !first.is_alphabetic() && first != '_' {
        return Err(());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_invalid_table_names() {
        assert!(Query::create("").is_err());
        assert!(Query::create("users; drop").is_err());
        assert!(Query::create("1users").is_err());
        assert!(Query::create("_users").is_ok());
    }

    #[test]
    fn where_clause_returns_a_new_descriptor() {
        let base = Query::create("todoitem").unwrap();
        let narrowed = base.clone().where_clause(json!({ "id": "1" })).unwrap();
        assert_eq!(base.conditions().len(), 0);
        assert_eq!(narrowed.conditions().len(), 1);
    }

    #[test]
    fn conditions_conjoin_left_to_right() {
        let query = Query::create("todoitem")
            .unwrap()
            .where_clause(json!({ "id": { "$gte": 2 } }))
            .unwrap()
            .where_clause(json!({ "id": { "$lte": 3 } }))
            .unwrap();

        let row = |id: i64| {
            let mut m = Map::new();
            m.insert("id".to_string(), json!(id));
            m
        };

        assert!(!query.matches(&row(1)).unwrap());
        assert!(query.matches(&row(2)).unwrap());
        assert!(query.matches(&row(3)).unwrap());
        assert!(!query.matches(&row(4)).unwrap());
    }

    #[test]
    fn where_clause_rejects_non_objects() {
        let query = Query::create("todoitem").unwrap();
        assert!(query.where_clause(json!("id = 1")).is_err());
    }
}
