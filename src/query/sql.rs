// WHERE/ORDER/LIMIT generation for the SQL provider. Produces positional
// `$n` placeholders and a parallel bind parameter list.

use serde_json::Value;

use super::error::QueryError;
use super::types::{ConditionOp, OrderInfo, SqlResult};

pub struct SqlWhere {
    params: Vec<Value>,
    next_index: usize,
}

impl SqlWhere {
    pub fn new(starting_index: usize) -> Self {
        Self {
            params: vec![],
            next_index: starting_index,
        }
    }

    /// Generate a conjunction of all condition objects. Empty input yields an
    /// empty clause.
    pub fn generate(conditions: &[Value], starting_index: usize) -> Result<SqlResult, QueryError> {
        let mut generator = Self::new(starting_index);
        let mut parts = Vec::new();
        for condition in conditions {
            parts.push(generator.condition_sql(condition)?);
        }
        Ok(SqlResult {
            sql: parts.join(" AND "),
            params: generator.params,
        })
    }

    fn condition_sql(&mut self, condition: &Value) -> Result<String, QueryError> {
        let obj = condition.as_object().ok_or_else(|| {
            QueryError::InvalidCondition("WHERE condition must be a JSON object".to_string())
        })?;

        let mut parts = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                parts.push(self.logical_sql(key, value)?);
            } else {
                parts.push(self.field_sql(key, value)?);
            }
        }
        match parts.len() {
            0 => Ok("TRUE".to_string()),
            1 => Ok(parts.remove(0)),
            _ => Ok(format!("({})", parts.join(" AND "))),
        }
    }

    fn logical_sql(&mut self, op: &str, value: &Value) -> Result<String, QueryError> {
        match ConditionOp::parse(op) {
            Some(ConditionOp::And) | Some(ConditionOp::Or) => {
                let joiner = if op == "$and" { " AND " } else { " OR " };
                let parts = value.as_array().ok_or_else(|| {
                    QueryError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                let mut sql_parts = Vec::new();
                for part in parts {
                    sql_parts.push(self.condition_sql(part)?);
                }
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            Some(ConditionOp::Not) => Ok(format!("NOT ({})", self.condition_sql(value)?)),
            _ => Err(QueryError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field_sql(&mut self, field: &str, spec: &Value) -> Result<String, QueryError> {
        validate_column(field)?;

        if let Value::Object(spec_obj) = spec {
            if spec_obj.keys().any(|k| k.starts_with('$')) {
                let mut parts = Vec::new();
                for (op, expected) in spec_obj {
                    parts.push(self.comparison_sql(field, op, expected)?);
                }
                return Ok(parts.join(" AND "));
            }
        }

        // Shorthand equality
        if spec.is_null() {
            return Ok(format!("\"{}\" IS NULL", field));
        }
        Ok(format!("\"{}\" = {}", field, self.bind(spec.clone())))
    }

    fn comparison_sql(&mut self, field: &str, op: &str, expected: &Value) -> Result<String, QueryError> {
        let op = ConditionOp::parse(op).ok_or_else(|| QueryError::UnsupportedOperator(op.to_string()))?;
        match op {
            ConditionOp::Eq => {
                if expected.is_null() {
                    Ok(format!("\"{}\" IS NULL", field))
                } else {
                    Ok(format!("\"{}\" = {}", field, self.bind(expected.clone())))
                }
            }
            ConditionOp::Ne => {
                if expected.is_null() {
                    Ok(format!("\"{}\" IS NOT NULL", field))
                } else {
                    Ok(format!("\"{}\" IS DISTINCT FROM {}", field, self.bind(expected.clone())))
                }
            }
            ConditionOp::Gt => Ok(format!("\"{}\" > {}", field, self.bind(expected.clone()))),
            ConditionOp::Gte => Ok(format!("\"{}\" >= {}", field, self.bind(expected.clone()))),
            ConditionOp::Lt => Ok(format!("\"{}\" < {}", field, self.bind(expected.clone()))),
            ConditionOp::Lte => Ok(format!("\"{}\" <= {}", field, self.bind(expected.clone()))),
            ConditionOp::In | ConditionOp::NIn => {
                let candidates = expected.as_array().ok_or_else(|| {
                    QueryError::InvalidOperatorData("$in/$nin require an array".to_string())
                })?;
                if candidates.is_empty() {
                    // IN () is invalid SQL; an empty candidate set matches
                    // nothing (or everything for NOT IN)
                    let literal = if op == ConditionOp::In { "FALSE" } else { "TRUE" };
                    return Ok(literal.to_string());
                }
                let placeholders: Vec<String> = candidates
                    .iter()
                    .map(|c| self.bind(c.clone()))
                    .collect();
                let keyword = if op == ConditionOp::In { "IN" } else { "NOT IN" };
                Ok(format!("\"{}\" {} ({})", field, keyword, placeholders.join(", ")))
            }
            ConditionOp::And | ConditionOp::Or | ConditionOp::Not => Err(
                QueryError::InvalidCondition("Logical operators cannot be applied to a field".to_string()),
            ),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.next_index += 1;
        format!("${}", self.next_index)
    }
}

pub fn order_sql(order: &[OrderInfo]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = order
        .iter()
        .map(|o| format!("\"{}\" {}", o.column, o.direction.to_sql()))
        .collect();
    format!("ORDER BY {}", parts.join(", "))
}

pub fn limit_sql(limit: Option<i64>, offset: Option<i64>) -> String {
    match (limit, offset) {
        (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
        (Some(l), None) => format!("LIMIT {}", l),
        (None, Some(o)) => format!("OFFSET {}", o),
        (None, None) => String::new(),
    }
}

pub fn validate_column(column: &str) -> Result<(), QueryError> {
    let mut chars = column.chars();
    let first = chars
        .next()
        .ok_or_else(|| QueryError::InvalidColumn("Column name cannot be empty".to_string()))?;
    if (!first.is_alphabetic() && first != '_')
        || !column.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Err(QueryError::InvalidColumn(column.to_string()));
    }
    Ok(())
}
