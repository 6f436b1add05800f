// In-memory evaluation of WHERE condition trees against JSON rows.
// Missing fields behave like explicit nulls for equality checks and never
// satisfy ordering comparisons.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::QueryError;
use super::types::ConditionOp;

/// Evaluate one condition object against a row
pub fn matches(condition: &Value, item: &Map<String, Value>) -> Result<bool, QueryError> {
    let obj = condition.as_object().ok_or_else(|| {
        QueryError::InvalidCondition("WHERE condition must be a JSON object".to_string())
    })?;

    for (key, value) in obj {
        let matched = if key.starts_with('$') {
            eval_logical(key, value, item)?
        } else {
            eval_field(key, value, item)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_logical(op: &str, value: &Value, item: &Map<String, Value>) -> Result<bool, QueryError> {
    match ConditionOp::parse(op) {
        Some(ConditionOp::And) => {
            let parts = expect_array(op, value)?;
            for part in parts {
                if !matches(part, item)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Some(ConditionOp::Or) => {
            let parts = expect_array(op, value)?;
            for part in parts {
                if matches(part, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Some(ConditionOp::Not) => Ok(!matches(value, item)?),
        _ => Err(QueryError::UnsupportedOperator(op.to_string())),
    }
}

fn eval_field(field: &str, spec: &Value, item: &Map<String, Value>) -> Result<bool, QueryError> {
    let actual = item.get(field);

    // An object whose keys are all operators is an operator spec; anything
    // else is shorthand for equality against the literal value.
    if let Value::Object(spec_obj) = spec {
        if spec_obj.keys().any(|k| k.starts_with('$')) {
            if !spec_obj.keys().all(|k| k.starts_with('$')) {
                return Err(QueryError::InvalidCondition(format!(
                    "Condition on '{}' mixes operators and literal keys",
                    field
                )));
            }
            for (op, expected) in spec_obj {
                if !eval_comparison(op, actual, expected)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
    }

    Ok(values_equal(actual.unwrap_or(&Value::Null), spec))
}

fn eval_comparison(op: &str, actual: Option<&Value>, expected: &Value) -> Result<bool, QueryError> {
    let op = ConditionOp::parse(op).ok_or_else(|| QueryError::UnsupportedOperator(op.to_string()))?;
    let actual_or_null = actual.unwrap_or(&Value::Null);

    match op {
        ConditionOp::Eq => Ok(values_equal(actual_or_null, expected)),
        ConditionOp::Ne => Ok(!values_equal(actual_or_null, expected)),
        ConditionOp::Gt => Ok(ordering(actual, expected).map_or(false, |o| o == Ordering::Greater)),
        ConditionOp::Gte => Ok(ordering(actual, expected).map_or(false, |o| o != Ordering::Less)),
        ConditionOp::Lt => Ok(ordering(actual, expected).map_or(false, |o| o == Ordering::Less)),
        ConditionOp::Lte => Ok(ordering(actual, expected).map_or(false, |o| o != Ordering::Greater)),
        ConditionOp::In => {
            let candidates = expected.as_array().ok_or_else(|| {
                QueryError::InvalidOperatorData("$in requires an array".to_string())
            })?;
            Ok(candidates.iter().any(|c| values_equal(actual_or_null, c)))
        }
        ConditionOp::NIn => {
            let candidates = expected.as_array().ok_or_else(|| {
                QueryError::InvalidOperatorData("$nin requires an array".to_string())
            })?;
            Ok(!candidates.iter().any(|c| values_equal(actual_or_null, c)))
        }
        ConditionOp::And | ConditionOp::Or | ConditionOp::Not => Err(
            QueryError::InvalidCondition("Logical operators cannot be applied to a field".to_string()),
        ),
    }
}

/// Equality across JSON values; numbers compare by numeric value
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Relative order of two values: numbers numerically, strings
/// lexicographically. Mixed or missing operands have no ordering.
pub fn ordering(a: Option<&Value>, b: &Value) -> Option<Ordering> {
    match (a?, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

fn expect_array<'a>(op: &str, value: &'a Value) -> Result<&'a Vec<Value>, QueryError> {
    value
        .as_array()
        .ok_or_else(|| QueryError::InvalidOperatorData(format!("{} requires an array", op)))
}
