use serde::{Deserialize, Serialize};

/// Comparison and logical operators accepted inside WHERE condition trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$and")] And,
    #[serde(rename = "$or")] Or,
    #[serde(rename = "$not")] Not,
}

impl ConditionOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "$eq" => Some(ConditionOp::Eq),
            "$ne" => Some(ConditionOp::Ne),
            "$gt" => Some(ConditionOp::Gt),
            "$gte" => Some(ConditionOp::Gte),
            "$lt" => Some(ConditionOp::Lt),
            "$lte" => Some(ConditionOp::Lte),
            "$in" => Some(ConditionOp::In),
            "$nin" => Some(ConditionOp::NIn),
            "$and" => Some(ConditionOp::And),
            "$or" => Some(ConditionOp::Or),
            "$not" => Some(ConditionOp::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderInfo {
    pub column: String,
    pub direction: SortDirection,
}

/// A generated SQL fragment plus its positional bind parameters
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}
