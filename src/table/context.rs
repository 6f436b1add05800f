use serde_json::{Map, Value};

use crate::auth::AuthUser;
use crate::types::Operation;

/// Request-scoped context threaded through every filter and transform call.
///
/// One context exists per pipeline execution; it is created when a request
/// arrives and discarded with the response, never shared between requests.
/// Identity fields are fixed at construction. `data` is the one designated
/// mutable area, holding request values that user callbacks read (for
/// example a `filterValue` a filter compares ids against).
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub table: String,
    pub operation: Operation,
    /// Id from the single-resource route, when the request targeted one
    pub id: Option<String>,
    pub auth: Option<AuthUser>,
    pub data: Map<String, Value>,
}

impl OperationContext {
    pub fn new(table: impl Into<String>, operation: Operation) -> Self {
        Self {
            table: table.into(),
            operation,
            id: None,
            auth: None,
            data: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthUser) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Request value by key, `Null` when absent
    pub fn value(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&Value::Null)
    }
}
