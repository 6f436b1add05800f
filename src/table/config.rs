use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::query::Query;
use crate::storage::Item;
use crate::types::Operation;

use super::context::OperationContext;
use super::pipeline::Handler;

/// Filter callback: narrows or validates a query using the request context.
/// Filters run in configured order and each receives the previous filter's
/// output.
pub type FilterFn = dyn Fn(Query, &OperationContext) -> Result<Query, ApiError> + Send + Sync;

/// Transform callback: reshapes an item before it reaches storage. Pure
/// return discipline: the returned item replaces the input.
pub type TransformFn = dyn Fn(Item, &OperationContext) -> Result<Item, ApiError> + Send + Sync;

/// Per-operation settings that override table-level defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationConfig {
    pub authorize: bool,
}

/// Handler override lists. One list per operation plus the reserved
/// `execute` list that replaces the whole mounted pipeline.
#[derive(Default, Clone)]
pub struct MiddlewareConfig {
    pub read: Vec<Arc<dyn Handler>>,
    pub insert: Vec<Arc<dyn Handler>>,
    pub update: Vec<Arc<dyn Handler>>,
    pub delete: Vec<Arc<dyn Handler>>,
    pub undelete: Vec<Arc<dyn Handler>>,
    pub execute: Vec<Arc<dyn Handler>>,
}

impl MiddlewareConfig {
    pub fn for_operation(&self, operation: Operation) -> &[Arc<dyn Handler>] {
        match operation {
            Operation::Read => &self.read,
            Operation::Insert => &self.insert,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::Undelete => &self.undelete,
        }
    }

    fn for_operation_mut(&mut self, operation: Operation) -> &mut Vec<Arc<dyn Handler>> {
        match operation {
            Operation::Read => &mut self.read,
            Operation::Insert => &mut self.insert,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
            Operation::Undelete => &mut self.undelete,
        }
    }
}

/// Declarative per-table configuration. Built once at setup time; the route
/// builder and operations executor read it for the life of the table.
#[derive(Clone)]
pub struct TableConfig {
    pub name: String,
    pub soft_delete: bool,
    /// Rows written once at initialization, bypassing filters and transforms
    pub seed: Vec<Item>,
    pub filters: Vec<Arc<FilterFn>>,
    pub transforms: Vec<Arc<TransformFn>>,
    /// Table-wide authorization requirement
    pub authorize: bool,
    pub operations: HashMap<Operation, OperationConfig>,
    pub middleware: MiddlewareConfig,
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soft_delete: false,
            seed: vec![],
            filters: vec![],
            transforms: vec![],
            authorize: false,
            operations: HashMap::new(),
            middleware: MiddlewareConfig::default(),
        }
    }

    pub fn soft_delete(mut self, soft_delete: bool) -> Self {
        self.soft_delete = soft_delete;
        self
    }

    pub fn seed(mut self, seed: Vec<Item>) -> Self {
        self.seed = seed;
        self
    }

    pub fn filter(
        mut self,
        filter: impl Fn(Query, &OperationContext) -> Result<Query, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn transform(
        mut self,
        transform: impl Fn(Item, &OperationContext) -> Result<Item, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn authorize(mut self, authorize: bool) -> Self {
        self.authorize = authorize;
        self
    }

    /// Require authorization for a single operation
    pub fn authorize_operation(mut self, operation: Operation) -> Self {
        self.operations
            .entry(operation)
            .or_default()
            .authorize = true;
        self
    }

    /// Replace the handler list for one operation
    pub fn operation_middleware(mut self, operation: Operation, handlers: Vec<Arc<dyn Handler>>) -> Self {
        *self.middleware.for_operation_mut(operation) = handlers;
        self
    }

    /// Replace the entire mounted pipeline with a custom handler list
    pub fn execute_middleware(mut self, handlers: Vec<Arc<dyn Handler>>) -> Self {
        self.middleware.execute = handlers;
        self
    }

    pub fn requires_authorize(&self, operation: Operation) -> bool {
        self.authorize
            || self
                .operations
                .get(&operation)
                .map(|op| op.authorize)
                .unwrap_or(false)
    }
}

impl std::fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableConfig")
            .field("name", &self.name)
            .field("soft_delete", &self.soft_delete)
            .field("seed", &self.seed.len())
            .field("filters", &self.filters.len())
            .field("transforms", &self.transforms.len())
            .field("authorize", &self.authorize)
            .finish()
    }
}
