use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::ApiError;
use crate::query::Query;
use crate::storage::{Item, Provider, StorageError};

use super::config::TableConfig;
use super::context::OperationContext;

/// Fixed messages for the zero-rows-affected conflict. Soft deletes route
/// through update, so they report the update message.
pub const NO_RECORDS_UPDATED: &str = "No records were updated";
pub const NO_RECORDS_DELETED: &str = "No records were deleted";

/// Executes table operations against a storage provider, applying the
/// configured filters, transforms and soft-delete policy.
///
/// Queries pass through every configured filter in order before reaching
/// storage; items pass through every configured transform in order, exactly
/// once per operation. Zero affected rows on a mutation surfaces as a
/// conflict whether the rows were excluded by a filter, hidden by soft
/// delete or simply absent.
pub struct TableOperations {
    config: Arc<TableConfig>,
    provider: Arc<dyn Provider>,
}

impl TableOperations {
    pub fn new(config: Arc<TableConfig>, provider: Arc<dyn Provider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Write the configured seed rows through the provider, bypassing
    /// filters and transforms. Rows whose id already exists are skipped so
    /// initialization can run more than once.
    pub async fn initialize(&self) -> Result<usize, ApiError> {
        let mut inserted = 0;
        for row in &self.config.seed {
            match self.provider.insert(&self.config.name, row.clone()).await {
                Ok(_) => inserted += 1,
                Err(StorageError::DuplicateId(id)) => {
                    tracing::debug!(table = %self.config.name, id = %id, "Seed row already present");
                }
                Err(other) => return Err(other.into()),
            }
        }
        tracing::info!(table = %self.config.name, rows = inserted, "Table initialized");
        Ok(inserted)
    }

    pub async fn read(&self, query: Query, context: &OperationContext) -> Result<Vec<Item>, ApiError> {
        let query = self.apply_filters(query, context)?;
        let query = self.scope_visible(query)?;
        Ok(self.provider.execute(&query).await?)
    }

    pub async fn insert(&self, item: Item, context: &OperationContext) -> Result<Item, ApiError> {
        let item = self.apply_transforms(item, context)?;
        Ok(self.provider.insert(&self.config.name, item).await?)
    }

    /// Update the row identified by the item's id. Returns the transformed
    /// item; fails with a conflict when no stored row was affected.
    pub async fn update(&self, item: Item, context: &OperationContext) -> Result<Item, ApiError> {
        let item = self.apply_transforms(item, context)?;

        let id = item
            .get("id")
            .cloned()
            .ok_or_else(|| ApiError::bad_request("Item must include an id to update"))?;

        let query = Query::create(self.config.name.clone())?.where_clause(json!({ "id": id }))?;
        let query = self.apply_filters(query, context)?;
        let query = self.scope_visible(query)?;

        let affected = self.provider.update(&query, item.clone()).await?;
        if affected == 0 {
            return Err(ApiError::conflict(NO_RECORDS_UPDATED));
        }
        Ok(item)
    }

    /// Delete the rows a query matches. Under soft delete this flags the
    /// rows instead of removing them.
    pub async fn delete(&self, query: Query, context: &OperationContext) -> Result<(), ApiError> {
        let query = self.apply_filters(query, context)?;

        if self.config.soft_delete {
            let query = self.scope_visible(query)?;
            let mut changes = Item::new();
            changes.insert("deleted".to_string(), Value::Bool(true));
            let affected = self.provider.update(&query, changes).await?;
            if affected == 0 {
                return Err(ApiError::conflict(NO_RECORDS_UPDATED));
            }
        } else {
            let affected = self.provider.delete(&query).await?;
            if affected == 0 {
                return Err(ApiError::conflict(NO_RECORDS_DELETED));
            }
        }
        Ok(())
    }

    /// Clear the deleted flag on the rows a query matches. Only meaningful
    /// under soft delete; with hard delete nothing is ever flagged, so the
    /// query matches no rows and the operation reports a conflict.
    pub async fn undelete(&self, query: Query, context: &OperationContext) -> Result<(), ApiError> {
        let query = self.apply_filters(query, context)?;

        // The target lookup must see soft-deleted rows; only flagged rows
        // are candidates, so nothing ever matches under hard delete.
        let query = query
            .include_deleted()
            .where_clause(json!({ "deleted": true }))?;

        let mut changes = Item::new();
        changes.insert("deleted".to_string(), Value::Bool(false));
        let affected = self.provider.update(&query, changes).await?;
        if affected == 0 {
            return Err(ApiError::conflict(NO_RECORDS_UPDATED));
        }
        Ok(())
    }

    fn apply_filters(&self, query: Query, context: &OperationContext) -> Result<Query, ApiError> {
        let mut query = query;
        for filter in &self.config.filters {
            query = filter(query, context)?;
        }
        Ok(query)
    }

    fn apply_transforms(&self, item: Item, context: &OperationContext) -> Result<Item, ApiError> {
        let mut item = item;
        for transform in &self.config.transforms {
            item = transform(item, context)?;
        }
        Ok(item)
    }

    /// Soft-delete visibility rewrite: the single point where queries are
    /// narrowed to rows that have not been flagged. Rows without the flag
    /// count as active; a query that opted into deleted rows passes through.
    fn scope_visible(&self, query: Query) -> Result<Query, ApiError> {
        if !self.config.soft_delete || query.includes_deleted() {
            return Ok(query);
        }
        Ok(query.where_clause(json!({ "deleted": { "$ne": true } }))?)
    }
}
