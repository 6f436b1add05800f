pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::{Query, QueryError};

/// One row, as a field-name to value mapping
pub type Item = Map<String, Value>;

/// Errors from storage providers
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("A record with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<QueryError> for StorageError {
    fn from(err: QueryError) -> Self {
        StorageError::QueryError(err.to_string())
    }
}

/// Storage provider contract consumed by the operations executor.
///
/// Mutations must report how many rows they actually matched and modified;
/// the layer above turns a zero count into a conflict. Consistency between
/// concurrent conflicting writes is the provider's concern.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Return the rows a query matches, honoring its ordering and paging
    async fn execute(&self, query: &Query) -> Result<Vec<Item>, StorageError>;

    /// Store a new row, returning it as stored (id and system fields set)
    async fn insert(&self, table: &str, item: Item) -> Result<Item, StorageError>;

    /// Apply field changes to every matching row, returning the affected count
    async fn update(&self, query: &Query, changes: Item) -> Result<u64, StorageError>;

    /// Remove every matching row, returning the affected count
    async fn delete(&self, query: &Query) -> Result<u64, StorageError>;
}
