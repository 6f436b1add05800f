// Shared fixtures for the integration tests. The `filters` table mirrors
// the canonical configuration exercised against every storage provider:
// four seed rows, one narrowing filter driven by a context value, and two
// ordered transforms.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use mesa_api::query::Query;
use mesa_api::storage::{memory::MemoryProvider, Item, Provider};
use mesa_api::table::{OperationContext, TableConfig, TableOperations};
use mesa_api::types::Operation;

pub fn item(value: Value) -> Item {
    value.as_object().cloned().unwrap_or_default()
}

pub fn seed_rows(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| item(json!({ "id": id }))).collect()
}

/// Table with a filter narrowing to `id >= context.filterValue` and
/// transforms that strip every field but `id`, then set `property` from
/// `context.propertyValue`.
pub fn filters_table() -> TableConfig {
    TableConfig::new("filters")
        .soft_delete(true)
        .seed(seed_rows(&["1", "2", "3", "4"]))
        .filter(|query, context| {
            let value = context.value("filterValue").clone();
            Ok(query.where_clause(json!({ "id": { "$gte": value } }))?)
        })
        .transform(|item, _context| {
            let mut next = Item::new();
            if let Some(id) = item.get("id") {
                next.insert("id".to_string(), id.clone());
            }
            Ok(next)
        })
        .transform(|mut item, context| {
            item.insert("property".to_string(), context.value("propertyValue").clone());
            Ok(item)
        })
}

pub fn operations(config: TableConfig) -> TableOperations {
    TableOperations::new(Arc::new(config), Arc::new(MemoryProvider::new()))
}

pub fn operations_with(config: TableConfig, provider: Arc<dyn Provider>) -> TableOperations {
    TableOperations::new(Arc::new(config), provider)
}

pub async fn seeded_operations(config: TableConfig) -> anyhow::Result<TableOperations> {
    let ops = operations(config);
    ops.initialize().await?;
    Ok(ops)
}

/// Context carrying the request values the filter and transforms read
pub fn request_context(table: &str, operation: Operation) -> OperationContext {
    OperationContext::new(table, operation)
        .with_value("filterValue", json!("3"))
        .with_value("propertyValue", json!("1"))
}

pub fn table_query(table: &str) -> Query {
    Query::create(table).expect("valid table name")
}

pub fn id_query(table: &str, id: &str) -> Query {
    table_query(table)
        .where_clause(json!({ "id": id }))
        .expect("valid id condition")
}
