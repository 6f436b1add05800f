mod common;

use anyhow::Result;
use serde_json::json;

use mesa_api::error::ApiError;
use mesa_api::table::{TableConfig, NO_RECORDS_UPDATED};
use mesa_api::types::Operation;

use common::{id_query, item, request_context, seed_rows, seeded_operations, table_query};

fn plain_table() -> TableConfig {
    TableConfig::new("items").seed(seed_rows(&["1", "2", "3"]))
}

#[tokio::test]
async fn initialize_reports_seeded_rows_and_is_repeatable() -> Result<()> {
    let ops = common::operations(plain_table());
    assert_eq!(ops.initialize().await?, 3);
    // Re-running skips rows that already exist
    assert_eq!(ops.initialize().await?, 0);
    Ok(())
}

#[tokio::test]
async fn insert_returns_the_stored_row() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Insert);

    let inserted = ops
        .insert(item(json!({ "text": "new row" })), &context)
        .await?;
    assert!(inserted.get("id").is_some(), "id must be generated");
    assert!(inserted.get("createdAt").is_some());
    Ok(())
}

#[tokio::test]
async fn insert_with_existing_id_conflicts() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Insert);

    let err = ops
        .insert(item(json!({ "id": "1" })), &context)
        .await
        .expect_err("duplicate id must conflict");
    assert!(matches!(err, ApiError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn update_requires_an_id() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Update);

    let err = ops
        .update(item(json!({ "text": "no id here" })), &context)
        .await
        .expect_err("update without id must fail");
    assert!(matches!(err, ApiError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn update_of_missing_row_reports_conflict() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Update);

    let err = ops
        .update(item(json!({ "id": "99", "text": "x" })), &context)
        .await
        .expect_err("absent row must conflict");
    assert!(matches!(err, ApiError::Conflict(msg) if msg == NO_RECORDS_UPDATED));
    Ok(())
}

#[tokio::test]
async fn update_persists_changes() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Update);

    ops.update(item(json!({ "id": "2", "text": "changed" })), &context)
        .await?;

    let rows = ops
        .read(id_query("items", "2"), &request_context("items", Operation::Read))
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("text"), Some(&json!("changed")));
    Ok(())
}

#[tokio::test]
async fn delete_against_the_collection_clears_every_row() -> Result<()> {
    let ops = seeded_operations(plain_table()).await?;
    let context = request_context("items", Operation::Delete);

    ops.delete(table_query("items"), &context).await?;

    let rows = ops
        .read(table_query("items"), &request_context("items", Operation::Read))
        .await?;
    assert!(rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn filters_run_in_configured_order() -> Result<()> {
    // Two narrowing filters: ids >= 2, then ids <= 2. Conjunction leaves
    // exactly one row, regardless of being applied to the same descriptor.
    let config = TableConfig::new("items")
        .seed(seed_rows(&["1", "2", "3"]))
        .filter(|query, _context| Ok(query.where_clause(json!({ "id": { "$gte": "2" } }))?))
        .filter(|query, _context| Ok(query.where_clause(json!({ "id": { "$lte": "2" } }))?));

    let ops = seeded_operations(config).await?;
    let rows = ops
        .read(table_query("items"), &request_context("items", Operation::Read))
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!("2")));
    Ok(())
}

#[tokio::test]
async fn filter_sees_values_from_the_request_context() -> Result<()> {
    let config = TableConfig::new("items")
        .seed(seed_rows(&["1", "2", "3"]))
        .filter(|query, context| {
            let floor = context.value("filterValue").clone();
            Ok(query.where_clause(json!({ "id": { "$gte": floor } }))?)
        });

    let ops = seeded_operations(config).await?;

    // filterValue "3" leaves one row; a different request with "2" sees two
    let rows = ops
        .read(table_query("items"), &request_context("items", Operation::Read))
        .await?;
    assert_eq!(rows.len(), 1);

    let looser = mesa_api::table::OperationContext::new("items", Operation::Read)
        .with_value("filterValue", json!("2"));
    let rows = ops.read(table_query("items"), &looser).await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}
