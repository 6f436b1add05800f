mod common;

use anyhow::Result;
use serde_json::json;

use mesa_api::error::ApiError;
use mesa_api::table::NO_RECORDS_UPDATED;
use mesa_api::types::Operation;

use common::{filters_table, id_query, item, request_context, seeded_operations, table_query};

#[tokio::test]
async fn attaches_filter_to_read_queries() -> Result<()> {
    let ops = seeded_operations(filters_table()).await?;
    let context = request_context("filters", Operation::Read);

    let results = ops.read(table_query("filters"), &context).await?;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].get("id"), Some(&json!("3")));
    assert_eq!(results[1].get("id"), Some(&json!("4")));
    Ok(())
}

#[tokio::test]
async fn attaches_filter_to_update_queries() -> Result<()> {
    let ops = seeded_operations(filters_table()).await?;
    let context = request_context("filters", Operation::Update);

    let err = ops
        .update(item(json!({ "id": "1", "value": "1" })), &context)
        .await
        .expect_err("filtered-out id must not update");
    match err {
        ApiError::Conflict(msg) => assert_eq!(msg, NO_RECORDS_UPDATED),
        other => panic!("expected conflict, got {:?}", other),
    }

    ops.update(item(json!({ "id": "3", "value": "1" })), &context)
        .await?;
    Ok(())
}

#[tokio::test]
async fn attaches_filter_to_delete_queries() -> Result<()> {
    let ops = seeded_operations(filters_table()).await?;
    let context = request_context("filters", Operation::Delete);

    let err = ops
        .delete(id_query("filters", "1"), &context)
        .await
        .expect_err("filtered-out id must not delete");
    match err {
        ApiError::Conflict(msg) => assert_eq!(msg, NO_RECORDS_UPDATED),
        other => panic!("expected conflict, got {:?}", other),
    }

    ops.delete(id_query("filters", "3"), &context).await?;
    Ok(())
}

#[tokio::test]
async fn applies_transforms_to_inserted_items() -> Result<()> {
    let ops = seeded_operations(filters_table()).await?;
    let context = request_context("filters", Operation::Insert);

    let inserted = ops
        .insert(item(json!({ "id": "5", "value": "untouched" })), &context)
        .await?;

    assert_eq!(inserted.get("property"), Some(&json!("1")));
    // The first transform strips everything but the id
    assert!(inserted.get("value").is_none());
    Ok(())
}

#[tokio::test]
async fn applies_transforms_to_updated_items() -> Result<()> {
    let ops = seeded_operations(filters_table()).await?;
    let context = request_context("filters", Operation::Update);

    let updated = ops.update(item(json!({ "id": "3" })), &context).await?;

    assert_eq!(updated.get("property"), Some(&json!("1")));
    Ok(())
}

#[tokio::test]
async fn transform_order_is_significant() -> Result<()> {
    // Reversing the fixture's transforms would drop `property`: the
    // strip-to-id transform must run first for property to survive.
    let reversed = mesa_api::table::TableConfig::new("filters")
        .seed(common::seed_rows(&["1"]))
        .transform(|mut item, context| {
            item.insert("property".to_string(), context.value("propertyValue").clone());
            Ok(item)
        })
        .transform(|item, _context| {
            let mut next = mesa_api::storage::Item::new();
            if let Some(id) = item.get("id") {
                next.insert("id".to_string(), id.clone());
            }
            Ok(next)
        });

    let ops = seeded_operations(reversed).await?;
    let context = request_context("filters", Operation::Insert);
    let inserted = ops.insert(item(json!({ "id": "9" })), &context).await?;

    assert!(inserted.get("property").is_none());
    Ok(())
}

#[tokio::test]
async fn failing_filter_aborts_the_operation() -> Result<()> {
    let config = mesa_api::table::TableConfig::new("filters")
        .seed(common::seed_rows(&["1"]))
        .filter(|_query, _context| Err(ApiError::validation_error("rejected by filter", None)));

    let ops = seeded_operations(config).await?;
    let context = request_context("filters", Operation::Read);

    let err = ops
        .read(table_query("filters"), &context)
        .await
        .expect_err("filter failure must propagate");
    match err {
        ApiError::ValidationError { message, .. } => assert_eq!(message, "rejected by filter"),
        other => panic!("expected validation error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn failing_transform_aborts_the_operation() -> Result<()> {
    let config = mesa_api::table::TableConfig::new("filters")
        .transform(|_item, _context| Err(ApiError::validation_error("rejected by transform", None)));

    let ops = seeded_operations(config).await?;
    let context = request_context("filters", Operation::Insert);

    let err = ops
        .insert(item(json!({ "id": "1" })), &context)
        .await
        .expect_err("transform failure must propagate");
    assert!(matches!(err, ApiError::ValidationError { .. }));
    Ok(())
}
