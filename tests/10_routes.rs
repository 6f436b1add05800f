mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use mesa_api::error::ApiError;
use mesa_api::storage::memory::MemoryProvider;
use mesa_api::table::pipeline::{Handler, HandlerFuture, Next, OpRequest, OpResponse};
use mesa_api::table::{mount_table, TableConfig, Verb, COLLECTION_ROUTE, ID_ROUTE};
use mesa_api::types::Operation;

use common::{item, request_context};

/// Stand-in operation handler for override tests
struct Canned;

impl Handler for Canned {
    fn handle<'a>(&'a self, _req: &'a mut OpRequest, _next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move { Ok(OpResponse::NoContent) })
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

fn mounted(config: TableConfig) -> mesa_api::table::MountedTable {
    mount_table(config, Arc::new(MemoryProvider::new()))
}

#[test]
fn registers_the_full_verb_and_path_set() {
    let table = mounted(TableConfig::new("todoitem"));
    let router = &table.mount.router;

    let expected = [
        (Operation::Read, Verb::Get, COLLECTION_ROUTE),
        (Operation::Read, Verb::Get, ID_ROUTE),
        (Operation::Insert, Verb::Post, COLLECTION_ROUTE),
        (Operation::Undelete, Verb::Post, ID_ROUTE),
        (Operation::Update, Verb::Patch, COLLECTION_ROUTE),
        (Operation::Update, Verb::Patch, ID_ROUTE),
        (Operation::Delete, Verb::Delete, COLLECTION_ROUTE),
        (Operation::Delete, Verb::Delete, ID_ROUTE),
    ];

    assert_eq!(router.routes().len(), expected.len());
    for (operation, verb, path) in expected {
        let binding = router
            .find(operation, path)
            .unwrap_or_else(|| panic!("missing binding for {} {}", verb.as_str(), path));
        assert_eq!(binding.verb, verb);
    }

    // Insert binds to the collection only; undelete to the resource only
    assert!(router.find(Operation::Insert, ID_ROUTE).is_none());
    assert!(router.find(Operation::Undelete, COLLECTION_ROUTE).is_none());
}

#[test]
fn chain_order_is_parse_then_execute() {
    let table = mounted(TableConfig::new("todoitem"));
    let router = &table.mount.router;

    let read = router.find(Operation::Read, COLLECTION_ROUTE).unwrap();
    assert_eq!(read.handler_names(), vec!["parse_query", "execute"]);

    let insert = router.find(Operation::Insert, COLLECTION_ROUTE).unwrap();
    assert_eq!(insert.handler_names(), vec!["parse_item", "execute"]);

    let undelete = router.find(Operation::Undelete, ID_ROUTE).unwrap();
    assert_eq!(undelete.handler_names(), vec!["parse_query", "execute"]);
}

#[test]
fn authorize_slots_between_parse_and_execute() {
    let table = mounted(TableConfig::new("todoitem").authorize(true));
    let router = &table.mount.router;

    for binding in router.routes() {
        let names = binding.handler_names();
        assert_eq!(names[1], "authorize", "authorize must follow parsing");
        assert_eq!(*names.last().unwrap(), "execute");
    }
}

#[test]
fn per_operation_authorize_only_guards_that_operation() {
    let table = mounted(TableConfig::new("todoitem").authorize_operation(Operation::Update));
    let router = &table.mount.router;

    let update = router.find(Operation::Update, ID_ROUTE).unwrap();
    assert_eq!(
        update.handler_names(),
        vec!["parse_item", "authorize", "execute"]
    );

    let read = router.find(Operation::Read, COLLECTION_ROUTE).unwrap();
    assert_eq!(read.handler_names(), vec!["parse_query", "execute"]);
}

#[test]
fn operation_middleware_replaces_the_execute_handler() {
    let config = TableConfig::new("todoitem")
        .operation_middleware(Operation::Read, vec![Arc::new(Canned)]);
    let table = mounted(config);
    let router = &table.mount.router;

    let read = router.find(Operation::Read, COLLECTION_ROUTE).unwrap();
    assert_eq!(read.handler_names(), vec!["parse_query", "canned"]);

    // Other operations keep the default execute handler
    let insert = router.find(Operation::Insert, COLLECTION_ROUTE).unwrap();
    assert_eq!(insert.handler_names(), vec!["parse_item", "execute"]);
}

#[test]
fn default_mount_is_the_router() {
    let table = mounted(TableConfig::new("todoitem"));
    assert_eq!(table.mount.handlers.len(), 1);
    assert_eq!(table.mount.handlers[0].name(), "table_router");
}

#[test]
fn execute_override_replaces_the_mount_but_not_the_routes() {
    let config = TableConfig::new("todoitem").execute_middleware(vec![Arc::new(Canned)]);
    let table = mounted(config);

    assert_eq!(table.mount.handlers.len(), 1);
    assert_eq!(table.mount.handlers[0].name(), "canned");

    // The internal router remains fully configured underneath the override
    assert_eq!(table.mount.router.routes().len(), 8);
}

#[tokio::test]
async fn override_can_redispatch_into_the_internal_router() -> Result<()> {
    let config = TableConfig::new("todoitem")
        .seed(vec![item(json!({ "id": "1" }))])
        .execute_middleware(vec![Arc::new(Canned)]);
    let table = mounted(config);
    table.initialize().await?;

    // The mounted chain answers with the override...
    let mut req = OpRequest::new(request_context("todoitem", Operation::Read));
    assert_eq!(table.mount.dispatch(&mut req).await?, OpResponse::NoContent);

    // ...while the internal routes stay reachable for an override that
    // chooses to forward
    let mut req = OpRequest::new(request_context("todoitem", Operation::Read));
    match table.mount.router.dispatch(&mut req).await? {
        OpResponse::Items(items) => assert_eq!(items.len(), 1),
        other => panic!("expected items, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn dispatch_runs_the_registered_chain() -> Result<()> {
    let table = mounted(TableConfig::new("todoitem").seed(vec![
        item(json!({ "id": "1", "text": "a" })),
        item(json!({ "id": "2", "text": "b" })),
    ]));
    table.initialize().await?;

    let mut req = OpRequest::new(request_context("todoitem", Operation::Read));
    match table.mount.dispatch(&mut req).await? {
        OpResponse::Items(items) => assert_eq!(items.len(), 2),
        other => panic!("expected items, got {:?}", other),
    }

    let mut req = OpRequest::new(request_context("todoitem", Operation::Read).with_id("2"));
    match table.mount.dispatch(&mut req).await? {
        OpResponse::Items(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].get("id"), Some(&json!("2")));
        }
        other => panic!("expected items, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn authorize_rejects_unauthenticated_dispatch() -> Result<()> {
    let table = mounted(
        TableConfig::new("todoitem")
            .authorize(true)
            .seed(vec![item(json!({ "id": "1" }))]),
    );
    table.initialize().await?;

    let mut req = OpRequest::new(request_context("todoitem", Operation::Read));
    match table.mount.dispatch(&mut req).await {
        Err(ApiError::Unauthorized(_)) => {}
        other => panic!("expected unauthorized, got {:?}", other.map(|_| ())),
    }

    let auth = mesa_api::auth::AuthUser {
        user: "tester".to_string(),
        user_id: uuid::Uuid::new_v4(),
        access: "full".to_string(),
    };
    let mut req = OpRequest::new(
        request_context("todoitem", Operation::Read).with_auth(auth),
    );
    assert!(table.mount.dispatch(&mut req).await.is_ok());
    Ok(())
}
