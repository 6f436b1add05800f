//! Handler pipeline for table operations.
//!
//! Every route binding is an ordered list of handlers sharing one invoke
//! signature; a handler may finish the request itself or pass it to the rest
//! of the chain through [`Next`]. The fixed order is parse, then authorize,
//! then the operation handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ApiError;
use crate::query::Query;
use crate::storage::Item;
use crate::types::Operation;

use super::context::OperationContext;
use super::operations::TableOperations;

/// One in-flight table request as it moves down a handler chain
#[derive(Debug)]
pub struct OpRequest {
    pub context: OperationContext,
    /// Raw request body, parsed into `item` by [`ParseItem`]
    pub body: Option<Value>,
    pub query: Option<Query>,
    pub item: Option<Item>,
}

impl OpRequest {
    pub fn new(context: OperationContext) -> Self {
        Self {
            context,
            body: None,
            query: None,
            item: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpResponse {
    Items(Vec<Item>),
    Item(Item),
    NoContent,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<OpResponse, ApiError>> + Send + 'a>>;

/// Uniform handler capability: inspect or modify the request, then either
/// respond or hand off to the remaining chain
pub trait Handler: Send + Sync {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, next: Next<'a>) -> HandlerFuture<'a>;

    /// Stable name, used for logging and chain-order assertions
    fn name(&self) -> &'static str;
}

/// Remaining handlers in the chain
pub struct Next<'a> {
    handlers: &'a [Arc<dyn Handler>],
}

impl<'a> Next<'a> {
    pub fn run(self, req: &'a mut OpRequest) -> HandlerFuture<'a> {
        Box::pin(async move {
            match self.handlers.split_first() {
                Some((first, rest)) => first.handle(req, Next { handlers: rest }).await,
                None => Err(ApiError::internal_server_error(
                    "Handler chain ended without producing a response",
                )),
            }
        })
    }
}

/// Run a complete handler chain against a request
pub async fn run_chain(handlers: &[Arc<dyn Handler>], req: &mut OpRequest) -> Result<OpResponse, ApiError> {
    Next { handlers }.run(req).await
}

/// Builds the query descriptor from route parameters: the table's collection
/// for the collection route, narrowed to one id for the resource route.
pub struct ParseQuery;

impl Handler for ParseQuery {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut query = Query::create(req.context.table.clone())?;
            if let Some(id) = &req.context.id {
                query = query.where_clause(serde_json::json!({ "id": id }))?;
            }
            req.query = Some(query);
            next.run(req).await
        })
    }

    fn name(&self) -> &'static str {
        "parse_query"
    }
}

/// Parses the request body into an item and merges the route id into it.
/// The route id wins over any id carried in the body.
pub struct ParseItem;

impl Handler for ParseItem {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let body = req
                .body
                .take()
                .ok_or_else(|| ApiError::bad_request("Request body is required"))?;
            let mut item = match body {
                Value::Object(map) => map,
                _ => return Err(ApiError::invalid_json("Expected JSON object")),
            };
            if let Some(id) = &req.context.id {
                item.insert("id".to_string(), Value::String(id.clone()));
            }
            req.item = Some(item);
            next.run(req).await
        })
    }

    fn name(&self) -> &'static str {
        "parse_item"
    }
}

/// Rejects requests without an authenticated caller. Runs after parsing so
/// an authorization decision can see the parsed query or item.
pub struct Authorize;

impl Handler for Authorize {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if req.context.auth.is_none() {
                tracing::debug!(
                    table = %req.context.table,
                    operation = %req.context.operation,
                    "Rejecting unauthenticated request"
                );
                return Err(ApiError::unauthorized("Authentication required"));
            }
            next.run(req).await
        })
    }

    fn name(&self) -> &'static str {
        "authorize"
    }
}

/// Terminal handler: dispatches into the operations executor
pub struct ExecuteOperation {
    operations: Arc<TableOperations>,
}

impl ExecuteOperation {
    pub fn new(operations: Arc<TableOperations>) -> Self {
        Self { operations }
    }
}

impl Handler for ExecuteOperation {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, _next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            match req.context.operation {
                Operation::Read => {
                    let query = take_query(req)?;
                    let items = self.operations.read(query, &req.context).await?;
                    Ok(OpResponse::Items(items))
                }
                Operation::Insert => {
                    let item = take_item(req)?;
                    let inserted = self.operations.insert(item, &req.context).await?;
                    Ok(OpResponse::Item(inserted))
                }
                Operation::Update => {
                    let item = take_item(req)?;
                    let updated = self.operations.update(item, &req.context).await?;
                    Ok(OpResponse::Item(updated))
                }
                Operation::Delete => {
                    let query = take_query(req)?;
                    self.operations.delete(query, &req.context).await?;
                    Ok(OpResponse::NoContent)
                }
                Operation::Undelete => {
                    let query = take_query(req)?;
                    self.operations.undelete(query, &req.context).await?;
                    Ok(OpResponse::NoContent)
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "execute"
    }
}

fn take_query(req: &mut OpRequest) -> Result<Query, ApiError> {
    req.query
        .take()
        .ok_or_else(|| ApiError::internal_server_error("Query was not parsed before execution"))
}

fn take_item(req: &mut OpRequest) -> Result<Item, ApiError> {
    req.item
        .take()
        .ok_or_else(|| ApiError::internal_server_error("Item was not parsed before execution"))
}
