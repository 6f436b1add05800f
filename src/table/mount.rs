//! HTTP surface for configured tables.
//!
//! Each table mounts at `/tables/{name}` (collection) and
//! `/tables/{name}/{id}` (resource). Requests are translated into pipeline
//! requests and dispatched through the table's mounted handler list; caller
//! identity is resolved from a bearer token before dispatch so the
//! authorization handler only has to check for its presence.

use std::sync::Arc;

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::storage::Provider;
use crate::types::Operation;

use super::config::TableConfig;
use super::context::OperationContext;
use super::operations::TableOperations;
use super::pipeline::{ExecuteOperation, OpRequest, OpResponse};
use super::routes::{attach_routes, TableMount, TableRouter};

/// A table wired to its operations executor and route set
#[derive(Clone)]
pub struct MountedTable {
    pub config: Arc<TableConfig>,
    pub operations: Arc<TableOperations>,
    pub mount: Arc<TableMount>,
}

/// Build the pipeline and route set for a table configuration
pub fn mount_table(config: TableConfig, provider: Arc<dyn Provider>) -> MountedTable {
    let config = Arc::new(config);
    let operations = Arc::new(TableOperations::new(config.clone(), provider));
    let execute = Arc::new(ExecuteOperation::new(operations.clone()));
    let mount = Arc::new(attach_routes(&config, TableRouter::new(), execute));

    MountedTable {
        config,
        operations,
        mount,
    }
}

impl MountedTable {
    /// Seed the table's initial rows
    pub async fn initialize(&self) -> Result<usize, ApiError> {
        self.operations.initialize().await
    }

    /// Axum router for this table's collection and resource routes
    pub fn router(&self) -> Router {
        let collection = {
            let read = self.clone();
            let insert = self.clone();
            let update = self.clone();
            let delete = self.clone();
            get(move |headers: HeaderMap, body: Option<Json<Value>>| {
                handle_request(read, Operation::Read, None, headers, body)
            })
            .post(move |headers: HeaderMap, body: Option<Json<Value>>| {
                handle_request(insert, Operation::Insert, None, headers, body)
            })
            .patch(move |headers: HeaderMap, body: Option<Json<Value>>| {
                handle_request(update, Operation::Update, None, headers, body)
            })
            .delete(move |headers: HeaderMap, body: Option<Json<Value>>| {
                handle_request(delete, Operation::Delete, None, headers, body)
            })
        };

        let resource = {
            let read = self.clone();
            let undelete = self.clone();
            let update = self.clone();
            let delete = self.clone();
            get(
                move |Path(id): Path<String>, headers: HeaderMap, body: Option<Json<Value>>| {
                    handle_request(read, Operation::Read, Some(id), headers, body)
                },
            )
            .post(
                move |Path(id): Path<String>, headers: HeaderMap, body: Option<Json<Value>>| {
                    handle_request(undelete, Operation::Undelete, Some(id), headers, body)
                },
            )
            .patch(
                move |Path(id): Path<String>, headers: HeaderMap, body: Option<Json<Value>>| {
                    handle_request(update, Operation::Update, Some(id), headers, body)
                },
            )
            .delete(
                move |Path(id): Path<String>, headers: HeaderMap, body: Option<Json<Value>>| {
                    handle_request(delete, Operation::Delete, Some(id), headers, body)
                },
            )
        };

        Router::new().route("/", collection).route("/:id", resource)
    }
}

/// Mount every table under `/tables/{name}`
pub fn tables_router(tables: &[MountedTable]) -> Router {
    let mut router = Router::new();
    for table in tables {
        let path = format!("/tables/{}", table.config.name);
        tracing::info!(table = %table.config.name, path = %path, "Mounting table");
        router = router.nest(&path, table.router());
    }
    router
}

async fn handle_request(
    table: MountedTable,
    operation: Operation,
    id: Option<String>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let mut context = OperationContext::new(table.config.name.clone(), operation);
    if let Some(id) = id {
        context = context.with_id(id);
    }
    if let Some(auth) = auth_from_headers(&headers) {
        context = context.with_auth(auth);
    }

    let single = context.id.is_some();
    let mut req = OpRequest::new(context);
    if let Some(Json(body)) = body {
        req = req.with_body(body);
    }

    match table.mount.dispatch(&mut req).await {
        Ok(OpResponse::Items(items)) if single && operation == Operation::Read => {
            match items.into_iter().next() {
                Some(item) => ApiResponse::success(Value::Object(item)).into_response(),
                None => ApiError::not_found("Record not found").into_response(),
            }
        }
        Ok(OpResponse::Items(items)) => {
            let items: Vec<Value> = items.into_iter().map(Value::Object).collect();
            ApiResponse::success(Value::Array(items)).into_response()
        }
        Ok(OpResponse::Item(item)) => {
            if operation == Operation::Insert {
                ApiResponse::created(Value::Object(item)).into_response()
            } else {
                ApiResponse::success(Value::Object(item)).into_response()
            }
        }
        Ok(OpResponse::NoContent) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Resolve the caller from the Authorization header. Absent or invalid
/// tokens leave the request unauthenticated rather than rejecting it here;
/// the authorization handler decides whether that matters for the route.
fn auth_from_headers(headers: &HeaderMap) -> Option<AuthUser> {
    let header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.trim().is_empty() {
        return None;
    }
    match crate::auth::validate_jwt(token) {
        Ok(claims) => Some(claims.into()),
        Err(e) => {
            tracing::debug!("Ignoring invalid bearer token: {}", e);
            None
        }
    }
}
