//! Route construction for a configured table.
//!
//! [`attach_routes`] wires every operation to its verb and path patterns on
//! a [`TableRouter`], resolving each registration's handler chain from the
//! table configuration. The chain order is fixed: operation-specific parsing
//! first, then authorization when required, then the operation handlers
//! (the configured override list, or the default execute handler).

use std::sync::Arc;

use crate::error::ApiError;
use crate::types::Operation;

use super::config::TableConfig;
use super::pipeline::{run_chain, Authorize, Handler, HandlerFuture, Next, OpRequest, OpResponse, ParseItem, ParseQuery};

pub const COLLECTION_ROUTE: &str = "/";
pub const ID_ROUTE: &str = "/:id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

/// One registration: an operation bound to a verb and path with its chain
pub struct RouteBinding {
    pub operation: Operation,
    pub verb: Verb,
    pub path: &'static str,
    pub handlers: Vec<Arc<dyn Handler>>,
}

impl RouteBinding {
    /// Handler names in chain order, for logging and tests
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

/// Records route registrations for one table and dispatches requests
/// through the matching chain.
#[derive(Default)]
pub struct TableRouter {
    routes: Vec<RouteBinding>,
}

impl TableRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        operation: Operation,
        verb: Verb,
        path: &'static str,
        handlers: Vec<Arc<dyn Handler>>,
    ) {
        tracing::debug!(
            operation = %operation,
            verb = verb.as_str(),
            path,
            handlers = ?handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            "Registered table route"
        );
        self.routes.push(RouteBinding {
            operation,
            verb,
            path,
            handlers,
        });
    }

    pub fn routes(&self) -> &[RouteBinding] {
        &self.routes
    }

    pub fn find(&self, operation: Operation, path: &str) -> Option<&RouteBinding> {
        self.routes
            .iter()
            .find(|r| r.operation == operation && r.path == path)
    }

    /// Run the chain registered for the request's operation and path shape
    pub async fn dispatch(&self, req: &mut OpRequest) -> Result<OpResponse, ApiError> {
        let path = if req.context.id.is_some() {
            ID_ROUTE
        } else {
            COLLECTION_ROUTE
        };
        let binding = self.find(req.context.operation, path).ok_or_else(|| {
            ApiError::not_found(format!(
                "No route for {} on {}",
                req.context.operation, path
            ))
        })?;
        run_chain(&binding.handlers, req).await
    }
}

// The router is itself a terminal handler, so the default mount is just the
// router and an execute override can re-dispatch into it.
impl Handler for TableRouter {
    fn handle<'a>(&'a self, req: &'a mut OpRequest, _next: Next<'a>) -> HandlerFuture<'a> {
        Box::pin(async move { self.dispatch(req).await })
    }

    fn name(&self) -> &'static str {
        "table_router"
    }
}

/// The mountable result of route construction: the configured router plus
/// the handler list the caller should mount.
pub struct TableMount {
    pub router: Arc<TableRouter>,
    pub handlers: Vec<Arc<dyn Handler>>,
}

impl TableMount {
    pub async fn dispatch(&self, req: &mut OpRequest) -> Result<OpResponse, ApiError> {
        run_chain(&self.handlers, req).await
    }
}

/// Configure routes for every operation and return what to mount: the
/// router, or the table's `execute` middleware override when one is set
/// (the router stays registered underneath either way).
pub fn attach_routes(
    configuration: &TableConfig,
    mut router: TableRouter,
    execute: Arc<dyn Handler>,
) -> TableMount {
    configure_operation(
        &mut router,
        configuration,
        &execute,
        Operation::Read,
        Verb::Get,
        vec![Arc::new(ParseQuery)],
        &[COLLECTION_ROUTE, ID_ROUTE],
    );
    configure_operation(
        &mut router,
        configuration,
        &execute,
        Operation::Insert,
        Verb::Post,
        vec![Arc::new(ParseItem)],
        &[COLLECTION_ROUTE],
    );
    configure_operation(
        &mut router,
        configuration,
        &execute,
        Operation::Undelete,
        Verb::Post,
        vec![Arc::new(ParseQuery)],
        &[ID_ROUTE],
    );
    configure_operation(
        &mut router,
        configuration,
        &execute,
        Operation::Update,
        Verb::Patch,
        vec![Arc::new(ParseItem)],
        &[COLLECTION_ROUTE, ID_ROUTE],
    );
    configure_operation(
        &mut router,
        configuration,
        &execute,
        Operation::Delete,
        Verb::Delete,
        vec![Arc::new(ParseQuery)],
        &[COLLECTION_ROUTE, ID_ROUTE],
    );

    let router = Arc::new(router);
    let handlers: Vec<Arc<dyn Handler>> = if configuration.middleware.execute.is_empty() {
        vec![router.clone()]
    } else {
        configuration.middleware.execute.clone()
    };

    TableMount { router, handlers }
}

fn configure_operation(
    router: &mut TableRouter,
    configuration: &TableConfig,
    execute: &Arc<dyn Handler>,
    operation: Operation,
    verb: Verb,
    pre: Vec<Arc<dyn Handler>>,
    routes: &[&'static str],
) {
    // If no middleware has been configured for this operation, the default
    // execute handler is the chain
    let configured = configuration.middleware.for_operation(operation);
    let mut handlers: Vec<Arc<dyn Handler>> = if configured.is_empty() {
        vec![execute.clone()]
    } else {
        configured.to_vec()
    };

    // Hook up the authorization handler when required
    if configuration.requires_authorize(operation) {
        handlers.insert(0, Arc::new(Authorize));
    }

    // Required internal parsing runs first, preserving pre-handler order
    for (index, handler) in pre.into_iter().enumerate() {
        handlers.insert(index, handler);
    }

    for route in routes {
        router.register(operation, verb, route, handlers.clone());
    }
}
