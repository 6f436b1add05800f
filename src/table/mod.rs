pub mod config;
pub mod context;
pub mod mount;
pub mod operations;
pub mod pipeline;
pub mod routes;

pub use config::{FilterFn, MiddlewareConfig, OperationConfig, TableConfig, TransformFn};
pub use context::OperationContext;
pub use mount::{mount_table, tables_router, MountedTable};
pub use operations::{TableOperations, NO_RECORDS_DELETED, NO_RECORDS_UPDATED};
pub use pipeline::{Handler, Next, OpRequest, OpResponse};
pub use routes::{attach_routes, TableMount, TableRouter, Verb, COLLECTION_ROUTE, ID_ROUTE};
