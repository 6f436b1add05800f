use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;
use serde_json::{json, Map, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use mesa_api::config;
use mesa_api::storage::{memory::MemoryProvider, postgres::PostgresProvider, Provider};
use mesa_api::table::{mount_table, tables_router, TableConfig};

#[derive(Parser, Debug)]
#[command(name = "mesa-api", about = "Table API server for the Mesa backend platform")]
struct Args {
    /// Port to listen on (overrides MESA_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Storage provider: memory or postgres (overrides MESA_DATA_PROVIDER)
    #[arg(long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, MESA_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = config::config();
    tracing::info!("Starting Mesa API in {:?} mode", config.environment);

    let provider_name = args
        .provider
        .unwrap_or_else(|| config.data.provider.clone());
    let provider: Arc<dyn Provider> = match provider_name.as_str() {
        "postgres" => {
            let url = config
                .data
                .database_url
                .as_deref()
                .expect("DATABASE_URL is required for the postgres provider");
            Arc::new(
                PostgresProvider::connect(url)
                    .await
                    .expect("failed to connect to Postgres"),
            )
        }
        _ => Arc::new(MemoryProvider::new()),
    };

    let tables = vec![mount_table(todoitem_table(), provider)];
    for table in &tables {
        if let Err(e) = table.initialize().await {
            tracing::error!(table = %table.config.name, "Failed to seed table: {}", e);
        }
    }

    let app = app(&tables);

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 Mesa API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(tables: &[mesa_api::table::MountedTable]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tables_router(tables))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// The quickstart table every new Mesa app starts from
fn todoitem_table() -> TableConfig {
    TableConfig::new("todoitem")
        .soft_delete(true)
        .seed(vec![
            seed_row(json!({ "id": "1", "text": "Learn Mesa", "complete": false })),
            seed_row(json!({ "id": "2", "text": "Build an app", "complete": false })),
        ])
}

fn seed_row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Mesa API",
            "version": version,
            "description": "Table API for the Mesa backend platform built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "tables": "/tables/:name[/:id] (per-table authorization)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    axum::response::Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": now
        }
    }))
}
