// SQL provider backed by Postgres. Rows travel as JSON via row_to_json so
// the provider stays schema-agnostic; the table schema owns column types and
// the createdAt/updatedAt defaults.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Row};

use crate::query::sql::{self, SqlWhere};
use crate::query::Query;

use super::{Item, Provider, StorageError};

const PROTECTED_FIELDS: &[&str] = &["id", "createdAt"];

pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .connect(database_url)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        tracing::info!("Connected storage provider to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Provider for PostgresProvider {
    async fn execute(&self, query: &Query) -> Result<Vec<Item>, StorageError> {
        let where_result = SqlWhere::generate(query.conditions(), 0)?;

        let statement = [
            format!("SELECT row_to_json(t) AS row FROM (SELECT * FROM \"{}\"", query.table()),
            if where_result.sql.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", where_result.sql)
            },
            sql::order_sql(query.ordering()),
            sql::limit_sql(query.limit_value(), query.offset_value()),
            ") t".to_string(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        let mut q = sqlx::query(&statement);
        for param in &where_result.params {
            q = bind_param(q, param);
        }

        let rows = q.fetch_all(&self.pool).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get("row")?;
            match value {
                Value::Object(map) => items.push(map),
                other => {
                    return Err(StorageError::QueryError(format!(
                        "Expected JSON object row, got {}",
                        other
                    )))
                }
            }
        }
        Ok(items)
    }

    async fn insert(&self, table: &str, item: Item) -> Result<Item, StorageError> {
        let mut columns = Vec::with_capacity(item.len());
        let mut placeholders = Vec::with_capacity(item.len());
        let mut params = Vec::with_capacity(item.len());
        for (index, (field, value)) in item.iter().enumerate() {
            sql::validate_column(field)?;
            columns.push(format!("\"{}\"", field));
            placeholders.push(format!("${}", index + 1));
            params.push(value.clone());
        }

        let statement = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING row_to_json(\"{}\".*) AS row",
            table,
            columns.join(", "),
            placeholders.join(", "),
            table
        );

        let mut q = sqlx::query(&statement);
        for param in &params {
            q = bind_param(q, param);
        }

        let row = match q.fetch_one(&self.pool).await {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                let id = item
                    .get("id")
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_default();
                return Err(StorageError::DuplicateId(id));
            }
            Err(e) => return Err(StorageError::Sqlx(e)),
        };

        let value: Value = row.try_get("row")?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::QueryError(format!(
                "Expected JSON object row, got {}",
                other
            ))),
        }
    }

    async fn update(&self, query: &Query, changes: Item) -> Result<u64, StorageError> {
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in &changes {
            if PROTECTED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            sql::validate_column(field)?;
            params.push(value.clone());
            assignments.push(format!("\"{}\" = ${}", field, params.len()));
        }
        assignments.push("\"updatedAt\" = now()".to_string());

        let where_result = SqlWhere::generate(query.conditions(), params.len())?;
        let statement = format!(
            "UPDATE \"{}\" SET {}{}",
            query.table(),
            assignments.join(", "),
            if where_result.sql.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", where_result.sql)
            }
        );

        let mut q = sqlx::query(&statement);
        for param in params.iter().chain(where_result.params.iter()) {
            q = bind_param(q, param);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, query: &Query) -> Result<u64, StorageError> {
        let where_result = SqlWhere::generate(query.conditions(), 0)?;
        let statement = format!(
            "DELETE FROM \"{}\"{}",
            query.table(),
            if where_result.sql.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", where_result.sql)
            }
        );

        let mut q = sqlx::query(&statement);
        for param in &where_result.params {
            q = bind_param(q, param);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays are expanded into individual placeholders by SqlWhere
        Value::Array(_) => q,
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}
