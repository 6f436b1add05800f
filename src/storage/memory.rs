// Default in-memory provider. Tables are ordered row lists behind an async
// RwLock; rows keep insertion order unless a query asks for sorting.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::query::{predicate, Query, SortDirection};

use super::{Item, Provider, StorageError};

/// Fields maintained by the provider itself; updates cannot overwrite them
const PROTECTED_FIELDS: &[&str] = &["id", "createdAt"];

#[derive(Default)]
pub struct MemoryProvider {
    tables: RwLock<HashMap<String, Vec<Item>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching_indexes(rows: &[Item], query: &Query) -> Result<Vec<usize>, StorageError> {
        let mut found = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if query.matches(row)? {
                found.push(index);
            }
        }
        Ok(found)
    }

    fn sort_rows(rows: &mut [Item], query: &Query) {
        let ordering = query.ordering();
        if ordering.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for order in ordering {
                let left = a.get(&order.column);
                let right = b.get(&order.column);
                let cmp = compare_values(left, right);
                let cmp = match order.direction {
                    SortDirection::Asc => cmp,
                    SortDirection::Desc => cmp.reverse(),
                };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });
    }

    fn page_rows(mut rows: Vec<Item>, query: &Query) -> Vec<Item> {
        if let Some(offset) = query.offset_value() {
            let offset = offset.max(0) as usize;
            if offset >= rows.len() {
                return vec![];
            }
            rows.drain(..offset);
        }
        if let Some(limit) = query.limit_value() {
            rows.truncate(limit.max(0) as usize);
        }
        rows
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => predicate::ordering(Some(a), b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn id_string(item: &Item) -> Option<String> {
    match item.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn execute(&self, query: &Query) -> Result<Vec<Item>, StorageError> {
        let tables = self.tables.read().await;
        let rows = match tables.get(query.table()) {
            Some(rows) => rows,
            None => return Ok(vec![]),
        };

        let mut matched = Vec::new();
        for row in rows {
            if query.matches(row)? {
                matched.push(row.clone());
            }
        }
        Self::sort_rows(&mut matched, query);
        Ok(Self::page_rows(matched, query))
    }

    async fn insert(&self, table: &str, mut item: Item) -> Result<Item, StorageError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let id = match id_string(&item) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                item.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        if rows.iter().any(|row| id_string(row).as_deref() == Some(id.as_str())) {
            return Err(StorageError::DuplicateId(id));
        }

        let now = Utc::now().to_rfc3339();
        item.insert("createdAt".to_string(), Value::String(now.clone()));
        item.insert("updatedAt".to_string(), Value::String(now));

        rows.push(item.clone());
        Ok(item)
    }

    async fn update(&self, query: &Query, changes: Item) -> Result<u64, StorageError> {
        let mut tables = self.tables.write().await;
        let rows = match tables.get_mut(query.table()) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let indexes = Self::matching_indexes(rows, query)?;
        let now = Utc::now().to_rfc3339();
        for &index in &indexes {
            let row = &mut rows[index];
            for (field, value) in &changes {
                if PROTECTED_FIELDS.contains(&field.as_str()) {
                    continue;
                }
                row.insert(field.clone(), value.clone());
            }
            row.insert("updatedAt".to_string(), Value::String(now.clone()));
        }
        Ok(indexes.len() as u64)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StorageError> {
        let mut tables = self.tables.write().await;
        let rows = match tables.get_mut(query.table()) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let before = rows.len();
        let indexes = Self::matching_indexes(rows, query)?;
        for index in indexes.into_iter().rev() {
            rows.remove(index);
        }
        Ok((before - rows.len()) as u64)
    }
}
