//! CRUD semantics of the table API, layered on the generic store: id and
//! timestamp injection, immutable-field stripping, re-read-and-return, and
//! page arithmetic.

use crate::database::registry::TableKind;
use crate::database::store::{JsonRow, ListQuery, StoreError};
use crate::database::Database;
use crate::utils::{generate_id, now_millis};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct TableService {
    database: Database,
}

#[derive(Debug, Serialize)]
pub struct ListPage {
    pub data: Vec<Value>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl TableService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn list(
        &self,
        kind: TableKind,
        page: i64,
        limit: i64,
        search: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = (page - 1) * limit;
        let slice = self.database.with_store(|store| {
            store.list(
                kind,
                &ListQuery {
                    limit,
                    offset,
                    search,
                },
            )
        })?;
        let pages = (slice.total + limit - 1) / limit;
        Ok(ListPage {
            data: slice.rows,
            total: slice.total,
            page,
            limit,
            pages,
        })
    }

    pub fn get(&self, kind: TableKind, id: &Value) -> Result<Option<Value>, StoreError> {
        self.database.with_store(|store| store.get(kind, id, false))
    }

    /// Assigns an id when the body has none, honours a caller-supplied
    /// created_at, always stamps updated_at, then returns the stored row.
    pub fn create(&self, kind: TableKind, body: JsonRow) -> Result<Value, StoreError> {
        let now = now_millis();
        let mut row = body;
        let id = match row.get("id") {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                let generated = Value::String(generate_id());
                row.insert("id".into(), generated.clone());
                generated
            }
        };
        if row.get("created_at").map_or(true, Value::is_null) {
            row.insert("created_at".into(), Value::from(now));
        }
        row.insert("updated_at".into(), Value::from(now));

        self.database.with_store(|store| {
            store.insert(kind, &row)?;
            store.get(kind, &id, true)?.ok_or(StoreError::RowNotFound)
        })
    }

    /// PUT and PATCH collapse to the same semantics: id and created_at are
    /// immutable and stripped from the body, updated_at is always stamped,
    /// and an empty body degenerates to a touch. The row is re-read without
    /// the soft-delete filter and returned.
    pub fn update(&self, kind: TableKind, id: &Value, body: JsonRow) -> Result<Value, StoreError> {
        let mut changes = body;
        changes.remove("id");
        changes.remove("created_at");
        changes.insert("updated_at".into(), Value::from(now_millis()));

        self.database.with_store(|store| {
            let affected = store.update(kind, id, &changes)?;
            if affected == 0 {
                return Err(StoreError::RowNotFound);
            }
            store.get(kind, id, true)?.ok_or(StoreError::RowNotFound)
        })
    }

    /// Soft delete. Acknowledges even when the id matches nothing.
    pub fn delete(&self, kind: TableKind, id: &Value) -> Result<(), StoreError> {
        let stamp = now_millis();
        self.database.with_store(|store| {
            store.soft_delete(kind, id, stamp)?;
            Ok(())
        })
    }
}
