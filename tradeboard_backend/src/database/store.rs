//! Generic parameterized CRUD over the registered tables.
//!
//! Statements are assembled from registry-owned identifiers only; every
//! request-supplied value is bound as a positional parameter, including the
//! search pattern.

use super::registry::TableKind;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use thiserror::Error;

pub type JsonRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such column '{column}' in table '{table}'")]
    UnknownColumn {
        table: &'static str,
        column: String,
    },
    #[error("row not found")]
    RowNotFound,
    #[error("database mutex poisoned")]
    Poisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Owned bind parameter converted from a JSON scalar. Arrays and objects are
/// stored as their JSON text.
#[derive(Debug, Clone)]
enum BindValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl BindValue {
    fn from_json(value: &Value) -> BindValue {
        match value {
            Value::Null => BindValue::Null,
            Value::Bool(flag) => BindValue::Integer(*flag as i64),
            Value::Number(number) => number
                .as_i64()
                .map(BindValue::Integer)
                .or_else(|| number.as_f64().map(BindValue::Real))
                .unwrap_or(BindValue::Null),
            Value::String(text) => BindValue::Text(text.clone()),
            other => BindValue::Text(other.to_string()),
        }
    }
}

impl ToSql for BindValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            BindValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            BindValue::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            BindValue::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            BindValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Number(n.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        // No registered column stores blobs.
        ValueRef::Blob(_) => Value::Null,
    }
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
}

#[derive(Debug)]
pub struct ListSlice {
    pub rows: Vec<Value>,
    pub total: i64,
}

pub struct TableStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TableStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Live rows ordered by created_at DESC (id DESC as tie-break so paging
    /// is deterministic), with the total counted under the same filters.
    /// A non-empty search term on a table without any of the search columns
    /// matches nothing.
    pub fn list(&self, kind: TableKind, query: &ListQuery) -> Result<ListSlice, StoreError> {
        let mut clauses = vec!["deleted_at IS NULL".to_string()];
        let mut params: Vec<BindValue> = Vec::new();

        if let Some(term) = query.search.as_deref().filter(|term| !term.is_empty()) {
            let search_columns = kind.search_columns();
            if search_columns.is_empty() {
                return Ok(ListSlice {
                    rows: Vec::new(),
                    total: 0,
                });
            }
            let pattern = format!("%{term}%");
            let mut alternatives = Vec::with_capacity(search_columns.len());
            for column in search_columns {
                params.push(BindValue::Text(pattern.clone()));
                alternatives.push(format!("{column} LIKE ?{}", params.len()));
            }
            clauses.push(format!("({})", alternatives.join(" OR ")));
        }

        let table = kind.table_name();
        let where_clause = clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_clause}");
        let total: i64 =
            self.conn
                .query_row(&count_sql, params_from_iter(params.iter()), |row| row.get(0))?;

        let select_sql = format!(
            "SELECT * FROM {table} WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2,
        );
        params.push(BindValue::Integer(query.limit));
        params.push(BindValue::Integer(query.offset));

        tracing::debug!(sql = %select_sql, "list query");
        let rows = self.query_rows(&select_sql, &params)?;
        Ok(ListSlice { rows, total })
    }

    pub fn get(
        &self,
        kind: TableKind,
        id: &Value,
        include_deleted: bool,
    ) -> Result<Option<Value>, StoreError> {
        let table = kind.table_name();
        let sql = if include_deleted {
            format!("SELECT * FROM {table} WHERE id = ?1")
        } else {
            format!("SELECT * FROM {table} WHERE id = ?1 AND deleted_at IS NULL")
        };
        let params = [BindValue::from_json(id)];
        let mut rows = self.query_rows(&sql, &params)?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Inserts exactly the given key set. Columns the body omits fall back to
    /// their schema defaults (views, status, ...).
    pub fn insert(&self, kind: TableKind, row: &JsonRow) -> Result<(), StoreError> {
        let table = kind.table_name();
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (key, value) in row {
            let column = kind
                .resolve_column(key)
                .ok_or_else(|| StoreError::UnknownColumn {
                    table,
                    column: key.clone(),
                })?;
            params.push(BindValue::from_json(value));
            columns.push(column);
            placeholders.push(format!("?{}", params.len()));
        }
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(sql = %sql, "insert");
        self.conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(())
    }

    /// Sets exactly the given key set on one row. Returns the number of rows
    /// matched; callers decide whether zero is an error.
    pub fn update(&self, kind: TableKind, id: &Value, changes: &JsonRow) -> Result<usize, StoreError> {
        let table = kind.table_name();
        let mut assignments = Vec::with_capacity(changes.len());
        let mut params = Vec::with_capacity(changes.len() + 1);
        for (key, value) in changes {
            let column = kind
                .resolve_column(key)
                .ok_or_else(|| StoreError::UnknownColumn {
                    table,
                    column: key.clone(),
                })?;
            params.push(BindValue::from_json(value));
            assignments.push(format!("{column} = ?{}", params.len()));
        }
        params.push(BindValue::from_json(id));
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{}",
            assignments.join(", "),
            params.len()
        );
        tracing::debug!(sql = %sql, "update");
        let affected = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(affected)
    }

    /// Marks one row deleted. Unconditional by id, so re-deleting just
    /// refreshes the stamp and unknown ids affect nothing.
    pub fn soft_delete(
        &self,
        kind: TableKind,
        id: &Value,
        deleted_at: i64,
    ) -> Result<usize, StoreError> {
        let sql = format!(
            "UPDATE {} SET deleted_at = ?1 WHERE id = ?2",
            kind.table_name()
        );
        let params = [BindValue::Integer(deleted_at), BindValue::from_json(id)];
        let affected = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(affected)
    }

    fn query_rows(&self, sql: &str, params: &[BindValue]) -> Result<Vec<Value>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut raw = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = raw.next()? {
            let mut object = Map::new();
            for (idx, name) in names.iter().enumerate() {
                object.insert(name.clone(), cell_to_json(row.get_ref(idx)?));
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use serde_json::json;

    fn setup() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn);
        db.ensure_migrations().expect("migrations");
        db
    }

    fn object(value: Value) -> JsonRow {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn post_row(id: &str, title: &str, author: &str, created_at: i64) -> JsonRow {
        object(json!({
            "id": id,
            "board_type": "free",
            "title": title,
            "content": format!("{title} body"),
            "author": author,
            "created_at": created_at,
            "updated_at": created_at,
        }))
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let db = setup();
        db.with_store(|store| {
            store.insert(TableKind::Posts, &post_row("p1", "Hello", "alice", 1_000))?;
            let row = store
                .get(TableKind::Posts, &json!("p1"), false)?
                .expect("row present");
            assert_eq!(row["title"], json!("Hello"));
            assert_eq!(row["views"], json!(0));
            assert_eq!(row["deleted_at"], Value::Null);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn unknown_column_is_rejected_before_sql() {
        let db = setup();
        let mut row = post_row("p1", "Hello", "alice", 1_000);
        row.insert("flavor".into(), json!("grape"));
        let err = db
            .with_store(|store| store.insert(TableKind::Posts, &row))
            .unwrap_err();
        match err {
            StoreError::UnknownColumn { table, column } => {
                assert_eq!(table, "posts");
                assert_eq!(column, "flavor");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn soft_deleted_rows_are_hidden_from_default_reads() {
        let db = setup();
        db.with_store(|store| {
            store.insert(TableKind::Posts, &post_row("p1", "Hello", "alice", 1_000))?;
            store.soft_delete(TableKind::Posts, &json!("p1"), 2_000)?;

            assert!(store.get(TableKind::Posts, &json!("p1"), false)?.is_none());
            let raw = store
                .get(TableKind::Posts, &json!("p1"), true)?
                .expect("physical row remains");
            assert_eq!(raw["deleted_at"], json!(2_000));

            let slice = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: None,
                },
            )?;
            assert!(slice.rows.is_empty());
            assert_eq!(slice.total, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn list_orders_pages_and_counts() {
        let db = setup();
        db.with_store(|store| {
            for i in 0..5 {
                store.insert(
                    TableKind::Posts,
                    &post_row(&format!("p{i}"), &format!("Post {i}"), "alice", 1_000 + i),
                )?;
            }

            let first = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 2,
                    offset: 0,
                    search: None,
                },
            )?;
            assert_eq!(first.total, 5);
            assert_eq!(first.rows.len(), 2);
            assert_eq!(first.rows[0]["id"], json!("p4"));
            assert_eq!(first.rows[1]["id"], json!("p3"));

            let last = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 2,
                    offset: 4,
                    search: None,
                },
            )?;
            assert_eq!(last.rows.len(), 1);
            assert_eq!(last.rows[0]["id"], json!("p0"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn search_matches_only_columns_the_table_has() {
        let db = setup();
        db.with_store(|store| {
            store.insert(TableKind::Posts, &post_row("p1", "Apple pie", "alice", 1_000))?;
            store.insert(TableKind::Posts, &post_row("p2", "Banana", "bob", 1_001))?;

            let hits = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: Some("Apple".into()),
                },
            )?;
            assert_eq!(hits.total, 1);
            assert_eq!(hits.rows[0]["id"], json!("p1"));

            // Author is a search column too.
            let by_author = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: Some("bob".into()),
                },
            )?;
            assert_eq!(by_author.total, 1);
            assert_eq!(by_author.rows[0]["id"], json!("p2"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn search_on_tables_without_search_columns_matches_nothing() {
        let db = setup();
        db.with_store(|store| {
            store.insert(
                TableKind::Members,
                &object(json!({
                    "id": "m1",
                    "username": "alice",
                    "password_hash": "x",
                    "created_at": 1_000,
                    "updated_at": 1_000,
                })),
            )?;

            let unfiltered = store.list(
                TableKind::Members,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: None,
                },
            )?;
            assert_eq!(unfiltered.total, 1);

            let searched = store.list(
                TableKind::Members,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: Some("alice".into()),
                },
            )?;
            assert!(searched.rows.is_empty());
            assert_eq!(searched.total, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn like_wildcards_in_search_are_bound_not_spliced() {
        let db = setup();
        db.with_store(|store| {
            store.insert(TableKind::Posts, &post_row("p1", "plain", "alice", 1_000))?;
            // A quote in the term must not break the statement.
            let slice = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: Some("'; DROP TABLE posts; --".into()),
                },
            )?;
            assert_eq!(slice.total, 0);
            // Table is still intact.
            let all = store.list(
                TableKind::Posts,
                &ListQuery {
                    limit: 10,
                    offset: 0,
                    search: None,
                },
            )?;
            assert_eq!(all.total, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn trade_request_defaults_apply_for_omitted_columns() {
        let db = setup();
        db.with_store(|store| {
            store.insert(
                TableKind::TradeRequests,
                &object(json!({
                    "id": "t1",
                    "post_id": "p1",
                    "post_title": "Selling gold",
                    "name": "Kim",
                    "id_number": "900101-1234567",
                    "phone": "010-0000-0000",
                    "game_id": "kim01",
                    "created_at": 1_000,
                    "updated_at": 1_000,
                })),
            )?;
            let row = store
                .get(TableKind::TradeRequests, &json!("t1"), false)?
                .expect("row present");
            assert_eq!(row["status"], json!("pending"));
            assert_eq!(row["sell_amount"], json!(0));
            assert_eq!(row["buy_amount"], json!(0));
            assert_eq!(row["custom_date"], Value::Null);
            Ok(())
        })
        .unwrap();
    }
}
