//! Embedded relational backend on a single SQLite file.
//!
//! - Foreign keys are enforced by SQLite (`PRAGMA foreign_keys = ON`) and re-checked inside the
//!   insert transaction so the error names the offending column.
//! - Seeds use `INSERT OR IGNORE` against the unique `seed_key` column, so a repeated or
//!   concurrent bootstrap never duplicates demo rows.
//! - Writes take the lock up front (`BEGIN IMMEDIATE`) so two processes seeding the same file
//!   wait on each other instead of failing mid-transaction.
//! - The connection is blocking; every call runs on tokio's blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use harvest_schema::{table_for, TableDef, ALL_TABLES};
use harvest_types::{EntityKind, NewRecord, Record, RowId};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction,
    TransactionBehavior,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::{insert_columns, record_from_row};
use crate::{check_constraints, seed_kind_mismatch, DataStore, SeedRow, StoreError};

pub struct SqliteDataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDataStore {
    /// Open (or create) the database file. `:memory:` opens a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(|e| map_sqlite("open", e))?;
        Self::configure(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| map_sqlite("open", e))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .map_err(|e| map_sqlite("pragma", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
    }
}

/// Translate a rusqlite error; `context` is the table or operation involved.
fn map_sqlite(context: &str, e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg) => {
            let msg = msg.clone().unwrap_or_else(|| err.to_string());
            if msg.starts_with("no such table") {
                StoreError::MissingTable(context.to_string())
            } else if err.code == ErrorCode::ConstraintViolation {
                if msg.contains("FOREIGN KEY") {
                    StoreError::ForeignKey(format!("{context}: {msg}"))
                } else {
                    StoreError::Validation(format!("{context}: {msg}"))
                }
            } else {
                StoreError::Backend(format!("{context}: {msg}"))
            }
        }
        _ => StoreError::Backend(format!("{context}: {e}")),
    }
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn query_rows(
    conn: &Connection,
    table: &TableDef,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Record>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(|e| map_sqlite(table.name(), e))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params, |row| {
            let mut obj = Map::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                obj.insert(name.clone(), from_sql(row.get_ref(i)?));
            }
            Ok(Value::Object(obj))
        })
        .map_err(|e| map_sqlite(table.name(), e))?;

    let mut out = Vec::new();
    for row in rows {
        let row = row.map_err(|e| map_sqlite(table.name(), e))?;
        out.push(record_from_row(table.kind, row)?);
    }
    Ok(out)
}

fn check_references(tx: &Transaction<'_>, record: &NewRecord) -> Result<(), StoreError> {
    for (column, parent, id) in record.references() {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", parent.table_name());
        let found: Option<i64> = tx
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()
            .map_err(|e| map_sqlite(parent.table_name(), e))?;
        if found.is_none() {
            return Err(StoreError::ForeignKey(format!(
                "{column} {id} does not match any {}",
                parent.label()
            )));
        }
    }
    Ok(())
}

/// Returns the number of rows written (0 when `or_ignore` skipped a duplicate seed).
fn insert_row(
    tx: &Transaction<'_>,
    record: &NewRecord,
    seed_key: Option<&str>,
    or_ignore: bool,
) -> Result<usize, StoreError> {
    check_constraints(record)?;
    check_references(tx, record)?;
    let table = table_for(record.kind());
    let row = insert_columns(record, seed_key, Utc::now())?;
    let values: Vec<SqlValue> = table
        .insert_columns()
        .into_iter()
        .map(|c| to_sql(row.get(c)))
        .collect();
    tx.execute(&table.insert_sql(or_ignore), params_from_iter(values))
        .map_err(|e| map_sqlite(table.name(), e))
}

#[async_trait]
impl DataStore for SqliteDataStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(|e| map_sqlite("schema", e))?;
            for table in ALL_TABLES {
                tx.execute_batch(&table.create_sql())
                    .map_err(|e| map_sqlite(table.name(), e))?;
            }
            tx.commit().map_err(|e| map_sqlite("schema", e))
        })
        .await
    }

    async fn drop_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(|e| map_sqlite("schema", e))?;
            for table in ALL_TABLES.iter().rev() {
                tx.execute_batch(&table.drop_sql())
                    .map_err(|e| map_sqlite(table.name(), e))?;
            }
            tx.commit().map_err(|e| map_sqlite("schema", e))
        })
        .await
    }

    async fn table_exists(&self, kind: EntityKind) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![kind.table_name()],
                    |row| row.get(0),
                )
                .map_err(|e| map_sqlite("sqlite_master", e))?;
            Ok(n > 0)
        })
        .await
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
            let n: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| map_sqlite(kind.table_name(), e))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        self.with_conn(move |conn| {
            let table = table_for(kind);
            query_rows(conn, table, &table.select_all_sql(), [])
        })
        .await
    }

    async fn fetch_by_id(&self, kind: EntityKind, id: RowId) -> Result<Record, StoreError> {
        self.with_conn(move |conn| {
            let table = table_for(kind);
            query_rows(conn, table, &table.select_by_id_sql(), params![id])?
                .into_iter()
                .next()
                .ok_or(StoreError::NotFound { kind, id })
        })
        .await
    }

    async fn insert(&self, record: NewRecord) -> Result<Record, StoreError> {
        self.with_conn(move |conn| {
            let kind = record.kind();
            let table = table_for(kind);
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| map_sqlite(table.name(), e))?;
            insert_row(&tx, &record, None, false)?;
            let id = tx.last_insert_rowid();
            let stored = query_rows(&tx, table, &table.select_by_id_sql(), params![id])?
                .into_iter()
                .next()
                .ok_or(StoreError::NotFound { kind, id })?;
            tx.commit().map_err(|e| map_sqlite(table.name(), e))?;
            Ok(stored)
        })
        .await
    }

    async fn seed(&self, kind: EntityKind, rows: Vec<SeedRow>) -> Result<usize, StoreError> {
        if let Some(err) = rows.iter().find_map(|r| seed_kind_mismatch(kind, r)) {
            return Err(err);
        }
        self.with_conn(move |conn| {
            let table = table_for(kind);
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| map_sqlite(table.name(), e))?;
            let mut inserted = 0;
            for row in &rows {
                inserted += insert_row(&tx, &row.record, Some(&row.key), true)?;
            }
            tx.commit().map_err(|e| map_sqlite(table.name(), e))?;
            debug!(table = table.name(), inserted, "seed rows applied");
            Ok(inserted)
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA optimize;")
                .map_err(|e| map_sqlite("close", e))
        })
        .await
    }
}
