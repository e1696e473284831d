//! SQLite-backed [`SqlBackend`]
//!
//! The shipped backend. A single connection behind a lock is enough here:
//! atomicity of the upsert statements comes from the engine, and SQLite
//! serializes writers anyway.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::StoreError;
use crate::sql::{SqlBackend, SqlEngine, SqlParam, SqlRow};
use crate::Result;

const CREATE_TENANTED_TABLE: &str = "CREATE TABLE IF NOT EXISTS IDN_OIDC_JTI (
        JWT_ID       TEXT    NOT NULL,
        TENANT_ID    INTEGER NOT NULL DEFAULT -1,
        EXP_TIME     INTEGER NOT NULL,
        TIME_CREATED INTEGER NOT NULL,
        PRIMARY KEY (JWT_ID, TENANT_ID)
    )";

const CREATE_LEGACY_TABLE: &str = "CREATE TABLE IF NOT EXISTS IDN_OIDC_JTI (
        JWT_ID       TEXT    NOT NULL PRIMARY KEY,
        EXP_TIME     INTEGER NOT NULL,
        TIME_CREATED INTEGER NOT NULL
    )";

/// SQLite connection wrapper implementing [`SqlBackend`].
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Wrap an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Connection::open(path).map(Self::new).map_err(map_err)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Connection::open_in_memory()
            .map(Self::new)
            .map_err(map_err)
    }

    /// Create the jti table in the tenanted or legacy layout.
    ///
    /// Schema provisioning normally belongs to the deployment; this helper
    /// exists for embedded and test databases.
    pub fn ensure_schema(&self, tenant_scoped: bool) -> Result<()> {
        let ddl = if tenant_scoped {
            CREATE_TENANTED_TABLE
        } else {
            CREATE_LEGACY_TABLE
        };
        self.lock()?.execute(ddl, []).map(|_| ()).map_err(map_err)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::backend("sqlite connection lock poisoned"))
    }
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqlBackend for SqliteBackend {
    fn engine(&self) -> SqlEngine {
        SqlEngine::Sqlite
    }

    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(map_err)?;
        stmt.execute(rusqlite::params_from_iter(params.iter().map(to_value)))
            .map_err(map_err)
    }

    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(map_err)?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter().map(to_value)), |row| {
                (0..columns).map(|idx| row.get::<_, i64>(idx)).collect()
            })
            .map_err(map_err)?;
        rows.collect::<rusqlite::Result<Vec<SqlRow>>>().map_err(map_err)
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                [table, column],
                |row| row.get(0),
            )
            .map_err(map_err)?;
        Ok(count > 0)
    }
}

fn to_value(param: &SqlParam) -> Value {
    match param {
        SqlParam::Text(text) => Value::Text(text.clone()),
        SqlParam::Int(value) => Value::Integer(*value),
    }
}

fn map_err(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate
        }
        other => StoreError::Backend {
            reason: other.to_string(),
        },
    }
}
