//! Dialect-portable SQL replay store
//!
//! The store speaks a fixed logical statement set; the [`SqlBackend`] trait is
//! the connection-provisioning boundary. Each backend executes one statement
//! on a scoped connection and reports unique-key violations distinctly, which
//! is all the store needs to stay atomic across process instances.

pub mod dialect;

#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::entry::{JtiEntry, DEFAULT_TENANT_ID};
use crate::error::StoreError;
use crate::store::ReplayStore;
use crate::{Result, JTI_TABLE, TENANT_COLUMN};

pub use dialect::{SqlEngine, UpsertStrategy};

/// Positional parameter value for a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// String value
    Text(String),
    /// Integer value
    Int(i64),
}

/// One result row; all columns the store selects are integral.
pub type SqlRow = Vec<i64>;

/// Execution boundary between the replay store and a database.
///
/// Implementations acquire a scoped connection per call and release it on
/// every exit path. Statements use `?` placeholders; a backend whose driver
/// wants a different placeholder style rewrites them before execution.
pub trait SqlBackend: Send + Sync + std::fmt::Debug {
    /// Detected engine identity, used once to pick the statement shapes.
    fn engine(&self) -> SqlEngine;

    /// Execute a DML statement, returning rows affected.
    ///
    /// Unique-constraint violations must surface as [`StoreError::Duplicate`]
    /// so the store can tell an at-most-once conflict from a storage fault.
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize>;

    /// Run a query, returning integral rows in select order.
    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>>;

    /// Whether `table` carries `column`, via engine metadata.
    fn has_column(&self, table: &str, column: &str) -> Result<bool>;
}

/// Replay store over any [`SqlBackend`].
///
/// The tenant-or-legacy schema decision is probed from table metadata exactly
/// once per store and cached; every operation then routes through the
/// matching statement set, so callers never branch on schema mode.
#[derive(Debug)]
pub struct SqlReplayStore<B> {
    backend: B,
    tenant_scoped: OnceCell<bool>,
}

impl<B: SqlBackend> SqlReplayStore<B> {
    /// Create a store over `backend`. The schema probe runs lazily on first use.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tenant_scoped: OnceCell::new(),
        }
    }

    /// Detected engine of the underlying backend.
    pub fn engine(&self) -> SqlEngine {
        self.backend.engine()
    }

    async fn tenant_scoped(&self) -> Result<bool> {
        self.tenant_scoped
            .get_or_try_init(|| async {
                let scoped = self
                    .backend
                    .has_column(JTI_TABLE, TENANT_COLUMN)
                    .map_err(|err| StoreError::SchemaProbe {
                        reason: err.to_string(),
                    })?;
                debug!(
                    table = JTI_TABLE,
                    tenant_scoped = scoped,
                    engine = ?self.backend.engine(),
                    "probed jti table schema mode"
                );
                Ok(scoped)
            })
            .await
            .copied()
    }

    fn key_params(entry_jwt_id: &str, tenant_id: i32, tenanted: bool) -> Vec<SqlParam> {
        let mut params = vec![SqlParam::Text(entry_jwt_id.to_owned())];
        if tenanted {
            params.push(SqlParam::Int(i64::from(tenant_id)));
        }
        params
    }

    /// Probe-then-write upsert for engines without a native construct.
    ///
    /// Not atomic on its own: a concurrent insert between probe and write is
    /// absorbed by retrying as an update, so the final row state still matches
    /// the native shapes.
    fn fallback_upsert(&self, entry: &JtiEntry, tenanted: bool) -> Result<()> {
        let exists_sql = if tenanted {
            dialect::GET_TENANTED_JWT_ID
        } else {
            dialect::GET_JWT_ID
        };
        let key = Self::key_params(&entry.jwt_id, entry.tenant_id, tenanted);
        let update = || {
            let mut params = vec![
                SqlParam::Int(entry.exp_time),
                SqlParam::Int(entry.time_created),
                SqlParam::Text(entry.jwt_id.clone()),
            ];
            if tenanted {
                params.push(SqlParam::Int(i64::from(entry.tenant_id)));
            }
            let sql = if tenanted {
                dialect::UPDATE_TENANTED_JWT_ID
            } else {
                dialect::UPDATE_JWT_ID
            };
            self.backend.execute(sql, &params).map(|_| ())
        };

        if self.backend.query(exists_sql, &key)?.is_empty() {
            match self.insert_row(entry, tenanted) {
                Err(StoreError::Duplicate) => {
                    warn!(jti = %entry.jwt_id, "lost probe-then-insert race, retrying as update");
                    update()
                }
                other => other,
            }
        } else {
            update()
        }
    }

    fn insert_row(&self, entry: &JtiEntry, tenanted: bool) -> Result<()> {
        let (sql, params) = if tenanted {
            (
                dialect::INSERT_TENANTED_JWT_ID,
                vec![
                    SqlParam::Text(entry.jwt_id.clone()),
                    SqlParam::Int(i64::from(entry.tenant_id)),
                    SqlParam::Int(entry.exp_time),
                    SqlParam::Int(entry.time_created),
                ],
            )
        } else {
            (
                dialect::INSERT_JWT_ID,
                vec![
                    SqlParam::Text(entry.jwt_id.clone()),
                    SqlParam::Int(entry.exp_time),
                    SqlParam::Int(entry.time_created),
                ],
            )
        };
        self.backend.execute(sql, &params).map(|_| ())
    }
}

#[async_trait]
impl<B: SqlBackend> ReplayStore for SqlReplayStore<B> {
    async fn exists(&self, jwt_id: &str, tenant_id: i32) -> Result<bool> {
        let tenanted = self.tenant_scoped().await?;
        let sql = if tenanted {
            dialect::GET_TENANTED_JWT_ID
        } else {
            dialect::GET_JWT_ID
        };
        let params = Self::key_params(jwt_id, tenant_id, tenanted);
        Ok(!self.backend.query(sql, &params)?.is_empty())
    }

    async fn lookup(&self, jwt_id: &str, tenant_id: i32) -> Result<Vec<JtiEntry>> {
        let tenanted = self.tenant_scoped().await?;
        if tenanted {
            let params = vec![
                SqlParam::Text(jwt_id.to_owned()),
                SqlParam::Int(i64::from(tenant_id)),
                SqlParam::Int(i64::from(DEFAULT_TENANT_ID)),
            ];
            let rows = self.backend.query(dialect::GET_JWT_DETAIL, &params)?;
            rows.into_iter()
                .map(|row| match row.as_slice() {
                    [tenant, exp, created] => {
                        Ok(JtiEntry::new(jwt_id, *tenant as i32, *exp, *created))
                    }
                    _ => Err(StoreError::backend("malformed jti detail row")),
                })
                .collect()
        } else {
            let params = vec![SqlParam::Text(jwt_id.to_owned())];
            let rows = self.backend.query(dialect::GET_JWT, &params)?;
            rows.into_iter()
                .map(|row| match row.as_slice() {
                    [exp, created] => Ok(JtiEntry::new(jwt_id, DEFAULT_TENANT_ID, *exp, *created)),
                    _ => Err(StoreError::backend("malformed jti row")),
                })
                .collect()
        }
    }

    async fn insert(&self, entry: &JtiEntry) -> Result<()> {
        let tenanted = self.tenant_scoped().await?;
        match self.insert_row(entry, tenanted) {
            Err(StoreError::Duplicate) => Err(StoreError::ReplayDetected {
                jwt_id: entry.jwt_id.clone(),
            }),
            other => other,
        }
    }

    async fn insert_or_update(&self, entry: &JtiEntry) -> Result<()> {
        let tenanted = self.tenant_scoped().await?;
        let engine = self.backend.engine();
        match dialect::upsert_statement(engine, tenanted) {
            Some(sql) => {
                let params = dialect::upsert_params(engine, entry, tenanted);
                self.backend.execute(sql, &params)?;
                Ok(())
            }
            None => self.fallback_upsert(entry, tenanted),
        }
    }

    async fn replace_expired(&self, entry: &JtiEntry, now_millis: i64) -> Result<bool> {
        let tenanted = self.tenant_scoped().await?;
        let mut params = vec![
            SqlParam::Int(entry.exp_time),
            SqlParam::Int(entry.time_created),
            SqlParam::Text(entry.jwt_id.clone()),
        ];
        if tenanted {
            params.push(SqlParam::Int(i64::from(entry.tenant_id)));
        }
        params.push(SqlParam::Int(now_millis));
        let sql = if tenanted {
            dialect::TAKE_OVER_EXPIRED_TENANTED_JWT_ID
        } else {
            dialect::TAKE_OVER_EXPIRED_JWT_ID
        };
        // The engine serializes the conditional update; rows affected tells
        // this caller whether it won the takeover.
        Ok(self.backend.execute(sql, &params)? == 1)
    }
}
