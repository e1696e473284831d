//! SQL engine identities and per-dialect statement shapes
//!
//! Every engine gets a semantically equivalent atomic upsert: same final row
//! state, same single-statement atomicity. Engines without a usable native
//! construct fall back to a probe-then-write pair driven by the store.

use crate::entry::JtiEntry;
use crate::sql::SqlParam;

/// Identity of the backing SQL engine, as detected by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlEngine {
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    Postgres,
    /// SQLite
    Sqlite,
    /// H2
    H2,
    /// Oracle
    Oracle,
    /// Microsoft SQL Server or IBM DB2 (shared MERGE shape)
    MssqlDb2,
    /// Unrecognized engine; only ANSI insert/update available
    Generic,
}

/// The closed set of upsert strategies.
///
/// Adding an engine means mapping it onto one of these (plus a statement
/// shape below); callers never branch on engine identity themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// `INSERT ... ON DUPLICATE KEY UPDATE`
    OnDuplicateKey,
    /// `INSERT ... ON CONFLICT ... DO UPDATE`
    OnConflict,
    /// Native `MERGE INTO`
    Merge,
    /// No native construct: existence probe, then insert or update
    InsertThenUpdate,
}

impl SqlEngine {
    /// Upsert strategy this engine supports.
    #[must_use]
    pub fn upsert_strategy(self) -> UpsertStrategy {
        match self {
            Self::MySql => UpsertStrategy::OnDuplicateKey,
            Self::Postgres | Self::Sqlite => UpsertStrategy::OnConflict,
            Self::H2 | Self::Oracle | Self::MssqlDb2 => UpsertStrategy::Merge,
            Self::Generic => UpsertStrategy::InsertThenUpdate,
        }
    }
}

// Lookup statements, legacy (global) schema.
pub(crate) const GET_JWT_ID: &str = "SELECT 1 FROM IDN_OIDC_JTI WHERE JWT_ID = ?";
pub(crate) const GET_JWT: &str =
    "SELECT EXP_TIME, TIME_CREATED FROM IDN_OIDC_JTI WHERE JWT_ID = ?";

// Lookup statements, tenanted schema. The detail query also surfaces rows
// recorded under the global sentinel tenant so a tenanted deployment still
// honors records written before the schema migration.
pub(crate) const GET_TENANTED_JWT_ID: &str =
    "SELECT 1 FROM IDN_OIDC_JTI WHERE JWT_ID = ? AND TENANT_ID = ?";
pub(crate) const GET_JWT_DETAIL: &str =
    "SELECT TENANT_ID, EXP_TIME, TIME_CREATED FROM IDN_OIDC_JTI WHERE JWT_ID = ? AND TENANT_ID IN (?, ?)";

// Plain inserts: the at-most-once path. A unique-key violation here is the
// replay signal.
pub(crate) const INSERT_JWT_ID: &str =
    "INSERT INTO IDN_OIDC_JTI (JWT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?)";
pub(crate) const INSERT_TENANTED_JWT_ID: &str =
    "INSERT INTO IDN_OIDC_JTI (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?, ?)";

// Updates for the probe-then-write fallback.
pub(crate) const UPDATE_JWT_ID: &str =
    "UPDATE IDN_OIDC_JTI SET EXP_TIME = ?, TIME_CREATED = ? WHERE JWT_ID = ?";
pub(crate) const UPDATE_TENANTED_JWT_ID: &str =
    "UPDATE IDN_OIDC_JTI SET EXP_TIME = ?, TIME_CREATED = ? WHERE JWT_ID = ? AND TENANT_ID = ?";

// Conditional takeover of an expired row. The EXP_TIME predicate makes the
// overwrite atomic: of any number of concurrent callers, the engine lets
// exactly one match the still-expired row, and the rows-affected count tells
// the caller whether it won.
pub(crate) const TAKE_OVER_EXPIRED_JWT_ID: &str =
    "UPDATE IDN_OIDC_JTI SET EXP_TIME = ?, TIME_CREATED = ? WHERE JWT_ID = ? AND EXP_TIME <= ?";
pub(crate) const TAKE_OVER_EXPIRED_TENANTED_JWT_ID: &str =
    "UPDATE IDN_OIDC_JTI SET EXP_TIME = ?, TIME_CREATED = ? \
     WHERE JWT_ID = ? AND TENANT_ID = ? AND EXP_TIME <= ?";

const UPSERT_MYSQL: &str = "INSERT INTO IDN_OIDC_JTI (JWT_ID, EXP_TIME, TIME_CREATED) \
     VALUES (?, ?, ?) ON DUPLICATE KEY UPDATE EXP_TIME = VALUES(EXP_TIME), \
     TIME_CREATED = VALUES(TIME_CREATED)";
const UPSERT_TENANTED_MYSQL: &str =
    "INSERT INTO IDN_OIDC_JTI (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?, ?) \
     ON DUPLICATE KEY UPDATE EXP_TIME = VALUES(EXP_TIME), TIME_CREATED = VALUES(TIME_CREATED)";

const UPSERT_ON_CONFLICT: &str =
    "INSERT INTO IDN_OIDC_JTI (JWT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?) \
     ON CONFLICT (JWT_ID) DO UPDATE SET EXP_TIME = EXCLUDED.EXP_TIME, \
     TIME_CREATED = EXCLUDED.TIME_CREATED";
const UPSERT_TENANTED_ON_CONFLICT: &str =
    "INSERT INTO IDN_OIDC_JTI (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?, ?) \
     ON CONFLICT (JWT_ID, TENANT_ID) DO UPDATE SET EXP_TIME = EXCLUDED.EXP_TIME, \
     TIME_CREATED = EXCLUDED.TIME_CREATED";

const UPSERT_H2: &str = "MERGE INTO IDN_OIDC_JTI KEY (JWT_ID) VALUES (?, ?, ?)";
const UPSERT_TENANTED_H2: &str =
    "MERGE INTO IDN_OIDC_JTI KEY (JWT_ID, TENANT_ID) VALUES (?, ?, ?, ?)";

// Oracle MERGE binds the key for the match clause, the update values, and
// then the full insert tuple again.
const UPSERT_ORACLE: &str = "MERGE INTO IDN_OIDC_JTI USING dual ON (JWT_ID = ?) \
     WHEN MATCHED THEN UPDATE SET EXP_TIME = ?, TIME_CREATED = ? \
     WHEN NOT MATCHED THEN INSERT (JWT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?)";
const UPSERT_TENANTED_ORACLE: &str =
    "MERGE INTO IDN_OIDC_JTI USING dual ON (JWT_ID = ? AND TENANT_ID = ?) \
     WHEN MATCHED THEN UPDATE SET EXP_TIME = ?, TIME_CREATED = ? \
     WHEN NOT MATCHED THEN INSERT (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) VALUES (?, ?, ?, ?)";

const UPSERT_MSSQL_DB2: &str = "MERGE INTO IDN_OIDC_JTI T USING \
     (VALUES (?, ?, ?)) S (JWT_ID, EXP_TIME, TIME_CREATED) ON T.JWT_ID = S.JWT_ID \
     WHEN MATCHED THEN UPDATE SET EXP_TIME = S.EXP_TIME, TIME_CREATED = S.TIME_CREATED \
     WHEN NOT MATCHED THEN INSERT (JWT_ID, EXP_TIME, TIME_CREATED) \
     VALUES (S.JWT_ID, S.EXP_TIME, S.TIME_CREATED);";
const UPSERT_TENANTED_MSSQL_DB2: &str = "MERGE INTO IDN_OIDC_JTI T USING \
     (VALUES (?, ?, ?, ?)) S (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) \
     ON T.JWT_ID = S.JWT_ID AND T.TENANT_ID = S.TENANT_ID \
     WHEN MATCHED THEN UPDATE SET EXP_TIME = S.EXP_TIME, TIME_CREATED = S.TIME_CREATED \
     WHEN NOT MATCHED THEN INSERT (JWT_ID, TENANT_ID, EXP_TIME, TIME_CREATED) \
     VALUES (S.JWT_ID, S.TENANT_ID, S.EXP_TIME, S.TIME_CREATED);";

/// Native upsert statement for the engine and schema mode, or `None` when the
/// store must run the probe-then-write fallback.
pub(crate) fn upsert_statement(engine: SqlEngine, tenanted: bool) -> Option<&'static str> {
    let sql = match (engine, tenanted) {
        (SqlEngine::MySql, false) => UPSERT_MYSQL,
        (SqlEngine::MySql, true) => UPSERT_TENANTED_MYSQL,
        (SqlEngine::Postgres | SqlEngine::Sqlite, false) => UPSERT_ON_CONFLICT,
        (SqlEngine::Postgres | SqlEngine::Sqlite, true) => UPSERT_TENANTED_ON_CONFLICT,
        (SqlEngine::H2, false) => UPSERT_H2,
        (SqlEngine::H2, true) => UPSERT_TENANTED_H2,
        (SqlEngine::Oracle, false) => UPSERT_ORACLE,
        (SqlEngine::Oracle, true) => UPSERT_TENANTED_ORACLE,
        (SqlEngine::MssqlDb2, false) => UPSERT_MSSQL_DB2,
        (SqlEngine::MssqlDb2, true) => UPSERT_TENANTED_MSSQL_DB2,
        (SqlEngine::Generic, _) => return None,
    };
    Some(sql)
}

/// Positional parameters matching [`upsert_statement`] for the engine.
pub(crate) fn upsert_params(engine: SqlEngine, entry: &JtiEntry, tenanted: bool) -> Vec<SqlParam> {
    let mut tuple = vec![SqlParam::Text(entry.jwt_id.clone())];
    if tenanted {
        tuple.push(SqlParam::Int(i64::from(entry.tenant_id)));
    }
    tuple.push(SqlParam::Int(entry.exp_time));
    tuple.push(SqlParam::Int(entry.time_created));

    if engine == SqlEngine::Oracle {
        // Key + update values for the ON/UPDATE clauses, then the insert tuple.
        let mut params = tuple.clone();
        params.extend(tuple);
        params
    } else {
        tuple
    }
}
