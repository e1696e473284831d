//! # tokengate-jti - JTI replay protection
//!
//! Durable, tenant-aware tracking of consumed JWT IDs ("jti") for OAuth2
//! `private_key_jwt` client authentication (RFC 7523). A client assertion may
//! be accepted at most once per configured reuse policy; this crate owns the
//! persistent record of which jti values have already been seen.
//!
//! ## Architecture
//!
//! - `entry` - the persisted `(tenant, jti, expiry, created)` record
//! - `store` - the [`ReplayStore`] contract and an in-memory implementation
//! - `sql` - dialect-portable SQL store with atomic per-engine upserts
//! - `cache` - optional in-process jti fast path in front of the store
//!
//! ## Concurrency
//!
//! Correctness under concurrent submission of the same assertion rests on the
//! atomicity of the backing store's insert/upsert, not on any in-process lock.
//! Multiple process instances sharing one database remain correct; the cache
//! only trims round trips within a single process.
//!
//! ## Feature Flags
//!
//! - `sqlite-store` (default) - rusqlite-backed [`sql::SqliteBackend`]

pub mod cache;
pub mod entry;
pub mod error;
pub mod sql;
pub mod store;

pub use cache::JtiCache;
pub use entry::{JtiEntry, DEFAULT_TENANT_ID};
pub use error::StoreError;
pub use sql::{SqlBackend, SqlEngine, SqlParam, SqlReplayStore, UpsertStrategy};
pub use store::{MemoryReplayStore, ReplayStore};

#[cfg(feature = "sqlite-store")]
pub use sql::sqlite::SqliteBackend;

/// Replay store result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Logical table holding consumed JWT IDs
pub const JTI_TABLE: &str = "IDN_OIDC_JTI";

/// Tenant column whose presence selects tenanted vs legacy statements
pub const TENANT_COLUMN: &str = "TENANT_ID";
