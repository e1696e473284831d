//! Replay store contract and in-memory implementation

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::entry::{JtiEntry, DEFAULT_TENANT_ID};
use crate::error::StoreError;
use crate::Result;

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> Result<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|_| StoreError::backend("system clock before Unix epoch"))
}

/// Durable record of consumed JWT IDs.
///
/// Implementations must guarantee that [`insert`](ReplayStore::insert) is
/// atomic with respect to concurrent calls for the same `(tenant, jti)` key:
/// when two requests race, exactly one insert succeeds. That atomicity is what
/// makes [`record`](ReplayStore::record) safe under reuse prevention without
/// any process-local locking.
#[async_trait]
pub trait ReplayStore: Send + Sync + std::fmt::Debug {
    /// Whether any record exists for the `(tenant, jti)` key.
    async fn exists(&self, jwt_id: &str, tenant_id: i32) -> Result<bool>;

    /// All records for `jwt_id` visible from `tenant_id`'s scope.
    ///
    /// Tenanted deployments see rows for the given tenant plus the
    /// [`DEFAULT_TENANT_ID`] global sentinel; legacy deployments see the
    /// single global row.
    async fn lookup(&self, jwt_id: &str, tenant_id: i32) -> Result<Vec<JtiEntry>>;

    /// Insert a fresh record; an existing record for the key fails with
    /// [`StoreError::ReplayDetected`].
    async fn insert(&self, entry: &JtiEntry) -> Result<()>;

    /// Insert the record, or overwrite expiry and creation time in place if
    /// the key already exists (last write wins).
    async fn insert_or_update(&self, entry: &JtiEntry) -> Result<()>;

    /// Atomically overwrite the existing record for the key, but only while
    /// it is still expired at `now_millis`. Returns whether the overwrite
    /// happened.
    ///
    /// Under concurrent calls for the same key, at most one caller may
    /// observe `true`; the store must decide this at the engine level (a
    /// conditional update judged by rows affected, or an equivalent), not by
    /// reading first.
    async fn replace_expired(&self, entry: &JtiEntry, now_millis: i64) -> Result<bool>;

    /// Record a consumed jti according to the reuse policy.
    ///
    /// With `prevent_reuse` a still-unexpired record in any visible scope
    /// (the tenant's own, or the [`DEFAULT_TENANT_ID`] global sentinel)
    /// rejects the call with [`StoreError::ReplayDetected`]; an expired
    /// record is overwritten. Without it the record is always upserted.
    ///
    /// The sentinel-scope check is a read before the write and so cannot be
    /// engine-atomic across scopes; same-key races are decided by the atomic
    /// insert and, when the key holds an expired row, by the conditional
    /// [`replace_expired`](Self::replace_expired) overwrite. Those two are
    /// where the at-most-once guarantee lives.
    async fn record(&self, entry: &JtiEntry, prevent_reuse: bool) -> Result<()> {
        if !prevent_reuse {
            return self.insert_or_update(entry).await;
        }
        let now = now_millis()?;
        let live = self
            .lookup(&entry.jwt_id, entry.tenant_id)
            .await?
            .iter()
            .any(|existing| !existing.is_expired(now));
        if live {
            debug!(jti = %entry.jwt_id, tenant_id = entry.tenant_id, "jti replay detected");
            return Err(StoreError::ReplayDetected {
                jwt_id: entry.jwt_id.clone(),
            });
        }
        match self.insert(entry).await {
            // The key is occupied: either a same-key race was lost, or an
            // expired row still holds it. The conditional overwrite settles
            // both cases atomically, exactly one caller may take the row over.
            Err(err) if err.is_replay() => {
                if self.replace_expired(entry, now).await? {
                    return Ok(());
                }
                debug!(jti = %entry.jwt_id, tenant_id = entry.tenant_id, "jti replay detected");
                Err(StoreError::ReplayDetected {
                    jwt_id: entry.jwt_id.clone(),
                })
            }
            other => other,
        }
    }
}

/// In-memory replay store for tests and single-process deployments.
///
/// Always tenant-scoped; the dual schema modes only exist for the SQL store.
#[derive(Debug, Default)]
pub struct MemoryReplayStore {
    entries: RwLock<HashMap<(String, i32), JtiEntry>>,
}

impl MemoryReplayStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplayStore for MemoryReplayStore {
    async fn exists(&self, jwt_id: &str, tenant_id: i32) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries.contains_key(&(jwt_id.to_owned(), tenant_id)))
    }

    async fn lookup(&self, jwt_id: &str, tenant_id: i32) -> Result<Vec<JtiEntry>> {
        let entries = self.entries.read().await;
        let mut found = Vec::new();
        for scope in [tenant_id, DEFAULT_TENANT_ID] {
            if let Some(entry) = entries.get(&(jwt_id.to_owned(), scope)) {
                found.push(entry.clone());
            }
            if tenant_id == DEFAULT_TENANT_ID {
                break;
            }
        }
        Ok(found)
    }

    async fn insert(&self, entry: &JtiEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = (entry.jwt_id.clone(), entry.tenant_id);
        if entries.contains_key(&key) {
            return Err(StoreError::ReplayDetected {
                jwt_id: entry.jwt_id.clone(),
            });
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn insert_or_update(&self, entry: &JtiEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert((entry.jwt_id.clone(), entry.tenant_id), entry.clone());
        Ok(())
    }

    async fn replace_expired(&self, entry: &JtiEntry, now_millis: i64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let key = (entry.jwt_id.clone(), entry.tenant_id);
        match entries.get(&key) {
            Some(existing) if existing.is_expired(now_millis) => {
                entries.insert(key, entry.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(jti: &str, tenant: i32, exp: i64) -> JtiEntry {
        JtiEntry::new(jti, tenant, exp, 1_000)
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_key() {
        let store = MemoryReplayStore::new();
        store.insert(&entry("jti-a", 1, i64::MAX)).await.unwrap();

        let err = store.insert(&entry("jti-a", 1, i64::MAX)).await.unwrap_err();
        assert!(matches!(err, StoreError::ReplayDetected { .. }));

        // Different tenant, same jti: separate key.
        store.insert(&entry("jti-a", 2, i64::MAX)).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins() {
        let store = MemoryReplayStore::new();
        store
            .insert_or_update(&JtiEntry::new("jti-b", 1, 10_000, 1_000))
            .await
            .unwrap();
        store
            .insert_or_update(&JtiEntry::new("jti-b", 1, 20_000, 2_000))
            .await
            .unwrap();

        let found = store.lookup("jti-b", 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].exp_time, 20_000);
        assert_eq!(found[0].time_created, 2_000);
    }

    #[tokio::test]
    async fn lookup_includes_global_sentinel_scope() {
        let store = MemoryReplayStore::new();
        store
            .insert(&entry("jti-c", DEFAULT_TENANT_ID, i64::MAX))
            .await
            .unwrap();

        let found = store.lookup("jti-c", 7).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tenant_id, DEFAULT_TENANT_ID);
    }

    #[tokio::test]
    async fn record_enforces_at_most_once() {
        let store = MemoryReplayStore::new();
        let live = entry("jti-d", 1, i64::MAX);

        store.record(&live, true).await.unwrap();
        let err = store.record(&live, true).await.unwrap_err();
        assert!(matches!(err, StoreError::ReplayDetected { .. }));
    }

    #[tokio::test]
    async fn record_overwrites_expired_entry_under_prevent_reuse() {
        let store = MemoryReplayStore::new();
        store.record(&entry("jti-e", 1, 1), true).await.unwrap();

        // The original assertion expired long ago; a new one reusing the jti
        // is not a replay of anything still valid.
        let fresh = entry("jti-e", 1, i64::MAX);
        store.record(&fresh, true).await.unwrap();

        let found = store.lookup("jti-e", 1).await.unwrap();
        assert_eq!(found[0].exp_time, i64::MAX);
    }

    #[tokio::test]
    async fn replace_expired_takes_over_only_expired_rows() {
        let store = MemoryReplayStore::new();
        store.insert(&entry("jti-g", 1, 1_000)).await.unwrap();

        let fresh = entry("jti-g", 1, i64::MAX);
        assert!(store.replace_expired(&fresh, 2_000).await.unwrap());

        // The row is live now; a second takeover of the same key must lose.
        assert!(!store.replace_expired(&fresh, 2_000).await.unwrap());

        // Absent key: nothing to take over.
        assert!(!store.replace_expired(&entry("jti-h", 1, i64::MAX), 2_000).await.unwrap());
    }

    #[tokio::test]
    async fn record_without_prevention_allows_reuse() {
        let store = MemoryReplayStore::new();
        store.record(&entry("jti-f", 1, i64::MAX), false).await.unwrap();
        store
            .record(&JtiEntry::new("jti-f", 1, i64::MAX, 9_999), false)
            .await
            .unwrap();

        let found = store.lookup("jti-f", 1).await.unwrap();
        assert_eq!(found[0].time_created, 9_999);
    }

    #[tokio::test]
    async fn concurrent_record_has_exactly_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryReplayStore::new());
        let entry = entry("jti-race", 1, i64::MAX);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let entry = entry.clone();
            handles.push(tokio::spawn(
                async move { store.record(&entry, true).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
