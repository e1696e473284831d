//! In-process jti fast path
//!
//! A small `(tenant, jti) -> expiry` cache in front of the replay store. It
//! is advisory only: a hit may short-circuit to rejection while the cached
//! expiry is still in the future, but an expired or missing entry always
//! defers to the authoritative store. In multi-instance deployments the cache
//! only saves store round trips for jti values already seen by the same
//! process.

use std::fmt;

use moka::sync::Cache;

/// Default maximum number of cached jti values
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Advisory `(tenant, jti) -> expiry (epoch millis)` cache.
///
/// Entries are scoped per tenant so one tenant's consumed jti never shadows
/// another tenant's first use of the same value.
#[derive(Clone)]
pub struct JtiCache {
    inner: Cache<String, i64>,
}

impl JtiCache {
    /// Create a cache bounded to `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    fn key(jwt_id: &str, tenant_id: i32) -> String {
        format!("{tenant_id}:{jwt_id}")
    }

    /// Cached expiry for `jwt_id` in `tenant_id`'s scope, if present.
    ///
    /// Callers must treat an expiry at or before "now" as stale and evict it
    /// with [`invalidate`](Self::invalidate) rather than reject on it.
    #[must_use]
    pub fn get(&self, jwt_id: &str, tenant_id: i32) -> Option<i64> {
        self.inner.get(&Self::key(jwt_id, tenant_id))
    }

    /// Remember `jwt_id` as consumed by `tenant_id` until `exp_time` (epoch
    /// millis).
    pub fn put(&self, jwt_id: &str, tenant_id: i32, exp_time: i64) {
        self.inner.insert(Self::key(jwt_id, tenant_id), exp_time);
    }

    /// Drop a stale entry.
    pub fn invalidate(&self, jwt_id: &str, tenant_id: i32) {
        self.inner.invalidate(&Self::key(jwt_id, tenant_id));
    }
}

impl Default for JtiCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for JtiCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JtiCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_invalidate_roundtrip() {
        let cache = JtiCache::default();
        assert_eq!(cache.get("jti-1", 1), None);

        cache.put("jti-1", 1, 42_000);
        assert_eq!(cache.get("jti-1", 1), Some(42_000));

        cache.invalidate("jti-1", 1);
        assert_eq!(cache.get("jti-1", 1), None);
    }

    #[test]
    fn put_overwrites_previous_expiry() {
        let cache = JtiCache::default();
        cache.put("jti-2", 1, 1_000);
        cache.put("jti-2", 1, 2_000);
        assert_eq!(cache.get("jti-2", 1), Some(2_000));
    }

    #[test]
    fn entries_are_scoped_per_tenant() {
        let cache = JtiCache::default();
        cache.put("jti-3", 1, 42_000);

        assert_eq!(cache.get("jti-3", 2), None);
        assert_eq!(cache.get("jti-3", -1), None);
        assert_eq!(cache.get("jti-3", 1), Some(42_000));
    }
}
