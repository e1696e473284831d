//! Persisted jti record

/// Sentinel tenant id denoting the global (tenant-less) keyspace.
///
/// Used both as the stored tenant value for deployments running the legacy
/// schema and as the fallback scope consulted during tenanted lookups.
pub const DEFAULT_TENANT_ID: i32 = -1;

/// One consumed JWT ID.
///
/// At most one live record exists per `(tenant_id, jwt_id)` pair. Records are
/// created on first acceptance, overwritten in place when reuse is allowed,
/// and never deleted by this subsystem (expired-row cleanup is an external
/// concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JtiEntry {
    /// The `jti` claim value
    pub jwt_id: String,

    /// Owning tenant, or [`DEFAULT_TENANT_ID`] for the global keyspace
    pub tenant_id: i32,

    /// Assertion expiry, epoch milliseconds
    pub exp_time: i64,

    /// Record creation time, epoch milliseconds
    pub time_created: i64,
}

impl JtiEntry {
    /// Create a new record.
    pub fn new(jwt_id: impl Into<String>, tenant_id: i32, exp_time: i64, time_created: i64) -> Self {
        Self {
            jwt_id: jwt_id.into(),
            tenant_id,
            exp_time,
            time_created,
        }
    }

    /// Whether the recorded assertion has expired at `now_millis`.
    ///
    /// An expired record no longer blocks reuse; it may be overwritten by a
    /// fresh assertion carrying the same jti.
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.exp_time <= now_millis
    }
}
