//! Replay store error types

use thiserror::Error;

/// Errors surfaced by replay stores and their SQL backends.
///
/// [`StoreError::ReplayDetected`] is an expected, policy-driven outcome; every
/// other variant is a storage fault the caller must treat as "cannot validate"
/// and fail closed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-key violation reported by a SQL backend.
    ///
    /// Backends raise this for the engine's native duplicate-key error so the
    /// store can distinguish an intentional at-most-once conflict from a
    /// generic statement failure.
    #[error("duplicate key while inserting jti record")]
    Duplicate,

    /// The jti was already consumed under a reuse-prevention policy.
    #[error("jti '{jwt_id}' has already been used")]
    ReplayDetected {
        /// The offending JWT ID
        jwt_id: String,
    },

    /// Schema capability probing failed.
    #[error("schema introspection failed: {reason}")]
    SchemaProbe {
        /// What went wrong
        reason: String,
    },

    /// Connection, transaction, or statement failure.
    #[error("storage backend failure: {reason}")]
    Backend {
        /// What went wrong
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for a backend failure with a formatted reason.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// True for the expected replay outcome, false for storage faults.
    #[must_use]
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::ReplayDetected { .. } | Self::Duplicate)
    }
}
