//! Assertion rejection taxonomy

use thiserror::Error;
use tokengate_jti::StoreError;

/// Why a client assertion was rejected.
///
/// Every variant except [`AuthnError::Storage`] is an expected, policy-driven
/// outcome: the assertion is invalid and the caller reports an authentication
/// failure. `Storage` means the replay store could not be consulted; the
/// validation fails closed and the caller should surface a server-side error
/// rather than blame the client.
#[derive(Debug, Error)]
pub enum AuthnError {
    /// Null, empty, or structurally malformed assertion.
    #[error("malformed client assertion: {reason}")]
    Structural {
        /// What was wrong with the token structure
        reason: String,
    },

    /// No trusted signing key is registered for the asserted client.
    #[error("unknown client '{client_id}'")]
    UnknownClient {
        /// The asserted client identifier
        client_id: String,
    },

    /// Cryptographic signature verification failed.
    #[error("invalid signature: {reason}")]
    Signature {
        /// Verification failure detail
        reason: String,
    },

    /// A claim check failed (issuer, subject, audience, timing, algorithm,
    /// or mandatory-claim presence).
    #[error("claim validation failed: {reason}")]
    ClaimRejected {
        /// Which check failed and why
        reason: String,
    },

    /// The assertion's jti was already consumed under reuse prevention.
    #[error("client assertion jti '{jwt_id}' has already been used")]
    ReplayRejected {
        /// The replayed JWT ID
        jwt_id: String,
    },

    /// The replay store failed; validation cannot complete safely.
    #[error("replay store unavailable: {0}")]
    Storage(StoreError),
}

impl AuthnError {
    /// Shorthand for a claim rejection with a formatted reason.
    pub(crate) fn claim(reason: impl Into<String>) -> Self {
        Self::ClaimRejected {
            reason: reason.into(),
        }
    }

    /// Shorthand for a structural rejection.
    pub(crate) fn structural(reason: impl Into<String>) -> Self {
        Self::Structural {
            reason: reason.into(),
        }
    }

    /// True when the failure is a storage fault rather than a verdict on the
    /// assertion itself. Such failures must fail closed.
    #[must_use]
    pub fn is_system_failure(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<StoreError> for AuthnError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReplayDetected { jwt_id } => Self::ReplayRejected { jwt_id },
            // A raw duplicate at this level is a lost at-most-once race.
            StoreError::Duplicate => Self::ReplayRejected {
                jwt_id: String::new(),
            },
            other => Self::Storage(other),
        }
    }
}
