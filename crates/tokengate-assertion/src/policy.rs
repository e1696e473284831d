//! Validation policy and deployment configuration
//!
//! The policy is resolved once per validation call and passed by reference;
//! nothing here is globally mutable. Whatever sources these values (file,
//! admin console, database) is out of scope - only their effect on validation
//! is defined.

use std::collections::HashSet;

use jsonwebtoken::Algorithm;

use crate::DEFAULT_VALIDITY_PERIOD_MINUTES;

/// Deployment-wide security profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityProfile {
    /// Baseline checks only
    #[default]
    Standard,
    /// FAPI profile "2": signing algorithm restricted to the policy allow-list
    Fapi2,
}

/// Per-client (relying party) validation policy snapshot.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Maximum accepted distance of `exp` from now, in minutes
    pub validity_period_minutes: i64,

    /// Explicitly accepted audience value, in addition to the endpoint URLs
    pub audience: Option<String>,

    /// Whether the in-process jti cache fronts the replay store
    pub enable_jti_cache: bool,

    /// Reject any reuse of a still-unexpired jti
    pub prevent_token_reuse: bool,

    /// Maximum assertion age in minutes, judged from `iat`
    pub reject_before_minutes: Option<i64>,

    /// Custom issuer override; when unset the issuer must equal the client id
    pub issuer: Option<String>,

    /// Claims that must be present and non-empty
    pub mandatory_claims: HashSet<String>,

    /// Alternate accepted audience value for the token endpoint
    pub token_endpoint_alias: Option<String>,

    /// Algorithms accepted under the FAPI "2" profile
    pub fapi_allowed_signature_algorithms: Vec<Algorithm>,

    /// Whether mTLS endpoint aliases participate in audience resolution
    pub mtls_enabled: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            validity_period_minutes: DEFAULT_VALIDITY_PERIOD_MINUTES,
            audience: None,
            enable_jti_cache: true,
            prevent_token_reuse: true,
            reject_before_minutes: None,
            issuer: None,
            mandatory_claims: HashSet::new(),
            token_endpoint_alias: None,
            fapi_allowed_signature_algorithms: vec![Algorithm::PS256, Algorithm::ES256],
            mtls_enabled: false,
        }
    }
}

/// Deployment-level validator configuration: the endpoints whose URLs are
/// acceptable audience values, and the active security profile.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Token endpoint URL, the canonical audience
    pub token_endpoint_url: String,

    /// Pushed-authorization-request endpoint URL, if deployed
    pub par_endpoint_url: Option<String>,

    /// mTLS token endpoint URL, accepted when the policy enables mTLS
    pub mtls_token_endpoint_url: Option<String>,

    /// Active security profile
    pub security_profile: SecurityProfile,
}

impl ValidatorConfig {
    /// Configuration for a deployment whose only accepted audience is the
    /// token endpoint URL.
    pub fn new(token_endpoint_url: impl Into<String>) -> Self {
        Self {
            token_endpoint_url: token_endpoint_url.into(),
            par_endpoint_url: None,
            mtls_token_endpoint_url: None,
            security_profile: SecurityProfile::Standard,
        }
    }

    /// Set the PAR endpoint URL.
    #[must_use]
    pub fn with_par_endpoint(mut self, url: impl Into<String>) -> Self {
        self.par_endpoint_url = Some(url.into());
        self
    }

    /// Set the mTLS token endpoint URL.
    #[must_use]
    pub fn with_mtls_endpoint(mut self, url: impl Into<String>) -> Self {
        self.mtls_token_endpoint_url = Some(url.into());
        self
    }

    /// Set the security profile.
    #[must_use]
    pub fn with_security_profile(mut self, profile: SecurityProfile) -> Self {
        self.security_profile = profile;
        self
    }
}
