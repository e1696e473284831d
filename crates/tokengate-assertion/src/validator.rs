//! Assertion validation pipeline
//!
//! [`AssertionValidator`] runs the full private_key_jwt flow: structural
//! parse, key resolution, signature verification, claim checks, then replay
//! bookkeeping against the JTI store. The ordering matters — nothing touches
//! the replay store until the assertion itself has been accepted, so a
//! rejected token never consumes its jti.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{debug, warn};

use tokengate_jti::{JtiCache, JtiEntry, ReplayStore};

use crate::claims::AssertionClaims;
use crate::error::AuthnError;
use crate::policy::{ValidationPolicy, ValidatorConfig};
use crate::resolver::KeyResolver;
use crate::validation::{is_symmetric, validate_claims};

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedAssertion {
    /// The authenticated client identifier (the assertion's `sub`)
    pub client_id: String,
    /// The consumed JWT ID
    pub jwt_id: String,
    /// Signing algorithm the assertion carried
    pub algorithm: Algorithm,
    /// Expiry in epoch milliseconds
    pub expires_at: i64,
    /// The full verified claim set
    pub claims: AssertionClaims,
}

/// Validates client assertions end to end.
pub struct AssertionValidator<R: KeyResolver> {
    resolver: R,
    store: Arc<dyn ReplayStore>,
    cache: JtiCache,
    config: ValidatorConfig,
}

impl<R: KeyResolver> AssertionValidator<R> {
    pub fn new(resolver: R, store: Arc<dyn ReplayStore>, config: ValidatorConfig) -> Self {
        Self {
            resolver,
            store,
            cache: JtiCache::default(),
            config,
        }
    }

    /// Replace the advisory jti cache, e.g. to bound its capacity.
    #[must_use]
    pub fn with_cache(mut self, cache: JtiCache) -> Self {
        self.cache = cache;
        self
    }

    /// Validate `assertion` under `policy` for tenant `tenant_id`.
    ///
    /// On success the assertion's jti has been recorded in the replay store
    /// and the same token cannot authenticate again while it is unexpired
    /// (when `policy.prevent_token_reuse` is set).
    ///
    /// # Errors
    /// Any [`AuthnError`]; callers deciding pass/fail should treat
    /// [`AuthnError::is_system_failure`] errors as server faults, not as a
    /// verdict on the client.
    pub async fn validate(
        &self,
        assertion: &str,
        policy: &ValidationPolicy,
        tenant_id: i32,
    ) -> Result<ValidatedAssertion, AuthnError> {
        if assertion.trim().is_empty() {
            return Err(AuthnError::structural("assertion is empty"));
        }

        let header = decode_header(assertion)
            .map_err(|e| AuthnError::structural(format!("unreadable JOSE header: {e}")))?;

        // Claims are parsed without verification first: the subject names the
        // client, and the client names the key. Nothing from this parse is
        // trusted until the signature check below passes.
        let unverified = AssertionClaims::parse_unverified(assertion)?;
        let client_id = unverified
            .sub
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthnError::structural("assertion carries no subject"))?;

        // Reject shared-secret algorithms before resolving any key material.
        if is_symmetric(header.alg) {
            return Err(AuthnError::claim(
                "symmetric signing algorithms are not accepted for client assertions",
            ));
        }

        let key = self
            .resolver
            .resolve_signing_key(&client_id, tenant_id)
            .await?;

        let claims = verify_signature(assertion, header.alg, &key)?;
        let now = Utc::now().timestamp_millis();

        validate_claims(&claims, header.alg, &client_id, policy, &self.config, now)?;

        // Presence of jti and exp was established by the claim checks.
        let jwt_id = claims.jti.clone().unwrap_or_default();
        let exp_millis = claims.exp_millis().unwrap_or_default();
        self.check_replay(&jwt_id, tenant_id, exp_millis, policy, now)
            .await?;

        debug!(
            client_id,
            jwt_id,
            tenant_id,
            algorithm = ?header.alg,
            "client assertion accepted"
        );

        Ok(ValidatedAssertion {
            client_id,
            jwt_id,
            algorithm: header.alg,
            expires_at: exp_millis,
            claims,
        })
    }

    /// Convenience wrapper collapsing the verdict to a boolean.
    ///
    /// Policy rejections come back as `Ok(false)` with a warning logged;
    /// storage faults stay errors so the caller fails closed.
    pub async fn is_valid_assertion(
        &self,
        assertion: &str,
        policy: &ValidationPolicy,
        tenant_id: i32,
    ) -> Result<bool, AuthnError> {
        match self.validate(assertion, policy, tenant_id).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_system_failure() => Err(err),
            Err(err) => {
                warn!(error = %err, "client assertion rejected");
                Ok(false)
            }
        }
    }

    async fn check_replay(
        &self,
        jwt_id: &str,
        tenant_id: i32,
        exp_millis: i64,
        policy: &ValidationPolicy,
        now: i64,
    ) -> Result<(), AuthnError> {
        if policy.enable_jti_cache {
            if let Some(cached_exp) = self.cache.get(jwt_id, tenant_id) {
                if cached_exp > now && policy.prevent_token_reuse {
                    return Err(AuthnError::ReplayRejected {
                        jwt_id: jwt_id.to_owned(),
                    });
                }
                if cached_exp <= now {
                    self.cache.invalidate(jwt_id, tenant_id);
                }
            }
        }

        let entry = JtiEntry::new(jwt_id, tenant_id, exp_millis, now);
        self.store
            .record(&entry, policy.prevent_token_reuse)
            .await?;

        if policy.enable_jti_cache {
            self.cache.put(jwt_id, tenant_id, exp_millis);
        }
        Ok(())
    }
}

/// Verify the signature and deserialize the claim set.
///
/// All temporal and audience checks are disabled here; the claim validator
/// owns them, against a single time snapshot, with richer rejection reasons.
fn verify_signature(
    assertion: &str,
    algorithm: Algorithm,
    key: &jsonwebtoken::DecodingKey,
) -> Result<AssertionClaims, AuthnError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims::<&str>(&[]);

    decode::<AssertionClaims>(assertion, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthnError::Signature {
            reason: e.to_string(),
        })
}
