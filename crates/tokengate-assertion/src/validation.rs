//! Claim validation
//!
//! Pure functions over a parsed, already signature-verified assertion plus a
//! policy snapshot. Checks run in a fixed order and short-circuit on the
//! first failure; every failure maps to [`AuthnError::ClaimRejected`]. All
//! timing comparisons use UTC epoch milliseconds.

use jsonwebtoken::Algorithm;
use tracing::debug;

use crate::claims::AssertionClaims;
use crate::error::AuthnError;
use crate::policy::{SecurityProfile, ValidationPolicy, ValidatorConfig};

const MILLIS_PER_MINUTE: i64 = 60 * 1_000;

/// Whether `algorithm` is HMAC-based. Shared-secret signatures cannot prove
/// possession of a client's private key and are never accepted.
#[must_use]
pub fn is_symmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Validate the assertion's claims against the resolved policy.
///
/// `client_id` is the client identifier the deployment resolved for this
/// request; `now_millis` is the single time snapshot used by every check.
///
/// # Errors
/// [`AuthnError::ClaimRejected`] naming the first failing check.
pub fn validate_claims(
    claims: &AssertionClaims,
    algorithm: Algorithm,
    client_id: &str,
    policy: &ValidationPolicy,
    config: &ValidatorConfig,
    now_millis: i64,
) -> Result<(), AuthnError> {
    check_presence(claims, policy)?;
    check_issuer(claims, client_id, policy)?;
    check_subject(claims, client_id)?;
    check_audience(claims, policy, config)?;
    check_expiry(claims, policy, now_millis)?;
    check_not_before_and_age(claims, policy, now_millis)?;
    check_algorithm(algorithm, policy, config)?;
    debug!(client_id, jti = claims.jti.as_deref(), "assertion claims valid");
    Ok(())
}

fn check_presence(claims: &AssertionClaims, policy: &ValidationPolicy) -> Result<(), AuthnError> {
    for required in ["iss", "sub", "jti", "exp"] {
        if !claims.has_non_empty_claim(required) {
            return Err(AuthnError::claim(format!(
                "mandatory claim '{required}' is missing or empty"
            )));
        }
    }
    for required in &policy.mandatory_claims {
        if !claims.has_non_empty_claim(required) {
            return Err(AuthnError::claim(format!(
                "configured mandatory claim '{required}' is missing or empty"
            )));
        }
    }
    Ok(())
}

fn check_issuer(
    claims: &AssertionClaims,
    client_id: &str,
    policy: &ValidationPolicy,
) -> Result<(), AuthnError> {
    let issuer = claims.iss.as_deref().unwrap_or_default();
    let expected = policy.issuer.as_deref().unwrap_or(client_id);
    if issuer != expected {
        return Err(AuthnError::claim(format!(
            "issuer '{issuer}' does not match expected '{expected}'"
        )));
    }
    Ok(())
}

fn check_subject(claims: &AssertionClaims, client_id: &str) -> Result<(), AuthnError> {
    let subject = claims.sub.as_deref().unwrap_or_default();
    if subject != client_id {
        return Err(AuthnError::claim(format!(
            "subject '{subject}' does not match client '{client_id}'"
        )));
    }
    Ok(())
}

fn check_audience(
    claims: &AssertionClaims,
    policy: &ValidationPolicy,
    config: &ValidatorConfig,
) -> Result<(), AuthnError> {
    let mut accepted: Vec<&str> = vec![config.token_endpoint_url.as_str()];
    if let Some(alias) = policy.token_endpoint_alias.as_deref() {
        accepted.push(alias);
    }
    if let Some(par) = config.par_endpoint_url.as_deref() {
        accepted.push(par);
    }
    if policy.mtls_enabled {
        if let Some(mtls) = config.mtls_token_endpoint_url.as_deref() {
            accepted.push(mtls);
        }
    }
    if let Some(custom) = policy.audience.as_deref() {
        accepted.push(custom);
    }

    let matched = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.matches_any(&accepted));
    if !matched {
        return Err(AuthnError::claim(
            "audience does not include any accepted endpoint value",
        ));
    }
    Ok(())
}

fn check_expiry(
    claims: &AssertionClaims,
    policy: &ValidationPolicy,
    now_millis: i64,
) -> Result<(), AuthnError> {
    // Presence was already established.
    let exp = claims.exp_millis().unwrap_or_default();
    if exp <= now_millis {
        return Err(AuthnError::claim("assertion has expired"));
    }
    // An assertion claiming validity far beyond the configured window is
    // rejected outright rather than silently truncated.
    let ceiling = now_millis + policy.validity_period_minutes * MILLIS_PER_MINUTE;
    if exp > ceiling {
        return Err(AuthnError::claim(format!(
            "expiry exceeds the allowed validity period of {} minutes",
            policy.validity_period_minutes
        )));
    }
    Ok(())
}

fn check_not_before_and_age(
    claims: &AssertionClaims,
    policy: &ValidationPolicy,
    now_millis: i64,
) -> Result<(), AuthnError> {
    if let Some(nbf) = claims.nbf_millis() {
        if now_millis < nbf {
            return Err(AuthnError::claim("assertion is not yet valid (nbf)"));
        }
    }
    // Independent age bound: even a not-yet-expired assertion is rejected
    // once older than the configured window, capping long-lived replays.
    if let Some(reject_before) = policy.reject_before_minutes {
        if let Some(iat) = claims.iat_millis() {
            if iat < now_millis - reject_before * MILLIS_PER_MINUTE {
                return Err(AuthnError::claim(format!(
                    "assertion is older than {reject_before} minutes"
                )));
            }
        }
    }
    Ok(())
}

fn check_algorithm(
    algorithm: Algorithm,
    policy: &ValidationPolicy,
    config: &ValidatorConfig,
) -> Result<(), AuthnError> {
    if is_symmetric(algorithm) {
        return Err(AuthnError::claim(
            "symmetric signing algorithms are not accepted for client assertions",
        ));
    }
    if config.security_profile == SecurityProfile::Fapi2
        && !policy.fapi_allowed_signature_algorithms.contains(&algorithm)
    {
        return Err(AuthnError::claim(format!(
            "algorithm {algorithm:?} is not allowed under the FAPI profile"
        )));
    }
    Ok(())
}
