//! Parsed assertion claim set

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::AuthnError;

/// The `aud` claim: a single value or a list (RFC 7519 permits both).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudienceClaim {
    /// Single audience value
    One(String),
    /// Multiple audience values
    Many(Vec<String>),
}

impl AudienceClaim {
    /// Whether any claimed audience appears in `accepted`.
    #[must_use]
    pub fn matches_any(&self, accepted: &[&str]) -> bool {
        match self {
            Self::One(value) => accepted.contains(&value.as_str()),
            Self::Many(values) => values
                .iter()
                .any(|value| accepted.contains(&value.as_str())),
        }
    }
}

/// Claim set of a client assertion.
///
/// Numeric date claims are epoch seconds as on the wire; the millisecond
/// accessors are what the validator compares against, since all timing
/// arithmetic runs in UTC epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer - the client id, or a configured custom issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject - the client authenticating itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience - the token endpoint (or an accepted alias)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<AudienceClaim>,

    /// Expiration time, epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before time, epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at time, epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// JWT ID, the replay-detection key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Any additional claims
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl AssertionClaims {
    /// Parse the claim set out of a compact JWS without verifying the
    /// signature.
    ///
    /// Used only to discover the asserted client before key resolution; the
    /// result must not be trusted until [`jsonwebtoken::decode`] has verified
    /// the token. Any structural defect is a [`AuthnError::Structural`].
    pub fn parse_unverified(assertion: &str) -> Result<Self, AuthnError> {
        let parts: Vec<&str> = assertion.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(AuthnError::structural(
                "expected a three-part compact JWS",
            ));
        }
        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|err| AuthnError::structural(format!("payload is not base64url: {err}")))?;
        serde_json::from_slice(&payload)
            .map_err(|err| AuthnError::structural(format!("claim set is not valid JSON: {err}")))
    }

    /// `exp` in epoch milliseconds.
    #[must_use]
    pub fn exp_millis(&self) -> Option<i64> {
        self.exp.map(|seconds| seconds.saturating_mul(1_000))
    }

    /// `nbf` in epoch milliseconds.
    #[must_use]
    pub fn nbf_millis(&self) -> Option<i64> {
        self.nbf.map(|seconds| seconds.saturating_mul(1_000))
    }

    /// `iat` in epoch milliseconds.
    #[must_use]
    pub fn iat_millis(&self) -> Option<i64> {
        self.iat.map(|seconds| seconds.saturating_mul(1_000))
    }

    /// Whether a claim is present with a non-empty value.
    ///
    /// Standard claims are checked against their typed fields; anything else
    /// against the additional-claims map. Empty strings, empty arrays, and
    /// JSON null all count as absent.
    #[must_use]
    pub fn has_non_empty_claim(&self, name: &str) -> bool {
        match name {
            "iss" => self.iss.as_deref().is_some_and(|v| !v.is_empty()),
            "sub" => self.sub.as_deref().is_some_and(|v| !v.is_empty()),
            "jti" => self.jti.as_deref().is_some_and(|v| !v.is_empty()),
            "aud" => match &self.aud {
                Some(AudienceClaim::One(value)) => !value.is_empty(),
                Some(AudienceClaim::Many(values)) => !values.is_empty(),
                None => false,
            },
            "exp" => self.exp.is_some(),
            "nbf" => self.nbf.is_some(),
            "iat" => self.iat.is_some(),
            other => match self.additional.get(other) {
                Some(serde_json::Value::Null) => false,
                Some(serde_json::Value::String(value)) => !value.is_empty(),
                Some(serde_json::Value::Array(values)) => !values.is_empty(),
                Some(_) => true,
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_payload_without_verification() {
        // Unsigned structure is enough here; the signature part is garbage.
        let payload = serde_json::json!({
            "iss": "client-1",
            "sub": "client-1",
            "aud": ["https://as.example.com/oauth2/token"],
            "exp": 1_700_000_000,
            "jti": "abc-123",
            "custom": "value",
        });
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let jws = format!("eyJhbGciOiJSUzI1NiJ9.{encoded}.c2ln");

        let claims = AssertionClaims::parse_unverified(&jws).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("client-1"));
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.exp_millis(), Some(1_700_000_000_000));
        assert!(claims.has_non_empty_claim("custom"));
        assert!(!claims.has_non_empty_claim("missing"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["", "one.two", "a.b.c.d", "..", "x.!!!.y"] {
            assert!(matches!(
                AssertionClaims::parse_unverified(bad),
                Err(AuthnError::Structural { .. })
            ));
        }
    }

    #[test]
    fn audience_accepts_one_or_many() {
        let one = AudienceClaim::One("https://as/token".into());
        assert!(one.matches_any(&["https://as/token", "alias"]));
        assert!(!one.matches_any(&["https://other/token"]));

        let many = AudienceClaim::Many(vec!["a".into(), "b".into()]);
        assert!(many.matches_any(&["b"]));
        assert!(!many.matches_any(&["c"]));
        assert!(!AudienceClaim::Many(Vec::new()).matches_any(&["a"]));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let claims: AssertionClaims = serde_json::from_value(serde_json::json!({
            "iss": "",
            "sub": "client-1",
            "aud": [],
            "empty": "",
            "null": null,
        }))
        .unwrap();

        assert!(!claims.has_non_empty_claim("iss"));
        assert!(claims.has_non_empty_claim("sub"));
        assert!(!claims.has_non_empty_claim("aud"));
        assert!(!claims.has_non_empty_claim("empty"));
        assert!(!claims.has_non_empty_claim("null"));
        assert!(!claims.has_non_empty_claim("exp"));
    }
}
