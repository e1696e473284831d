//! Key resolution
//!
//! The seam between assertion validation and wherever a deployment keeps its
//! registered client keys (database, JWKS cache, config file). The validator
//! only ever asks one question: "what key verifies signatures for this
//! client in this tenant?".

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;

use crate::error::AuthnError;

/// Resolves the registered public key for a client.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Look up the verification key registered for `client_id` in
    /// `tenant_id`.
    ///
    /// # Errors
    /// [`AuthnError::UnknownClient`] when no key is registered. Backends may
    /// surface their own failures through other variants.
    async fn resolve_signing_key(
        &self,
        client_id: &str,
        tenant_id: i32,
    ) -> Result<DecodingKey, AuthnError>;
}

/// In-memory resolver holding a fixed client-to-key map.
///
/// Suitable for tests and single-file deployments; tenancy is ignored, every
/// tenant sees the same registrations.
#[derive(Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeyResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` for `client_id`, replacing any previous registration.
    #[must_use]
    pub fn with_key(mut self, client_id: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(client_id.into(), key);
        self
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve_signing_key(
        &self,
        client_id: &str,
        _tenant_id: i32,
    ) -> Result<DecodingKey, AuthnError> {
        self.keys
            .get(client_id)
            .cloned()
            .ok_or_else(|| AuthnError::UnknownClient {
                client_id: client_id.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_client_is_reported_by_id() {
        let resolver = StaticKeyResolver::new();
        let err = resolver
            .resolve_signing_key("ghost", 1)
            .await
            .unwrap_err();
        match err {
            AuthnError::UnknownClient { client_id } => assert_eq!(client_id, "ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn registered_key_resolves_for_any_tenant() {
        let resolver = StaticKeyResolver::new()
            .with_key("client-a", DecodingKey::from_secret(b"unused"));
        assert!(resolver.resolve_signing_key("client-a", 1).await.is_ok());
        assert!(resolver.resolve_signing_key("client-a", -1234).await.is_ok());
    }
}
