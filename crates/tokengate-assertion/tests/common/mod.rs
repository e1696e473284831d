//! Shared fixtures for assertion validation tests.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use tokengate_assertion::{
    AssertionValidator, StaticKeyResolver, ValidatorConfig,
};
use tokengate_jti::ReplayStore;

pub const CLIENT_ID: &str = "KrVLov4Bl3natUksF2HmWsdw684a";
pub const TOKEN_ENDPOINT: &str = "https://as.example.com/oauth2/token";
pub const PAR_ENDPOINT: &str = "https://as.example.com/oauth2/par";

const RSA_PRIVATE: &str = include_str!("../keys/rsa_private.pem");
const RSA_PUBLIC: &str = include_str!("../keys/rsa_public.pem");
const EC_PRIVATE: &str = include_str!("../keys/ec_private.pem");
const EC_PUBLIC: &str = include_str!("../keys/ec_public.pem");

pub fn rsa_signing_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(RSA_PRIVATE.as_bytes()).unwrap()
}

pub fn rsa_verification_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(RSA_PUBLIC.as_bytes()).unwrap()
}

pub fn ec_signing_key() -> EncodingKey {
    EncodingKey::from_ec_pem(EC_PRIVATE.as_bytes()).unwrap()
}

pub fn ec_verification_key() -> DecodingKey {
    DecodingKey::from_ec_pem(EC_PUBLIC.as_bytes()).unwrap()
}

/// A fresh, well-formed claim set for `CLIENT_ID`, valid for five minutes.
pub fn base_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": CLIENT_ID,
        "sub": CLIENT_ID,
        "aud": TOKEN_ENDPOINT,
        "exp": now + 300,
        "iat": now,
        "jti": Uuid::new_v4().to_string(),
    })
}

pub fn sign(claims: &Value, algorithm: Algorithm, key: &EncodingKey) -> String {
    encode(&Header::new(algorithm), claims, key).unwrap()
}

/// RS256-signed assertion over `claims` with the RSA test key.
pub fn rs256_assertion(claims: &Value) -> String {
    sign(claims, Algorithm::RS256, &rsa_signing_key())
}

pub fn config() -> ValidatorConfig {
    ValidatorConfig::new(TOKEN_ENDPOINT).with_par_endpoint(PAR_ENDPOINT)
}

/// Validator knowing the RSA and EC test keys for `CLIENT_ID`.
pub fn validator(store: Arc<dyn ReplayStore>) -> AssertionValidator<StaticKeyResolver> {
    let resolver = StaticKeyResolver::new().with_key(CLIENT_ID, rsa_verification_key());
    AssertionValidator::new(resolver, store, config())
}
