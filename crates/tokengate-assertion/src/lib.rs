//! # tokengate-assertion - private_key_jwt client authentication
//!
//! Validation of OAuth2 `private_key_jwt` client assertions (RFC 7523 JWT
//! Bearer client authentication) presented at a token endpoint. A client
//! authenticates by signing a JWT with its registered key; this crate applies
//! the ordered structural, cryptographic, and claim checks, including
//! FAPI-mode tightening, and prevents replay of previously-used assertions
//! through the [`tokengate_jti`] replay store.
//!
//! ## Architecture
//!
//! - `claims` - the parsed assertion claim set
//! - `policy` - per-client validation policy and deployment configuration
//! - `validation` - pure claim validator over an already-verified assertion
//! - `resolver` - key-resolution seam towards the client registry
//! - `validator` - the orchestrating [`AssertionValidator`]
//! - `error` - rejection taxonomy, distinguishing policy rejections from
//!   fail-closed storage faults
//!
//! ## Security Notice
//!
//! Client assertions must be asymmetrically signed: HMAC algorithms are
//! rejected unconditionally, since a shared secret cannot prove possession of
//! a client's private key. When the FAPI "2" profile is active the signing
//! algorithm must additionally be on the configured allow-list.

pub mod claims;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod validation;
pub mod validator;

pub use claims::{AssertionClaims, AudienceClaim};
pub use error::AuthnError;
pub use policy::{SecurityProfile, ValidationPolicy, ValidatorConfig};
pub use resolver::{KeyResolver, StaticKeyResolver};
pub use validator::{AssertionValidator, ValidatedAssertion};

/// Assertion validation result type
pub type Result<T> = std::result::Result<T, AuthnError>;

/// `client_assertion_type` value for JWT bearer client authentication (RFC 7523)
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Token request parameter carrying the signed assertion
pub const CLIENT_ASSERTION_PARAM: &str = "client_assertion";

/// Token request parameter carrying the assertion type
pub const CLIENT_ASSERTION_TYPE_PARAM: &str = "client_assertion_type";

/// Default assertion validity window in minutes
pub const DEFAULT_VALIDITY_PERIOD_MINUTES: i64 = 300;
