//! # Pinning Core
//!
//! Primitives for issuing signed certificate pin sets to mobile clients.
//!
//! ## Key Concepts
//!
//! - **Pin**: base64 SHA-256 of a certificate's SubjectPublicKeyInfo (RFC 7469)
//! - **Whitelist**: exact hosts and single-level `*.suffix` wildcards that pins
//!   may be served for
//! - **Claim set**: domain, pins, issuance and expiry bound together
//! - **Envelope**: a claim set signed with the service key, either compact
//!   JWS (ES256) or detached (EdDSA)
//!
//! ## Invariants
//!
//! 1. Pin `i` always belongs to certificate `i` of the chain, leaf first
//! 2. A wildcard covers exactly one extra label
//! 3. `expires - created == ttl_seconds` in every envelope

pub mod claims;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod pin;

pub use claims::ClaimSet;
pub use crypto::{
    CompactEnvelope, DetachedEnvelope, KeyId, SignedEnvelope, Signer, SigningAlgorithm, Verifier,
};
pub use domain::{is_ip_literal, normalize, DomainMatcher, DomainPattern};
pub use error::{PinningError, Result};
pub use pin::{batch, compute_spki_hash, pin_count, Certificate, CertificateChain, Pin};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}
