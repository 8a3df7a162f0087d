//! Signing of pin claim sets
//!
//! Two envelope schemes implement the same contract:
//!
//! - **Compact JWS** (`ES256`): claims inside a signed JWT, returned as
//!   `{ "jws": "<token>" }`.
//! - **Detached** (`EdDSA`): claims as plain JSON fields plus a sibling
//!   `signature` over their canonical form.
//!
//! A deployment runs exactly one scheme, chosen by the type of the key it is
//! given: P-256 keys sign compact tokens, Ed25519 keys sign detached envelopes.
//! Claim set construction is shared; only the final encoding differs.
//!
//! Key types:
//! - `Signer`: private key plus scheme, produces `SignedEnvelope`
//! - `Verifier`: public half, checks an envelope and returns its `ClaimSet`
//! - `KeyId`: 8-hex-character public key fingerprint

mod detached;
mod jws;
mod key_id;

pub use detached::{DetachedEnvelope, DetachedSigner, DetachedVerifier};
pub use jws::{CompactEnvelope, JwsSigner, JwsVerifier};
pub use key_id::{KeyId, KEY_ID_LEN};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::claims::ClaimSet;
use crate::error::{PinningError, Result};

/// Signature algorithm of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// ECDSA P-256 with SHA-256, compact JWS
    Es256,
    /// Ed25519, detached signature
    EdDsa,
}

impl SigningAlgorithm {
    /// JOSE algorithm name
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::EdDsa => "EdDSA",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed claim set in one of the two response shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignedEnvelope {
    Compact(CompactEnvelope),
    Detached(DetachedEnvelope),
}

impl SignedEnvelope {
    /// Algorithm the envelope was signed with
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            SignedEnvelope::Compact(_) => SigningAlgorithm::Es256,
            SignedEnvelope::Detached(_) => SigningAlgorithm::EdDsa,
        }
    }
}

/// The process-wide signing key
///
/// Loaded once at startup and shared read-only; signing takes `&self`.
#[derive(Debug)]
pub enum Signer {
    CompactJws(JwsSigner),
    Detached(DetachedSigner),
}

impl Signer {
    /// Load a PEM private key, picking the scheme from the key type
    ///
    /// P-256 (PKCS#8 or SEC1) selects compact JWS; Ed25519 (PKCS#8) selects
    /// the detached scheme. Anything else is rejected.
    pub fn from_pem(pem: &str) -> Result<Self> {
        if let Ok(signer) = JwsSigner::from_pem(pem) {
            return Ok(Signer::CompactJws(signer));
        }
        if let Ok(signer) = DetachedSigner::from_pem(pem) {
            return Ok(Signer::Detached(signer));
        }
        Err(PinningError::InvalidKey(
            "unsupported private key (expected ECDSA P-256 or Ed25519 PEM)".into(),
        ))
    }

    /// Generate a fresh key for the given algorithm
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self> {
        match algorithm {
            SigningAlgorithm::Es256 => Ok(Signer::CompactJws(JwsSigner::generate()?)),
            SigningAlgorithm::EdDsa => Ok(Signer::Detached(DetachedSigner::generate()?)),
        }
    }

    /// Algorithm of this key
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            Signer::CompactJws(_) => SigningAlgorithm::Es256,
            Signer::Detached(_) => SigningAlgorithm::EdDsa,
        }
    }

    /// Fingerprint of the public key
    pub fn key_id(&self) -> &KeyId {
        match self {
            Signer::CompactJws(signer) => signer.key_id(),
            Signer::Detached(signer) => signer.key_id(),
        }
    }

    /// DER SubjectPublicKeyInfo of the public key
    pub fn public_key_der(&self) -> &[u8] {
        match self {
            Signer::CompactJws(signer) => signer.public_key_der(),
            Signer::Detached(signer) => signer.public_key_der(),
        }
    }

    /// The verifying half
    pub fn verifier(&self) -> Verifier {
        match self {
            Signer::CompactJws(signer) => Verifier::Es256(signer.verifier()),
            Signer::Detached(signer) => Verifier::EdDsa(signer.verifier()),
        }
    }

    /// Sign a claim set
    ///
    /// The claim set must name this key; a foreign `key_id` is refused so an
    /// envelope can never advertise a key that did not sign it.
    pub fn sign(&self, claims: &ClaimSet) -> Result<SignedEnvelope> {
        if &claims.key_id != self.key_id() {
            return Err(PinningError::KeyIdMismatch {
                expected: self.key_id().to_string(),
                actual: claims.key_id.to_string(),
            });
        }

        match self {
            Signer::CompactJws(signer) => signer.sign(claims).map(SignedEnvelope::Compact),
            Signer::Detached(signer) => signer.sign(claims).map(SignedEnvelope::Detached),
        }
    }
}

/// Public verification key for either scheme
#[derive(Debug, Clone)]
pub enum Verifier {
    Es256(JwsVerifier),
    EdDsa(DetachedVerifier),
}

impl Verifier {
    /// Fingerprint of the public key
    pub fn key_id(&self) -> &KeyId {
        match self {
            Verifier::Es256(verifier) => verifier.key_id(),
            Verifier::EdDsa(verifier) => verifier.key_id(),
        }
    }

    /// Verify an envelope and return the claims it carries
    pub fn verify(&self, envelope: &SignedEnvelope) -> Result<ClaimSet> {
        match (self, envelope) {
            (Verifier::Es256(verifier), SignedEnvelope::Compact(compact)) => verifier.verify(compact),
            (Verifier::EdDsa(verifier), SignedEnvelope::Detached(detached)) => {
                verifier.verify(detached)
            }
            _ => Err(PinningError::MalformedEnvelope(format!(
                "{} envelope cannot be verified with this key",
                envelope.algorithm()
            ))),
        }
    }
}
