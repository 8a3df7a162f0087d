//! Detached-signature envelopes (Ed25519)
//!
//! The claims stay readable as plain JSON fields and the signature sits next
//! to them. The signed bytes are the JCS (RFC 8785) canonical form of every
//! field except `signature`, so any client can rebuild them byte for byte.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::{KeyId, SigningAlgorithm};
use crate::claims::{from_unix, ClaimSet};
use crate::error::{PinningError, Result};
use crate::pin::Pin;

/// Response body for the detached scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedEnvelope {
    pub domain: String,
    pub pins: Vec<Pin>,
    /// Issuance time, Unix seconds
    pub created: i64,
    /// Expiry time, Unix seconds
    pub expires: i64,
    pub ttl_seconds: u64,
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub alg: String,
    /// Base64 Ed25519 signature over the canonical form of the other fields
    pub signature: String,
}

/// The fields covered by the signature
#[derive(Serialize)]
struct SignedFields<'a> {
    domain: &'a str,
    pins: &'a [Pin],
    created: i64,
    expires: i64,
    ttl_seconds: u64,
    #[serde(rename = "keyId")]
    key_id: &'a str,
    alg: &'a str,
}

impl<'a> SignedFields<'a> {
    fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_jcs::to_vec(self)?)
    }
}

impl<'a> From<&'a DetachedEnvelope> for SignedFields<'a> {
    fn from(envelope: &'a DetachedEnvelope) -> Self {
        Self {
            domain: &envelope.domain,
            pins: &envelope.pins,
            created: envelope.created,
            expires: envelope.expires,
            ttl_seconds: envelope.ttl_seconds,
            key_id: &envelope.key_id,
            alg: &envelope.alg,
        }
    }
}

/// Ed25519 signing key
pub struct DetachedSigner {
    signing_key: SigningKey,
    public_key_der: Vec<u8>,
    verifier: DetachedVerifier,
}

impl std::fmt::Debug for DetachedSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedSigner")
            .field("kid", self.key_id())
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl DetachedSigner {
    /// Create a signer from an existing Ed25519 key
    pub fn from_signing_key(signing_key: SigningKey) -> Result<Self> {
        let verifying_key = signing_key.verifying_key();
        let public_key_der = verifying_key
            .to_public_key_der()
            .map_err(|e| PinningError::InvalidKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        let key_id = KeyId::from_public_key_der(&public_key_der);

        Ok(Self {
            signing_key,
            public_key_der,
            verifier: DetachedVerifier::new(verifying_key, key_id),
        })
    }

    /// Load an Ed25519 key from PKCS#8 (`PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| PinningError::InvalidKey(format!("not an Ed25519 key: {}", e)))?;
        Self::from_signing_key(signing_key)
    }

    /// Generate a fresh random key
    pub fn generate() -> Result<Self> {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Fingerprint of the public key
    pub fn key_id(&self) -> &KeyId {
        self.verifier.key_id()
    }

    /// DER SubjectPublicKeyInfo of the public key
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// The verifying half
    pub fn verifier(&self) -> DetachedVerifier {
        self.verifier.clone()
    }

    /// Sign a claim set into a detached envelope
    pub fn sign(&self, claims: &ClaimSet) -> Result<DetachedEnvelope> {
        let mut envelope = DetachedEnvelope {
            domain: claims.domain.clone(),
            pins: claims.pins.clone(),
            created: claims.created(),
            expires: claims.expires(),
            ttl_seconds: claims.ttl_seconds,
            key_id: self.key_id().to_string(),
            alg: SigningAlgorithm::EdDsa.as_str().to_string(),
            signature: String::new(),
        };

        let message = SignedFields::from(&envelope).canonical_bytes()?;
        let signature = self.signing_key.sign(&message);
        envelope.signature = STANDARD.encode(signature.to_bytes());

        Ok(envelope)
    }
}

/// Ed25519 verification key
#[derive(Clone)]
pub struct DetachedVerifier {
    key_id: KeyId,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for DetachedVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedVerifier")
            .field("kid", &self.key_id)
            .finish()
    }
}

impl DetachedVerifier {
    /// Create a verifier for a known public key
    pub fn new(verifying_key: VerifyingKey, key_id: KeyId) -> Self {
        Self {
            key_id,
            verifying_key,
        }
    }

    /// Fingerprint of the public key
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Verify a detached envelope and return its claims
    pub fn verify(&self, envelope: &DetachedEnvelope) -> Result<ClaimSet> {
        if envelope.alg != SigningAlgorithm::EdDsa.as_str() {
            return Err(PinningError::SignatureInvalid(format!(
                "unexpected algorithm {}",
                envelope.alg
            )));
        }

        if envelope.key_id != self.key_id.as_str() {
            return Err(PinningError::KeyIdMismatch {
                expected: self.key_id.to_string(),
                actual: envelope.key_id.clone(),
            });
        }

        let signature_bytes = STANDARD.decode(&envelope.signature).map_err(|e| {
            PinningError::MalformedEnvelope(format!("signature is not base64: {}", e))
        })?;
        let signature = Signature::from_slice(&signature_bytes)?;

        let message = SignedFields::from(envelope).canonical_bytes()?;
        self.verifying_key.verify(&message, &signature)?;

        if envelope.expires - envelope.created != envelope.ttl_seconds as i64 {
            return Err(PinningError::MalformedEnvelope(
                "expires - created does not equal ttl_seconds".into(),
            ));
        }

        Ok(ClaimSet {
            domain: envelope.domain.clone(),
            pins: envelope.pins.clone(),
            issued_at: from_unix(envelope.created)?,
            expires_at: from_unix(envelope.expires)?,
            ttl_seconds: envelope.ttl_seconds,
            key_id: self.key_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::EncodePrivateKey;
    use std::time::Duration;

    fn sign_sample(signer: &DetachedSigner) -> DetachedEnvelope {
        let claims = ClaimSet::new(
            "example.com",
            vec![Pin::new("leaf-pin"), Pin::new("intermediate-pin")],
            Duration::from_secs(3600),
            signer.key_id().clone(),
        )
        .unwrap();
        signer.sign(&claims).unwrap()
    }

    #[test]
    fn test_envelope_fields() {
        let signer = DetachedSigner::generate().unwrap();
        let envelope = sign_sample(&signer);

        assert_eq!(envelope.domain, "example.com");
        assert_eq!(envelope.alg, "EdDSA");
        assert_eq!(envelope.key_id, signer.key_id().as_str());
        assert_eq!(envelope.expires - envelope.created, 3600);
        assert_eq!(STANDARD.decode(&envelope.signature).unwrap().len(), 64);
    }

    #[test]
    fn test_json_shape() {
        let signer = DetachedSigner::generate().unwrap();
        let json = serde_json::to_value(sign_sample(&signer)).unwrap();

        for field in ["domain", "pins", "created", "expires", "ttl_seconds", "keyId", "alg", "signature"] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_canonical_bytes_sorted() {
        let signer = DetachedSigner::generate().unwrap();
        let envelope = sign_sample(&signer);

        let bytes = SignedFields::from(&envelope).canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        // JCS orders keys lexicographically and emits no whitespace
        assert!(text.starts_with("{\"alg\":\"EdDSA\",\"created\":"));
        assert!(!text.contains(' '));
        assert!(!text.contains("signature"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let signer = DetachedSigner::generate().unwrap();
        let envelope = sign_sample(&signer);

        let claims = signer.verifier().verify(&envelope).unwrap();

        assert_eq!(claims.domain, "example.com");
        assert_eq!(claims.pins[1].as_str(), "intermediate-pin");
        assert_eq!(claims.ttl_seconds, 3600);
    }

    #[test]
    fn test_every_field_is_covered() {
        let signer = DetachedSigner::generate().unwrap();
        let verifier = signer.verifier();
        let original = sign_sample(&signer);

        let mutations: Vec<Box<dyn Fn(&mut DetachedEnvelope)>> = vec![
            Box::new(|e: &mut DetachedEnvelope| e.domain = "evil.com".into()),
            Box::new(|e: &mut DetachedEnvelope| e.pins[0] = Pin::new("attacker-pin")),
            Box::new(|e: &mut DetachedEnvelope| e.pins.truncate(1)),
            Box::new(|e: &mut DetachedEnvelope| e.created -= 1),
            Box::new(|e: &mut DetachedEnvelope| e.expires += 60),
            Box::new(|e: &mut DetachedEnvelope| e.ttl_seconds = 86400),
        ];

        for mutate in mutations {
            let mut tampered = original.clone();
            mutate(&mut tampered);
            assert!(verifier.verify(&tampered).is_err());
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = DetachedSigner::generate().unwrap();
        let other = DetachedSigner::generate().unwrap();
        let envelope = sign_sample(&signer);

        let err = other.verifier().verify(&envelope).unwrap_err();
        assert!(matches!(err, PinningError::KeyIdMismatch { .. }));
    }

    #[test]
    fn test_forged_key_id_rejected() {
        let signer = DetachedSigner::generate().unwrap();
        let other = DetachedSigner::generate().unwrap();
        let mut envelope = sign_sample(&signer);
        envelope.key_id = other.key_id().to_string();

        assert!(other.verifier().verify(&envelope).is_err());
    }

    #[test]
    fn test_bad_signature_encoding_rejected() {
        let signer = DetachedSigner::generate().unwrap();
        let mut envelope = sign_sample(&signer);
        envelope.signature = "%%%".into();

        let err = signer.verifier().verify(&envelope).unwrap_err();
        assert!(matches!(err, PinningError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_pem_roundtrip_keeps_key_id() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pem = signing_key.to_pkcs8_pem(Default::default()).unwrap();

        let a = DetachedSigner::from_pem(&pem).unwrap();
        let b = DetachedSigner::from_signing_key(signing_key).unwrap();

        assert_eq!(a.key_id(), b.key_id());
        // Ed25519 SPKI is a 12-byte prefix plus the 32-byte key
        assert_eq!(a.public_key_der().len(), 44);
    }
}
