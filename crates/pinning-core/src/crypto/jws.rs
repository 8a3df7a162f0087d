//! Compact JWS envelopes (ES256)
//!
//! Claims travel in a JWT payload signed with ECDSA P-256 over SHA-256. The
//! protected header carries `alg` and `kid`, so the signature binds header and
//! payload together and the whole envelope is one opaque string.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::KeyId;
use crate::claims::{from_unix, ClaimSet};
use crate::error::{PinningError, Result};
use crate::pin::Pin;

/// Response body for the compact scheme: `{ "jws": "<token>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactEnvelope {
    pub jws: String,
}

/// JWT payload
#[derive(Debug, Serialize, Deserialize)]
struct PinClaims {
    domain: String,
    pins: Vec<Pin>,
    iat: i64,
    exp: i64,
    ttl_seconds: u64,
}

impl From<&ClaimSet> for PinClaims {
    fn from(claims: &ClaimSet) -> Self {
        Self {
            domain: claims.domain.clone(),
            pins: claims.pins.clone(),
            iat: claims.created(),
            exp: claims.expires(),
            ttl_seconds: claims.ttl_seconds,
        }
    }
}

/// ES256 signing key
pub struct JwsSigner {
    encoding_key: EncodingKey,
    public_key_der: Vec<u8>,
    verifier: JwsVerifier,
}

impl std::fmt::Debug for JwsSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwsSigner")
            .field("kid", self.key_id())
            .field("encoding_key", &"[redacted]")
            .finish()
    }
}

impl JwsSigner {
    /// Create a signer from a P-256 secret key
    pub fn from_secret_key(secret: &SecretKey) -> Result<Self> {
        let pkcs8 = secret
            .to_pkcs8_der()
            .map_err(|e| PinningError::InvalidKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_ec_der(pkcs8.as_bytes());

        let public = secret.public_key();
        let public_key_der = public
            .to_public_key_der()
            .map_err(|e| PinningError::InvalidKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        let key_id = KeyId::from_public_key_der(&public_key_der);
        let verifier = JwsVerifier::from_public_key(&public, key_id)?;

        Ok(Self {
            encoding_key,
            public_key_der,
            verifier,
        })
    }

    /// Load a P-256 key from PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        let secret = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| PinningError::InvalidKey(format!("not a P-256 key: {}", e)))?;
        Self::from_secret_key(&secret)
    }

    /// Generate a fresh random key
    pub fn generate() -> Result<Self> {
        Self::from_secret_key(&SecretKey::random(&mut OsRng))
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
    pub fn verifier(&self) -> JwsVerifier {
        self.verifier.clone()
    }

    /// Sign a claim set into a compact token
    pub fn sign(&self, claims: &ClaimSet) -> Result<CompactEnvelope> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id().to_string());

        let jws = encode(&header, &PinClaims::from(claims), &self.encoding_key)
            .map_err(|e| PinningError::SigningFailed(e.to_string()))?;

        Ok(CompactEnvelope { jws })
    }
}

/// ES256 verification key
#[derive(Clone)]
pub struct JwsVerifier {
    key_id: KeyId,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwsVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwsVerifier")
            .field("kid", &self.key_id)
            .finish()
    }
}

impl JwsVerifier {
    /// Create a verifier from a P-256 public key
    pub fn from_public_key(public: &PublicKey, key_id: KeyId) -> Result<Self> {
        let point = public.to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| PinningError::InvalidKey("public key is the identity point".into()))?;
        let y = point
            .y()
            .ok_or_else(|| PinningError::InvalidKey("public key is compressed".into()))?;

        let decoding_key =
            DecodingKey::from_ec_components(&URL_SAFE_NO_PAD.encode(x), &URL_SAFE_NO_PAD.encode(y))?;

        Ok(Self {
            key_id,
            decoding_key,
        })
    }

    /// Fingerprint of the public key
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Verify a compact token and return its claims
    ///
    /// Fails on a bad signature, a foreign `kid`, an expired token, or an
    /// `exp`/`iat`/`ttl_seconds` triple that does not add up.
    pub fn verify(&self, envelope: &CompactEnvelope) -> Result<ClaimSet> {
        let header = decode_header(&envelope.jws)?;
        if header.alg != Algorithm::ES256 {
            return Err(PinningError::SignatureInvalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let kid = header.kid.unwrap_or_default();
        if kid != self.key_id.as_str() {
            return Err(PinningError::KeyIdMismatch {
                expected: self.key_id.to_string(),
                actual: kid,
            });
        }

        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_required_spec_claims(&["exp", "iat"]);

        let claims = decode::<PinClaims>(&envelope.jws, &self.decoding_key, &validation)?.claims;

        if claims.exp - claims.iat != claims.ttl_seconds as i64 {
            return Err(PinningError::MalformedEnvelope(
                "exp - iat does not equal ttl_seconds".into(),
            ));
        }

        Ok(ClaimSet {
            domain: claims.domain,
            pins: claims.pins,
            issued_at: from_unix(claims.iat)?,
            expires_at: from_unix(claims.exp)?,
            ttl_seconds: claims.ttl_seconds,
            key_id: self.key_id.clone(),
        })
    }
}
