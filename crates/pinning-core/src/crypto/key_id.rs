//! Short public-key fingerprints

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the SHA-256 of the public key
pub const KEY_ID_LEN: usize = 8;

/// Fingerprint of a signing public key
///
/// First eight hex characters of SHA-256 over the DER SubjectPublicKeyInfo.
/// Lets clients pick the right verification key during rotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Derive the key ID from a DER-encoded SubjectPublicKeyInfo
    pub fn from_public_key_der(public_key_der: &[u8]) -> Self {
        let digest = hex::encode(Sha256::digest(public_key_der));
        Self(digest[..KEY_ID_LEN].to_string())
    }

    /// The hex fingerprint
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for KeyId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_shape() {
        let kid = KeyId::from_public_key_der(b"some public key");

        assert_eq!(kid.as_str().len(), KEY_ID_LEN);
        assert!(kid.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_id_deterministic() {
        assert_eq!(
            KeyId::from_public_key_der(b"key"),
            KeyId::from_public_key_der(b"key")
        );
        assert_ne!(
            KeyId::from_public_key_der(b"key-a"),
            KeyId::from_public_key_der(b"key-b")
        );
    }

    #[test]
    fn test_key_id_is_sha256_prefix() {
        let kid = KeyId::from_public_key_der(b"");
        // SHA-256 of the empty string starts with e3b0c442
        assert_eq!(kid.as_str(), "e3b0c442");
    }
}
