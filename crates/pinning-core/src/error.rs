//! Error types for pin issuance

use thiserror::Error;

/// Result type alias using PinningError
pub type Result<T> = std::result::Result<T, PinningError>;

/// Errors that can occur while hashing, signing, or verifying pins
#[derive(Error, Debug)]
pub enum PinningError {
    /// Certificate could not be parsed as DER X.509
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Signing key could not be loaded or is of an unsupported type
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing the claim set failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Signature did not verify against the claims
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Envelope does not have the expected shape
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Key identifier in the envelope does not match the verifying key
    #[error("Key ID mismatch: expected '{expected}', got '{actual}'")]
    KeyIdMismatch { expected: String, actual: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ed25519_dalek::SignatureError> for PinningError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        PinningError::SignatureInvalid(err.to_string())
    }
}

impl From<serde_json::Error> for PinningError {
    fn from(err: serde_json::Error) -> Self {
        PinningError::SerializationError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for PinningError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature => PinningError::SignatureInvalid(err.to_string()),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                PinningError::MalformedEnvelope(err.to_string())
            }
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                PinningError::InvalidKey(err.to_string())
            }
            _ => PinningError::SignatureInvalid(err.to_string()),
        }
    }
}

impl From<x509_cert::der::Error> for PinningError {
    fn from(err: x509_cert::der::Error) -> Self {
        PinningError::InvalidCertificate(err.to_string())
    }
}
