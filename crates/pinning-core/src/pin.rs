//! SPKI pin computation
//!
//! A pin is `base64(SHA-256(SubjectPublicKeyInfo))`, the RFC 7469
//! `pin-sha256` format that mobile pinning libraries verify against. Only the
//! DER-encoded SPKI (algorithm identifier plus key bits) is hashed, never the
//! whole certificate, so a pin survives certificate renewal with the same key.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use x509_cert::der::{Decode, Encode};

use crate::error::Result;

/// A DER-encoded X.509 certificate with its SPKI extracted
///
/// Parsing happens once at construction, so hashing a `Certificate` cannot fail.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    spki_der: Vec<u8>,
    subject: String,
}

impl Certificate {
    /// Parse a DER-encoded certificate
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        let parsed = x509_cert::Certificate::from_der(&der)?;
        let spki_der = parsed.tbs_certificate.subject_public_key_info.to_der()?;
        let subject = parsed.tbs_certificate.subject.to_string();

        Ok(Self {
            der,
            spki_der,
            subject,
        })
    }

    /// The full certificate DER
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The DER-encoded SubjectPublicKeyInfo
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Subject distinguished name (RFC 4514 form)
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// Certificates presented by a server, leaf first
///
/// Order is exactly as negotiated; the chain is never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    /// Create a chain from leaf-first certificates
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    /// The leaf certificate, if any
    pub fn leaf(&self) -> Option<&Certificate> {
        self.certificates.first()
    }

    /// Number of certificates in the chain
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// True if the chain holds no certificates
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Iterate leaf first
    pub fn iter(&self) -> std::slice::Iter<'_, Certificate> {
        self.certificates.iter()
    }

    /// Borrow the certificates as a slice
    pub fn as_slice(&self) -> &[Certificate] {
        &self.certificates
    }
}

impl From<Vec<Certificate>> for CertificateChain {
    fn from(certificates: Vec<Certificate>) -> Self {
        Self::new(certificates)
    }
}

impl<'a> IntoIterator for &'a CertificateChain {
    type Item = &'a Certificate;
    type IntoIter = std::slice::Iter<'a, Certificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.iter()
    }
}

/// Base64-encoded SHA-256 digest of one certificate's SPKI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Wrap an already-encoded pin value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The encoded pin
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as an HPKP-style directive: `pin-sha256="..."`
    pub fn to_directive(&self) -> String {
        format!("pin-sha256=\"{}\"", self.0)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

/// Hash one certificate's SPKI into a pin
pub fn compute_spki_hash(cert: &Certificate) -> Pin {
    let digest = Sha256::digest(cert.spki_der());
    Pin(STANDARD.encode(digest))
}

/// Pin the first `count` certificates of a chain, preserving order
///
/// Pin `i` always corresponds to chain certificate `i`. A `count` larger than
/// the chain simply pins every certificate.
pub fn batch(chain: &CertificateChain, count: usize) -> Vec<Pin> {
    chain.iter().take(count).map(compute_spki_hash).collect()
}

/// How many leading certificates to pin
///
/// Leaf only by default. Backup pins add the first intermediate when the chain
/// has one, and silently fall back to the leaf otherwise.
pub fn pin_count(chain_len: usize, include_backup_pins: bool) -> usize {
    if include_backup_pins && chain_len >= 2 {
        2
    } else {
        1
    }
}
