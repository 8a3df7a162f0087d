//! Certificate retrieval
//!
//! A `CertificateSource` turns a domain into the certificate chain its server
//! presents. Production uses a live TLS handshake (`TlsCertificateSource`),
//! optionally wrapped in a TTL cache (`CachedCertificateSource`); tests use
//! canned chains (`FakeCertificateSource`). All three are interchangeable
//! behind the trait.

pub mod cache;
pub mod fake;
pub mod tls;

pub use cache::{CachedCertificateSource, CertificateCache};
pub use fake::FakeCertificateSource;
pub use tls::TlsCertificateSource;

use async_trait::async_trait;
use pinning_core::CertificateChain;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a certificate chain
///
/// Every variant is transient from the caller's point of view: the target may
/// be reachable later. Nothing here is retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("timed out after {timeout:?} fetching certificates for {domain}")]
    Timeout { domain: String, timeout: Duration },

    #[error("failed to connect to {domain}: {message}")]
    Connect { domain: String, message: String },

    #[error("TLS handshake with {domain} failed: {message}")]
    Handshake { domain: String, message: String },

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("{0} presented no certificates")]
    EmptyChain(String),

    #[error("unparseable certificate from {domain}: {message}")]
    InvalidCertificate { domain: String, message: String },

    #[error("certificate retrieval failed: {0}")]
    Other(String),
}

/// Capability to fetch the chain a domain presents, leaf first
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the certificate chain for `domain`
    ///
    /// `domain` is already normalized (trimmed, lowercase). A successful chain
    /// is never empty.
    async fn get_chain(&self, domain: &str) -> Result<Arc<CertificateChain>, RetrievalError>;
}

#[async_trait]
impl<S> CertificateSource for Arc<S>
where
    S: CertificateSource + ?Sized,
{
    async fn get_chain(&self, domain: &str) -> Result<Arc<CertificateChain>, RetrievalError> {
        (**self).get_chain(domain).await
    }
}
