//! Issuance pipeline
//!
//! `Requested → DomainChecked → CertificateFetched → Hashed → Signed`.
//! Every stage either hands a complete value to the next or ends the request
//! with one classified `IssueError`. Nothing is retried and no partial result
//! escapes.

use pinning_core::{
    batch, normalize, pin_count, ClaimSet, DomainMatcher, PinningError, SignedEnvelope, Signer,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cert::{CertificateSource, RetrievalError};

/// Longest host name accepted, per RFC 1035
pub const MAX_DOMAIN_LEN: usize = 253;

/// Caller options for one issuance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Pin the first intermediate as well as the leaf
    pub include_backup_pins: bool,
}

/// Why a domain parameter was refused before the pipeline ran
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("domain is missing")]
    Missing,

    #[error("domain is {0} characters long")]
    TooLong(usize),

    #[error("domain contains invalid characters")]
    InvalidCharacters,
}

/// Classified issuance failure
#[derive(Error, Debug)]
pub enum IssueError {
    /// Missing or malformed domain; the caller can fix and retry
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Domain is not covered by the whitelist; permanent under this config
    #[error("domain not whitelisted: {0}")]
    NotWhitelisted(String),

    /// Target unreachable or handshake failed; safe to retry later
    #[error("certificate retrieval failed for {domain}")]
    Retrieval {
        domain: String,
        #[source]
        source: RetrievalError,
    },

    /// Envelope construction failed; a server fault
    #[error("signing failed")]
    Signing(#[source] PinningError),
}

impl IssueError {
    /// Stable tag for logs
    pub fn tag(&self) -> &'static str {
        match self {
            IssueError::Validation(ValidationError::Missing) => "missing_domain",
            IssueError::Validation(_) => "invalid_domain",
            IssueError::NotWhitelisted(_) => "domain_not_allowed",
            IssueError::Retrieval { .. } => "cert_retrieval_failed",
            IssueError::Signing(_) => "signing_failed",
        }
    }
}

/// Check a raw domain parameter and return its normalized form
///
/// IP literal characters (`:`, `[`, `]`) pass so that address rejection is
/// reported by the whitelist, not here.
pub fn validate_domain(raw: &str) -> Result<String, ValidationError> {
    let domain = normalize(raw);
    if domain.is_empty() {
        return Err(ValidationError::Missing);
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(ValidationError::TooLong(domain.len()));
    }

    let allowed = |c: char| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']')
    };
    if !domain.chars().all(allowed) {
        return Err(ValidationError::InvalidCharacters);
    }

    Ok(domain)
}

/// Orchestrates matcher, certificate source, pin hashing, and signing
pub struct IssuanceService {
    matcher: DomainMatcher,
    source: Arc<dyn CertificateSource>,
    signer: Signer,
    signature_lifetime: Duration,
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("matcher", &self.matcher)
            .field("signer", &self.signer)
            .field("signature_lifetime", &self.signature_lifetime)
            .finish_non_exhaustive()
    }
}

impl IssuanceService {
    /// Assemble the pipeline
    pub fn new(
        matcher: DomainMatcher,
        source: Arc<dyn CertificateSource>,
        signer: Signer,
        signature_lifetime: Duration,
    ) -> Self {
        Self {
            matcher,
            source,
            signer,
            signature_lifetime,
        }
    }

    /// The whitelist
    pub fn matcher(&self) -> &DomainMatcher {
        &self.matcher
    }

    /// The signing key
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Lifetime stamped into each envelope
    pub fn signature_lifetime(&self) -> Duration {
        self.signature_lifetime
    }

    /// Issue a signed pin set for `raw_domain`
    pub async fn issue(
        &self,
        raw_domain: &str,
        options: IssueOptions,
    ) -> Result<SignedEnvelope, IssueError> {
        let domain = validate_domain(raw_domain)?;

        if !self.matcher.is_allowed(&domain) {
            warn!(domain = %domain, "Domain not in whitelist");
            return Err(IssueError::NotWhitelisted(domain));
        }

        let chain = self.source.get_chain(&domain).await.map_err(|source| {
            error!(domain = %domain, error = %source, "Failed to retrieve certificate chain");
            IssueError::Retrieval {
                domain: domain.clone(),
                source,
            }
        })?;

        if chain.is_empty() {
            error!(domain = %domain, "Certificate source returned an empty chain");
            return Err(IssueError::Retrieval {
                source: RetrievalError::EmptyChain(domain.clone()),
                domain,
            });
        }

        let count = pin_count(chain.len(), options.include_backup_pins);
        let pins = batch(&chain, count);
        debug!(domain = %domain, chain_len = chain.len(), pins = pins.len(), "Computed pins");

        let claims = ClaimSet::new(
            domain.as_str(),
            pins,
            self.signature_lifetime,
            self.signer.key_id().clone(),
        )
        .and_then(|claims| self.signer.sign(&claims).map(|envelope| (claims, envelope)));

        match claims {
            Ok((claims, envelope)) => {
                info!(
                    domain = %domain,
                    pin_count = claims.pins.len(),
                    include_backup = options.include_backup_pins,
                    kid = %claims.key_id,
                    expires = claims.expires(),
                    "Issued pin set"
                );
                Ok(envelope)
            }
            Err(err) => {
                error!(domain = %domain, error = %err, "Failed to sign pin set");
                Err(IssueError::Signing(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_normalizes() {
        assert_eq!(validate_domain("  Example.COM ").unwrap(), "example.com");
    }

    #[test]
    fn test_validate_missing() {
        assert_eq!(validate_domain(""), Err(ValidationError::Missing));
        assert_eq!(validate_domain(" \t"), Err(ValidationError::Missing));
    }

    #[test]
    fn test_validate_length_limit() {
        let label = "a".repeat(63);
        let at_limit = format!("{0}.{0}.{0}.{1}", label, "a".repeat(61));
        assert_eq!(at_limit.len(), MAX_DOMAIN_LEN);
        assert!(validate_domain(&at_limit).is_ok());

        let over = format!("{}a", at_limit);
        assert_eq!(validate_domain(&over), Err(ValidationError::TooLong(254)));
    }

    #[test]
    fn test_validate_characters() {
        for bad in ["example.com/path", "exa mple.com", "example.com?x=1", "user@example.com", "ex\u{e4}mple.com"] {
            assert_eq!(validate_domain(bad), Err(ValidationError::InvalidCharacters), "{}", bad);
        }
    }

    #[test]
    fn test_validate_lets_ip_literals_through() {
        assert!(validate_domain("127.0.0.1").is_ok());
        assert!(validate_domain("[2001:db8::1]").is_ok());
        assert!(validate_domain("_dmarc.example.com").is_ok());
    }

    #[test]
    fn test_error_tags() {
        assert_eq!(IssueError::from(ValidationError::Missing).tag(), "missing_domain");
        assert_eq!(IssueError::from(ValidationError::InvalidCharacters).tag(), "invalid_domain");
        assert_eq!(IssueError::NotWhitelisted("x".into()).tag(), "domain_not_allowed");
        assert_eq!(
            IssueError::Retrieval {
                domain: "x".into(),
                source: RetrievalError::Other("boom".into()),
            }
            .tag(),
            "cert_retrieval_failed"
        );
        assert_eq!(
            IssueError::Signing(PinningError::SigningFailed("boom".into())).tag(),
            "signing_failed"
        );
    }
}
