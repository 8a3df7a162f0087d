//! Domain whitelist matching
//!
//! Decides whether pins may be issued for a requested host. The whitelist
//! holds exact hosts (`api.example.com`) and single-level wildcards
//! (`*.example.com`). A wildcard grants exactly one extra label: it never
//! covers the bare suffix and never covers two or more extra labels.
//!
//! IP literals are rejected unless explicitly allowed, since pinning a bare
//! address is meaningless and alternate address spellings would otherwise
//! open a bypass around the whitelist.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use tracing::warn;

/// Normalize a host or pattern: trim whitespace and lowercase
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A single whitelist entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainPattern {
    /// Matches one host exactly
    Exact(String),
    /// `*.suffix`: matches exactly one label in front of `suffix`
    Wildcard { suffix: String },
}

impl DomainPattern {
    /// Parse a whitelist entry
    ///
    /// Returns `None` for an empty entry or a wildcard with no suffix.
    pub fn parse(raw: &str) -> Option<Self> {
        let pattern = normalize(raw);
        if pattern.is_empty() {
            return None;
        }

        match pattern.strip_prefix("*.") {
            Some("") => None,
            Some(suffix) => Some(DomainPattern::Wildcard {
                suffix: suffix.to_string(),
            }),
            None => Some(DomainPattern::Exact(pattern)),
        }
    }

    /// Check an already-normalized domain against this pattern
    pub fn matches(&self, domain: &str) -> bool {
        match self {
            DomainPattern::Exact(host) => host == domain,
            DomainPattern::Wildcard { suffix } => {
                let Some(head) = domain.strip_suffix(suffix.as_str()) else {
                    return false;
                };
                // Boundary must be a dot, and the label in front of it must be
                // a single non-empty label.
                match head.strip_suffix('.') {
                    Some(label) => !label.is_empty() && !label.contains('.'),
                    None => false,
                }
            }
        }
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainPattern::Exact(host) => write!(f, "{}", host),
            DomainPattern::Wildcard { suffix } => write!(f, "*.{}", suffix),
        }
    }
}

/// Whitelist predicate for pin issuance
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    patterns: Vec<DomainPattern>,
    allow_ip_literals: bool,
}

impl DomainMatcher {
    /// Build a matcher from raw whitelist entries
    ///
    /// Unusable entries are skipped with a warning rather than failing, so a
    /// stray trailing comma in configuration does not take the service down.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|raw| {
                let raw = raw.as_ref();
                let parsed = DomainPattern::parse(raw);
                if parsed.is_none() {
                    warn!(pattern = %raw, "Ignoring unusable whitelist pattern");
                }
                parsed
            })
            .collect();

        Self {
            patterns,
            allow_ip_literals: false,
        }
    }

    /// Allow or reject IP literal hosts (rejected by default)
    pub fn with_ip_literals(mut self, allow: bool) -> Self {
        self.allow_ip_literals = allow;
        self
    }

    /// The parsed whitelist
    pub fn patterns(&self) -> &[DomainPattern] {
        &self.patterns
    }

    /// Number of usable whitelist entries
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if no usable entries were configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether IP literal hosts are accepted
    pub fn allows_ip_literals(&self) -> bool {
        self.allow_ip_literals
    }

    /// Decide whether pins may be served for `raw`
    ///
    /// Never errors: anything that does not match is simply `false`.
    pub fn is_allowed(&self, raw: &str) -> bool {
        let domain = normalize(raw);
        if domain.is_empty() {
            return false;
        }

        if !self.allow_ip_literals && is_ip_literal(&domain) {
            return false;
        }

        self.patterns.iter().any(|pattern| pattern.matches(&domain))
    }
}

/// Detect IPv4, IPv6, and bracketed IP literals
pub fn is_ip_literal(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }

    match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(inner) => inner.parse::<Ipv6Addr>().is_ok() || inner.parse::<IpAddr>().is_ok(),
        None => false,
    }
}
