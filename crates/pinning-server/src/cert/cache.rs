//! TTL cache for certificate chains
//!
//! Entries are keyed by the exact normalized domain, never by whitelist
//! pattern. An expired entry is treated as absent and replaced on the next
//! successful fetch; nothing is evicted proactively. Failures are never stored.

use async_trait::async_trait;
use pinning_core::CertificateChain;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{CertificateSource, RetrievalError};

#[derive(Debug)]
struct CacheEntry {
    chain: Arc<CertificateChain>,
    expires_at: Instant,
}

/// Shared domain → chain cache
#[derive(Debug)]
pub struct CertificateCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CertificateCache {
    /// Create a cache; a zero `ttl` disables it
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether lookups and inserts do anything
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Look up a live entry
    pub fn get(&self, domain: &str) -> Option<Arc<CertificateChain>> {
        self.get_at(domain, Instant::now())
    }

    fn get_at(&self, domain: &str, now: Instant) -> Option<Arc<CertificateChain>> {
        if !self.is_enabled() {
            return None;
        }

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(domain)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| Arc::clone(&entry.chain))
    }

    /// Insert or replace the entry for `domain`
    pub fn insert(&self, domain: &str, chain: Arc<CertificateChain>) {
        self.insert_at(domain, chain, Instant::now());
    }

    fn insert_at(&self, domain: &str, chain: Arc<CertificateChain>, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        let Some(expires_at) = now.checked_add(self.ttl) else {
            return;
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(domain.to_string(), CacheEntry { chain, expires_at });
    }

    /// Number of stored entries, live or expired
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A `CertificateSource` that consults a `CertificateCache` first
///
/// Concurrent misses for the same domain each reach the inner source; there
/// is no in-flight deduplication.
#[derive(Debug)]
pub struct CachedCertificateSource<S> {
    inner: S,
    cache: CertificateCache,
}

impl<S: CertificateSource> CachedCertificateSource<S> {
    /// Wrap `inner` with a cache of the given TTL
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: CertificateCache::new(ttl),
        }
    }

    /// The underlying cache
    pub fn cache(&self) -> &CertificateCache {
        &self.cache
    }

    /// The wrapped source
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CertificateSource> CertificateSource for CachedCertificateSource<S> {
    async fn get_chain(&self, domain: &str) -> Result<Arc<CertificateChain>, RetrievalError> {
        if let Some(chain) = self.cache.get(domain) {
            debug!(domain = %domain, "Certificate cache hit");
            return Ok(chain);
        }

        let chain = self.inner.get_chain(domain).await?;
        self.cache.insert(domain, Arc::clone(&chain));
        Ok(chain)
    }
}
