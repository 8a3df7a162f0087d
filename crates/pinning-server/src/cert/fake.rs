//! In-memory certificate source for tests and local runs

use async_trait::async_trait;
use pinning_core::CertificateChain;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{CertificateSource, RetrievalError};

/// Returns canned chains without touching the network
///
/// An injected failure takes precedence over every canned chain. Unknown
/// domains fail with `RetrievalError::Connect`.
#[derive(Debug, Default)]
pub struct FakeCertificateSource {
    chains: RwLock<HashMap<String, Arc<CertificateChain>>>,
    failure: RwLock<Option<RetrievalError>>,
    calls: AtomicUsize,
}

impl FakeCertificateSource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `set_chain`
    pub fn with_chain(self, domain: &str, chain: CertificateChain) -> Self {
        self.set_chain(domain, chain);
        self
    }

    /// Serve `chain` for `domain`
    pub fn set_chain(&self, domain: &str, chain: CertificateChain) {
        self.chains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.to_lowercase(), Arc::new(chain));
    }

    /// Fail every call with `error` until cleared
    pub fn set_failure(&self, error: RetrievalError) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Stop failing
    pub fn clear_failure(&self) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of `get_chain` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateSource for FakeCertificateSource {
    async fn get_chain(&self, domain: &str) -> Result<Arc<CertificateChain>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failure.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(error);
        }

        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
            .cloned()
            .ok_or_else(|| RetrievalError::Connect {
                domain: domain.to_string(),
                message: "no canned chain for domain".into(),
            })
    }
}
