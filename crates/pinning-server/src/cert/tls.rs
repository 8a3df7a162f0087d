//! Live TLS certificate retrieval

use async_trait::async_trait;
use pinning_core::{Certificate, CertificateChain};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::{CertificateSource, RetrievalError};

/// Default HTTPS port dialed for every domain
pub const DEFAULT_PORT: u16 = 443;

/// Fetches chains with a real TLS handshake
///
/// Verification is always on: a chain that does not validate against the
/// configured roots is a handshake failure and is never pinned. One timeout
/// bounds TCP connect and handshake together.
#[derive(Clone)]
pub struct TlsCertificateSource {
    connector: TlsConnector,
    dial_timeout: Duration,
    port: u16,
}

impl std::fmt::Debug for TlsCertificateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCertificateSource")
            .field("dial_timeout", &self.dial_timeout)
            .field("port", &self.port)
            .finish()
    }
}

impl TlsCertificateSource {
    /// Source trusting the Mozilla root set
    pub fn new(dial_timeout: Duration) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self::with_client_config(Arc::new(config), dial_timeout)
    }

    /// Source using a custom client configuration (e.g. private roots)
    pub fn with_client_config(config: Arc<ClientConfig>, dial_timeout: Duration) -> Self {
        Self {
            connector: TlsConnector::from(config),
            dial_timeout,
            port: DEFAULT_PORT,
        }
    }

    /// Dial a port other than 443
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Configured dial timeout
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    async fn handshake(&self, domain: &str) -> Result<CertificateChain, RetrievalError> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| RetrievalError::InvalidServerName(domain.to_string()))?;

        let stream = TcpStream::connect((domain, self.port))
            .await
            .map_err(|e| RetrievalError::Connect {
                domain: domain.to_string(),
                message: e.to_string(),
            })?;

        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| RetrievalError::Handshake {
                domain: domain.to_string(),
                message: e.to_string(),
            })?;

        let (_, connection) = tls.get_ref();
        let presented = connection.peer_certificates().unwrap_or_default();
        if presented.is_empty() {
            return Err(RetrievalError::EmptyChain(domain.to_string()));
        }

        let certificates = presented
            .iter()
            .map(|der| {
                Certificate::from_der(der.to_vec()).map_err(|e| RetrievalError::InvalidCertificate {
                    domain: domain.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CertificateChain::new(certificates))
    }
}

#[async_trait]
impl CertificateSource for TlsCertificateSource {
    async fn get_chain(&self, domain: &str) -> Result<Arc<CertificateChain>, RetrievalError> {
        debug!(domain = %domain, port = self.port, "Dialing for certificate chain");

        let chain = timeout(self.dial_timeout, self.handshake(domain))
            .await
            .map_err(|_| RetrievalError::Timeout {
                domain: domain.to_string(),
                timeout: self.dial_timeout,
            })??;

        debug!(domain = %domain, certificates = chain.len(), "Fetched certificate chain");
        Ok(Arc::new(chain))
    }
}
