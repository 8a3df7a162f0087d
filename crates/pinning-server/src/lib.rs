//! Pinning Server
//!
//! Issues short-lived, signed attestations of a domain's current certificate
//! pins for mobile clients that pin dynamically. Per request it:
//! - Checks the domain against the configured whitelist
//! - Fetches the live certificate chain over TLS (with a TTL cache)
//! - Hashes the leaf SPKI, plus the first intermediate when backup pins are asked for
//! - Signs the claim set with the service key
//!
//! ## API Endpoints
//!
//! - `GET /v1/pins?domain=<fqdn>[&include-backup-pins=true]` - Signed pin set
//! - `GET /health` - Liveness check
//! - `GET /readiness` - Readiness check with key info
//!
//! ## Error Classes
//!
//! | Status | Meaning | Client action |
//! |---|---|---|
//! | 400 | missing or malformed domain | fix the request |
//! | 403 | domain not whitelisted (or an IP literal) | do not retry |
//! | 408 | request deadline passed | retry with backoff |
//! | 422 | certificate retrieval failed | retry with backoff |
//! | 500 | signing failed | report |

pub mod api;
pub mod cert;
pub mod config;
pub mod service;

pub use api::create_router;
pub use api::handlers::AppState;
pub use cert::{
    CachedCertificateSource, CertificateSource, FakeCertificateSource, RetrievalError,
    TlsCertificateSource,
};
pub use config::{ConfigError, ServerConfig};
pub use service::{IssuanceService, IssueError, IssueOptions, ValidationError};
