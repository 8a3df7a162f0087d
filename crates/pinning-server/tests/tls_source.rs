//! Live TLS Retrieval Tests
//!
//! Runs a local rustls listener with a generated CA and drives the real
//! `TlsCertificateSource` against it: successful handshake, untrusted chain,
//! a peer that never answers, and a closed port.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pinning_core::compute_spki_hash;
use pinning_server::{CertificateSource, RetrievalError, TlsCertificateSource};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use common::{ca, leaf_signed_by, Issued};

// =============================================================================
// Test Helpers
// =============================================================================

/// Start a TLS server presenting `leaf` then `issuer`; returns its port
async fn spawn_tls_server(leaf: &Issued, issuer: &Issued) -> u16 {
    let chain = vec![leaf.cert.der().clone(), issuer.cert.der().clone()];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf.key.serialize_der()));

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .expect("server config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    // Hold the session until the client goes away
                    let mut buf = [0u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
            });
        }
    });

    port
}

/// Client configuration trusting only `root`
fn client_trusting(root: &Issued) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(root.cert.der().clone()).expect("add root");

    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

// =============================================================================
// Handshake Outcomes
// =============================================================================

#[tokio::test]
async fn test_fetches_chain_leaf_first() {
    let root = ca("Local Test CA");
    let leaf = leaf_signed_by("localhost", &root);
    let port = spawn_tls_server(&leaf, &root).await;

    let source = TlsCertificateSource::with_client_config(client_trusting(&root), Duration::from_secs(5))
        .with_port(port);

    let chain = source.get_chain("localhost").await.expect("handshake should succeed");

    assert_eq!(chain.len(), 2);
    assert_eq!(compute_spki_hash(chain.leaf().unwrap()), leaf.expected_pin());
    assert_eq!(compute_spki_hash(&chain.as_slice()[1]), root.expected_pin());
    assert!(chain.leaf().unwrap().subject().contains("localhost"));
}

#[tokio::test]
async fn test_untrusted_chain_rejected() {
    let root = ca("Untrusted CA");
    let leaf = leaf_signed_by("localhost", &root);
    let port = spawn_tls_server(&leaf, &root).await;

    // Public roots only: the local CA is unknown
    let source = TlsCertificateSource::new(Duration::from_secs(5)).with_port(port);

    let err = source.get_chain("localhost").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Handshake { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_name_mismatch_rejected() {
    let root = ca("Local Test CA");
    let leaf = leaf_signed_by("other.example", &root);
    let port = spawn_tls_server(&leaf, &root).await;

    let source = TlsCertificateSource::with_client_config(client_trusting(&root), Duration::from_secs(5))
        .with_port(port);

    let err = source.get_chain("localhost").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Handshake { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let root = ca("Local Test CA");
    let source = TlsCertificateSource::with_client_config(client_trusting(&root), Duration::from_millis(200))
        .with_port(port);

    let started = Instant::now();
    let err = source.get_chain("localhost").await.unwrap_err();

    assert!(matches!(err, RetrievalError::Timeout { .. }), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_closed_port_is_connect_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let root = ca("Local Test CA");
    let source = TlsCertificateSource::with_client_config(client_trusting(&root), Duration::from_secs(5))
        .with_port(port);

    let err = source.get_chain("127.0.0.1").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Connect { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_server_name() {
    let source = TlsCertificateSource::new(Duration::from_secs(1));

    let err = source.get_chain("not a host").await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidServerName(_)), "got {:?}", err);
}
