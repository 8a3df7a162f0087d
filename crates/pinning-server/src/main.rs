//! Pinning Server Binary
//!
//! Runs the HTTP service that issues signed certificate pin sets.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use pinning_server::{
    create_router, AppState, CachedCertificateSource, IssuanceService, ServerConfig,
    TlsCertificateSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Configuration warnings go to a provisional info-level subscriber
    let config = tracing::subscriber::with_default(json_subscriber(Level::INFO), ServerConfig::from_env);

    // Initialize logging
    let log_level = config.as_ref().map_or(Level::INFO, ServerConfig::max_level);
    tracing::subscriber::set_global_default(json_subscriber(log_level))
        .expect("Failed to set tracing subscriber");

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let signer = match config.load_signer() {
        Ok(signer) => signer,
        Err(err) => {
            error!(error = %err, "Failed to load signing key");
            return ExitCode::FAILURE;
        }
    };

    let matcher = config.matcher();
    if matcher.is_empty() {
        error!(allowed_domains = ?config.allowed_domains, "No usable whitelist patterns");
        return ExitCode::FAILURE;
    }

    info!(
        port = config.port,
        allowed_domains = matcher.len(),
        allow_ip_literals = config.allow_ip_literals,
        key_id = %signer.key_id(),
        algorithm = %signer.algorithm(),
        signature_lifetime = ?config.signature_lifetime,
        cert_dial_timeout = ?config.cert_dial_timeout,
        cert_cache_ttl = ?config.cert_cache_ttl,
        request_timeout = ?config.request_timeout,
        log_level = %log_level,
        "Starting pinning server"
    );

    // Certificate retrieval
    let source = CachedCertificateSource::new(
        TlsCertificateSource::new(config.cert_dial_timeout),
        config.cert_cache_ttl,
    );

    // Create application state
    let service = IssuanceService::new(matcher, Arc::new(source), signer, config.signature_lifetime);
    let state = Arc::new(AppState::new(service));

    // Build router
    let app = create_router(state, config.request_timeout);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %addr, error = %err, "Failed to bind to address");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %addr, "Pinning server listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "Server error");
        return ExitCode::FAILURE;
    }

    info!("Pinning server stopped");
    ExitCode::SUCCESS
}

fn json_subscriber(level: Level) -> impl tracing::Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
