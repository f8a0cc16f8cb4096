//! SIWE Auth Server
//!
//! Issues nonces, verifies Sign-In with Ethereum messages and hands out
//! session tokens for the wallets that signed them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use siwe_auth_server::auth::{
    AuthDeps, AuthService, Clock, JwtService, NonceStore, SiweConstraints, SystemClock,
    TokenVerifier,
};
use siwe_auth_server::config::Config;
use siwe_auth_server::eth::{EthClient, EthGateway};
use siwe_auth_server::middleware;
use siwe_auth_server::routes::build_router;
use siwe_auth_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = %config.environment.as_str(),
        domain = %config.siwe_domain,
        chain_id = config.chain_id,
        "Starting SIWE auth server"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let nonce_store = Arc::new(NonceStore::new(clock.clone()));

    let jwt = Arc::new(JwtService::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
        config.jwt_expiry(),
        clock.clone(),
    ));

    let auth_service = Arc::new(AuthService::new(AuthDeps {
        nonce_store: nonce_store.clone(),
        jwt: jwt.clone(),
        constraints: SiweConstraints {
            domain: config.siwe_domain.clone(),
            uri: config.siwe_uri.clone(),
            chain_id: config.chain_id,
            time_skew: config.time_skew(),
        },
        nonce_ttl: config.nonce_ttl(),
        clock,
    }));

    let token_verifier: Arc<dyn TokenVerifier> = jwt;
    let eth: Arc<dyn EthGateway> = Arc::new(EthClient::new(config.rpc_url.clone()));

    let app_state = AppState::new(
        auth_service,
        token_verifier,
        eth,
        config.siwe_statement.clone(),
    );

    // Start nonce sweeper in background
    if config.nonce_sweep_interval_seconds > 0 {
        let interval = Duration::from_secs(config.nonce_sweep_interval_seconds);
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Nonce sweeper task started");
            sweep_nonces(nonce_store, interval).await;
        });
    }

    let mut app = build_router(app_state).layer(configure_cors(&config));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::new(config.host, config.port);

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodically drop expired and consumed nonces
async fn sweep_nonces(store: Arc<NonceStore>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let removed = store.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "Purged stale nonces");
        }
    }
}

fn configure_cors(config: &Config) -> CorsLayer {
    let Some(allowed_origins_str) = config.cors_allowed_origins.as_deref() else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
