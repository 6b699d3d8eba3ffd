//! Bridge server for the scripting layer.
//!
//! Listens on loopback only. Requests made through `/api/request` skip TLS
//! certificate validation, so cross-origin access is limited to the single
//! origin in `BRIDGE_ALLOWED_ORIGIN` (the webview's origin); when unset, no
//! browser page on another origin can call the bridge.

use insecure_bridge::{build_executor, config, infra::SystemDnsResolver, routes};
use std::{net::SocketAddr, process::ExitCode, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insecure_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();
    tracing::info!("Starting bridge on port {}", config.port);

    let executor = match build_executor(&config, Arc::new(SystemDnsResolver::new())) {
        Ok(executor) => executor,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize bridge");
            return ExitCode::FAILURE;
        }
    };

    let cors = match routes::cors_layer(config.allowed_origin.as_deref()) {
        Ok(cors) => cors,
        Err(e) => {
            tracing::error!(origin = ?config.allowed_origin, error = %e, "Invalid allowed origin");
            return ExitCode::FAILURE;
        }
    };
    if config.allowed_origin.is_none() {
        tracing::warn!("BRIDGE_ALLOWED_ORIGIN not set: cross-origin callers are refused");
    }

    let app = routes::router(Arc::new(executor))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Listening on http://{}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
