mod api;
mod config;
mod error;
mod fanout;
mod mapper;
mod memo;
mod metrics;
mod model;
mod policy;
mod upstream;

use std::sync::Arc;

use api::AppState;
use config::AppConfig;
use memo::{SystemClock, WarmMemo};
use metrics::Metrics;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = AppConfig::from_env()?;

    if cfg.github_token.is_none() {
        tracing::warn!("GH_TOKEN not configured; GitHub-backed endpoints will return errors");
    }

    let state = AppState {
        memo: WarmMemo::new(Arc::new(SystemClock), cfg.memo_ttl),
        metrics: Metrics::new().map_err(|e| anyhow::anyhow!("metrics setup failed: {e}"))?,
        upstream: UpstreamClient::try_new(&cfg)
            .map_err(|e| anyhow::anyhow!("upstream client setup failed: {e}"))?,
        default_login: cfg.default_login.clone(),
        max_repos: cfg.max_repos,
        max_readmes: cfg.max_readmes,
        topic_workers: cfg.topic_workers,
    };

    // The portfolio front-end is served from another origin.
    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listen_addr = cfg.listen_addr;
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    tracing::info!(%listen_addr, "starting folio-edge proxy");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("folio-edge exited cleanly");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term_signal) => term_signal.recv().await,
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                None
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
