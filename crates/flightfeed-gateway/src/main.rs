//! Flightfeed gateway binary.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use flightfeed_core::{FeedService, SqliteSource, SystemClock};
use flightfeed_gateway::{create_router, AppState, Args, GatewayConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flightfeed_gateway=info,flightfeed_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        db = %config.db_path.display(),
        dataset_year = ?config.dataset_year,
        "Starting flightfeed gateway"
    );

    let source = SqliteSource::open(config.source_config())
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let service = FeedService::start(
        config.feed_config(),
        Arc::new(source),
        Arc::new(SystemClock),
    )?;
    let shutdown = service.shutdown_token();

    let state = AppState::new(service.feed().clone(), shutdown.clone(), config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("Gateway listening on {}", config.listen_addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            // The server only stops on its own when it fails.
            shutdown.cancel();
            service.shutdown().await;
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
            shutdown.cancel();
        }
    }

    match tokio::time::timeout(config.shutdown_grace, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            warn!(
                grace_secs = config.shutdown_grace.as_secs(),
                "connections still open after grace period, closing"
            );
            server.abort();
        }
    }

    service.shutdown().await;
    info!("gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
