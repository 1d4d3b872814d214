//! Flightfeed HTTP gateway.
//!
//! Serves same-day catch-up as JSON and the live feed as server-sent events
//! on top of a [`flightfeed_core::Feed`].

pub mod config;
pub mod error;
pub mod json;
pub mod routes;
pub mod sse;

pub use config::{Args, GatewayConfig};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use flightfeed_core::Feed;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The live feed.
    pub feed: Arc<Feed>,
    /// Cancelled when the process begins shutting down; streams end with it.
    pub shutdown: CancellationToken,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(feed: Arc<Feed>, shutdown: CancellationToken, config: GatewayConfig) -> Self {
        Self {
            feed,
            shutdown,
            config,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::schedule::routes())
        .merge(routes::stream::routes())
        .merge(routes::metrics::routes())
        .merge(routes::status::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
