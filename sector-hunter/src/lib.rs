//! Sector Hunter - A-share sector rotation screener.
//!
//! Ranks concept boards by momentum, pulls their constituents, fuses them
//! with the live market snapshot and classifies stocks into leaders,
//! laggards and signal-filtered catch-up candidates.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod routes;
pub mod screener;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use sector_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::data::{CachedSource, EastmoneySource, MarketDataSource};
use crate::screener::{ScreenerEngine, SignalRegistry};

pub struct HunterState {
    pub config: Config,
    pub cache: Arc<CachedSource>,
    pub engine: Arc<ScreenerEngine>,
}

impl HunterState {
    /// State backed by the configured upstream.
    pub fn new(config: Config) -> Self {
        let upstream: Arc<dyn MarketDataSource> = Arc::new(EastmoneySource::from_config(&config.source));
        Self::with_source(config, upstream)
    }

    /// State backed by an arbitrary source, wrapped in the response cache.
    pub fn with_source(config: Config, upstream: Arc<dyn MarketDataSource>) -> Self {
        let cache = Arc::new(CachedSource::from_config(upstream, &config.source));
        let registry = Arc::new(SignalRegistry::with_builtin());
        let engine = Arc::new(ScreenerEngine::new(
            Arc::clone(&cache) as Arc<dyn MarketDataSource>,
            registry,
            &config.screener,
        ));

        Self {
            config,
            cache,
            engine,
        }
    }
}

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<HunterState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/signals", get(routes::get_signals))
        .route("/api/v1/sectors", get(routes::get_sectors))
        .layer(cors)
        .with_state(state)
}

pub struct HunterService {
    state: Arc<HunterState>,
}

impl HunterService {
    pub fn new(config: Config) -> Self {
        let state = Arc::new(HunterState::new(config));
        Self { state }
    }

    pub async fn start(self) -> Result<()> {
        let bind = self.state.config.bind_address();
        let app = build_router(Arc::clone(&self.state));

        let addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("Invalid bind address {}", bind))?;
        info!(address = %addr, source = self.state.engine.source_name(), "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
