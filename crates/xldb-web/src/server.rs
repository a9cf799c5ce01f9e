use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use xldb::Index;

use crate::handlers::{browse, health_check, AppState};

/// Serves an [`xldb::Index`] over HTTP, matching `voidfs`'s single
/// catch-all route plus a health endpoint.
pub struct BrowseServer {
    index: AppState,
    addr: String,
}

impl BrowseServer {
    pub fn new(index: Arc<Index>, addr: impl Into<String>) -> Self {
        BrowseServer {
            index,
            addr: addr.into(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let app = Router::new()
            .route("/healthz", get(health_check))
            .fallback(browse)
            .with_state(self.index)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("voidfs: listening on {}", self.addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
