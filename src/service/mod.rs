//! Single-route inference service.
//!
//! The model artifact is loaded once at startup into an immutable [`AppContext`] and shared
//! with handlers through axum state.

mod routes;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::artifact::{ArtifactError, ModelArtifact};

pub use routes::{ApiError, PredictResponse};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model not found at {path}. Run `dynprice-train` first to train a model.")]
    ModelNotFound { path: PathBuf },
    #[error(transparent)]
    Artifact(ArtifactError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppContext {
    artifact: Arc<ModelArtifact>,
}

impl AppContext {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
        }
    }

    /// Load the artifact at `path`, failing fast when no model has been trained.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        tracing::info!("Loading model from {}", path.display());
        let artifact = ModelArtifact::load(path).map_err(|err| match err {
            ArtifactError::NotFound { path } => ServiceError::ModelNotFound { path },
            other => ServiceError::Artifact(other),
        })?;
        tracing::info!(
            trees = artifact.model.trees().len(),
            freight_median = artifact.freight_median,
            "Model loaded"
        );
        Ok(Self::new(artifact))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/predict", post(routes::predict))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, ctx: AppContext) -> Result<(), ServiceError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceError::Bind { addr, source })?;
    tracing::info!(
        "dynprice v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        addr
    );
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServiceError::Serve)?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C, shutdown only by process exit: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
