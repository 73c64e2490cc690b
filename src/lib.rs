//! Library exports shared by the service, the command-line tools, benchmarks and tests.
/// Dataset download and placement under `data/`.
pub mod acquire;
/// Persisted model artifact.
pub mod artifact;
/// Optional `dynprice.toml` settings.
pub mod config;
/// Feature derivation from raw order items.
pub mod features;
/// Shared HTTP client helpers.
mod http_client;
/// Logging setup.
pub mod logging;
/// Gradient-boosted model and evaluation metrics.
pub mod ml;
/// Project root and well-known paths.
pub mod project_dirs;
/// HTTP inference service.
pub mod service;
/// Batch training pipeline.
pub mod training;
