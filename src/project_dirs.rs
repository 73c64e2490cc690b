//! Project directory helpers anchored to a single project root.
//!
//! Every artifact the workflow touches (raw data, the persisted model, logs and the
//! optional settings file) lives under one root. The root defaults to the current working
//! directory and can be redirected with `DYNPRICE_HOME` for tests or alternate checkouts.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Environment variable that overrides the project root.
pub const HOME_ENV_VAR: &str = "DYNPRICE_HOME";
/// Directory holding downloaded datasets.
pub const DATA_DIR_NAME: &str = "data";
/// Directory holding the persisted model artifact.
pub const MODELS_DIR_NAME: &str = "models";
/// Directory holding per-launch log files.
pub const LOGS_DIR_NAME: &str = "logs";
/// Kaggle dataset folder the training pipeline reads from.
pub const DATASET_FOLDER: &str = "brazilian-ecommerce";
/// CSV file inside [`DATASET_FOLDER`] with one row per order item.
pub const DATASET_FILE: &str = "olist_order_items_dataset.csv";
/// File name of the persisted model artifact.
pub const MODEL_FILE: &str = "model.json";

static ROOT_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing project directories.
#[derive(Debug, Error)]
pub enum ProjectDirError {
    /// Neither an override nor the current directory could be resolved.
    #[error("No project root available: {0}")]
    NoRoot(std::io::Error),
    /// The user's home/cache directories could not be resolved.
    #[error("No user base directory available")]
    NoBaseDir,
    /// Failed to create a project directory.
    #[error("Failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the project root.
pub fn project_root() -> Result<PathBuf, ProjectDirError> {
    if let Some(path) = ROOT_OVERRIDE.lock().ok().and_then(|guard| guard.clone()) {
        return Ok(path);
    }
    if let Ok(path) = std::env::var(HOME_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    std::env::current_dir().map_err(ProjectDirError::NoRoot)
}

/// Return `<root>/data`.
pub fn data_dir() -> Result<PathBuf, ProjectDirError> {
    Ok(project_root()?.join(DATA_DIR_NAME))
}

/// Default raw dataset location: `<root>/data/brazilian-ecommerce/olist_order_items_dataset.csv`.
pub fn default_dataset_path() -> Result<PathBuf, ProjectDirError> {
    Ok(data_dir()?.join(DATASET_FOLDER).join(DATASET_FILE))
}

/// Default model artifact location: `<root>/models/model.json`.
pub fn default_model_path() -> Result<PathBuf, ProjectDirError> {
    Ok(project_root()?.join(MODELS_DIR_NAME).join(MODEL_FILE))
}

/// Return the logs directory, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, ProjectDirError> {
    let path = project_root()?.join(LOGS_DIR_NAME);
    ensure_dir(&path)?;
    Ok(path)
}

/// Per-user download cache, e.g. `~/.cache/dynprice/datasets` on Linux.
pub fn download_cache_dir() -> Result<PathBuf, ProjectDirError> {
    let base = BaseDirs::new().ok_or(ProjectDirError::NoBaseDir)?;
    Ok(base.cache_dir().join("dynprice").join("datasets"))
}

/// The user's home directory, used to locate `~/.kaggle/kaggle.json`.
pub fn home_dir() -> Result<PathBuf, ProjectDirError> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ProjectDirError::NoBaseDir)
}

/// Resolve `path` against the project root unless it is already absolute.
pub fn resolve(path: &Path) -> Result<PathBuf, ProjectDirError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(project_root()?.join(path))
    }
}

fn ensure_dir(path: &Path) -> Result<(), ProjectDirError> {
    std::fs::create_dir_all(path).map_err(|source| ProjectDirError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn set_root_override(path: PathBuf) {
    let mut guard = ROOT_OVERRIDE
        .lock()
        .expect("root override mutex poisoned");
    *guard = Some(path);
}

#[cfg(test)]
pub(crate) fn clear_root_override() {
    let mut guard = ROOT_OVERRIDE
        .lock()
        .expect("root override mutex poisoned");
    *guard = None;
}
