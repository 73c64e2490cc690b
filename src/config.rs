//! Optional `dynprice.toml` settings stored at the project root.
//!
//! Every field has a default, so a missing file is equivalent to an empty one:
//!
//! ```toml
//! [paths]
//! dataset = "data/brazilian-ecommerce/olist_order_items_dataset.csv"
//! model = "models/model.json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//!
//! [model]
//! n_estimators = 300
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::gbdt::ParamOverrides;
use crate::project_dirs::{self, ProjectDirError};

/// Settings file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "dynprice.toml";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    ProjectDir(#[from] ProjectDirError),
    #[error("Failed to read settings at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid server host '{host}'")]
    InvalidHost { host: String },
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub server: ServerSettings,
    /// Hyperparameter overrides handed to the model factory.
    #[serde(default)]
    pub model: ParamOverrides,
}

/// Dataset and artifact locations, relative to the project root unless absolute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default)]
    pub model: Option<PathBuf>,
}

/// Bind address of the inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidHost {
            host: self.host.clone(),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Settings {
    /// Load `<root>/dynprice.toml`, returning defaults if it does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = project_dirs::project_root()?.join(CONFIG_FILE_NAME);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved raw dataset path.
    pub fn dataset_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.paths.dataset {
            Some(path) => Ok(project_dirs::resolve(path)?),
            None => Ok(project_dirs::default_dataset_path()?),
        }
    }

    /// Resolved model artifact path.
    pub fn model_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.paths.model {
            Some(path) => Ok(project_dirs::resolve(path)?),
            None => Ok(project_dirs::default_model_path()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(settings.model.is_empty());
        assert_eq!(settings.server.port, 8000);
        assert_eq!(
            settings.server.socket_addr().unwrap(),
            "127.0.0.1:8000".parse().unwrap()
        );
    }

    #[test]
    fn parses_sections_and_model_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[paths]
model = "/tmp/elsewhere/model.json"

[server]
host = "0.0.0.0"
port = 9100

[model]
n_estimators = 50
learning_rate = 0.1
"#,
        )
        .unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(
            settings.model_path().unwrap(),
            PathBuf::from("/tmp/elsewhere/model.json")
        );
        assert_eq!(settings.model["n_estimators"], serde_json::json!(50));
        assert_eq!(settings.model["learning_rate"], serde_json::json!(0.1));
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn rejects_unparseable_host() {
        let server = ServerSettings {
            host: "not a host".into(),
            port: 1,
        };
        assert!(matches!(
            server.socket_addr(),
            Err(ConfigError::InvalidHost { .. })
        ));
    }
}
