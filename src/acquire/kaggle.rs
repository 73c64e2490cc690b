//! Kaggle dataset references, credentials and download URLs.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;
use url::Url;

use crate::project_dirs;

/// Public endpoint serving dataset archives.
pub const KAGGLE_DOWNLOAD_BASE: &str = "https://www.kaggle.com/api/v1/datasets/download/";
const USERNAME_ENV_VAR: &str = "KAGGLE_USERNAME";
const KEY_ENV_VAR: &str = "KAGGLE_KEY";

/// An `owner/slug` dataset handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub owner: String,
    pub slug: String,
}

impl DatasetRef {
    pub fn parse(name: &str) -> Result<Self, String> {
        let (owner, slug) = name
            .split_once('/')
            .ok_or_else(|| format!("expected 'owner/dataset', got '{name}'"))?;
        for part in [owner, slug] {
            if part.is_empty() || part == "." || part == ".." {
                return Err(format!("'{name}' has an empty or relative component"));
            }
            if let Some(bad) = part
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            {
                return Err(format!("'{name}' contains unsupported character '{bad}'"));
            }
        }
        Ok(Self {
            owner: owner.to_string(),
            slug: slug.to_string(),
        })
    }

    /// Archive URL for this dataset under `base`, which must end with `/`.
    pub fn download_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&format!("{}/{}", self.owner, self.slug))
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

/// API credentials, sent as HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl KaggleCredentials {
    /// Environment variables first, then `~/.kaggle/kaggle.json`. Absent credentials are
    /// fine for public datasets.
    pub fn discover() -> Option<Self> {
        if let Some(credentials) = Self::from_env() {
            return Some(credentials);
        }
        let path = default_credentials_path()?;
        match Self::from_file(&path) {
            Ok(credentials) => credentials,
            Err(err) => {
                tracing::warn!("Ignoring unreadable Kaggle credentials: {err}");
                None
            }
        }
    }

    pub fn from_env() -> Option<Self> {
        let username = std::env::var(USERNAME_ENV_VAR).ok()?;
        let key = std::env::var(KEY_ENV_VAR).ok()?;
        if username.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self { username, key })
    }

    /// `Ok(None)` when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>, String> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| format!("Failed to parse {}: {err}", path.display()))
    }

    pub fn authorization_header(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.key));
        format!("Basic {token}")
    }
}

fn default_credentials_path() -> Option<PathBuf> {
    let home = project_dirs::home_dir().ok()?;
    Some(home.join(".kaggle").join("kaggle.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_owner_and_slug() {
        let dataset = DatasetRef::parse("olistbr/brazilian-ecommerce").unwrap();
        assert_eq!(dataset.owner, "olistbr");
        assert_eq!(dataset.slug, "brazilian-ecommerce");
        assert_eq!(dataset.to_string(), "olistbr/brazilian-ecommerce");
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["", "no-slash", "/slug", "owner/", "a/b/c", "owner/..", "own er/x"] {
            assert!(DatasetRef::parse(name).is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn download_url_appends_owner_and_slug() {
        let base = Url::parse(KAGGLE_DOWNLOAD_BASE).unwrap();
        let url = DatasetRef::parse("olistbr/brazilian-ecommerce")
            .unwrap()
            .download_url(&base)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.kaggle.com/api/v1/datasets/download/olistbr/brazilian-ecommerce"
        );
    }

    #[test]
    fn basic_auth_header_and_redacted_debug() {
        let credentials = KaggleCredentials {
            username: "user".into(),
            key: "key".into(),
        };
        assert_eq!(credentials.authorization_header(), "Basic dXNlcjprZXk=");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("\"key\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn reads_credentials_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kaggle.json");
        assert_eq!(KaggleCredentials::from_file(&path).unwrap(), None);
        std::fs::write(&path, r#"{"username":"ana","key":"s3cret"}"#).unwrap();
        let credentials = KaggleCredentials::from_file(&path).unwrap().unwrap();
        assert_eq!(credentials.username, "ana");
        assert_eq!(credentials.key, "s3cret");
        std::fs::write(&path, "nope").unwrap();
        assert!(KaggleCredentials::from_file(&path).is_err());
    }
}
