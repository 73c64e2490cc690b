//! Persisted model artifact shared by the training pipeline and the inference service.
//!
//! The artifact bundles the fitted booster with the freight median observed at training
//! time, so inference derives `high_freight` against the same threshold the model was
//! trained with.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::features::{self, FEATURE_COLUMNS, FeatureError, RawTable};
use crate::ml::gbdt::{FittedGbdt, ModelError};

/// Current on-disk format version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Model not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Failed to read model at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse model at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to encode model: {0}")]
    Encode(serde_json::Error),
    #[error("Failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unsupported artifact format_version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Artifact feature columns {found:?} do not match {expected:?}")]
    SchemaMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[error("Artifact {field} is not finite: {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelError),
}

/// Errors raised while scoring a record against a loaded artifact.
#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Model input columns, in order.
    pub feature_columns: Vec<String>,
    /// Freight median of the training dataset; the `high_freight` threshold at inference.
    pub freight_median: f64,
    pub model: FittedGbdt,
}

impl ModelArtifact {
    pub fn new(model: FittedGbdt, freight_median: f64) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            freight_median,
            model,
        }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: self.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        if self.feature_columns.iter().map(String::as_str).ne(FEATURE_COLUMNS)
            || self.model.n_features() != FEATURE_COLUMNS.len()
        {
            return Err(ArtifactError::SchemaMismatch {
                found: self.feature_columns.clone(),
                expected: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        }
        for (field, value) in [
            ("freight_median", self.freight_median),
            ("base_score", self.model.base_score()),
        ] {
            if !value.is_finite() {
                return Err(ArtifactError::NonFinite { field, value });
            }
        }
        self.model.validate()?;
        Ok(())
    }

    /// Load and validate an artifact.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact, creating parent directories and replacing any existing file.
    ///
    /// Bytes go to a temporary sibling first and are renamed into place, so readers never
    /// observe a partially written model.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let write_err = |source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;
        let bytes = serde_json::to_vec_pretty(self).map_err(ArtifactError::Encode)?;
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        staged.write_all(&bytes).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(path).map_err(|err| write_err(err.error))?;
        Ok(())
    }

    /// Predict every row of `table` using the training-time freight median.
    pub fn predict_table(&self, table: &RawTable) -> Result<Vec<f64>, PredictionError> {
        let features = features::derive_features_with_threshold(table, self.freight_median)?;
        features
            .rows()
            .iter()
            .map(|row| {
                self.model
                    .predict_row(&row.as_array())
                    .map_err(PredictionError::from)
            })
            .collect()
    }

    /// Predict a single flat JSON record.
    pub fn predict_record(&self, record: &Map<String, Value>) -> Result<f64, PredictionError> {
        let table = RawTable::from_json_record(record)?;
        let predictions = self.predict_table(&table)?;
        Ok(predictions[0])
    }
}
