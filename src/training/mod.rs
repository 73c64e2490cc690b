//! Batch training pipeline: load, label, featurize, split, fit, evaluate, persist.

mod dataset;
mod split;

use std::path::PathBuf;

use ndarray::Array1;
use thiserror::Error;

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::config::{ConfigError, Settings};
use crate::features::{self, FeatureError, RawTable};
use crate::ml::gbdt::{self, FittedGbdt, ModelError, ParamError, ParamOverrides};
use crate::ml::metrics::RegressionMetrics;

pub use dataset::load_dataset;
pub use split::{TrainTestSplit, train_test_split};

/// Premium applied to prices whose freight exceeds the dataset median.
pub const FREIGHT_PREMIUM: f64 = 0.05;
/// Fraction of rows held out for evaluation.
pub const TEST_SIZE: f64 = 0.2;
/// Seed for the train/test shuffle.
pub const RANDOM_STATE: u64 = 42;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Dataset not found at {path}")]
    DatasetNotFound { path: PathBuf },
    #[error("Failed to open dataset at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read CSV at {path}: {source}")]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    #[error("Row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidCell {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Need at least {needed} rows to train and evaluate, found {found}")]
    TooFewRows { needed: usize, found: usize },
    #[error("Held-out partition produced no predictions to evaluate")]
    Evaluation,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Inputs for one training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    pub overrides: Option<ParamOverrides>,
    pub test_size: f64,
    pub random_state: u64,
}

impl TrainingConfig {
    pub fn new(dataset_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            model_path: model_path.into(),
            overrides: None,
            test_size: TEST_SIZE,
            random_state: RANDOM_STATE,
        }
    }

    /// Paths and `[model]` overrides from the project settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut config = Self::new(settings.dataset_path()?, settings.model_path()?);
        if !settings.model.is_empty() {
            config.overrides = Some(settings.model.clone());
        }
        Ok(config)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub freight_median: f64,
    pub metrics: RegressionMetrics,
    pub model_path: PathBuf,
}

/// `price * (1 + FREIGHT_PREMIUM)` where freight exceeds the median of the whole table,
/// `price` otherwise.
pub fn create_target(table: &RawTable) -> Result<(Array1<f64>, f64), FeatureError> {
    let (price, freight) = table.price_and_freight()?;
    let freight_median = features::median(freight).unwrap_or(f64::NAN);
    let target = price
        .iter()
        .zip(freight)
        .map(|(&price, &freight)| {
            if freight > freight_median {
                price * (1.0 + FREIGHT_PREMIUM)
            } else {
                price
            }
        })
        .collect();
    Ok((target, freight_median))
}

/// Fit a fresh model from the factory on a training partition.
pub fn train_model(
    x: ndarray::ArrayView2<'_, f64>,
    y: ndarray::ArrayView1<'_, f64>,
    overrides: Option<&ParamOverrides>,
) -> Result<FittedGbdt, PipelineError> {
    let regressor = gbdt::build_model(overrides)?;
    tracing::info!(rows = x.nrows(), "Training model");
    let model = regressor.fit(x, y)?;
    tracing::info!(trees = model.trees().len(), "Model training completed");
    Ok(model)
}

/// Run every stage in order. The artifact is only written once fitting and evaluation
/// have succeeded.
pub fn run_training_pipeline(config: &TrainingConfig) -> Result<TrainingReport, PipelineError> {
    tracing::info!("Starting training pipeline");
    let raw = load_dataset(&config.dataset_path)?;

    tracing::info!("Creating target variable");
    let (target, freight_median) = create_target(&raw)?;

    tracing::info!("Engineering features");
    let features = features::derive_features(&raw)?;
    let x = features.to_array();

    let split = train_test_split(raw.len(), config.test_size, config.random_state);
    if split.train.is_empty() || split.test.is_empty() {
        return Err(PipelineError::TooFewRows {
            needed: 2,
            found: raw.len(),
        });
    }
    tracing::info!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        "Split dataset"
    );
    let (x_train, y_train) = TrainTestSplit::select(&split.train, &x, &target);
    let (x_test, y_test) = TrainTestSplit::select(&split.test, &x, &target);

    let model = train_model(x_train.view(), y_train.view(), config.overrides.as_ref())?;

    tracing::info!("Evaluating model");
    let predictions = model.predict(x_test.view())?;
    let truth = y_test.to_vec();
    let metrics = RegressionMetrics::compute(&truth, &predictions.to_vec())
        .ok_or(PipelineError::Evaluation)?;
    tracing::info!(
        mse = metrics.mse,
        rmse = metrics.rmse,
        mae = metrics.mae,
        r2 = metrics.r2,
        "Model evaluation completed"
    );

    tracing::info!("Saving model to {}", config.model_path.display());
    ModelArtifact::new(model, freight_median).save(&config.model_path)?;
    tracing::info!("Training pipeline completed successfully");

    Ok(TrainingReport {
        rows: raw.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        freight_median,
        metrics,
        model_path: config.model_path.clone(),
    })
}
