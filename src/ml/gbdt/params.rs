use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// String-keyed hyperparameter overrides merged on top of [`HyperParams::default`].
pub type ParamOverrides = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Invalid hyperparameters: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("Hyperparameter `{name}` {reason}")]
    OutOfRange { name: &'static str, reason: String },
}

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Squared-error regression: gradient `pred - y`, hessian `1`.
    #[serde(rename = "reg:squarederror")]
    SquaredError,
}

/// Gradient-boosting hyperparameters, named after their XGBoost counterparts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HyperParams {
    /// Number of boosting rounds (trees).
    pub n_estimators: usize,
    /// Maximum depth of each tree; the root sits at depth 0.
    pub max_depth: usize,
    /// Shrinkage applied to every leaf value.
    pub learning_rate: f64,
    pub objective: Objective,
    /// Seed for row subsampling.
    pub random_state: u64,
    /// Worker threads for split search; `-1` uses every available core.
    pub n_jobs: i64,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f64,
    /// Minimum gain required to keep a split.
    pub gamma: f64,
    /// Minimum hessian sum per child.
    pub min_child_weight: f64,
    /// Fraction of rows sampled per tree, in `(0, 1]`.
    pub subsample: f64,
    /// Maximum number of histogram bins per feature.
    pub max_bin: usize,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 5,
            learning_rate: 0.05,
            objective: Objective::SquaredError,
            random_state: 42,
            n_jobs: -1,
            reg_lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            max_bin: 256,
        }
    }
}

/// Upper bound for `max_bin`; bin indices are stored as `u16`.
pub const MAX_BIN_LIMIT: usize = u16::MAX as usize + 1;

impl HyperParams {
    /// Defaults with `overrides` applied key by key. Unknown keys are rejected.
    pub fn with_overrides(overrides: &ParamOverrides) -> Result<Self, ParamError> {
        let mut merged = serde_json::to_value(Self::default())?;
        if let Some(fields) = merged.as_object_mut() {
            for (key, value) in overrides {
                fields.insert(key.clone(), value.clone());
            }
        }
        let params: Self = serde_json::from_value(merged)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.n_estimators == 0 {
            return Err(out_of_range("n_estimators", "must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(out_of_range("max_depth", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(out_of_range("learning_rate", "must be a positive number"));
        }
        if self.n_jobs == 0 || self.n_jobs < -1 {
            return Err(out_of_range("n_jobs", "must be -1 or a positive count"));
        }
        if !(self.reg_lambda.is_finite() && self.reg_lambda >= 0.0) {
            return Err(out_of_range("reg_lambda", "must be non-negative"));
        }
        if !(self.gamma.is_finite() && self.gamma >= 0.0) {
            return Err(out_of_range("gamma", "must be non-negative"));
        }
        if !(self.min_child_weight.is_finite() && self.min_child_weight >= 0.0) {
            return Err(out_of_range("min_child_weight", "must be non-negative"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(out_of_range("subsample", "must be in (0, 1]"));
        }
        if !(2..=MAX_BIN_LIMIT).contains(&self.max_bin) {
            return Err(out_of_range(
                "max_bin",
                &format!("must be between 2 and {MAX_BIN_LIMIT}"),
            ));
        }
        Ok(())
    }

    /// Number of split-search workers implied by `n_jobs`.
    pub fn worker_threads(&self) -> usize {
        if self.n_jobs > 0 {
            self.n_jobs as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

fn out_of_range(name: &'static str, reason: &str) -> ParamError {
    ParamError::OutOfRange {
        name,
        reason: reason.to_string(),
    }
}
