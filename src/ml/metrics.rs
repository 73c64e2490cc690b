//! Evaluation metrics for regression models.

use serde::{Deserialize, Serialize};

/// Held-out evaluation summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Number of evaluated rows.
    pub support: usize,
    /// Mean squared error.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination.
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute all metrics; `None` when the inputs are empty or differ in length.
    pub fn compute(truth: &[f64], predicted: &[f64]) -> Option<Self> {
        let mse = mean_squared_error(truth, predicted)?;
        let mae = mean_absolute_error(truth, predicted)?;
        Some(Self {
            support: truth.len(),
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(truth, predicted)?,
        })
    }
}

pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    mean_of(truth, predicted, |err| err * err)
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    mean_of(truth, predicted, f64::abs)
}

/// `1 - SS_res / SS_tot`. A constant target scores `1.0` when predicted exactly, else `0.0`.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    if ss_tot == 0.0 {
        return Some(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Some(1.0 - ss_res / ss_tot)
}

fn mean_of(truth: &[f64], predicted: &[f64], loss: impl Fn(f64) -> f64) -> Option<f64> {
    if truth.is_empty() || truth.len() != predicted.len() {
        return None;
    }
    let total: f64 = truth.iter().zip(predicted).map(|(t, p)| loss(t - p)).sum();
    Some(total / truth.len() as f64)
}
