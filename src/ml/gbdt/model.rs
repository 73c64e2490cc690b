use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::params::HyperParams;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Cannot fit on an empty dataset")]
    EmptyDataset,
    #[error("Feature matrix has {rows} rows but {targets} targets were given")]
    LengthMismatch { rows: usize, targets: usize },
    #[error("Expected {expected} features per row, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },
    #[error("Non-finite value at row {row}")]
    NonFinite { row: usize },
    #[error("Tree {tree} is malformed at node {node}: {reason}")]
    InvalidTree {
        tree: usize,
        node: usize,
        reason: &'static str,
    },
}

/// Tree node stored in a flat arena. Children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `feature <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf output, already scaled by the learning rate.
    Leaf { value: f64 },
}

/// Regression tree with its root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub(super) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Number of split levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = *node {
                let child_depth = depths[idx] + 1;
                depths[left] = child_depth;
                depths[right] = child_depth;
                deepest = deepest.max(child_depth);
            }
        }
        deepest
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    fn validate(&self, tree: usize, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidTree {
                tree,
                node: 0,
                reason: "tree has no nodes",
            });
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let invalid = |reason| ModelError::InvalidTree {
                tree,
                node: idx,
                reason,
            };
            match *node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(invalid("leaf value is not finite"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if feature >= n_features {
                        return Err(invalid("split feature out of range"));
                    }
                    let len = self.nodes.len();
                    if left <= idx || right <= idx || left >= len || right >= len {
                        return Err(invalid("child index out of order"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Fitted gradient-boosted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedGbdt {
    params: HyperParams,
    n_features: usize,
    /// Initial prediction before any tree is applied (mean of the training targets).
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl FittedGbdt {
    pub(super) fn new(
        params: HyperParams,
        n_features: usize,
        base_score: f64,
        trees: Vec<RegressionTree>,
    ) -> Self {
        Self {
            params,
            n_features,
            base_score,
            trees,
        }
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Check structural invariants, typically after deserializing.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx, self.n_features)?;
        }
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        Ok(self.predict_unchecked(row))
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        let mut row = vec![0.0; self.n_features];
        let mut out = Array1::zeros(x.nrows());
        for (pred, features) in out.iter_mut().zip(x.rows()) {
            for (slot, &value) in row.iter_mut().zip(features.iter()) {
                *slot = value;
            }
            *pred = self.predict_unchecked(&row);
        }
        Ok(out)
    }

    fn predict_unchecked(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict(row))
    }
}
