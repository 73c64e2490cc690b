use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::model::{FittedGbdt, ModelError, Node, RegressionTree};
use super::params::{HyperParams, Objective};

/// Nodes with fewer rows than this search splits on the calling thread.
const PARALLEL_MIN_ROWS: usize = 4096;

/// Untrained gradient-boosted regressor, as returned by the model factory.
#[derive(Debug, Clone, PartialEq)]
pub struct GbdtRegressor {
    params: HyperParams,
}

impl GbdtRegressor {
    pub fn new(params: HyperParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    /// Fit on a row-major feature matrix and aligned targets.
    ///
    /// Results depend only on the data and the hyperparameters; `n_jobs` changes how many
    /// threads search for splits, never the fitted trees.
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedGbdt, ModelError> {
        validate_inputs(x, y)?;
        let params = &self.params;
        let n_rows = x.nrows();
        let n_features = x.ncols();

        let cuts: Vec<FeatureCuts> = x
            .columns()
            .into_iter()
            .map(|column| FeatureCuts::from_values(column.iter().copied(), params.max_bin))
            .collect();
        let binned = BinnedMatrix::new(x, &cuts);
        let dense: Vec<f64> = x.iter().copied().collect();
        let targets: Vec<f64> = y.to_vec();

        let base_score = targets.iter().sum::<f64>() / n_rows as f64;
        let mut predictions = vec![base_score; n_rows];
        let mut grad = vec![0.0f64; n_rows];
        let mut hess = vec![0.0f64; n_rows];
        let mut rng = StdRng::seed_from_u64(params.random_state);
        let workers = params.worker_threads().min(n_features).max(1);

        tracing::debug!(
            rows = n_rows,
            features = n_features,
            workers,
            "Fitting gradient-boosted trees"
        );

        let mut trees = Vec::with_capacity(params.n_estimators);
        for round in 0..params.n_estimators {
            for i in 0..n_rows {
                (grad[i], hess[i]) = gradient_pair(params.objective, predictions[i], targets[i]);
            }
            let rows = sample_rows(n_rows, params.subsample, &mut rng);
            let tree = TreeGrower {
                params,
                cuts: &cuts,
                binned: &binned,
                grad: &grad,
                hess: &hess,
                workers,
                nodes: Vec::new(),
            }
            .grow(rows);

            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += tree.predict(&dense[i * n_features..(i + 1) * n_features]);
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                tracing::debug!(
                    round = round + 1,
                    train_mse = squared_error(&predictions, &targets),
                    "Boosting progress"
                );
            }
        }

        Ok(FittedGbdt::new(
            params.clone(),
            n_features,
            base_score,
            trees,
        ))
    }
}

fn validate_inputs(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), ModelError> {
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::EmptyDataset);
    }
    for (row, (features, target)) in x.rows().into_iter().zip(y.iter()).enumerate() {
        if !target.is_finite() || features.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { row });
        }
    }
    Ok(())
}

fn gradient_pair(objective: Objective, prediction: f64, target: f64) -> (f64, f64) {
    match objective {
        Objective::SquaredError => (prediction - target, 1.0),
    }
}

fn squared_error(predictions: &[f64], targets: &[f64]) -> f64 {
    let total: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t) * (p - t))
        .sum();
    total / predictions.len().max(1) as f64
}

/// Uniform row sampling; always keeps at least one row.
fn sample_rows(n_rows: usize, subsample: f64, rng: &mut StdRng) -> Vec<u32> {
    if subsample >= 1.0 {
        return (0..n_rows as u32).collect();
    }
    let mut rows: Vec<u32> = (0..n_rows as u32)
        .filter(|_| rng.random::<f64>() < subsample)
        .collect();
    if rows.is_empty() {
        rows.push(rng.random_range(0..n_rows as u32));
    }
    rows
}

/// Bin upper bounds for one feature; a value falls in the first bin whose bound is `>=` it.
#[derive(Debug, Clone)]
struct FeatureCuts {
    upper: Vec<f64>,
}

impl FeatureCuts {
    /// One bin per distinct value when they fit, otherwise row quantiles.
    fn from_values(values: impl Iterator<Item = f64>, max_bin: usize) -> Self {
        let mut sorted: Vec<f64> = values.collect();
        sorted.sort_by(f64::total_cmp);
        let mut distinct = sorted.clone();
        distinct.dedup();
        if distinct.len() <= max_bin {
            return Self { upper: distinct };
        }
        let n = sorted.len();
        let mut upper: Vec<f64> = (1..=max_bin)
            .map(|k| sorted[(k * n).div_ceil(max_bin) - 1])
            .collect();
        upper.dedup();
        Self { upper }
    }

    fn len(&self) -> usize {
        self.upper.len()
    }

    fn bin(&self, value: f64) -> u16 {
        let idx = self.upper.partition_point(|&bound| bound < value);
        idx.min(self.upper.len().saturating_sub(1)) as u16
    }

    fn threshold(&self, bin: usize) -> f64 {
        self.upper[bin]
    }
}

/// Column-major bin indices.
struct BinnedMatrix {
    columns: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    fn new(x: ArrayView2<'_, f64>, cuts: &[FeatureCuts]) -> Self {
        let columns = x
            .columns()
            .into_iter()
            .zip(cuts)
            .map(|(column, cuts)| column.iter().map(|&v| cuts.bin(v)).collect())
            .collect();
        Self { columns }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: u32,
}

/// Depth-wise grower for a single tree.
struct TreeGrower<'a> {
    params: &'a HyperParams,
    cuts: &'a [FeatureCuts],
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    workers: usize,
    nodes: Vec<Node>,
}

impl TreeGrower<'_> {
    fn grow(mut self, rows: Vec<u32>) -> RegressionTree {
        self.grow_node(rows, 0);
        RegressionTree::from_nodes(self.nodes)
    }

    fn grow_node(&mut self, rows: Vec<u32>, depth: usize) -> usize {
        let (grad_sum, hess_sum) = rows.iter().fold((0.0, 0.0), |(g, h), &row| {
            (g + self.grad[row as usize], h + self.hess[row as usize])
        });
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(grad_sum, hess_sum),
        });
        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(split) = self.best_split(&rows, grad_sum, hess_sum) else {
            return idx;
        };

        let binned = self.binned;
        let column = &binned.columns[split.feature];
        let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = rows
            .into_iter()
            .partition(|&row| usize::from(column[row as usize]) <= split.bin);
        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: self.cuts[split.feature].threshold(split.bin),
            left,
            right,
        };
        idx
    }

    /// Newton step `-G / (H + lambda)`, shrunk by the learning rate.
    fn leaf_value(&self, grad_sum: f64, hess_sum: f64) -> f64 {
        -grad_sum / (hess_sum + self.params.reg_lambda) * self.params.learning_rate
    }

    fn best_split(&self, rows: &[u32], grad_sum: f64, hess_sum: f64) -> Option<SplitCandidate> {
        let n_features = self.cuts.len();
        let per_feature: Vec<Option<SplitCandidate>> =
            if self.workers <= 1 || rows.len() < PARALLEL_MIN_ROWS {
                (0..n_features)
                    .map(|feature| self.best_split_for_feature(feature, rows, grad_sum, hess_sum))
                    .collect()
            } else {
                let chunk = n_features.div_ceil(self.workers);
                std::thread::scope(|scope| {
                    let handles: Vec<_> = (0..n_features)
                        .step_by(chunk)
                        .map(|start| {
                            let end = (start + chunk).min(n_features);
                            scope.spawn(move || {
                                (start..end)
                                    .map(|feature| {
                                        self.best_split_for_feature(
                                            feature, rows, grad_sum, hess_sum,
                                        )
                                    })
                                    .collect::<Vec<_>>()
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .flat_map(|handle| {
                            handle
                                .join()
                                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                        })
                        .collect()
                })
            };

        // Ties resolve to the lowest feature index.
        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(current) if current.gain >= candidate.gain => Some(current),
                _ => Some(candidate),
            })
    }

    fn best_split_for_feature(
        &self,
        feature: usize,
        rows: &[u32],
        grad_sum: f64,
        hess_sum: f64,
    ) -> Option<SplitCandidate> {
        let n_bins = self.cuts[feature].len();
        if n_bins < 2 {
            return None;
        }
        let column = &self.binned.columns[feature];
        let mut hist = vec![BinStats::default(); n_bins];
        for &row in rows {
            let row = row as usize;
            let stats = &mut hist[usize::from(column[row])];
            stats.grad += self.grad[row];
            stats.hess += self.hess[row];
            stats.count += 1;
        }

        let lambda = self.params.reg_lambda;
        let min_child_weight = self.params.min_child_weight;
        let total_count = rows.len() as u32;
        let parent_score = grad_sum * grad_sum / (hess_sum + lambda);

        let mut best: Option<SplitCandidate> = None;
        let mut left = BinStats::default();
        for (bin, stats) in hist.iter().enumerate().take(n_bins - 1) {
            left.grad += stats.grad;
            left.hess += stats.hess;
            left.count += stats.count;
            let right_count = total_count - left.count;
            if left.count == 0 || right_count == 0 {
                continue;
            }
            let right_grad = grad_sum - left.grad;
            let right_hess = hess_sum - left.hess;
            if left.hess < min_child_weight || right_hess < min_child_weight {
                continue;
            }
            let gain = 0.5
                * (left.grad * left.grad / (left.hess + lambda)
                    + right_grad * right_grad / (right_hess + lambda)
                    - parent_score)
                - self.params.gamma;
            if gain > best.map_or(0.0, |b| b.gain) {
                best = Some(SplitCandidate { feature, bin, gain });
            }
        }
        best
    }
}
