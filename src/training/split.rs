//! Seeded train/test partitioning.

use ndarray::{Array1, Array2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Row indices for each side of a split, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(test_size * n_rows)` rows.
///
/// The same `n_rows`, `test_size` and `seed` always give the same partition.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> TrainTestSplit {
    let n_test = ((test_size * n_rows as f64).ceil() as usize).min(n_rows);
    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(n_test);
    TrainTestSplit { train, test: order }
}

impl TrainTestSplit {
    /// Gather the selected rows of a feature matrix and target vector.
    pub fn select(
        indices: &[usize],
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> (Array2<f64>, Array1<f64>) {
        (x.select(Axis(0), indices), y.select(Axis(0), indices))
    }
}
