//! Feature derivation shared by the training pipeline and the inference service.
//!
//! Raw records carry at least `price` and `freight_value`. The derived schema is always the
//! four columns in [`FEATURE_COLUMNS`], in that order:
//!
//! - `price`
//! - `freight_value`
//! - `total_value = price + freight_value`
//! - `high_freight`, `1` when `freight_value` is strictly above the freight median, else `0`

use std::collections::BTreeMap;

use ndarray::Array2;
use serde_json::{Map, Value};
use thiserror::Error;

/// Columns every raw table must provide.
pub const REQUIRED_COLUMNS: [&str; 2] = ["price", "freight_value"];

/// Derived feature columns, in model input order.
pub const FEATURE_COLUMNS: [&str; 4] = ["price", "freight_value", "total_value", "high_freight"];

/// Number of derived features per row.
pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Missing required columns in dataset: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
    #[error("Column '{column}' must be numeric")]
    NonNumeric { column: String },
    #[error("Column '{column}' has a non-finite value at row {row}")]
    NonFinite { column: String, row: usize },
    #[error("Column '{column}' has {actual} rows but the table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Column-oriented table of named numeric columns sharing one row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl RawTable {
    /// Empty table with a fixed row count; columns added later must match it.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            columns: BTreeMap::new(),
            rows,
        }
    }

    /// Build a table from `(name, values)` pairs. The first column fixes the row count.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut iter = columns.into_iter().peekable();
        let rows = iter.peek().map(|(_, values)| values.len()).unwrap_or(0);
        let mut table = Self::with_rows(rows);
        for (name, values) in iter {
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    /// Build a single-row table from a flat JSON object.
    ///
    /// Numeric fields become columns; other fields are ignored unless they are one of the
    /// [`REQUIRED_COLUMNS`], which must be numeric when present.
    pub fn from_json_record(record: &Map<String, Value>) -> Result<Self, FeatureError> {
        let mut table = Self::with_rows(1);
        for (key, value) in record {
            match value.as_f64() {
                Some(number) => table.insert_column(key.clone(), vec![number])?,
                None if REQUIRED_COLUMNS.contains(&key.as_str()) => {
                    return Err(FeatureError::NonNumeric {
                        column: key.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(table)
    }

    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), FeatureError> {
        let name = name.into();
        if values.len() != self.rows {
            return Err(FeatureError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Return `price` and `freight_value`, validating presence and finiteness.
    pub fn price_and_freight(&self) -> Result<(&[f64], &[f64]), FeatureError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !self.columns.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns { missing });
        }
        let price = self.finite_column("price")?;
        let freight = self.finite_column("freight_value")?;
        Ok((price, freight))
    }

    fn finite_column(&self, name: &str) -> Result<&[f64], FeatureError> {
        let values = self.column(name).unwrap_or(&[]);
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite {
                column: name.to_string(),
                row,
            });
        }
        Ok(values)
    }
}

/// One derived row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub price: f64,
    pub freight_value: f64,
    pub total_value: f64,
    pub high_freight: u8,
}

impl FeatureVector {
    /// Values in [`FEATURE_COLUMNS`] order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.price,
            self.freight_value,
            self.total_value,
            f64::from(self.high_freight),
        ]
    }
}

/// Derived features for a batch, row order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn columns(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &FEATURE_COLUMNS
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row-major design matrix with [`FEATURE_COUNT`] columns.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows.len(), FEATURE_COUNT));
        for (mut dest, row) in out.rows_mut().into_iter().zip(&self.rows) {
            for (cell, value) in dest.iter_mut().zip(row.as_array()) {
                *cell = value;
            }
        }
        out
    }
}

/// Derive features using the freight median of `table` itself.
///
/// A single-row table always gets `high_freight = 0`, since a value never exceeds its own
/// median.
pub fn derive_features(table: &RawTable) -> Result<FeatureTable, FeatureError> {
    let (_, freight) = table.price_and_freight()?;
    let threshold = median(freight).unwrap_or(f64::NAN);
    derive_features_with_threshold(table, threshold)
}

/// Derive features against a caller-supplied freight threshold, typically the median
/// recorded at training time.
pub fn derive_features_with_threshold(
    table: &RawTable,
    freight_threshold: f64,
) -> Result<FeatureTable, FeatureError> {
    tracing::debug!(rows = table.len(), "Starting feature engineering");
    let (price, freight) = table.price_and_freight()?;
    let rows = price
        .iter()
        .zip(freight)
        .map(|(&price, &freight_value)| FeatureVector {
            price,
            freight_value,
            total_value: price + freight_value,
            high_freight: u8::from(freight_value > freight_threshold),
        })
        .collect();
    Ok(FeatureTable { rows })
}

/// Median with the even-length convention of averaging the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
