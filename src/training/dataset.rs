//! CSV loading for the raw order-items dataset.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::PipelineError;
use crate::features::{REQUIRED_COLUMNS, RawTable};

/// Load the numeric columns the pipeline needs from a CSV file with a header row.
///
/// Columns absent from the header are left out of the table, so the feature deriver can
/// report every missing column at once.
pub fn load_dataset(path: &Path) -> Result<RawTable, PipelineError> {
    tracing::info!("Loading dataset from {}", path.display());
    if !path.is_file() {
        return Err(PipelineError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let headers = reader.headers().map_err(csv_err)?.clone();

    let wanted: Vec<(usize, &str)> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|name| {
            headers
                .iter()
                .position(|header| header.trim() == *name)
                .map(|idx| (idx, *name))
        })
        .collect();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); wanted.len()];

    let mut rows = 0usize;
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        for ((idx, name), column) in wanted.iter().zip(values.iter_mut()) {
            let field = record.get(*idx).unwrap_or("").trim();
            let value = field
                .parse::<f64>()
                .map_err(|_| PipelineError::InvalidCell {
                    row: rows + 1,
                    column: name.to_string(),
                    value: field.to_string(),
                })?;
            column.push(value);
        }
        rows += 1;
    }

    let mut table = RawTable::with_rows(rows);
    for ((_, name), column) in wanted.into_iter().zip(values) {
        table.insert_column(name, column)?;
    }
    tracing::info!(rows, "Dataset loaded");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_required_columns_and_ignores_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(
            &path,
            "order_id,order_item_id,price,freight_value\n\
             a1,1,58.90,13.29\n\
             b2,1,239.90,19.93\n",
        )
        .unwrap();
        let table = load_dataset(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("price"), Some(&[58.90, 239.90][..]));
        assert_eq!(table.column("freight_value"), Some(&[13.29, 19.93][..]));
        assert!(table.column("order_item_id").is_none());
    }

    #[test]
    fn missing_file_is_dataset_not_found() {
        let dir = tempdir().unwrap();
        let err = load_dataset(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetNotFound { .. }));
    }

    #[test]
    fn absent_header_leaves_column_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "price,seller\n1.0,x\n").unwrap();
        let table = load_dataset(&path).unwrap();
        assert!(table.column("price").is_some());
        assert!(table.column("freight_value").is_none());
    }

    #[test]
    fn unparseable_cell_names_row_and_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "price,freight_value\n1.0,2.0\n3.0,oops\n").unwrap();
        let err = load_dataset(&path).unwrap_err();
        match err {
            PipelineError::InvalidCell { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "freight_value");
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
