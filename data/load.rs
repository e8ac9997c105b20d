//! # Dataset Loading and Validation Module
//!
//! This module is the single entry point for user-provided data. It reads a
//! delimited file with a header row, strips the columns that carry no
//! measurement (the identifier and any column that is entirely empty),
//! reports missing values, and turns what remains into the `ndarray`
//! structures used by the explorer and the model-selection core.
//!
//! - Fixed layout: one categorical label column with exactly two accepted
//!   values, every other retained column numeric.
//! - User-centric errors: failures are assumed to be user-input errors and
//!   `DataError` names the offending column or row.

use ndarray::{Array1, Array2, ShapeBuilder};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// What to do with rows that have a missing value in a retained column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Report the counts, then drop every incomplete row.
    DropRows,
    /// Report the counts, then refuse the file.
    Fail,
}

/// Schema and cleaning options for [`load_dataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    pub separator: char,
    /// Identifier column, dropped before analysis when present.
    pub id_column: String,
    pub label_column: String,
    /// Label value encoded as class 1.
    pub positive_label: String,
    /// Label value encoded as class 0.
    pub negative_label: String,
    pub missing: MissingPolicy,
    pub min_rows: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            id_column: "id".to_string(),
            label_column: "diagnosis".to_string(),
            positive_label: "M".to_string(),
            negative_label: "B".to_string(),
            missing: MissingPolicy::DropRows,
            min_rows: 10,
        }
    }
}

/// A validated table: numeric features plus a binary label per row.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Feature column names, in file order.
    pub feature_names: Vec<String>,
    /// Shape: [n_samples, n_features].
    pub features: Array2<f64>,
    /// 1 for the positive label, 0 for the negative label.
    pub labels: Array1<usize>,
    /// Columns removed before analysis (identifier and all-null columns).
    pub dropped_columns: Vec<String>,
    /// Per-column missing-value counts observed in the raw file, for columns with any.
    pub missing_counts: Vec<(String, usize)>,
    /// Number of incomplete rows removed under [`MissingPolicy::DropRows`].
    pub dropped_rows: usize,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&label| label == 1).count()
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. The configured policy requires complete data."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. All features must be finite."
    )]
    NonFiniteValuesFound(String),
    #[error(
        "Row {row} has label '{value}', but only '{positive}' and '{negative}' are accepted in column '{column}'."
    )]
    UnexpectedLabel {
        column: String,
        value: String,
        row: usize,
        positive: String,
        negative: String,
    },
    #[error("Input file contains only {found} usable data rows, but at least {required} are required.")]
    InsufficientRows { found: usize, required: usize },
    #[error("No numeric feature columns remain after dropping the identifier and empty columns.")]
    NoFeatureColumns,
    #[error("The separator '{0}' is not a single-byte ASCII character.")]
    InvalidSeparator(char),
    #[error("Feature matrix could not be assembled: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

/// Loads, cleans, and validates a labelled table.
pub fn load_dataset(path: &str, options: &LoaderOptions) -> Result<Dataset, DataError> {
    if !options.separator.is_ascii() {
        return Err(DataError::InvalidSeparator(options.separator));
    }

    println!("Loading data from '{path}'");
    let df = CsvReader::new(File::open(Path::new(path))?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(
                    CsvParseOptions::default().with_separator(options.separator as u8),
                ),
        )
        .finish()?;
    println!(
        "Successfully loaded data file: {} rows x {} columns.",
        df.height(),
        df.width()
    );

    let height = df.height();
    if height == 0 {
        return Err(DataError::InsufficientRows {
            found: 0,
            required: options.min_rows,
        });
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let columns_set: HashSet<&str> = column_names.iter().map(String::as_str).collect();
    if !columns_set.contains(options.label_column.as_str()) {
        return Err(DataError::ColumnNotFound(options.label_column.clone()));
    }

    let missing_counts = internal::report_missing(&df, &column_names)?;

    let mut dropped_columns = Vec::new();
    let mut feature_names = Vec::new();
    for name in &column_names {
        if name == &options.label_column {
            continue;
        }
        if name == &options.id_column {
            dropped_columns.push(name.clone());
            continue;
        }
        if df.column(name)?.null_count() == height {
            dropped_columns.push(name.clone());
            continue;
        }
        feature_names.push(name.clone());
    }
    if !dropped_columns.is_empty() {
        println!("Dropping non-measurement columns: {dropped_columns:?}");
    }
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns);
    }

    let labels_raw = internal::extract_label_column(&df, &options.label_column)?;
    let mut columns = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        columns.push(internal::extract_numeric_column(&df, name)?);
    }

    // Every present label is checked, including those on rows dropped below.
    let mut encoded = Vec::with_capacity(height);
    for (row, value) in labels_raw.iter().enumerate() {
        let Some(value) = value.as_deref() else {
            encoded.push(None);
            continue;
        };
        let value = value.trim();
        if value == options.positive_label {
            encoded.push(Some(1));
        } else if value == options.negative_label {
            encoded.push(Some(0));
        } else {
            return Err(DataError::UnexpectedLabel {
                column: options.label_column.clone(),
                value: value.to_string(),
                row: row + 1,
                positive: options.positive_label.clone(),
                negative: options.negative_label.clone(),
            });
        }
    }

    let complete: Vec<bool> = (0..height)
        .map(|row| encoded[row].is_some() && columns.iter().all(|c| c[row].is_some()))
        .collect();
    let dropped_rows = complete.iter().filter(|&&keep| !keep).count();
    if dropped_rows > 0 {
        match options.missing {
            MissingPolicy::Fail => {
                let column = if labels_raw.iter().any(Option::is_none) {
                    options.label_column.clone()
                } else {
                    feature_names
                        .iter()
                        .zip(&columns)
                        .find(|(_, c)| c.iter().any(Option::is_none))
                        .map(|(name, _)| name.clone())
                        .unwrap_or_else(|| options.label_column.clone())
                };
                return Err(DataError::MissingValuesFound(column));
            }
            MissingPolicy::DropRows => {
                println!("Dropping {dropped_rows} incomplete rows.");
                log::warn!("{dropped_rows} of {height} rows dropped for missing values");
            }
        }
    }

    let n = height - dropped_rows;
    if n < options.min_rows {
        return Err(DataError::InsufficientRows {
            found: n,
            required: options.min_rows,
        });
    }

    let labels: Vec<usize> = encoded
        .iter()
        .zip(&complete)
        .filter(|(_, keep)| **keep)
        .filter_map(|(label, _)| *label)
        .collect();

    // Column-major buffer: one column after another.
    let mut buffer = Vec::with_capacity(n * feature_names.len());
    for (name, column) in feature_names.iter().zip(&columns) {
        let start = buffer.len();
        buffer.extend(
            column
                .iter()
                .zip(&complete)
                .filter(|(_, keep)| **keep)
                .filter_map(|(value, _)| *value),
        );
        if buffer[start..].iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(name.clone()));
        }
    }
    let features = Array2::from_shape_vec((n, feature_names.len()).f(), buffer)?;

    println!(
        "Data validation successful: {} samples, {} numeric features.",
        n,
        feature_names.len()
    );

    Ok(Dataset {
        feature_names,
        features,
        labels: Array1::from_vec(labels),
        dropped_columns,
        missing_counts,
        dropped_rows,
    })
}

/// Internal module for column extraction logic.
mod internal {
    use super::*;

    pub(super) fn report_missing(
        df: &DataFrame,
        column_names: &[String],
    ) -> Result<Vec<(String, usize)>, DataError> {
        let mut counts = Vec::new();
        for name in column_names {
            let nulls = df.column(name)?.null_count();
            if nulls > 0 {
                counts.push((name.clone(), nulls));
            }
        }
        if counts.is_empty() {
            println!("No missing values found.");
        } else {
            println!("Missing values per column:");
            for (name, nulls) in &counts {
                println!("  {name:<28} {nulls}");
            }
        }
        Ok(counts)
    }

    pub(super) fn extract_label_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<String>>, DataError> {
        let casted = df.column(column_name)?.cast(&DataType::String)?;
        let values = casted
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }

    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<f64>>, DataError> {
        let series = df.column(column_name)?;
        let wrong_type = || DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        };

        let casted = series
            .cast(&DataType::Float64)
            .map_err(|_| wrong_type())?;
        // A lossy cast turns unparsable text into extra nulls.
        if casted.null_count() > series.null_count() {
            return Err(wrong_type());
        }

        Ok(casted.f64()?.into_iter().collect())
    }
}
