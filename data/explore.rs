//! # Descriptive Explorer
//!
//! Read-only summaries of a loaded [`Dataset`]: per-feature statistics, class
//! balance, per-class means, Pearson correlations and a text heatmap. Plots
//! are not drawn here; instead the data behind them is written as TSV files
//! that any plotting tool can pick up.

use crate::data::load::Dataset;
use crate::select::transform::{Components, Fit, MinMaxScaler, Pca, PcaState, Transform, TransformError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not write TSV artifact: {0}")]
    Csv(#[from] csv::Error),
    #[error("Feature '{0}' is not present in the dataset.")]
    UnknownFeature(String),
    #[error("Variance curve could not be computed: {0}")]
    Transform(#[from] TransformError),
}

/// Describe-style statistics of one feature column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 divisor); NaN below two rows.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Quantile of sorted values by linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn summarize_column(name: &str, column: ArrayView1<f64>) -> FeatureSummary {
    let count = column.len();
    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mean = column.mean().unwrap_or(f64::NAN);
    let std = if count > 1 { column.std(1.0) } else { f64::NAN };
    FeatureSummary {
        name: name.to_string(),
        count,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

pub fn summarize(dataset: &Dataset) -> Vec<FeatureSummary> {
    dataset
        .feature_names
        .iter()
        .zip(dataset.features.axis_iter(Axis(1)))
        .map(|(name, column)| summarize_column(name, column))
        .collect()
}

pub fn render_summary_table(summaries: &[FeatureSummary]) -> String {
    let width = summaries
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(7)
        .max(7);
    let mut out = format!(
        "{:<width$} {:>6} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11}\n",
        "feature", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<width$} {:>6} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>11.4}",
            s.name, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
        );
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassBalance {
    pub negative: usize,
    pub positive: usize,
}

impl ClassBalance {
    pub fn total(&self) -> usize {
        self.negative + self.positive
    }

    pub fn positive_fraction(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.positive as f64 / self.total() as f64
        }
    }

    pub fn negative_fraction(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.negative as f64 / self.total() as f64
        }
    }
}

pub fn class_balance(dataset: &Dataset) -> ClassBalance {
    let positive = dataset.positive_count();
    ClassBalance {
        negative: dataset.n_samples() - positive,
        positive,
    }
}

/// Per-class feature means, shape [2, n_features]: row 0 is the negative
/// class, row 1 the positive class. A class with no rows yields NaN.
pub fn class_means(dataset: &Dataset) -> Array2<f64> {
    let mut means = Array2::from_elem((2, dataset.n_features()), f64::NAN);
    for class in 0..2 {
        let rows: Vec<usize> = dataset
            .labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        if let Some(mean) = dataset.features.select(Axis(0), &rows).mean_axis(Axis(0)) {
            means.row_mut(class).assign(&mean);
        }
    }
    means
}

/// Pearson correlation between every pair of columns. A constant column
/// correlates 0 with every other column and 1 with itself.
pub fn correlation_matrix(features: ArrayView2<f64>) -> Array2<f64> {
    let n_features = features.ncols();
    let mut corr = Array2::eye(n_features);
    let Some(mean) = features.mean_axis(Axis(0)) else {
        return corr;
    };
    let centered = &features - &mean;
    let norms: Array1<f64> = centered
        .axis_iter(Axis(1))
        .map(|column| column.dot(&column).sqrt())
        .collect();
    for i in 0..n_features {
        for j in (i + 1)..n_features {
            let denominator = norms[i] * norms[j];
            let r = if denominator > 0.0 {
                (centered.column(i).dot(&centered.column(j)) / denominator).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub r: f64,
}

/// Pairs with |r| at or above `threshold`, strongest first.
pub fn correlated_pairs(corr: &Array2<f64>, names: &[String], threshold: f64) -> Vec<CorrelatedPair> {
    let mut pairs = Vec::new();
    for i in 0..corr.nrows() {
        for j in (i + 1)..corr.ncols() {
            let r = corr[[i, j]];
            if r.abs() >= threshold {
                pairs.push(CorrelatedPair {
                    first: names[i].clone(),
                    second: names[j].clone(),
                    r,
                });
            }
        }
    }
    pairs.sort_by(|a, b| b.r.abs().total_cmp(&a.r.abs()));
    pairs
}

const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Text heatmap of a correlation matrix. Each cell is a sign marker followed
/// by a shade proportional to |r|.
pub fn render_heatmap(corr: &Array2<f64>, names: &[String]) -> String {
    let width = names.iter().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    let _ = write!(out, "{:>width$}    ", "");
    for j in 0..corr.ncols() {
        let _ = write!(out, "{:>2}", j % 100);
    }
    out.push('\n');
    for (i, name) in names.iter().enumerate().take(corr.nrows()) {
        let _ = write!(out, "{name:>width$} {i:>2} ");
        for j in 0..corr.ncols() {
            let r = corr[[i, j]];
            let level = (r.abs() * (SHADES.len() - 1) as f64).round() as usize;
            let sign = if r < 0.0 { '-' } else { ' ' };
            out.push(sign);
            out.push(SHADES[level.min(SHADES.len() - 1)]);
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "shade by |r|: ' ' < 0.125 <= '░' < 0.375 <= '▒' < 0.625 <= '▓' < 0.875 <= '█'; '-' marks negative r"
    );
    out
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, ExploreError> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Long-format correlation table: one row per ordered feature pair.
pub fn write_correlation_tsv(path: &Path, corr: &Array2<f64>, names: &[String]) -> Result<(), ExploreError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["feature_a", "feature_b", "r"])?;
    for (i, a) in names.iter().enumerate() {
        for (j, b) in names.iter().enumerate() {
            let r = format!("{:.6}", corr[[i, j]]);
            writer.write_record([a.as_str(), b.as_str(), r.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Selected feature columns plus the label, one row per sample.
pub fn write_pairplot_tsv(path: &Path, dataset: &Dataset, features: &[String]) -> Result<(), ExploreError> {
    let columns = features
        .iter()
        .map(|name| {
            dataset
                .feature_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| ExploreError::UnknownFeature(name.clone()))
        })
        .collect::<Result<Vec<usize>, ExploreError>>()?;

    let mut writer = tsv_writer(path)?;
    let mut header: Vec<&str> = features.iter().map(String::as_str).collect();
    header.push("label");
    writer.write_record(&header)?;
    for (row, label) in dataset.features.axis_iter(Axis(0)).zip(dataset.labels.iter()) {
        let mut record: Vec<String> = columns.iter().map(|&c| row[c].to_string()).collect();
        record.push(label.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// PCA over min-max scaled features, keeping every component.
pub fn variance_curve(features: ArrayView2<f64>, labels: ArrayView1<usize>) -> Result<PcaState, ExploreError> {
    let scaled = MinMaxScaler.fit(features, labels)?.transform(features)?;
    Ok(Pca::new(Components::All).fit(scaled.view(), labels)?)
}

pub fn write_variance_curve_tsv(path: &Path, pca: &PcaState) -> Result<(), ExploreError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["component", "ratio", "cumulative"])?;
    let cumulative = pca.cumulative_variance_ratio();
    for (index, (ratio, total)) in pca
        .explained_variance_ratio()
        .iter()
        .zip(cumulative.iter())
        .enumerate()
    {
        writer.write_record([(index + 1).to_string(), format!("{ratio:.6}"), format!("{total:.6}")])?;
    }
    writer.flush()?;
    Ok(())
}
