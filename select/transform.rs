//! # Feature Transformer Stage
//!
//! Each transformer is split in two: a configuration value implementing
//! [`Fit`], and the immutable state that fitting produces, implementing
//! [`Transform`]. State can only be obtained by fitting on training rows,
//! and `transform` borrows it immutably, so a fitted stage is applied
//! unchanged to validation and test rows.
//!
//! - [`MinMaxScaler`]: linear map of each feature onto [0, 1] over the
//!   training range, without clipping.
//! - [`StandardScaler`]: zero mean, unit variance over the training rows.
//! - [`Pca`]: projection onto the directions of largest training variance,
//!   from the eigendecomposition of the sample covariance.
//! - [`SelectKBest`]: univariate one-way ANOVA F scores against the label.

use crate::select::faer_ndarray::{FaerLinalgError, descending_eigh};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Cannot fit a transformer on zero rows.")]
    EmptyInput,
    #[error("Non-finite value at row {row}, column {column}.")]
    NonFinite { row: usize, column: usize },
    #[error("Feature matrix has {rows} rows but the label vector has {labels}.")]
    LabelMismatch { rows: usize, labels: usize },
    #[error("Transformer was fitted on {expected} features but received {found}.")]
    FeatureMismatch { expected: usize, found: usize },
    #[error("Requested {requested} principal components but at most {max} are available.")]
    TooManyComponents { requested: usize, max: usize },
    #[error("PCA needs at least 2 rows to estimate a covariance, got {0}.")]
    TooFewRows(usize),
    #[error("Invalid component setting: {0}")]
    InvalidComponents(String),
    #[error("Invalid feature selection setting: {0}")]
    InvalidSelection(String),
    #[error("Univariate scoring needs at least two classes, found {0}.")]
    TooFewClasses(usize),
    #[error("Eigendecomposition of the training covariance failed: {0}")]
    Linalg(#[from] FaerLinalgError),
}

/// Learns transformer state from training rows.
pub trait Fit {
    type State: Transform;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<usize>)
    -> Result<Self::State, TransformError>;
}

/// Applies fitted state to any rows with the fitted feature count.
pub trait Transform {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError>;
    fn n_features_in(&self) -> usize;
    fn n_features_out(&self) -> usize;
}

fn validate_fit_input(x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<(), TransformError> {
    if x.nrows() == 0 {
        return Err(TransformError::EmptyInput);
    }
    if x.nrows() != y.len() {
        return Err(TransformError::LabelMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if let Some(((row, column), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(TransformError::NonFinite { row, column });
    }
    Ok(())
}

fn check_width(expected: usize, x: ArrayView2<f64>) -> Result<(), TransformError> {
    if x.ncols() != expected {
        return Err(TransformError::FeatureMismatch {
            expected,
            found: x.ncols(),
        });
    }
    Ok(())
}

// --- Range scaler ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxState {
    min: Array1<f64>,
    /// max - min, or 1 for constant features.
    range: Array1<f64>,
}

impl MinMaxState {
    pub fn data_min(&self) -> &Array1<f64> {
        &self.min
    }

    pub fn data_range(&self) -> &Array1<f64> {
        &self.range
    }
}

impl Fit for MinMaxScaler {
    type State = MinMaxState;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<MinMaxState, TransformError> {
        validate_fit_input(x, y)?;
        let min = x.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
        let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));
        let range = (&max - &min).mapv(|r| if r > 0.0 { r } else { 1.0 });
        Ok(MinMaxState { min, range })
    }
}

impl Transform for MinMaxState {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        check_width(self.min.len(), x)?;
        Ok((&x - &self.min) / &self.range)
    }

    fn n_features_in(&self) -> usize {
        self.min.len()
    }

    fn n_features_out(&self) -> usize {
        self.min.len()
    }
}

// --- Standard scaler ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardState {
    mean: Array1<f64>,
    /// Population standard deviation, or 1 for constant features.
    scale: Array1<f64>,
}

impl Fit for StandardScaler {
    type State = StandardState;

    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<StandardState, TransformError> {
        validate_fit_input(x, y)?;
        let mean = x.mean_axis(Axis(0)).ok_or(TransformError::EmptyInput)?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Ok(StandardState { mean, scale })
    }
}

impl Transform for StandardState {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        check_width(self.mean.len(), x)?;
        Ok((&x - &self.mean) / &self.scale)
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn n_features_out(&self) -> usize {
        self.mean.len()
    }
}

// --- Principal component analysis ---

/// How many principal components to keep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Components {
    Count(usize),
    /// Smallest count whose cumulative explained-variance ratio reaches the fraction.
    VarianceFraction(f64),
    All,
}

impl fmt::Display for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Components::Count(k) => write!(f, "{k}"),
            Components::VarianceFraction(fraction) => write!(f, "{fraction}"),
            Components::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub components: Components,
}

impl Pca {
    pub fn new(components: Components) -> Self {
        Self { components }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaState {
    mean: Array1<f64>,
    /// Retained directions as rows, shape [n_components, n_features].
    components: Array2<f64>,
    /// Variance along every direction, not only the retained ones.
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl PcaState {
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    /// Running sum of the explained-variance ratio over every direction.
    pub fn cumulative_variance_ratio(&self) -> Array1<f64> {
        let mut total = 0.0;
        self.explained_variance_ratio.mapv(|r| {
            total += r;
            total.min(1.0)
        })
    }
}

impl Fit for Pca {
    type State = PcaState;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<PcaState, TransformError> {
        validate_fit_input(x, y)?;
        let (n, p) = x.dim();
        if n < 2 {
            return Err(TransformError::TooFewRows(n));
        }
        let max_components = n.min(p);

        let mean = x.mean_axis(Axis(0)).ok_or(TransformError::EmptyInput)?;
        let centered = &x - &mean;
        let covariance = centered.t().dot(&centered) / (n as f64 - 1.0);
        let eigen = descending_eigh(&covariance)?;

        let explained_variance = eigen.values.mapv(|v| v.max(0.0));
        let total: f64 = explained_variance.sum();
        let explained_variance_ratio = if total > 0.0 {
            explained_variance.mapv(|v| v / total)
        } else {
            Array1::zeros(p)
        };

        let k = match self.components {
            Components::Count(k) => {
                if k == 0 {
                    return Err(TransformError::InvalidComponents(
                        "component count must be positive".to_string(),
                    ));
                }
                if k > max_components {
                    return Err(TransformError::TooManyComponents {
                        requested: k,
                        max: max_components,
                    });
                }
                k
            }
            Components::VarianceFraction(fraction) => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(TransformError::InvalidComponents(format!(
                        "variance fraction must be in (0, 1], got {fraction}"
                    )));
                }
                let mut cumulative = 0.0;
                let mut k = max_components;
                for (i, ratio) in explained_variance_ratio.iter().enumerate() {
                    cumulative += ratio;
                    if cumulative >= fraction - 1e-12 {
                        k = i + 1;
                        break;
                    }
                }
                k.min(max_components)
            }
            Components::All => max_components,
        };

        log::debug!(
            "PCA retained {k} of {p} components ({:.4} of variance)",
            explained_variance_ratio.iter().take(k).sum::<f64>()
        );

        Ok(PcaState {
            mean,
            components: eigen.vectors.slice(ndarray::s![..k, ..]).to_owned(),
            explained_variance,
            explained_variance_ratio,
        })
    }
}

impl Transform for PcaState {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        check_width(self.mean.len(), x)?;
        Ok((&x - &self.mean).dot(&self.components.t()))
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn n_features_out(&self) -> usize {
        self.components.nrows()
    }
}

// --- Univariate feature selection ---

/// How many of the best-scoring features to keep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    K(usize),
    /// Percentage of features in (0, 100], rounded up, at least one.
    Percentile(f64),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::K(k) => write!(f, "k={k}"),
            Selection::Percentile(p) => write!(f, "{p}%"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectKBest {
    pub selection: Selection,
}

impl SelectKBest {
    pub fn new(selection: Selection) -> Self {
        Self { selection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionState {
    scores: Array1<f64>,
    /// Retained feature indices, ascending.
    selected: Vec<usize>,
}

impl SelectionState {
    pub fn scores(&self) -> &Array1<f64> {
        &self.scores
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }
}

/// One-way ANOVA F statistic of every feature against the class label.
///
/// A feature with no within-class spread scores infinity when its class means
/// differ and 0 when it is constant.
pub fn anova_f_scores(
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<Array1<f64>, TransformError> {
    validate_fit_input(x, y)?;
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in y.iter().enumerate() {
        groups.entry(label).or_default().push(row);
    }
    let n_classes = groups.len();
    let n = x.nrows();
    if n_classes < 2 {
        return Err(TransformError::TooFewClasses(n_classes));
    }
    if n <= n_classes {
        return Err(TransformError::InvalidSelection(format!(
            "{n} rows are too few to score {n_classes} classes"
        )));
    }
    let df_between = (n_classes - 1) as f64;
    let df_within = (n - n_classes) as f64;

    Ok(Array1::from_iter(x.axis_iter(Axis(1)).map(|column| {
        let grand_mean = column.sum() / n as f64;
        let mut between = 0.0;
        let mut within = 0.0;
        for rows in groups.values() {
            let mean = rows.iter().map(|&r| column[r]).sum::<f64>() / rows.len() as f64;
            between += rows.len() as f64 * (mean - grand_mean).powi(2);
            within += rows.iter().map(|&r| (column[r] - mean).powi(2)).sum::<f64>();
        }
        if within > 0.0 {
            (between / df_between) / (within / df_within)
        } else if between > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    })))
}

impl Fit for SelectKBest {
    type State = SelectionState;

    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<SelectionState, TransformError> {
        let scores = anova_f_scores(x, y)?;
        let p = scores.len();
        let keep = match self.selection {
            Selection::K(k) if k == 0 || k > p => {
                return Err(TransformError::InvalidSelection(format!(
                    "k must be between 1 and {p}, got {k}"
                )));
            }
            Selection::K(k) => k,
            Selection::Percentile(pct) if !(pct > 0.0 && pct <= 100.0) => {
                return Err(TransformError::InvalidSelection(format!(
                    "percentile must be in (0, 100], got {pct}"
                )));
            }
            Selection::Percentile(pct) => ((pct / 100.0 * p as f64).ceil() as usize).clamp(1, p),
        };

        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        let mut selected: Vec<usize> = order.into_iter().take(keep).collect();
        selected.sort_unstable();
        Ok(SelectionState { scores, selected })
    }
}

impl Transform for SelectionState {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        check_width(self.scores.len(), x)?;
        Ok(x.select(Axis(1), &self.selected))
    }

    fn n_features_in(&self) -> usize {
        self.scores.len()
    }

    fn n_features_out(&self) -> usize {
        self.selected.len()
    }
}

// --- Heterogeneous stage list ---

/// One preprocessing step of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    MinMax,
    Standard,
    Pca(Pca),
    SelectKBest(SelectKBest),
}

impl StageSpec {
    pub fn name(&self) -> &'static str {
        match self {
            StageSpec::MinMax => "minmax",
            StageSpec::Standard => "standard",
            StageSpec::Pca(_) => "pca",
            StageSpec::SelectKBest(_) => "select",
        }
    }

    /// Named hyperparameters of this stage, prefixed with the stage name.
    pub fn params(&self) -> Vec<(String, String)> {
        match self {
            StageSpec::MinMax | StageSpec::Standard => Vec::new(),
            StageSpec::Pca(pca) => vec![("pca__n_components".to_string(), pca.components.to_string())],
            StageSpec::SelectKBest(select) => vec![(
                "select__selection".to_string(),
                select.selection.to_string(),
            )],
        }
    }
}

/// State of a fitted [`StageSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedStage {
    MinMax(MinMaxState),
    Standard(StandardState),
    Pca(PcaState),
    SelectKBest(SelectionState),
}

impl Fit for StageSpec {
    type State = FittedStage;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<FittedStage, TransformError> {
        Ok(match self {
            StageSpec::MinMax => FittedStage::MinMax(MinMaxScaler.fit(x, y)?),
            StageSpec::Standard => FittedStage::Standard(StandardScaler.fit(x, y)?),
            StageSpec::Pca(pca) => FittedStage::Pca(pca.fit(x, y)?),
            StageSpec::SelectKBest(select) => FittedStage::SelectKBest(select.fit(x, y)?),
        })
    }
}

impl FittedStage {
    fn inner(&self) -> &dyn Transform {
        match self {
            FittedStage::MinMax(state) => state,
            FittedStage::Standard(state) => state,
            FittedStage::Pca(state) => state,
            FittedStage::SelectKBest(state) => state,
        }
    }
}

impl Transform for FittedStage {
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        self.inner().transform(x)
    }

    fn n_features_in(&self) -> usize {
        self.inner().n_features_in()
    }

    fn n_features_out(&self) -> usize {
        self.inner().n_features_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array, array};

    fn labels(n: usize) -> Array1<usize> {
        Array1::from_shape_fn(n, |i| i % 2)
    }

    #[test]
    fn minmax_maps_training_extremes_to_unit_interval() {
        let x = array![[1.0, -5.0], [3.0, 5.0], [2.0, 0.0]];
        let state = MinMaxScaler.fit(x.view(), labels(3).view()).unwrap();
        let out = state.transform(x.view()).unwrap();

        for j in 0..2 {
            let column = out.column(j);
            assert_abs_diff_eq!(column.fold(f64::INFINITY, |a, &b| a.min(b)), 0.0);
            assert_abs_diff_eq!(column.fold(f64::NEG_INFINITY, |a, &b| a.max(b)), 1.0);
        }
        assert_abs_diff_eq!(out[[2, 0]], 0.5);
    }

    #[test]
    fn minmax_does_not_clip_unseen_values() {
        let train = array![[0.0], [10.0]];
        let state = MinMaxScaler.fit(train.view(), labels(2).view()).unwrap();
        let test = array![[-5.0], [20.0]];
        let out = state.transform(test.view()).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], -0.5);
        assert_abs_diff_eq!(out[[1, 0]], 2.0);
    }

    #[test]
    fn minmax_constant_feature_maps_to_zero() {
        let x = array![[4.0, 1.0], [4.0, 2.0]];
        let state = MinMaxScaler.fit(x.view(), labels(2).view()).unwrap();
        let out = state.transform(x.view()).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 0.0);
        assert_abs_diff_eq!(out[[1, 0]], 0.0);
    }

    #[test]
    fn fit_rejects_empty_and_non_finite_input() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            MinMaxScaler.fit(empty.view(), Array1::zeros(0).view()),
            Err(TransformError::EmptyInput)
        ));

        let x = array![[1.0, f64::NAN], [2.0, 3.0]];
        assert!(matches!(
            Pca::new(Components::All).fit(x.view(), labels(2).view()),
            Err(TransformError::NonFinite { row: 0, column: 1 })
        ));
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let state = StandardScaler.fit(x.view(), labels(2).view()).unwrap();
        let wide = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            state.transform(wide.view()),
            Err(TransformError::FeatureMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn standard_scaler_centers_and_scales() {
        let x = array![[1.0], [3.0], [5.0], [7.0]];
        let state = StandardScaler.fit(x.view(), labels(4).view()).unwrap();
        let out = state.transform(x.view()).unwrap();
        assert_abs_diff_eq!(out.sum(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.std(0.0), 1.0, epsilon = 1e-12);
    }

    fn correlated_data() -> Array2<f64> {
        Array::from_shape_fn((40, 4), |(i, j)| {
            let t = i as f64 / 4.0;
            match j {
                0 => t,
                1 => 2.0 * t + (i % 3) as f64 * 0.1,
                2 => ((i * 7) % 5) as f64,
                _ => -t + ((i * 3) % 4) as f64 * 0.2,
            }
        })
    }

    #[test]
    fn pca_cumulative_variance_is_monotone_and_complete() {
        let x = correlated_data();
        let state = Pca::new(Components::All).fit(x.view(), labels(40).view()).unwrap();
        let cumulative = state.cumulative_variance_ratio();

        assert_eq!(cumulative.len(), 4);
        for w in cumulative.windows(2) {
            assert!(w[1] >= w[0] - 1e-12);
        }
        assert_abs_diff_eq!(cumulative[3], 1.0, epsilon = 1e-9);
        for w in state.explained_variance().windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn pca_projection_of_training_rows_is_centered() {
        let x = correlated_data();
        let state = Pca::new(Components::Count(2))
            .fit(x.view(), labels(40).view())
            .unwrap();
        let projected = state.transform(x.view()).unwrap();

        assert_eq!(projected.dim(), (40, 2));
        for column in projected.columns() {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-9);
        }
        let var0 = projected.column(0).var(1.0);
        assert_abs_diff_eq!(var0, state.explained_variance()[0], epsilon = 1e-8);
    }

    #[test]
    fn pca_variance_fraction_picks_smallest_sufficient_count() {
        let x = correlated_data();
        let y = labels(40);
        let full = Pca::new(Components::All).fit(x.view(), y.view()).unwrap();
        let first = full.explained_variance_ratio()[0];

        let state = Pca::new(Components::VarianceFraction(first * 0.5))
            .fit(x.view(), y.view())
            .unwrap();
        assert_eq!(state.n_components(), 1);

        let state = Pca::new(Components::VarianceFraction(1.0))
            .fit(x.view(), y.view())
            .unwrap();
        assert!(state.n_components() >= 3);
    }

    #[test]
    fn pca_rejects_too_many_components() {
        let x = correlated_data();
        assert!(matches!(
            Pca::new(Components::Count(5)).fit(x.view(), labels(40).view()),
            Err(TransformError::TooManyComponents {
                requested: 5,
                max: 4
            })
        ));
    }

    #[test]
    fn anova_scores_rank_separating_feature_first() {
        // Column 0 separates the classes, column 1 is noise, column 2 is constant.
        let x = array![
            [0.0, 1.0, 3.0],
            [10.0, 2.0, 3.0],
            [0.5, 2.0, 3.0],
            [10.5, 1.0, 3.0],
            [0.2, 1.5, 3.0],
            [9.8, 1.5, 3.0]
        ];
        let y = labels(6);
        let scores = anova_f_scores(x.view(), y.view()).unwrap();
        assert!(scores[0] > scores[1]);
        assert_abs_diff_eq!(scores[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[2], 0.0);

        let state = SelectKBest::new(Selection::K(1)).fit(x.view(), y.view()).unwrap();
        assert_eq!(state.selected(), &[0]);
        let out = state.transform(x.view()).unwrap();
        assert_eq!(out.column(0), x.column(0));
    }

    #[test]
    fn selection_ties_keep_lower_index_and_input_order() {
        let x = array![[1.0, 0.0, 1.0], [2.0, 5.0, 2.0], [1.0, 0.0, 1.0], [2.0, 5.0, 2.0]];
        let y = labels(4);
        let state = SelectKBest::new(Selection::K(2)).fit(x.view(), y.view()).unwrap();
        assert_eq!(state.selected(), &[0, 1]);

        let state = SelectKBest::new(Selection::Percentile(50.0))
            .fit(x.view(), y.view())
            .unwrap();
        assert_eq!(state.n_features_out(), 2);
    }

    #[test]
    fn selection_needs_two_classes() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = Array1::zeros(3);
        assert!(matches!(
            SelectKBest::new(Selection::K(1)).fit(x.view(), y.view()),
            Err(TransformError::TooFewClasses(1))
        ));
    }

    #[test]
    fn stage_spec_dispatches_to_fitted_state() {
        let x = correlated_data();
        let y = labels(40);
        let stage = StageSpec::Pca(Pca::new(Components::Count(3)));
        let fitted = stage.fit(x.view(), y.view()).unwrap();
        assert_eq!(fitted.n_features_in(), 4);
        assert_eq!(fitted.n_features_out(), 3);
        assert_eq!(
            stage.params(),
            vec![("pca__n_components".to_string(), "3".to_string())]
        );
    }
}
