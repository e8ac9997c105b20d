//! # Model Selector
//!
//! Exhaustive search over a grid of pipeline configurations. Every
//! configuration is scored by cross-validation on the training rows it is
//! given, using folds generated once and shared by all configurations. The
//! best mean score wins, the earliest configuration in grid order wins ties,
//! and the winner is refitted on the whole training set.
//!
//! The selector never receives held-out test rows: callers split first and
//! pass only the training side.

use crate::data::split::{CvScheme, Fold, SplitError};
use crate::select::classifier::{DistanceMetric, KnnParams, Weighting};
use crate::select::metrics::{MetricError, Scoring};
use crate::select::pipeline::{FittedPipeline, PipelineConfig, PipelineError};
use crate::select::progress::{SearchProgressObserver, SearchProgressStage};
use crate::select::transform::{Components, Pca, SelectKBest, Selection, StageSpec};
use itertools::iproduct;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// What to do when a configuration fails to fit or score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the search and report the first failing configuration in grid order.
    #[default]
    Abort,
    /// Record the failure, exclude the configuration, and keep going.
    Skip,
}

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Metric(#[from] MetricError),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("The configuration grid is empty; nothing to search.")]
    EmptyGrid,
    #[error("Feature matrix has {rows} rows but the label vector has {labels}.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Could not generate cross-validation folds: {0}")]
    Folds(#[from] SplitError),
    #[error("Configuration {index} ({params}) failed: {source}")]
    ConfigurationFailed {
        index: usize,
        params: String,
        #[source]
        source: EvaluationError,
    },
    #[error("All {0} configurations failed.")]
    AllFailed(usize),
    #[error("Refitting the best configuration on the full training set failed: {0}")]
    Refit(#[source] PipelineError),
}

// --- Grid definition ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerChoice {
    None,
    MinMax,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducerChoice {
    None,
    Pca(Components),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorChoice {
    None,
    SelectKBest(Selection),
}

/// Axes of the configuration grid. Stages are chained as
/// scaler, selector, reducer, then the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub scalers: Vec<ScalerChoice>,
    pub selectors: Vec<SelectorChoice>,
    pub reducers: Vec<ReducerChoice>,
    pub n_neighbors: Vec<usize>,
    pub weights: Vec<Weighting>,
    pub metrics: Vec<DistanceMetric>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            scalers: vec![ScalerChoice::MinMax],
            selectors: vec![SelectorChoice::None],
            reducers: vec![
                ReducerChoice::None,
                ReducerChoice::Pca(Components::Count(2)),
                ReducerChoice::Pca(Components::Count(5)),
                ReducerChoice::Pca(Components::Count(10)),
                ReducerChoice::Pca(Components::VarianceFraction(0.95)),
            ],
            n_neighbors: vec![3, 5, 7, 9, 11, 15, 21],
            weights: vec![Weighting::Uniform, Weighting::Distance],
            metrics: vec![DistanceMetric::Euclidean],
        }
    }
}

impl GridSpec {
    /// Enumerates the Cartesian product. The last axis (metric) varies fastest.
    pub fn configurations(&self) -> Vec<PipelineConfig> {
        iproduct!(
            self.scalers.iter(),
            self.selectors.iter(),
            self.reducers.iter(),
            self.n_neighbors.iter(),
            self.weights.iter(),
            self.metrics.iter()
        )
        .map(|(scaler, selector, reducer, &n_neighbors, &weighting, &metric)| {
            let mut stages = Vec::with_capacity(3);
            match scaler {
                ScalerChoice::None => {}
                ScalerChoice::MinMax => stages.push(StageSpec::MinMax),
                ScalerChoice::Standard => stages.push(StageSpec::Standard),
            }
            if let SelectorChoice::SelectKBest(selection) = selector {
                stages.push(StageSpec::SelectKBest(SelectKBest::new(*selection)));
            }
            if let ReducerChoice::Pca(components) = reducer {
                stages.push(StageSpec::Pca(Pca::new(*components)));
            }
            PipelineConfig::new(
                stages,
                KnnParams {
                    n_neighbors,
                    weighting,
                    metric,
                },
            )
        })
        .collect()
    }
}

// --- Search ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub cv: CvScheme,
    pub scoring: Scoring,
    pub failure_policy: FailurePolicy,
    /// Evaluate configurations on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            cv: CvScheme::default(),
            scoring: Scoring::Accuracy,
            failure_policy: FailurePolicy::Abort,
            parallel: true,
        }
    }
}

/// Cross-validation outcome of one configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResult {
    pub index: usize,
    pub params: BTreeMap<String, String>,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best configuration; 0 for failed ones.
    pub rank: usize,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub results: Vec<ConfigResult>,
    pub best_index: usize,
    pub best: FittedPipeline,
    pub scoring: Scoring,
    pub n_folds: usize,
}

impl SearchOutcome {
    pub fn best_result(&self) -> &ConfigResult {
        &self.results[self.best_index]
    }

    /// Successful configurations ordered by rank.
    pub fn ranked(&self) -> Vec<&ConfigResult> {
        let mut ranked: Vec<&ConfigResult> = self.results.iter().filter(|r| r.rank > 0).collect();
        ranked.sort_by_key(|r| r.rank);
        ranked
    }
}

fn evaluate_config(
    config: &PipelineConfig,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
    folds: &[Fold],
    scoring: Scoring,
) -> Result<Vec<f64>, EvaluationError> {
    folds
        .iter()
        .map(|fold| {
            let x_train = x.select(Axis(0), &fold.train);
            let y_train = y.select(Axis(0), &fold.train);
            let x_valid = x.select(Axis(0), &fold.validation);
            let y_valid = y.select(Axis(0), &fold.validation);
            let fitted = config.fit(x_train.view(), y_train.view())?;
            let predicted = fitted.predict(x_valid.view())?;
            Ok(scoring.score(y_valid.view(), predicted.view())?)
        })
        .collect()
}

fn mean_and_std(scores: &[f64]) -> (f64, f64) {
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn params_label(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Scores every configuration by cross-validation and refits the best one.
///
/// Fails with [`SearchError::EmptyGrid`] before any fit when `configs` is empty.
pub fn grid_search(
    configs: &[PipelineConfig],
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
    options: &SearchOptions,
    progress: &mut dyn SearchProgressObserver,
) -> Result<SearchOutcome, SearchError> {
    if configs.is_empty() {
        return Err(SearchError::EmptyGrid);
    }
    if x.nrows() != y.len() {
        return Err(SearchError::LengthMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }

    let folds = options.cv.folds(y)?;
    log::info!(
        "Grid search: {} configurations x {} folds on {} training rows, scoring by {}",
        configs.len(),
        folds.len(),
        x.nrows(),
        options.scoring
    );

    progress.on_stage_start(SearchProgressStage::CrossValidation, configs.len());
    let evaluations: Vec<Result<Vec<f64>, EvaluationError>> = if options.parallel {
        let completed = AtomicUsize::new(0);
        let observer = Mutex::new(&mut *progress);
        configs
            .par_iter()
            .map(|config| {
                let outcome = evaluate_config(config, x, y, &folds, options.scoring);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Ok(mut guard) = observer.lock() {
                    guard.on_stage_advance(SearchProgressStage::CrossValidation, done);
                }
                outcome
            })
            .collect()
    } else {
        let mut evaluations = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let outcome = evaluate_config(config, x, y, &folds, options.scoring);
            let failed = outcome.is_err();
            evaluations.push(outcome);
            progress.on_stage_advance(SearchProgressStage::CrossValidation, index + 1);
            if failed && options.failure_policy == FailurePolicy::Abort {
                break;
            }
        }
        evaluations
    };
    progress.on_stage_finish(SearchProgressStage::CrossValidation);

    let mut results = Vec::with_capacity(configs.len());
    for (index, (config, outcome)) in configs.iter().zip(evaluations).enumerate() {
        let params = config.describe();
        match outcome {
            Ok(fold_scores) => {
                let (mean_score, std_score) = mean_and_std(&fold_scores);
                log::debug!(
                    "config {index}: mean {} = {mean_score:.4} (+/- {std_score:.4})",
                    options.scoring
                );
                results.push(ConfigResult {
                    index,
                    params,
                    fold_scores,
                    mean_score,
                    std_score,
                    rank: 0,
                    error: None,
                });
            }
            Err(source) => match options.failure_policy {
                FailurePolicy::Abort => {
                    return Err(SearchError::ConfigurationFailed {
                        index,
                        params: params_label(&params),
                        source,
                    });
                }
                FailurePolicy::Skip => {
                    log::warn!("Skipping configuration {index} ({}): {source}", params_label(&params));
                    results.push(ConfigResult {
                        index,
                        params,
                        fold_scores: Vec::new(),
                        mean_score: f64::NAN,
                        std_score: f64::NAN,
                        rank: 0,
                        error: Some(source.to_string()),
                    });
                }
            },
        }
    }

    let mut order: Vec<usize> = results
        .iter()
        .filter(|r| r.error.is_none())
        .map(|r| r.index)
        .collect();
    if order.is_empty() {
        return Err(SearchError::AllFailed(configs.len()));
    }
    // Stable sort keeps grid order among equal means.
    order.sort_by(|&a, &b| results[b].mean_score.total_cmp(&results[a].mean_score));
    for (position, &index) in order.iter().enumerate() {
        results[index].rank = position + 1;
    }
    let best_index = order[0];

    log::info!(
        "Best configuration {best_index}: mean {} {:.4} ({})",
        options.scoring,
        results[best_index].mean_score,
        params_label(&results[best_index].params)
    );

    progress.on_stage_start(SearchProgressStage::Refit, 1);
    let best = configs[best_index].fit(x, y).map_err(SearchError::Refit)?;
    progress.on_stage_advance(SearchProgressStage::Refit, 1);
    progress.on_stage_finish(SearchProgressStage::Refit);

    Ok(SearchOutcome {
        results,
        best_index,
        best,
        scoring: options.scoring,
        n_folds: folds.len(),
    })
}
