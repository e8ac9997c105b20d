//! k-nearest-neighbour classification.
//!
//! Fitting stores the training rows; prediction ranks them by distance to each
//! query row. Query rows are independent and are scored in parallel.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("n_neighbors must be at least 1.")]
    ZeroNeighbors,
    #[error("n_neighbors ({k}) exceeds the number of training rows ({n_train}).")]
    TooManyNeighbors { k: usize, n_train: usize },
    #[error("Feature matrix has {rows} rows but the label vector has {labels}.")]
    LabelMismatch { rows: usize, labels: usize },
    #[error("Classifier was fitted on {expected} features but received {found}.")]
    FeatureMismatch { expected: usize, found: usize },
    #[error("Non-finite value at row {row}, column {column}.")]
    NonFinite { row: usize, column: usize },
    #[error("Minkowski order must be finite and at least 1, got {0}.")]
    InvalidMinkowskiOrder(f64),
}

/// How neighbours contribute to the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    Uniform,
    /// Inverse distance; exact matches outvote everything else.
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
    Minkowski(f64),
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        match *self {
            DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => diffs.sum(),
            DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Weighting::Uniform => "uniform",
            Weighting::Distance => "distance",
        })
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Euclidean => f.write_str("euclidean"),
            DistanceMetric::Manhattan => f.write_str("manhattan"),
            DistanceMetric::Minkowski(p) => write!(f, "minkowski(p={p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub weighting: Weighting,
    pub metric: DistanceMetric,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weighting: Weighting::Uniform,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl KnnParams {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            ..Self::default()
        }
    }

    pub fn params(&self) -> Vec<(String, String)> {
        vec![
            ("knn__n_neighbors".to_string(), self.n_neighbors.to_string()),
            ("knn__weights".to_string(), self.weighting.to_string()),
            ("knn__metric".to_string(), self.metric.to_string()),
        ]
    }

    /// Validates the parameters and stores the training rows.
    pub fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<FittedKnn, ClassifierError> {
        if self.n_neighbors == 0 {
            return Err(ClassifierError::ZeroNeighbors);
        }
        if let DistanceMetric::Minkowski(p) = self.metric
            && !(p.is_finite() && p >= 1.0)
        {
            return Err(ClassifierError::InvalidMinkowskiOrder(p));
        }
        if x.nrows() != y.len() {
            return Err(ClassifierError::LabelMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        if self.n_neighbors > x.nrows() {
            return Err(ClassifierError::TooManyNeighbors {
                k: self.n_neighbors,
                n_train: x.nrows(),
            });
        }
        if let Some(((row, column), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ClassifierError::NonFinite { row, column });
        }
        let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
        Ok(FittedKnn {
            params: *self,
            x_train: x.to_owned(),
            y_train: y.to_owned(),
            n_classes,
        })
    }
}

/// A fitted classifier: parameters plus the stored training rows.
#[derive(Debug, Clone)]
pub struct FittedKnn {
    params: KnnParams,
    x_train: Array2<f64>,
    y_train: Array1<usize>,
    n_classes: usize,
}

impl FittedKnn {
    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    /// Class votes for one query row, normalized to sum to 1.
    fn votes(&self, query: ArrayView1<f64>) -> Vec<f64> {
        let metric = self.params.metric;
        let mut neighbours: Vec<(f64, usize)> = self
            .x_train
            .axis_iter(Axis(0))
            .map(|row| metric.distance(query, row))
            .enumerate()
            .map(|(index, distance)| (distance, index))
            .collect();
        let k = self.params.n_neighbors;
        neighbours.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let nearest = &neighbours[..k];

        let mut votes = vec![0.0; self.n_classes];
        let exact_match = nearest.iter().any(|&(d, _)| d == 0.0);
        for &(distance, index) in nearest {
            let weight = match self.params.weighting {
                Weighting::Uniform => 1.0,
                Weighting::Distance if exact_match => f64::from(u8::from(distance == 0.0)),
                Weighting::Distance => 1.0 / distance,
            };
            votes[self.y_train[index]] += weight;
        }
        let total: f64 = votes.iter().sum();
        if total > 0.0 {
            votes.iter_mut().for_each(|v| *v /= total);
        }
        votes
    }

    fn check_width(&self, x: ArrayView2<f64>) -> Result<(), ClassifierError> {
        if x.ncols() != self.n_features() {
            return Err(ClassifierError::FeatureMismatch {
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        Ok(())
    }

    /// Per-row class probabilities, shape [n_rows, n_classes].
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        self.check_width(x)?;
        let rows: Vec<Vec<f64>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|query| self.votes(query))
            .collect();
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, p) in row.into_iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    /// Predicted class per row. Ties between classes go to the smaller label.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>, ClassifierError> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (class, &p)| {
                        if p > best.1 { (class, p) } else { best }
                    })
                    .0
            })
            .collect())
    }
}
