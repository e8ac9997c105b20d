//! Classification metrics and scoring functions for model selection.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MetricError {
    #[error("Prediction vector has {predicted} entries but the truth vector has {truth}.")]
    LengthMismatch { truth: usize, predicted: usize },
    #[error("Cannot score an empty prediction vector.")]
    Empty,
    #[error(
        "Unknown scoring metric '{0}'. Expected one of: accuracy, precision, recall, f1, balanced_accuracy."
    )]
    UnknownScoring(String),
}

/// Square count matrix: rows are true classes, columns predicted classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Builds the matrix over classes `0..max(label)+1`, at least two.
    pub fn new(
        truth: ArrayView1<usize>,
        predicted: ArrayView1<usize>,
    ) -> Result<Self, MetricError> {
        if truth.len() != predicted.len() {
            return Err(MetricError::LengthMismatch {
                truth: truth.len(),
                predicted: predicted.len(),
            });
        }
        if truth.is_empty() {
            return Err(MetricError::Empty);
        }
        let n_classes = truth
            .iter()
            .chain(predicted.iter())
            .copied()
            .max()
            .map_or(2, |m| (m + 1).max(2));
        let mut counts = Array2::zeros((n_classes, n_classes));
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            counts[[t, p]] += 1;
        }
        Ok(Self { counts })
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[[truth, predicted]]
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes()).map(|c| self.get(c, c)).sum();
        correct as f64 / self.total() as f64
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }

    pub fn precision(&self, class: usize) -> f64 {
        let predicted = self.counts.column(class).sum();
        ratio(self.get(class, class), predicted, "precision", class)
    }

    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.get(class, class), self.support(class), "recall", class)
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 }
    }

    pub fn balanced_accuracy(&self) -> f64 {
        let present: Vec<usize> = (0..self.n_classes())
            .filter(|&c| self.support(c) > 0)
            .collect();
        present.iter().map(|&c| self.recall(c)).sum::<f64>() / present.len().max(1) as f64
    }
}

/// Zero-division yields 0 with a warning.
fn ratio(numerator: usize, denominator: usize, name: &str, class: usize) -> f64 {
    if denominator == 0 {
        log::warn!("{name} is ill-defined for class {class} (no samples); using 0.0");
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Metric used to rank configurations during the search. Precision, recall
/// and F1 are taken for the positive class (label 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    Precision,
    Recall,
    F1,
    BalancedAccuracy,
}

impl Scoring {
    pub const POSITIVE_CLASS: usize = 1;

    pub fn score(
        &self,
        truth: ArrayView1<usize>,
        predicted: ArrayView1<usize>,
    ) -> Result<f64, MetricError> {
        let matrix = ConfusionMatrix::new(truth, predicted)?;
        Ok(match self {
            Scoring::Accuracy => matrix.accuracy(),
            Scoring::Precision => matrix.precision(Self::POSITIVE_CLASS),
            Scoring::Recall => matrix.recall(Self::POSITIVE_CLASS),
            Scoring::F1 => matrix.f1(Self::POSITIVE_CLASS),
            Scoring::BalancedAccuracy => matrix.balanced_accuracy(),
        })
    }
}

impl FromStr for Scoring {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Scoring::Accuracy),
            "precision" => Ok(Scoring::Precision),
            "recall" => Ok(Scoring::Recall),
            "f1" => Ok(Scoring::F1),
            "balanced_accuracy" => Ok(Scoring::BalancedAccuracy),
            other => Err(MetricError::UnknownScoring(other.to_string())),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scoring::Accuracy => "accuracy",
            Scoring::Precision => "precision",
            Scoring::Recall => "recall",
            Scoring::F1 => "f1",
            Scoring::BalancedAccuracy => "balanced_accuracy",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn confusion_matrix_rows_are_truth() {
        let truth = array![1, 1, 1, 0, 0, 0, 0];
        let pred = array![1, 1, 0, 0, 0, 0, 1];
        let cm = ConfusionMatrix::new(truth.view(), pred.view()).unwrap();
        assert_eq!(cm.get(1, 1), 2);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.total(), 7);
    }

    #[test]
    fn binary_scores() {
        let truth = array![1, 1, 1, 0, 0, 0, 0];
        let pred = array![1, 1, 0, 0, 0, 0, 1];
        let cm = ConfusionMatrix::new(truth.view(), pred.view()).unwrap();
        assert_abs_diff_eq!(cm.accuracy(), 5.0 / 7.0);
        assert_abs_diff_eq!(cm.precision(1), 2.0 / 3.0);
        assert_abs_diff_eq!(cm.recall(1), 2.0 / 3.0);
        assert_abs_diff_eq!(cm.f1(1), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cm.recall(0), 0.75);
        assert_abs_diff_eq!(cm.balanced_accuracy(), (2.0 / 3.0 + 0.75) / 2.0);
    }

    #[test]
    fn undefined_precision_is_zero() {
        let truth = array![1, 0, 0];
        let pred = array![0, 0, 0];
        let score = Scoring::Precision.score(truth.view(), pred.view()).unwrap();
        assert_abs_diff_eq!(score, 0.0);
        let f1 = Scoring::F1.score(truth.view(), pred.view()).unwrap();
        assert_abs_diff_eq!(f1, 0.0);
    }

    #[test]
    fn single_class_input_still_has_two_rows() {
        let truth = array![0, 0];
        let cm = ConfusionMatrix::new(truth.view(), truth.view()).unwrap();
        assert_eq!(cm.n_classes(), 2);
        assert_abs_diff_eq!(cm.balanced_accuracy(), 1.0);
    }

    #[test]
    fn scoring_parses_by_name() {
        assert_eq!("F1".parse::<Scoring>().unwrap(), Scoring::F1);
        assert_eq!(
            " balanced_accuracy ".parse::<Scoring>().unwrap(),
            Scoring::BalancedAccuracy
        );
        assert_eq!(
            "roc".parse::<Scoring>().unwrap_err(),
            MetricError::UnknownScoring("roc".to_string())
        );
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let truth = array![0, 1];
        let pred = array![0];
        assert_eq!(
            ConfusionMatrix::new(truth.view(), pred.view()).unwrap_err(),
            MetricError::LengthMismatch {
                truth: 2,
                predicted: 1
            }
        );
    }
}
