//! Evaluation reports for fitted pipelines and summaries of a grid search.

use crate::select::metrics::{ConfusionMatrix, MetricError, Scoring};
use crate::select::pipeline::{FittedPipeline, PipelineError};
use crate::select::search::SearchOutcome;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Prediction failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Metric computation failed: {0}")]
    Metric(#[from] MetricError),
    #[error("Failed to write report file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialize report to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub total: usize,
    /// Rows are true classes, columns predicted classes.
    pub confusion: Vec<Vec<usize>>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub classes: Vec<ClassMetrics>,
}

fn class_label(class_names: &[String], class: usize) -> String {
    class_names
        .get(class)
        .cloned()
        .unwrap_or_else(|| class.to_string())
}

impl EvaluationReport {
    /// `class_names[c]` labels class `c`; missing names fall back to the index.
    pub fn from_predictions(
        truth: ArrayView1<usize>,
        predicted: ArrayView1<usize>,
        class_names: &[String],
    ) -> Result<Self, MetricError> {
        let matrix = ConfusionMatrix::new(truth, predicted)?;
        let total = matrix.total();
        let classes: Vec<ClassMetrics> = (0..matrix.n_classes())
            .map(|c| ClassMetrics {
                label: class_label(class_names, c),
                precision: matrix.precision(c),
                recall: matrix.recall(c),
                f1: matrix.f1(c),
                support: matrix.support(c),
            })
            .collect();

        let n = classes.len() as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        };
        let weight = |c: &ClassMetrics| c.support as f64 / total as f64;
        let weighted_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
            recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
            f1: classes.iter().map(|c| c.f1 * weight(c)).sum(),
        };

        Ok(Self {
            accuracy: matrix.accuracy(),
            total,
            confusion: matrix.counts().outer_iter().map(|row| row.to_vec()).collect(),
            macro_avg,
            weighted_avg,
            classes,
        })
    }

    pub fn save(&self, path: &str) -> Result<(), ReportError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }
}

/// Predicts the held-out rows and scores the predictions.
pub fn evaluate(
    model: &FittedPipeline,
    x_test: ArrayView2<f64>,
    y_test: ArrayView1<usize>,
    class_names: &[String],
) -> Result<EvaluationReport, ReportError> {
    let predicted = model.predict(x_test)?;
    Ok(EvaluationReport::from_predictions(
        y_test,
        predicted.view(),
        class_names,
    )?)
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max(12);
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.total
            )?;
        }

        writeln!(f, "\nConfusion matrix (rows = true, columns = predicted):")?;
        write!(f, "{:>width$}", "")?;
        for c in &self.classes {
            write!(f, " {:>8}", c.label)?;
        }
        writeln!(f)?;
        for (c, row) in self.classes.iter().zip(&self.confusion) {
            write!(f, "{:>width$}", c.label)?;
            for count in row {
                write!(f, " {count:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Console view of a finished search: the best parameters and the top of the
/// ranking.
pub struct SearchSummary<'a> {
    outcome: &'a SearchOutcome,
    top_n: usize,
}

impl<'a> SearchSummary<'a> {
    pub fn new(outcome: &'a SearchOutcome, top_n: usize) -> Self {
        Self { outcome, top_n }
    }
}

impl fmt::Display for SearchSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let best = self.outcome.best_result();
        let failed = self
            .outcome
            .results
            .iter()
            .filter(|r| r.error.is_some())
            .count();
        writeln!(
            f,
            "Searched {} configurations over {} folds (scoring: {}, failed: {failed})",
            self.outcome.results.len(),
            self.outcome.n_folds,
            self.outcome.scoring
        )?;
        writeln!(
            f,
            "Best CV {}: {:.4} (+/- {:.4})",
            self.outcome.scoring, best.mean_score, best.std_score
        )?;
        writeln!(f, "Best parameters:")?;
        for (name, value) in &best.params {
            writeln!(f, "  {name} = {value}")?;
        }

        writeln!(f, "\n{:>4} {:>8} {:>8}  parameters", "rank", "mean", "std")?;
        for result in self.outcome.ranked().into_iter().take(self.top_n) {
            let params: Vec<String> = result
                .params
                .iter()
                .filter(|(name, _)| name.as_str() != "steps")
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            writeln!(
                f,
                "{:>4} {:>8.4} {:>8.4}  [{}] {}",
                result.rank,
                result.mean_score,
                result.std_score,
                result.params.get("steps").map_or("", String::as_str),
                params.join(" ")
            )?;
        }
        Ok(())
    }
}

/// Everything the `search` command can persist: the winner's cross-validation
/// result and its held-out evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub scoring: Scoring,
    pub configurations: usize,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub best_params: BTreeMap<String, String>,
    pub test: EvaluationReport,
}

impl SearchReport {
    pub fn new(outcome: &SearchOutcome, test: EvaluationReport) -> Self {
        let best = outcome.best_result();
        Self {
            scoring: outcome.scoring,
            configurations: outcome.results.len(),
            cv_mean: best.mean_score,
            cv_std: best.std_score,
            best_params: best.params.clone(),
            test,
        }
    }

    pub fn save(&self, path: &str) -> Result<(), ReportError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tempfile::tempdir;

    fn names() -> Vec<String> {
        vec!["B".to_string(), "M".to_string()]
    }

    #[test]
    fn report_matches_hand_computed_values() {
        let truth = array![1, 1, 1, 0, 0, 0, 0];
        let pred = array![1, 1, 0, 0, 0, 0, 1];
        let report = EvaluationReport::from_predictions(truth.view(), pred.view(), &names()).unwrap();
        assert_abs_diff_eq!(report.accuracy, 5.0 / 7.0);
        assert_eq!(report.classes[0].label, "B");
        assert_eq!(report.classes[0].support, 4);
        assert_abs_diff_eq!(report.classes[0].precision, 0.75);
        assert_abs_diff_eq!(report.classes[1].recall, 2.0 / 3.0);
        assert_abs_diff_eq!(
            report.macro_avg.recall,
            (0.75 + 2.0 / 3.0) / 2.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            report.weighted_avg.recall,
            report.accuracy,
            epsilon = 1e-12
        );
        assert_eq!(report.confusion, vec![vec![3, 1], vec![1, 2]]);
    }

    #[test]
    fn display_contains_table_and_matrix() {
        let truth = array![0, 1, 1, 0];
        let report = EvaluationReport::from_predictions(truth.view(), truth.view(), &names()).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("Confusion matrix"));
    }

    #[test]
    fn unnamed_classes_use_their_index() {
        let truth = array![0, 1];
        let report = EvaluationReport::from_predictions(truth.view(), truth.view(), &[]).unwrap();
        assert_eq!(report.classes[1].label, "1");
    }

    #[test]
    fn report_saves_as_toml() {
        let truth = array![0, 1, 1, 0];
        let pred = array![0, 1, 0, 0];
        let report = EvaluationReport::from_predictions(truth.view(), pred.view(), &names()).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.toml");
        report.save(path.to_str().unwrap()).unwrap();
        let loaded: EvaluationReport = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.confusion, report.confusion);
        assert_eq!(loaded.classes.len(), 2);
    }
}
