//! A pipeline is an ordered list of preprocessing stages followed by a
//! nearest-neighbour classifier. Fitting runs the stages in order, each on the
//! output of the one before, using training rows only.

use crate::select::classifier::{ClassifierError, FittedKnn, KnnParams};
use crate::select::transform::{Fit, FittedStage, StageSpec, Transform, TransformError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage {index} ({name}) failed: {source}")]
    Stage {
        index: usize,
        name: &'static str,
        #[source]
        source: TransformError,
    },
    #[error("Classifier failed: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Fits `stages` one after another, feeding each the previous stage's output.
/// Returns the fitted states and the fully transformed training rows.
pub fn fit_sequence<S: Fit>(
    stages: &[S],
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<(Vec<S::State>, Array2<f64>), (usize, TransformError)> {
    let mut fitted = Vec::with_capacity(stages.len());
    let mut current = x.to_owned();
    for (index, stage) in stages.iter().enumerate() {
        let state = stage.fit(current.view(), y).map_err(|e| (index, e))?;
        current = state.transform(current.view()).map_err(|e| (index, e))?;
        fitted.push(state);
    }
    Ok((fitted, current))
}

/// Applies already fitted states in order.
pub fn apply_sequence<T: Transform>(
    states: &[T],
    x: ArrayView2<f64>,
) -> Result<Array2<f64>, (usize, TransformError)> {
    let mut current = x.to_owned();
    for (index, state) in states.iter().enumerate() {
        current = state.transform(current.view()).map_err(|e| (index, e))?;
    }
    Ok(current)
}

/// One point of the configuration grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub stages: Vec<StageSpec>,
    pub knn: KnnParams,
}

impl PipelineConfig {
    pub fn new(stages: Vec<StageSpec>, knn: KnnParams) -> Self {
        Self { stages, knn }
    }

    /// Named hyperparameters, e.g. `pca__n_components` or `knn__n_neighbors`.
    pub fn describe(&self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = self
            .stages
            .iter()
            .flat_map(|stage| stage.params())
            .chain(self.knn.params())
            .collect();
        let steps: Vec<&str> = self
            .stages
            .iter()
            .map(StageSpec::name)
            .chain(std::iter::once("knn"))
            .collect();
        params.insert("steps".to_string(), steps.join(" -> "));
        params
    }

    fn stage_error(&self, (index, source): (usize, TransformError)) -> PipelineError {
        PipelineError::Stage {
            index,
            name: self.stages[index].name(),
            source,
        }
    }

    pub fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<FittedPipeline, PipelineError> {
        let (stages, transformed) =
            fit_sequence(&self.stages, x, y).map_err(|e| self.stage_error(e))?;
        let knn = self.knn.fit(transformed.view(), y)?;
        Ok(FittedPipeline {
            config: self.clone(),
            stages,
            knn,
        })
    }
}

/// A pipeline whose every stage has been fitted on one training set.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    config: PipelineConfig,
    stages: Vec<FittedStage>,
    knn: FittedKnn,
}

impl FittedPipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    pub fn classifier(&self) -> &FittedKnn {
        &self.knn
    }

    /// Runs the fitted preprocessing stages only.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        apply_sequence(&self.stages, x).map_err(|e| self.config.stage_error(e))
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>, PipelineError> {
        let transformed = self.transform(x)?;
        Ok(self.knn.predict(transformed.view())?)
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PipelineError> {
        let transformed = self.transform(x)?;
        Ok(self.knn.predict_proba(transformed.view())?)
    }
}
