pub mod classifier;
pub mod faer_ndarray;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod transform;

pub use classifier::{DistanceMetric, FittedKnn, KnnParams, Weighting};
pub use pipeline::{FittedPipeline, PipelineConfig, PipelineError};
pub use search::{FailurePolicy, GridSpec, SearchError, SearchOptions, SearchOutcome, grid_search};
pub use transform::{Components, Fit, StageSpec, Selection, Transform, TransformError};
