//! Experiment configuration, read from a TOML file. Every section and field
//! has a default, so an empty file (or no file) describes the standard run.
//!
//! A `[cv]` section is the one exception: when present it must name its
//! `scheme` (`"stratified_shuffle"` or `"stratified_k_fold"`). The other `[cv]`
//! fields are optional.

use crate::data::load::LoaderOptions;
use crate::data::split::CvScheme;
use crate::select::metrics::Scoring;
use crate::select::search::{FailurePolicy, GridSpec, SearchOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
            stratify: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub scoring: Scoring,
    pub failure_policy: FailurePolicy,
    pub parallel: bool,
    /// Rows shown in the ranked configuration table.
    pub top_n: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            scoring: Scoring::Accuracy,
            failure_policy: FailurePolicy::Abort,
            parallel: true,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    /// Pairs with |r| at or above this are listed.
    pub correlation_threshold: f64,
    /// Columns exported for the pair-plot artifact.
    pub pairplot_features: Vec<String>,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.9,
            pairplot_features: ["radius_mean", "texture_mean", "perimeter_mean", "area_mean"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("oncosift_output"),
        }
    }
}

/// Baseline comparison: one KNN on raw features and one on scaled features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub n_neighbors: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self { n_neighbors: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: LoaderOptions,
    pub split: SplitConfig,
    pub cv: CvScheme,
    pub search: SearchConfig,
    pub grid: GridSpec,
    pub baseline: BaselineConfig,
    pub explore: ExploreConfig,
    pub output: OutputConfig,
}

impl ExperimentConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Self::from_toml(&toml_string)
    }

    pub fn from_toml(toml_string: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_string)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "split.test_fraction",
                reason: format!("must be strictly between 0 and 1, got {fraction}"),
            });
        }
        if self.search.top_n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.top_n",
                reason: "must be at least 1".to_string(),
            });
        }
        let threshold = self.explore.correlation_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                field: "explore.correlation_threshold",
                reason: format!("must be within [0, 1], got {threshold}"),
            });
        }
        if self.baseline.n_neighbors == 0 {
            return Err(ConfigError::InvalidValue {
                field: "baseline.n_neighbors",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            cv: self.cv,
            scoring: self.search.scoring,
            failure_policy: self.search.failure_policy,
            parallel: self.search.parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::search::ReducerChoice;
    use crate::select::transform::Components;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ExperimentConfig::from_toml("").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.split.test_fraction, 0.3);
        assert_eq!(config.data.label_column, "diagnosis");
        assert_eq!(config.search_options().failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = ExperimentConfig::from_toml(
            r#"
[split]
seed = 7

[cv]
scheme = "stratified_k_fold"
n_splits = 5
shuffle = true
seed = 1

[search]
scoring = "f1"
failure_policy = "skip"

[grid]
n_neighbors = [1, 3]
reducers = ["none", { pca = { count = 3 } }]
"#,
        )
        .unwrap();
        assert_eq!(config.split.seed, 7);
        assert!(config.split.stratify);
        assert_eq!(config.cv.n_splits(), 5);
        assert_eq!(config.search.scoring, Scoring::F1);
        assert_eq!(config.search.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.grid.n_neighbors, vec![1, 3]);
        assert_eq!(
            config.grid.reducers,
            vec![ReducerChoice::None, ReducerChoice::Pca(Components::Count(3))]
        );
        assert_eq!(config.grid.configurations().len(), 2 * 2 * 2);
    }

    #[test]
    fn cv_section_needs_only_its_scheme() {
        let config =
            ExperimentConfig::from_toml("[cv]\nscheme = \"stratified_k_fold\"\nn_splits = 4\n")
                .unwrap();
        assert_eq!(
            config.cv,
            CvScheme::StratifiedKFold {
                n_splits: 4,
                shuffle: true,
                seed: 42,
            }
        );

        let config =
            ExperimentConfig::from_toml("[cv]\nscheme = \"stratified_shuffle\"\n").unwrap();
        assert_eq!(config.cv, CvScheme::default());

        let err = ExperimentConfig::from_toml("[cv]\nn_splits = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError(_)));
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let err = ExperimentConfig::from_toml("[split]\ntest_fraction = 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "split.test_fraction",
                ..
            }
        ));
    }

    #[test]
    fn unknown_scoring_is_a_parse_error() {
        let err = ExperimentConfig::from_toml("[search]\nscoring = \"roc_auc\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[output]\ndir = \"results\"").unwrap();
        let config = ExperimentConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("results"));
        assert!(ExperimentConfig::load("/nonexistent/oncosift.toml").is_err());
    }
}
