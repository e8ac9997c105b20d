use ndarray::Axis;
use oncosift::config::ExperimentConfig;
use oncosift::data::explore::{correlated_pairs, correlation_matrix};
use oncosift::data::{CvScheme, Dataset, LoaderOptions, load_dataset, train_test_split};
use oncosift::report::{EvaluationReport, SearchReport, evaluate};
use oncosift::select::metrics::Scoring;
use oncosift::select::progress::NoopSearchProgress;
use oncosift::select::search::ReducerChoice;
use oncosift::select::{
    Components, FailurePolicy, GridSpec, KnnParams, PipelineConfig, SearchError, SearchOptions,
    StageSpec, grid_search,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::io::Write;
use tempfile::NamedTempFile;

const N_POSITIVE: usize = 212;
const N_NEGATIVE: usize = 357;

/// Writes a diagnostic table shaped like the breast-cancer measurements:
/// id, diagnosis, four informative small-scale features, two large-scale
/// noise features, and a trailing empty column.
fn synthetic_csv(seed: u64) -> NamedTempFile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels: Vec<bool> = std::iter::repeat_n(true, N_POSITIVE)
        .chain(std::iter::repeat_n(false, N_NEGATIVE))
        .collect();
    labels.shuffle(&mut rng);

    let noise_area = Normal::new(1000.0_f64, 300.0).unwrap();
    let noise_perimeter = Normal::new(500.0_f64, 150.0).unwrap();
    let unit = Normal::new(0.0_f64, 1.0).unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "id,diagnosis,radius_mean,texture_mean,concavity_mean,symmetry_mean,area_mean,perimeter_mean,Unnamed: 32"
    )
    .unwrap();
    for (i, &malignant) in labels.iter().enumerate() {
        let shift = if malignant { 3.0 } else { 0.0 };
        let informative: Vec<f64> = [(14.0, 0.5), (19.0, 0.4), (0.05, 0.01), (0.18, 0.005)]
            .iter()
            .map(|&(base, scale)| base + scale * (shift + unit.sample(&mut rng)))
            .collect();
        writeln!(
            file,
            "{},{},{:.5},{:.5},{:.6},{:.6},{:.2},{:.2},",
            842_000 + i * 7 + rng.gen_range(0..7),
            if malignant { "M" } else { "B" },
            informative[0],
            informative[1],
            informative[2],
            informative[3],
            noise_area.sample(&mut rng).abs(),
            noise_perimeter.sample(&mut rng).abs()
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn load(seed: u64) -> Dataset {
    let file = synthetic_csv(seed);
    load_dataset(file.path().to_str().unwrap(), &LoaderOptions::default()).unwrap()
}

fn names() -> Vec<String> {
    vec!["B".to_string(), "M".to_string()]
}

#[test]
fn loader_drops_identifier_and_empty_column() {
    let data = load(1);
    assert_eq!(data.n_samples(), N_POSITIVE + N_NEGATIVE);
    assert_eq!(data.positive_count(), N_POSITIVE);
    assert_eq!(data.n_features(), 6);
    assert!(!data.feature_names.iter().any(|n| n == "id"));
    assert_eq!(data.dropped_columns.len(), 2);
}

#[test]
fn stratified_split_preserves_class_counts() {
    let data = load(2);
    let split = train_test_split(data.features.view(), data.labels.view(), 0.3, 42, true).unwrap();
    assert_eq!(split.y_train.len(), 398);
    assert_eq!(split.y_test.len(), 171);
    let positive = split.y_train.iter().filter(|&&y| y == 1).count();
    assert_eq!(positive, 148);
    assert_eq!(split.y_train.len() - positive, 250);

    let mut all: Vec<usize> = split
        .train_indices
        .iter()
        .chain(&split.test_indices)
        .copied()
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..569).collect::<Vec<_>>());
}

#[test]
fn scaling_changes_knn_results_reproducibly() {
    let data = load(3);
    let run = || -> (EvaluationReport, EvaluationReport) {
        let split =
            train_test_split(data.features.view(), data.labels.view(), 0.3, 42, true).unwrap();
        let score = |stages: Vec<StageSpec>| {
            let model = PipelineConfig::new(stages, KnnParams::new(5))
                .fit(split.x_train.view(), split.y_train.view())
                .unwrap();
            evaluate(&model, split.x_test.view(), split.y_test.view(), &names()).unwrap()
        };
        (score(Vec::new()), score(vec![StageSpec::MinMax]))
    };

    let (raw, scaled) = run();
    assert!(
        scaled.accuracy > raw.accuracy + 0.1,
        "raw {} vs scaled {}",
        raw.accuracy,
        scaled.accuracy
    );
    assert_eq!(run(), (raw, scaled));
}

fn small_grid() -> GridSpec {
    GridSpec {
        reducers: vec![ReducerChoice::None, ReducerChoice::Pca(Components::Count(3))],
        n_neighbors: vec![3, 7],
        ..GridSpec::default()
    }
}

fn search_options() -> SearchOptions {
    SearchOptions {
        cv: CvScheme::StratifiedShuffle {
            n_splits: 5,
            validation_fraction: 0.2,
            seed: 42,
        },
        scoring: Scoring::Accuracy,
        failure_policy: FailurePolicy::Abort,
        parallel: true,
    }
}

#[test]
fn grid_search_selects_and_generalizes() {
    let data = load(4);
    let split = train_test_split(data.features.view(), data.labels.view(), 0.3, 42, true).unwrap();
    let configs = small_grid().configurations();
    assert_eq!(configs.len(), 8);

    let outcome = grid_search(
        &configs,
        split.x_train.view(),
        split.y_train.view(),
        &search_options(),
        &mut NoopSearchProgress,
    )
    .unwrap();
    assert_eq!(outcome.results.len(), 8);
    assert_eq!(outcome.n_folds, 5);
    let best = outcome.best_result();
    assert!(outcome.results.iter().all(|r| r.mean_score <= best.mean_score));

    let report = evaluate(
        &outcome.best,
        split.x_test.view(),
        split.y_test.view(),
        &names(),
    )
    .unwrap();
    assert!(report.accuracy > 0.85, "test accuracy {}", report.accuracy);

    let summary = SearchReport::new(&outcome, report);
    assert_eq!(summary.best_params, best.params);
}

#[test]
fn selection_is_independent_of_test_rows() {
    let data = load(5);
    let clean = train_test_split(data.features.view(), data.labels.view(), 0.3, 42, true).unwrap();

    let mut tampered = data.clone();
    for &row in &clean.test_indices {
        tampered.features.index_axis_mut(Axis(0), row).fill(1e6);
    }
    let dirty =
        train_test_split(tampered.features.view(), tampered.labels.view(), 0.3, 42, true).unwrap();
    assert_eq!(clean.train_indices, dirty.train_indices);

    let configs = small_grid().configurations();
    let run = |x: ndarray::ArrayView2<f64>, y: ndarray::ArrayView1<usize>| {
        grid_search(&configs, x, y, &search_options(), &mut NoopSearchProgress).unwrap()
    };
    let a = run(clean.x_train.view(), clean.y_train.view());
    let b = run(dirty.x_train.view(), dirty.y_train.view());
    assert_eq!(a.best_index, b.best_index);
    for (ra, rb) in a.results.iter().zip(&b.results) {
        assert_eq!(ra.fold_scores, rb.fold_scores);
    }
}

#[test]
fn folds_stay_inside_the_training_set() {
    let data = load(6);
    let split = train_test_split(data.features.view(), data.labels.view(), 0.3, 42, true).unwrap();
    let n_train = split.y_train.len();
    for scheme in [
        CvScheme::default(),
        CvScheme::StratifiedKFold {
            n_splits: 5,
            shuffle: true,
            seed: 9,
        },
    ] {
        for fold in scheme.folds(split.y_train.view()).unwrap() {
            assert!(fold.train.iter().chain(&fold.validation).all(|&i| i < n_train));
            assert!(fold.validation.iter().all(|i| !fold.train.contains(i)));
        }
    }
}

#[test]
fn empty_grid_is_rejected() {
    let data = load(7);
    let grid = GridSpec {
        n_neighbors: Vec::new(),
        ..GridSpec::default()
    };
    let configs = grid.configurations();
    assert!(configs.is_empty());
    let result = grid_search(
        &configs,
        data.features.view(),
        data.labels.view(),
        &search_options(),
        &mut NoopSearchProgress,
    );
    assert!(matches!(result, Err(SearchError::EmptyGrid)));
}

#[test]
fn default_configuration_runs_end_to_end() {
    let data = load(8);
    let config = ExperimentConfig::default();
    let corr = correlation_matrix(data.features.view());
    let pairs = correlated_pairs(&corr, &data.feature_names, config.explore.correlation_threshold);
    assert!(pairs.iter().all(|p| p.r.abs() >= 0.9));

    let split = train_test_split(
        data.features.view(),
        data.labels.view(),
        config.split.test_fraction,
        config.split.seed,
        config.split.stratify,
    )
    .unwrap();
    let configs = GridSpec {
        n_neighbors: vec![5],
        weights: vec![oncosift::select::Weighting::Uniform],
        ..config.grid.clone()
    }
    .configurations();
    // Six features cannot support the default ten-component reducer.
    assert!(matches!(
        grid_search(
            &configs,
            split.x_train.view(),
            split.y_train.view(),
            &config.search_options(),
            &mut NoopSearchProgress,
        ),
        Err(SearchError::ConfigurationFailed { .. })
    ));

    let options = SearchOptions {
        failure_policy: FailurePolicy::Skip,
        ..config.search_options()
    };
    let outcome = grid_search(
        &configs,
        split.x_train.view(),
        split.y_train.view(),
        &options,
        &mut NoopSearchProgress,
    )
    .unwrap();
    assert_eq!(outcome.n_folds, config.cv.n_splits());
    assert_eq!(outcome.results.iter().filter(|r| r.error.is_some()).count(), 1);
    assert_eq!(outcome.best.config(), &configs[outcome.best_index]);
}
