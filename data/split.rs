//! Seeded train/test partitioning and cross-validation fold generation.
//!
//! Every function here takes an explicit seed and draws from a single
//! `StdRng` stream, so identical inputs always produce identical partitions.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Test fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidFraction(f64),
    #[error("Feature matrix has {features} rows but the label vector has {labels}.")]
    LengthMismatch { features: usize, labels: usize },
    #[error(
        "Splitting {n_samples} rows with fraction {fraction} leaves an empty subset (train {n_train}, test {n_test})."
    )]
    EmptySubset {
        n_samples: usize,
        fraction: f64,
        n_train: usize,
        n_test: usize,
    },
    #[error("Class {label} has only {count} rows; stratification needs at least {required}.")]
    ClassTooSmall {
        label: usize,
        count: usize,
        required: usize,
    },
    #[error("Cross-validation needs at least {required} splits, got {found}.")]
    TooFewSplits { found: usize, required: usize },
}

/// A train/test partition and the source row indices of each side.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// One cross-validation partition, as row indices into the data it was drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

fn default_n_splits() -> usize {
    10
}

fn default_validation_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_shuffle() -> bool {
    true
}

/// Cross-validation schemes offered to the model selector.
///
/// In TOML the `scheme` key is required and picks the variant; the remaining
/// fields fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum CvScheme {
    /// Independent stratified shuffle splits drawn from one seeded stream.
    StratifiedShuffle {
        #[serde(default = "default_n_splits")]
        n_splits: usize,
        #[serde(default = "default_validation_fraction")]
        validation_fraction: f64,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// Disjoint stratified folds; every row is validated exactly once.
    StratifiedKFold {
        #[serde(default = "default_n_splits")]
        n_splits: usize,
        #[serde(default = "default_shuffle")]
        shuffle: bool,
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

impl Default for CvScheme {
    fn default() -> Self {
        CvScheme::StratifiedShuffle {
            n_splits: default_n_splits(),
            validation_fraction: default_validation_fraction(),
            seed: default_seed(),
        }
    }
}

impl CvScheme {
    /// Generates the folds for a label vector. Indices refer to positions in `labels`.
    pub fn folds(&self, labels: ArrayView1<usize>) -> Result<Vec<Fold>, SplitError> {
        match *self {
            CvScheme::StratifiedShuffle {
                n_splits,
                validation_fraction,
                seed,
            } => {
                if n_splits == 0 {
                    return Err(SplitError::TooFewSplits {
                        found: 0,
                        required: 1,
                    });
                }
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n_splits)
                    .map(|_| {
                        let (train, validation) =
                            stratified_indices(labels, validation_fraction, &mut rng)?;
                        Ok(Fold { train, validation })
                    })
                    .collect()
            }
            CvScheme::StratifiedKFold {
                n_splits,
                shuffle,
                seed,
            } => stratified_kfold(labels, n_splits, shuffle, seed),
        }
    }

    pub fn n_splits(&self) -> usize {
        match *self {
            CvScheme::StratifiedShuffle { n_splits, .. }
            | CvScheme::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

/// Splits features and labels into training and test subsets.
///
/// `n_test = ceil(test_fraction * n)`. With `stratify`, each class keeps its
/// share of the training set up to rounding.
pub fn train_test_split(
    features: ArrayView2<f64>,
    labels: ArrayView1<usize>,
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<TrainTestSplit, SplitError> {
    if features.nrows() != labels.len() {
        return Err(SplitError::LengthMismatch {
            features: features.nrows(),
            labels: labels.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (train_indices, test_indices) = if stratify {
        stratified_indices(labels, test_fraction, &mut rng)?
    } else {
        let (n_train, n_test) = subset_sizes(labels.len(), test_fraction)?;
        let mut indices: Vec<usize> = (0..labels.len()).collect();
        indices.shuffle(&mut rng);
        let test = indices.split_off(n_train);
        debug_assert_eq!(test.len(), n_test);
        (indices, test)
    };

    log::debug!(
        "Split {} rows into {} train / {} test (stratified: {stratify})",
        labels.len(),
        train_indices.len(),
        test_indices.len()
    );

    Ok(TrainTestSplit {
        x_train: features.select(Axis(0), &train_indices),
        x_test: features.select(Axis(0), &test_indices),
        y_train: labels.select(Axis(0), &train_indices),
        y_test: labels.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}

/// Counts rows per class, ordered by label.
pub fn class_counts(labels: ArrayView1<usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

fn subset_sizes(n_samples: usize, test_fraction: f64) -> Result<(usize, usize), SplitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(test_fraction));
    }
    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_train == 0 || n_test == 0 {
        return Err(SplitError::EmptySubset {
            n_samples,
            fraction: test_fraction,
            n_train,
            n_test,
        });
    }
    Ok((n_train, n_test))
}

/// Largest-remainder allocation of `total` rows across classes in proportion
/// to their counts. Ties go to the larger remainder, then the larger class,
/// then the smaller label.
fn allocate(counts: &BTreeMap<usize, usize>, total: usize) -> BTreeMap<usize, usize> {
    let n: usize = counts.values().sum();
    let mut allocation = BTreeMap::new();
    let mut remainders = Vec::with_capacity(counts.len());
    for (&label, &count) in counts {
        let exact = total as f64 * count as f64 / n as f64;
        let floor = exact.floor() as usize;
        allocation.insert(label, floor);
        remainders.push((exact - floor as f64, count, label));
    }
    let assigned: usize = allocation.values().sum();
    remainders.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    for &(_, _, label) in remainders.iter().take(total - assigned) {
        if let Some(slot) = allocation.get_mut(&label) {
            *slot += 1;
        }
    }
    allocation
}

fn stratified_indices(
    labels: ArrayView1<usize>,
    test_fraction: f64,
    rng: &mut StdRng,
) -> Result<(Vec<usize>, Vec<usize>), SplitError> {
    let (n_train, _) = subset_sizes(labels.len(), test_fraction)?;
    let counts = class_counts(labels);
    for (&label, &count) in &counts {
        if count < 2 {
            return Err(SplitError::ClassTooSmall {
                label,
                count,
                required: 2,
            });
        }
    }

    let allocation = allocate(&counts, n_train);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(labels.len() - n_train);
    for (&label, &take) in &allocation {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(rng);
        test.extend_from_slice(&members[take..]);
        members.truncate(take);
        train.extend(members);
    }
    train.shuffle(rng);
    test.shuffle(rng);
    Ok((train, test))
}

fn stratified_kfold(
    labels: ArrayView1<usize>,
    n_splits: usize,
    shuffle: bool,
    seed: u64,
) -> Result<Vec<Fold>, SplitError> {
    if n_splits < 2 {
        return Err(SplitError::TooFewSplits {
            found: n_splits,
            required: 2,
        });
    }
    let counts = class_counts(labels);
    for (&label, &count) in &counts {
        if count < n_splits {
            return Err(SplitError::ClassTooSmall {
                label,
                count,
                required: n_splits,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; labels.len()];
    for &label in counts.keys() {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect();
        if shuffle {
            members.shuffle(&mut rng);
        }
        for (position, &row) in members.iter().enumerate() {
            assignment[row] = position % n_splits;
        }
    }

    Ok((0..n_splits)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&row| assignment[row] == fold);
            Fold { train, validation }
        })
        .collect())
}
