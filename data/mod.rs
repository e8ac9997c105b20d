pub mod explore;
pub mod load;
pub mod split;

pub use load::{DataError, Dataset, LoaderOptions, MissingPolicy, load_dataset};
pub use split::{CvScheme, Fold, SplitError, TrainTestSplit, train_test_split};
