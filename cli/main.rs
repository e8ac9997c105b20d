#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use oncosift::config::ExperimentConfig;
use oncosift::data::explore::{
    class_balance, class_means, correlated_pairs, correlation_matrix, render_heatmap,
    render_summary_table, summarize, variance_curve, write_correlation_tsv, write_pairplot_tsv,
    write_variance_curve_tsv,
};
use oncosift::data::{Dataset, TrainTestSplit, load_dataset, train_test_split};
use oncosift::report::{SearchReport, SearchSummary, evaluate};
use oncosift::select::progress::ConsoleSearchProgress;
use oncosift::select::transform::StageSpec;
use oncosift::select::{KnnParams, PipelineConfig, grid_search};

#[derive(Args)]
pub struct ExploreArgs {
    /// Path to the CSV file with an id column, the diagnosis and numeric measurements
    pub data: String,

    /// TOML configuration file; every field is optional
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Directory for the TSV artifacts (overrides output.dir)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BaselineArgs {
    /// Path to the CSV file with an id column, the diagnosis and numeric measurements
    pub data: String,

    /// TOML configuration file; every field is optional
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Path to the CSV file with an id column, the diagnosis and numeric measurements
    pub data: String,

    /// TOML configuration file; every field is optional
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Write the best configuration and its test evaluation to this TOML file
    #[arg(long, value_name = "FILE")]
    pub report: Option<String>,
}

fn load(data: &str, config: &ExperimentConfig) -> Result<Dataset, Box<dyn std::error::Error>> {
    let dataset = load_dataset(data, &config.data)?;
    println!(
        "Loaded {} samples with {} features ({} {}, {} {})",
        dataset.n_samples(),
        dataset.n_features(),
        dataset.positive_count(),
        config.data.positive_label,
        dataset.n_samples() - dataset.positive_count(),
        config.data.negative_label
    );
    Ok(dataset)
}

fn class_names(config: &ExperimentConfig) -> Vec<String> {
    vec![
        config.data.negative_label.clone(),
        config.data.positive_label.clone(),
    ]
}

fn split_dataset(
    dataset: &Dataset,
    config: &ExperimentConfig,
) -> Result<TrainTestSplit, Box<dyn std::error::Error>> {
    let split = train_test_split(
        dataset.features.view(),
        dataset.labels.view(),
        config.split.test_fraction,
        config.split.seed,
        config.split.stratify,
    )?;
    let train_positive = split.y_train.iter().filter(|&&y| y == 1).count();
    println!(
        "Split (seed {}, stratified: {}): {} training rows ({} positive), {} test rows",
        config.split.seed,
        config.split.stratify,
        split.y_train.len(),
        train_positive,
        split.y_test.len()
    );
    Ok(split)
}

pub fn explore(args: ExploreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ExperimentConfig::load_or_default(args.config.as_deref())?;
    let dataset = load(&args.data, &config)?;

    println!("\nShape: {} rows x {} features", dataset.n_samples(), dataset.n_features());
    if !dataset.missing_counts.is_empty() {
        let total: usize = dataset.missing_counts.iter().map(|(_, count)| count).sum();
        println!(
            "{total} missing values across {} columns; {} incomplete rows dropped.",
            dataset.missing_counts.len(),
            dataset.dropped_rows
        );
    }

    println!("\n{}", render_summary_table(&summarize(&dataset)));

    let balance = class_balance(&dataset);
    println!(
        "Class balance: {} {} ({:.1}%), {} {} ({:.1}%)",
        config.data.negative_label,
        balance.negative,
        100.0 * balance.negative_fraction(),
        config.data.positive_label,
        balance.positive,
        100.0 * balance.positive_fraction()
    );

    let means = class_means(&dataset);
    let width = dataset
        .feature_names
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(7);
    println!(
        "\n{:<width$} {:>12} {:>12}",
        "feature", config.data.negative_label, config.data.positive_label
    );
    for (j, name) in dataset.feature_names.iter().enumerate() {
        println!("{name:<width$} {:>12.4} {:>12.4}", means[[0, j]], means[[1, j]]);
    }

    let corr = correlation_matrix(dataset.features.view());
    let threshold = config.explore.correlation_threshold;
    let pairs = correlated_pairs(&corr, &dataset.feature_names, threshold);
    println!("\n{} feature pairs with |r| >= {threshold}:", pairs.len());
    for pair in &pairs {
        println!("  {:>7.4}  {} ~ {}", pair.r, pair.first, pair.second);
    }
    println!("\n{}", render_heatmap(&corr, &dataset.feature_names));

    let pca = variance_curve(dataset.features.view(), dataset.labels.view())?;
    println!("PCA on min-max scaled features:");
    println!("{:>9} {:>9} {:>11}", "component", "ratio", "cumulative");
    let cumulative = pca.cumulative_variance_ratio();
    for (i, (ratio, total)) in pca
        .explained_variance_ratio()
        .iter()
        .zip(cumulative.iter())
        .enumerate()
        .take(10)
    {
        println!("{:>9} {ratio:>9.4} {total:>11.4}", i + 1);
    }

    let out_dir = args.out_dir.unwrap_or_else(|| config.output.dir.clone());
    fs::create_dir_all(&out_dir)?;
    write_correlation_tsv(&out_dir.join("correlation.tsv"), &corr, &dataset.feature_names)?;
    let pairplot_features: Vec<String> = config
        .explore
        .pairplot_features
        .iter()
        .filter(|name| {
            let present = dataset.feature_names.contains(*name);
            if !present {
                log::warn!("Pair-plot feature '{name}' not found; skipping it");
            }
            present
        })
        .cloned()
        .collect();
    write_pairplot_tsv(&out_dir.join("pairplot.tsv"), &dataset, &pairplot_features)?;
    write_variance_curve_tsv(&out_dir.join("variance_curve.tsv"), &pca)?;
    println!("\nArtifacts written to: {}", out_dir.display());
    Ok(())
}

pub fn baseline(args: BaselineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ExperimentConfig::load_or_default(args.config.as_deref())?;
    let dataset = load(&args.data, &config)?;
    let split = split_dataset(&dataset, &config)?;
    let names = class_names(&config);
    let knn = KnnParams::new(config.baseline.n_neighbors);

    for (title, stages) in [
        ("raw features", Vec::new()),
        ("min-max scaled features", vec![StageSpec::MinMax]),
    ] {
        let model = PipelineConfig::new(stages, knn).fit(split.x_train.view(), split.y_train.view())?;
        let report = evaluate(&model, split.x_test.view(), split.y_test.view(), &names)?;
        println!(
            "\nKNN (k = {}) on {title}: accuracy {:.4}\n",
            knn.n_neighbors, report.accuracy
        );
        println!("{report}");
    }
    Ok(())
}

pub fn search(args: SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ExperimentConfig::load_or_default(args.config.as_deref())?;
    let dataset = load(&args.data, &config)?;
    let split = split_dataset(&dataset, &config)?;

    let configs = config.grid.configurations();
    println!(
        "Searching {} configurations with {} cross-validation splits...",
        configs.len(),
        config.cv.n_splits()
    );
    let mut progress = ConsoleSearchProgress::new();
    let outcome = grid_search(
        &configs,
        split.x_train.view(),
        split.y_train.view(),
        &config.search_options(),
        &mut progress,
    )?;
    println!("\n{}", SearchSummary::new(&outcome, config.search.top_n));

    let report = evaluate(
        &outcome.best,
        split.x_test.view(),
        split.y_test.view(),
        &class_names(&config),
    )?;
    println!("Best configuration on the held-out test set:\n");
    println!("{report}");

    if let Some(path) = args.report {
        SearchReport::new(&outcome, report).save(&path)?;
        println!("Report saved to: {path}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "oncosift",
    about = "Exploratory analysis and nearest-neighbour model selection for tumour diagnosis data",
    long_about = "Loads a diagnostic measurement table, summarizes it, and searches scaling, \
                 reduction and k-nearest-neighbour settings by stratified cross-validation."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the dataset and write plot-ready artifacts
    #[command(about = "Describe the dataset (outputs: correlation.tsv, pairplot.tsv, variance_curve.tsv)")]
    Explore(ExploreArgs),

    /// Compare KNN on raw and min-max scaled features
    #[command(about = "Evaluate unscaled and scaled KNN baselines")]
    Baseline(BaselineArgs),

    /// Grid-search pipelines by cross-validation and evaluate the best one
    #[command(about = "Search pipeline configurations (optional output: TOML report)")]
    Search(SearchArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Explore(args)) => explore(args),
        Some(Commands::Baseline(args)) => baseline(args),
        Some(Commands::Search(args)) => search(args),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
