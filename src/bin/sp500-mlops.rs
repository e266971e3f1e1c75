//! sp500-mlops CLI - pipeline stage entry points
//!
//! Each subcommand runs one batch stage of the pipeline; scheduled jobs
//! chain them.
//!
//! ## Example Usage
//!
//! ```bash
//! # Append today's bars to the raw data
//! sp500-mlops fetch
//!
//! # Rebuild the feature frame and split it
//! sp500-mlops process
//! sp500-mlops split
//!
//! # Drift-check the fresh data, then train and evaluate
//! sp500-mlops validate
//! sp500-mlops train
//! sp500-mlops evaluate
//!
//! # Serve predictions / run the monitoring job
//! sp500-mlops serve
//! sp500-mlops monitor
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use sp500_mlops::alert::try_send_alert;
use sp500_mlops::data::{append_bars_csv, read_bars_csv};
use sp500_mlops::ml::trainer::{CLASSIFIER_MODEL, REGRESSOR_MODEL};
use sp500_mlops::monitor::evaluate_production;
use sp500_mlops::prelude::*;
use sp500_mlops::serve::{self, AppState};
use sp500_mlops::store::VALIDATION_RESULTS;
use std::path::PathBuf;
use std::sync::Arc;

/// sp500-mlops: S&P 500 prediction pipeline
#[derive(Parser)]
#[command(name = "sp500-mlops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "S&P 500 next-day prediction pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent daily bars and append them to the raw CSVs
    Fetch {
        /// Calendar days to fetch
        #[arg(long, default_value_t = 1)]
        days: i64,
    },

    /// Build the feature frame from the raw bars
    Process,

    /// Split the current dataset chronologically into train and test
    Split {
        /// Fraction of rows held out as the test split
        #[arg(long, default_value_t = 0.1)]
        fraction: f64,
    },

    /// Validate the current dataset against the reference schema
    Validate {
        /// Reference CSV (defaults to data/reference_data.csv)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Current CSV (defaults to data/current_data.csv)
        #[arg(long)]
        current: Option<PathBuf>,
    },

    /// Train both models and register them at stage staging
    Train,

    /// Evaluate staged models against production on the test split
    Evaluate,

    /// Evaluate the production model against realized outcomes
    Monitor,

    /// Run the HTTP serving layer
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Fetch { days } => fetch(&settings, days).await,
        Commands::Process => process(&settings),
        Commands::Split { fraction } => split(&settings, fraction),
        Commands::Validate { reference, current } => validate_cmd(&settings, reference, current),
        Commands::Train => train(&settings),
        Commands::Evaluate => evaluate(&settings),
        Commands::Monitor => monitor_cmd(&settings).await,
        Commands::Serve => serve_cmd(settings).await,
    }
}

async fn fetch(settings: &Settings, days: i64) -> anyhow::Result<()> {
    let source = YahooFinanceSource::new()?;

    let bars = source.fetch_recent(&settings.ticker, days).await?;
    append_bars_csv(&settings.raw_data_path("sp500"), &bars)?;
    println!("Appended {} bars for {}", bars.len(), settings.ticker);

    let aux = source.fetch_recent(&settings.aux_ticker, days).await?;
    append_bars_csv(&settings.raw_data_path("nasdaq"), &aux)?;
    println!("Appended {} bars for {}", aux.len(), settings.aux_ticker);

    Ok(())
}

fn process(settings: &Settings) -> anyhow::Result<()> {
    let bars = read_bars_csv(&settings.raw_data_path("sp500"))
        .context("reading raw S&P 500 bars (run `fetch` first)")?;

    let aux_path = settings.raw_data_path("nasdaq");
    let aux = if aux_path.is_file() {
        read_bars_csv(&aux_path)?
    } else {
        log::warn!("no raw Nasdaq data; Open_Nasdaq will be null");
        Vec::new()
    };

    let frame = FeatureBuilder::new().build(&bars, &aux)?;
    frame.to_csv(&settings.current_data_path())?;
    println!(
        "Wrote {} rows x {} columns to {}",
        frame.n_rows(),
        frame.n_cols(),
        settings.current_data_path().display()
    );
    Ok(())
}

fn split(settings: &Settings, fraction: f64) -> anyhow::Result<()> {
    let frame = Frame::from_csv(&settings.current_data_path())
        .context("reading the current dataset (run `process` first)")?;

    let (train, test) = chronological_split(&frame, fraction)?;
    train.to_csv(&settings.train_path())?;
    test.to_csv(&settings.test_path())?;
    println!(
        "Split {} rows into {} train / {} test",
        frame.n_rows(),
        train.n_rows(),
        test.n_rows()
    );
    Ok(())
}

fn validate_cmd(
    settings: &Settings,
    reference: Option<PathBuf>,
    current: Option<PathBuf>,
) -> anyhow::Result<()> {
    let reference_path = reference.unwrap_or_else(|| settings.reference_data_path());
    let current_path = current.unwrap_or_else(|| settings.current_data_path());

    let reference = Frame::from_csv(&reference_path)
        .with_context(|| format!("reading reference data {}", reference_path.display()))?;
    let current = Frame::from_csv(&current_path)
        .with_context(|| format!("reading current data {}", current_path.display()))?;

    let report = validate(&reference, &current);
    for message in &report.messages {
        println!("{message}");
    }
    println!("Validation {}", if report.success { "passed" } else { "FAILED" });

    let store = DocumentStore::open(&settings.store_path)?;
    store.insert(VALIDATION_RESULTS, &report)?;

    if !report.success {
        try_send_alert(
            settings.smtp.as_ref(),
            "ALERT - dataset validation failed",
            &report.messages.join("\n"),
        );
    }
    Ok(())
}

fn train(settings: &Settings) -> anyhow::Result<()> {
    let frame = Frame::from_csv(&settings.train_path())
        .context("reading the train split (run `split` first)")?;
    let registry = ModelRegistry::open(&settings.registry_dir)?;

    let trained = train_and_register(&registry, &frame, &TrainerConfig::default())?;
    println!(
        "Registered {} v{} and {} v{} at staging",
        trained.classifier.name,
        trained.classifier.version,
        trained.regressor.name,
        trained.regressor.version
    );
    Ok(())
}

fn evaluate(settings: &Settings) -> anyhow::Result<()> {
    let test = Frame::from_csv(&settings.test_path())
        .context("reading the test split (run `split` first)")?;
    let registry = ModelRegistry::open(&settings.registry_dir)?;
    let store = DocumentStore::open(&settings.store_path)?;
    let evaluator = PromotionEvaluator::new(&registry, &store, &settings.reports_dir);

    for (name, task) in [
        (CLASSIFIER_MODEL, TaskKind::Classification),
        (REGRESSOR_MODEL, TaskKind::Regression),
    ] {
        let outcome = evaluator.evaluate(name, task, &test)?;
        match outcome {
            PromotionOutcome::NoStaging => println!("{name}: no staging candidate"),
            PromotionOutcome::Promoted {
                version,
                superseded: None,
            } => println!("{name}: v{version} promoted (no incumbent)"),
            PromotionOutcome::Promoted {
                version,
                superseded: Some(old),
            } => println!("{name}: v{version} promoted over v{old}"),
            PromotionOutcome::Rejected { version, incumbent } => {
                println!("{name}: v{version} rejected, production stays at v{incumbent}")
            }
        }
    }
    Ok(())
}

async fn monitor_cmd(settings: &Settings) -> anyhow::Result<()> {
    let source = YahooFinanceSource::new()?;
    let store = DocumentStore::open(&settings.store_path)?;

    let metrics = evaluate_production(&source, &store, settings).await?;
    println!("Accuracy: {:.2}", metrics.accuracy);
    println!("Precision: {:.2}", metrics.precision);
    println!("Recall: {:.2}", metrics.recall);
    println!("F1 Score: {:.2}", metrics.f1);
    Ok(())
}

async fn serve_cmd(settings: Settings) -> anyhow::Result<()> {
    let registry = ModelRegistry::open(&settings.registry_dir)?;
    let store = DocumentStore::open(&settings.store_path)?;
    let source = YahooFinanceSource::new()?;

    let state = Arc::new(AppState {
        settings,
        registry,
        store,
        source,
    });
    serve::run(state).await?;
    Ok(())
}
