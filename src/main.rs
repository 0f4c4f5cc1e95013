//! PowerGuard CLI
//!
//! Usage:
//!   powerguard detect [--model isolation_forest|autoencoder] [--threshold 0.6] [--meter ID]...
//!   powerguard analyze <METER_ID>
//!   powerguard series <METER_ID>
//!   powerguard results [--suspicious-only] [--limit N]
//!   powerguard stats
//!
//! Output is JSON on stdout, logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use powerguard_core::config::Settings;
use powerguard_core::constants::{APP_NAME, APP_VERSION};
use powerguard_core::error::PipelineResult;
use powerguard_core::logic::detection::DetectionOrchestrator;
use powerguard_core::logic::model::ModelKind;
use powerguard_core::logic::store::SqliteStore;

/// PowerGuard - smart meter theft detection
#[derive(Parser)]
#[command(name = "powerguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database with meters, readings and results
    #[arg(long, env = "POWERGUARD_DATABASE_PATH", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelArg {
    #[value(name = "isolation_forest")]
    IsolationForest,
    #[value(name = "autoencoder")]
    Autoencoder,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::IsolationForest => ModelKind::IsolationForest,
            ModelArg::Autoencoder => ModelKind::Autoencoder,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score meters and store one result per meter
    Detect {
        /// Detector, defaults to USE_AUTOENCODER
        #[arg(short, long)]
        model: Option<ModelArg>,

        /// Flag meters with score >= threshold instead of the model decision
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Restrict the run to these meters (repeatable)
        #[arg(long = "meter")]
        meters: Vec<String>,
    },

    /// Recomputed features and the live result of one meter
    Analyze { meter_id: String },

    /// Readings of one meter with spike marks
    Series { meter_id: String },

    /// Stored results, highest score first
    Results {
        #[arg(long)]
        suspicious_only: bool,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Totals over the stored results
    Stats,
}

fn print_json<T: Serialize>(value: &T) -> PipelineResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn not_found(meter_id: &str) -> ExitCode {
    log::error!("No data found for meter {}", meter_id);
    ExitCode::from(2)
}

fn run(cli: Cli) -> PipelineResult<ExitCode> {
    let mut settings = Settings::from_env();
    if let Some(path) = cli.database {
        settings.database_path = path;
    }

    let store = SqliteStore::open(&settings.database_path)?;
    let default_model = settings.default_model();
    let orchestrator = DetectionOrchestrator::new(&store, &store, settings);

    match cli.command {
        Commands::Detect { model, threshold, meters } => {
            let model = model.map(ModelKind::from).unwrap_or(default_model);
            let filter = (!meters.is_empty()).then_some(meters.as_slice());
            let records = orchestrator.run_detection(model, threshold, filter)?;
            print_json(&records)?;
        }
        Commands::Analyze { meter_id } => match orchestrator.get_meter_analysis(&meter_id)? {
            Some(analysis) => print_json(&analysis)?,
            None => return Ok(not_found(&meter_id)),
        },
        Commands::Series { meter_id } => match orchestrator.get_meter_time_series(&meter_id)? {
            Some(series) => print_json(&series)?,
            None => return Ok(not_found(&meter_id)),
        },
        Commands::Results { suspicious_only, limit } => {
            let records: Vec<_> = orchestrator
                .results()?
                .into_iter()
                .filter(|r| !suspicious_only || r.is_suspicious)
                .take(limit.unwrap_or(usize::MAX))
                .collect();
            print_json(&records)?;
        }
        Commands::Stats => print_json(&orchestrator.summary()?)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
