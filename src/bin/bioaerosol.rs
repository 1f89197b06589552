// Command-line entry point
//
// Usage:
//   bioaerosol compare --config study.json --json report.json
//   bioaerosol averages --data-dir data/ --csv averages.csv

use anyhow::{Context, Result};
use bioaerosol_stats::{
    location_averages, report, AnalysisConfig, ComparisonGranularity, SiteAnalyzer,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compare airborne bacteria at the control site against all other sites.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the control-vs-other comparison for every variable
    Compare {
        #[command(flatten)]
        input: InputArgs,

        /// Compare per-location means or every raw measurement
        #[arg(long, value_enum)]
        granularity: Option<Granularity>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the merged location × variable table as CSV
        #[arg(long)]
        merged_csv: Option<PathBuf>,
    },
    /// Print per-location averages sorted by total
    Averages {
        #[command(flatten)]
        input: InputArgs,

        /// Write the averages table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON configuration; the built-in field study layout when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the source files (falls back to DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Granularity {
    PerLocation,
    Pooled,
}

impl From<Granularity> for ComparisonGranularity {
    fn from(value: Granularity) -> Self {
        match value {
            Granularity::PerLocation => ComparisonGranularity::PerLocation,
            Granularity::Pooled => ComparisonGranularity::Pooled,
        }
    }
}

fn load_config(input: &InputArgs) -> Result<AnalysisConfig> {
    let config = match &input.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => AnalysisConfig::default(),
    };

    let data_dir = input
        .data_dir
        .clone()
        .or_else(|| std::env::var("DATA_DIR").ok().map(PathBuf::from));

    Ok(match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn run_compare(
    mut config: AnalysisConfig,
    granularity: Option<Granularity>,
    json: Option<&Path>,
    merged_csv: Option<&Path>,
) -> Result<()> {
    if let Some(granularity) = granularity {
        config.granularity = granularity.into();
    }

    let analyzer = SiteAnalyzer::new(config)?;
    let analysis = analyzer.run()?;

    print!("{}", report::render_text(&analysis));

    if let Some(path) = json {
        report::write_json(&analysis, path)
            .with_context(|| format!("Failed to write report {:?}", path))?;
        tracing::info!("Report written to {:?}", path);
    }

    if let Some(path) = merged_csv {
        report::write_merged_csv(&analysis.merged, &analyzer.config().classifier, path)
            .with_context(|| format!("Failed to write merged table {:?}", path))?;
        tracing::info!("Merged table written to {:?}", path);
    }

    Ok(())
}

fn run_averages(config: AnalysisConfig, csv: Option<&Path>) -> Result<()> {
    let analyzer = SiteAnalyzer::new(config)?;
    let merged = analyzer.merged()?;
    let scale = analyzer.config().scale_exponent;

    let rows = location_averages(&merged, &analyzer.config().classifier, scale);
    print!("{}", report::render_averages_text(merged.variables(), &rows, scale));

    if let Some(path) = csv {
        report::write_averages_csv(merged.variables(), &rows, path)
            .with_context(|| format!("Failed to write averages {:?}", path))?;
        tracing::info!("Averages written to {:?}", path);
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bioaerosol_stats=info,bioaerosol=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compare {
            input,
            granularity,
            json,
            merged_csv,
        } => {
            let config = load_config(&input)?;
            run_compare(config, granularity, json.as_deref(), merged_csv.as_deref())
        }
        Command::Averages { input, csv } => {
            let config = load_config(&input)?;
            run_averages(config, csv.as_deref())
        }
    }
}
