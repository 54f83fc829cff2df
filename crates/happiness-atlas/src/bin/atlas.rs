//! Happiness atlas CLI
//!
//! Run with: cargo run -p happiness-atlas -- analyze --internet internet.csv --happiness happiness.csv

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use happiness_atlas::{analyze_files, AtlasConfig, Error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "happiness-atlas")]
#[command(about = "Internet usage vs. happiness: merge, correlate, cluster", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge both tables and run the full analysis
    Analyze {
        /// Internet usage table (CSV or JSON)
        #[arg(short, long)]
        internet: PathBuf,

        /// Happiness table (CSV or JSON)
        #[arg(long)]
        happiness: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the merged records as CSV
        #[arg(long)]
        records_csv: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "happiness_atlas=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AtlasConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Analyze {
            internet,
            happiness,
            format,
            output,
            records_csv,
        } => {
            let report = analyze_files(config, &internet, &happiness)
                .await
                .map_err(|err| {
                    let context = failure_context(&err, &internet, &happiness);
                    anyhow::Error::new(err).context(context)
                })?;

            let rendered = match format {
                OutputFormat::Text => report.render_text(),
                OutputFormat::Json => report.to_json_pretty()?,
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!("Report written to {}", path.display());
                }
                None => print!("{}", rendered),
            }

            if let Some(path) = records_csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report.write_records_csv(file)?;
                tracing::info!("Records written to {}", path.display());
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

/// Top-level message for a failed analysis; bad input is named as such
fn failure_context(err: &Error, internet: &Path, happiness: &Path) -> String {
    if err.is_input_error() {
        format!(
            "could not read input tables {} and {}",
            internet.display(),
            happiness.display()
        )
    } else {
        format!(
            "analysis of {} and {} failed",
            internet.display(),
            happiness.display()
        )
    }
}
