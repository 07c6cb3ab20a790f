use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use basalprofile::{EngineConfig, JsonReportProvider, Recommender, Strategy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pump/CGM report exported as JSON
    #[arg(short, long)]
    report: PathBuf,

    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = Strategy::Stability)]
    strategy: Strategy,

    /// Print only the raw hour -> rate mapping
    #[arg(long, default_value_t = false)]
    raw: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(None)
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            info!("No config given, using defaults.");
            EngineConfig::default()
        }
    };

    let recommender = Recommender::new(JsonReportProvider::new(&args.report), config)?;
    let summary = recommender
        .run(args.strategy)
        .with_context(|| format!("Recommendation failed for {}", args.report.display()))?;

    let out = if args.raw {
        serde_json::to_string_pretty(&summary.raw)?
    } else {
        serde_json::to_string_pretty(&summary)?
    };
    println!("{}", out);
    Ok(())
}
