mod app;
mod export;
mod glyph;
mod terminal;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use mrot_core::ParticipantMeta;
use mrot_experiment::ExperimentConfig;
use tracing_subscriber::EnvFilter;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "mrot")]
#[command(about = "Mental rotation reaction-time experiment")]
struct Args {
    /// Experiment configuration (JSON). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Opaque participant identifier stored with the results
    #[arg(short, long, default_value = "anonymous")]
    participant: String,

    /// Where to write the JSON results on completion or quit
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for trial order; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Override the practice block length
    #[arg(long)]
    practice: Option<usize>,

    /// Override the formal block length
    #[arg(long)]
    formal: Option<usize>,

    /// Log file; logs go to stderr at `warn` when omitted
    #[arg(long)]
    log: Option<PathBuf>,
}

fn init_tracing(log: Option<&Path>) -> Result<()> {
    let default_level = if log.is_some() { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(n) = args.practice {
        config.practice_trials = n;
    }
    if let Some(n) = args.formal {
        config.formal_trials = n;
    }

    let participant = ParticipantMeta::new(args.participant);
    let app = App::new(config, participant, args.seed, args.output)?;
    app.run()?;

    Ok(())
}
