//! Exp Uploadr - uploads experiment artifacts and metrics to Notion
//!
//! Archives an experiment directory, uploads it via the chunked multipart
//! protocol, and records validation metrics on a database page.

use clap::Parser;
use exp_uploadr::config::Config;
use exp_uploadr::exp::ExpUploader;
use exp_uploadr::metrics::ReportFileProducer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exp Uploadr - upload experiment results to a Notion database
#[derive(Parser, Debug)]
#[command(name = "exp-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the experiment directory
    #[arg(long)]
    exp_path: PathBuf,

    /// Path to the dataset configuration file
    #[arg(long)]
    data_path: PathBuf,

    /// Extra tags for the upload (space-separated)
    #[arg(long, num_args = 0..)]
    extra_tags: Vec<String>,

    /// Path to the credentials/config file
    #[arg(short, long, default_value = "notion_key.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for the append-only log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;
    info!("Starting Exp Uploadr v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args).await {
        error!("Upload FAIL: {e}");
        for cause in e.chain().skip(1) {
            error!("caused by: {cause}");
        }
        std::process::exit(1);
    }

    info!("Upload completed successfully");
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let producer = ReportFileProducer::default();
    let mut uploader = ExpUploader::new(
        &config,
        &args.exp_path,
        &args.data_path,
        &args.extra_tags,
        &producer,
    )?;
    uploader.run().await?;
    Ok(())
}

/// Console output plus an append-only log file, one file across runs
fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    std::fs::create_dir_all(&args.log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(args.log_dir.join(".notionlogs"))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}
