use anyhow::Context;
use bookworm::app::App;
use bookworm::config::{Config, ConfigOverrides};
use bookworm::{PatternMode, ReportFormat};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "bookworm", about = "Concurrent book ingestion server")]
struct Cli {
    /// Port to listen on.
    #[arg(short = 'l', long)]
    port: Option<u16>,

    /// Pattern to count in every book, matched case-insensitively as plain text unless --regex is set.
    #[arg(short = 'p', long)]
    pattern: Option<String>,

    /// Treat the pattern as a regular expression instead of plain text.
    #[arg(long)]
    regex: bool,

    /// Seconds between analysis reports.
    #[arg(long)]
    interval: Option<u64>,

    /// Number of analysis workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for book_NN.txt artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    bind: Option<String>,

    /// Emit reports as JSON lines.
    #[arg(long)]
    json: bool,

    /// Config file (defaults to ~/.config/bookworm/config.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind: self.bind.clone(),
            port: self.port,
            output_dir: self.output_dir.clone(),
            pattern: self.pattern.clone(),
            mode: self.regex.then_some(PatternMode::Regex),
            interval_secs: self.interval,
            worker_count: self.workers,
            report_format: self.json.then_some(ReportFormat::Json),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply(cli.overrides());
    let settings = config.resolve().context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let app = App::start(settings, cancel.clone()).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, shutting down"),
            Err(err) => tracing::error!(%err, "failed to listen for interrupt, shutting down"),
        }
        cancel.cancel();
    });

    app.join().await?;
    Ok(())
}
