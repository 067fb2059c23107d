use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use yadsync::{sync_tree, SyncConfig, DEFAULT_API_ENDPOINT};

#[derive(Parser, Debug)]
#[command(name = "yadsync")]
#[command(about = "Mirror a public Yandex.Disk folder to a local directory", long_about = None)]
#[command(version)]
struct Args {
    /// Public key or share URL of the folder
    url: String,

    /// Output directory
    #[arg(short = 'o', value_name = "OUTPUT_PATH", default_value = "output")]
    output_path: PathBuf,

    /// Check local files but do not download anything
    #[arg(long)]
    dry: bool,

    /// Maximum number of entries listed per folder
    #[arg(long, default_value_t = 20)]
    limit: u32,

    /// Base URL of the public resources API
    #[arg(long, default_value = DEFAULT_API_ENDPOINT)]
    api_endpoint: String,

    /// Attempts per request, including the first
    #[arg(long, default_value_t = 3)]
    retries: usize,

    /// Pause between attempts (e.g. "1s", "500ms")
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Timeout for listings and for waiting on download headers
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Do not draw download progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = SyncConfig {
        public_key: args.url,
        output_dir: args.output_path,
        limit: args.limit,
        dry_run: args.dry,
        api_endpoint: args.api_endpoint,
        max_attempts: args.retries,
        retry_delay: args.retry_delay,
        request_timeout: args.timeout,
        show_progress: !args.no_progress,
    };

    info!("Share: {}", config.public_key);
    info!("Output directory: {:?}", config.output_dir);
    if config.dry_run {
        info!("Dry run: no files will be written");
    }

    let started = Instant::now();
    let report = sync_tree(&config)
        .await
        .with_context(|| format!("failed to mirror {}", config.public_key))?;

    let elapsed = Duration::from_secs(started.elapsed().as_secs());
    info!("Done in {}", humantime::format_duration(elapsed));
    if !report.unexpected_listings.is_empty() {
        info!(
            "{} folder(s) could not be listed: {:?}",
            report.unexpected_listings.len(),
            report.unexpected_listings
        );
    }
    if args.verbose {
        info!("Report: {}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("yadsync={}", log_level))
        .init();

    if let Err(e) = run(args).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}
