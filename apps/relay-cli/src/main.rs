mod config;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use filerelay_relay::{ChunkStore, Relay, TransferDescriptor, filename_from_url};
use filerelay_transfer::{ProgressThrottle, SpeedCalculator};

use config::{RelayConfig, TOKEN_ENV};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Relay a remote file into the file host")]
struct Args {
    /// URL of the file to relay
    source_url: String,

    /// Target filename (default: last segment of the source URL)
    #[arg(long)]
    filename: Option<String>,

    /// MIME type (default: the source's Content-Type)
    #[arg(long)]
    content_type: Option<String>,

    /// Declared length of the source in bytes (0 = unknown)
    #[arg(long, default_value_t = 0)]
    length: u64,

    /// Destination base URL
    #[arg(long)]
    destination: Option<String>,

    /// Deletion deadline passed to the destination
    #[arg(long)]
    expiry: Option<String>,

    /// Compression level passed to the destination
    #[arg(long)]
    compression: Option<String>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Files at or above this size are uploaded in chunks
    #[arg(long)]
    threshold: Option<u64>,

    /// Always use the chunked upload
    #[arg(long)]
    chunked: bool,

    /// Config file (default: ~/.config/filerelay/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply_to(&self, config: &mut RelayConfig) {
        if let Some(dest) = &self.destination {
            config.destination_base_url = dest.clone();
        }
        if let Some(expiry) = &self.expiry {
            config.expiry = Some(expiry.clone());
        }
        if let Some(compression) = &self.compression {
            config.compression = Some(compression.clone());
        }
        if let Some(size) = self.chunk_size.filter(|&s| s > 0) {
            config.chunk_size = size;
        }
        if let Some(threshold) = self.threshold.filter(|&t| t > 0) {
            config.chunk_threshold = threshold;
        }
    }
}

/// Logs relay progress at most once per interval.
struct ProgressLog {
    throttle: ProgressThrottle,
    speed: SpeedCalculator,
    last_sent: AtomicU64,
}

impl ProgressLog {
    fn new(interval: Duration) -> Self {
        Self {
            throttle: ProgressThrottle::new(Some(interval)),
            speed: SpeedCalculator::new(None, None),
            last_sent: AtomicU64::new(0),
        }
    }

    fn report(&self, sent: u64, total: u64) {
        let prev = self.last_sent.swap(sent, Ordering::Relaxed);
        self.speed.add_sample(sent.saturating_sub(prev));

        if !self.throttle.should_report(sent, total) {
            return;
        }
        let rate = self.speed.bytes_per_second();
        if total > 0 {
            let eta = self.speed.eta(total.saturating_sub(sent));
            tracing::info!(
                sent,
                total,
                percent = sent * 100 / total,
                bytes_per_sec = rate as u64,
                eta_secs = eta.map(|d| d.as_secs()),
                "progress"
            );
        } else {
            tracing::info!(sent, bytes_per_sec = rate as u64, "progress");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,filerelay=debug")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => RelayConfig::load_from(path.clone()),
        None => RelayConfig::load(),
    }
    .context("loading config")?;
    cfg.apply_token_override(std::env::var(TOKEN_ENV).ok());
    args.apply_to(&mut cfg);

    if args.save_config {
        cfg.save()
            .with_context(|| format!("saving config to {}", cfg.file_path().display()))?;
    }

    if cfg.destination_base_url.is_empty() {
        bail!("no destination configured; pass --destination or set destinationBaseUrl");
    }
    if cfg.token.is_empty() {
        bail!("no token configured; set {TOKEN_ENV} or token in the config file");
    }

    let filename = args
        .filename
        .clone()
        .or_else(|| filename_from_url(&args.source_url))
        .context("cannot derive a filename from the source URL; pass --filename")?;

    let mut descriptor = TransferDescriptor::new(
        &args.source_url,
        filename,
        &cfg.destination_base_url,
        &cfg.token,
    )
    .with_declared_length(args.length)
    .with_settings(cfg.settings());
    if let Some(ct) = &args.content_type {
        descriptor = descriptor.with_content_type(ct);
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("filerelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current chunk");
            on_signal.cancel();
        }
    });

    let store = match &cfg.staging_dir {
        Some(dir) => ChunkStore::new(dir),
        None => ChunkStore::in_temp_dir(),
    };
    let relay = Relay::new(http)
        .with_store(store)
        .with_chunk_size(cfg.chunk_size)
        .with_threshold(cfg.chunk_threshold)
        .with_cancel(cancel);

    let progress = ProgressLog::new(Duration::from_millis(cfg.progress_interval_ms));
    let on_progress = |sent, total| progress.report(sent, total);

    let files = if args.chunked {
        relay.upload(&descriptor, &on_progress).await?
    } else {
        relay.relay(&descriptor, &on_progress).await?.files
    };

    println!("{}", serde_json::to_string_pretty(&files)?);
    Ok(())
}
