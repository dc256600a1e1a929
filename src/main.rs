//! Tubescribe - Resumable Channel Transcript Ingestion
//!
//! Entry point: logging bootstrap, configuration load, and command dispatch
//! into the acquisition pipeline.

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tubescribe::audio::{AudioFetcher, AudioOutcome, YtDlpAudioFetcher};
use tubescribe::captions::{CaptionFetcher, CaptionOutcome, YtDlpCaptionFetcher};
use tubescribe::cli::{Args, Commands};
use tubescribe::config::Config;
use tubescribe::lister::{VideoLister, YtDlpLister};
use tubescribe::pipeline::Pipeline;
use tubescribe::store::ContentStore;
use tubescribe::transcriber::{SpeechTranscriber, TranscribeOutcome, WhisperCliTranscriber};
use tubescribe::transcript::VideoId;
use tubescribe::ytdlp::YtDlpCommandBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("tubescribe.toml").exists() {
                info!("Found tubescribe.toml in current directory, loading...");
                Config::from_file("tubescribe.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::InitConfig { force } => {
            let path = "tubescribe.toml";
            if std::path::Path::new(path).exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path);
            }
            Config::default().save_to_file(path)?;
            println!("Wrote default configuration to {}", path);
        }
        Commands::Run { limit, channel } => {
            if let Some(channel) = channel {
                config.channel_url = channel;
            }

            ensure_ytdlp_available(&config).await?;

            let pipeline = Pipeline::new(&config)?;

            // Ctrl-C requests a clean stop between items rather than killing
            // the process mid-write.
            let flag = pipeline.interrupt_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt requested, finishing the current item...");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let summary = pipeline.run(limit).await?;
            println!("\n{}", summary);
        }
        Commands::List { channel } => {
            if let Some(channel) = channel {
                config.channel_url = channel;
            }

            ensure_ytdlp_available(&config).await?;

            let lister = YtDlpLister::new(&config.tools);
            let ids = lister.list(&config.channel_url).await?;
            for id in &ids {
                println!("{}", id);
            }
            println!("\nTotal videos listed: {}", ids.len());
        }
        Commands::Captions { id } => {
            let store = Arc::new(ContentStore::new(&config.store.root)?);
            let fetcher =
                YtDlpCaptionFetcher::new(&config.tools, config.captions.clone(), Arc::clone(&store));

            match fetcher.fetch(&VideoId::new(id)).await? {
                CaptionOutcome::Saved(record) => {
                    println!("Captions saved ({} segments)", record.segments.len())
                }
                CaptionOutcome::Cached(record) => {
                    println!("Transcript already cached ({} segments)", record.segments.len())
                }
                CaptionOutcome::NoTranscript => println!("No caption track available"),
                CaptionOutcome::LockedOrPrivate => println!("Video is locked or private"),
                CaptionOutcome::RateLimited => println!("Rate limited, retries exhausted"),
                CaptionOutcome::IpBlocked => println!("IP-block signal from the remote source"),
                CaptionOutcome::Failed(detail) => println!("Caption fetch failed: {}", detail),
            }
        }
        Commands::Audio { id } => {
            let store = Arc::new(ContentStore::new(&config.store.root)?);
            let fetcher =
                YtDlpAudioFetcher::new(&config.tools, config.audio.clone(), Arc::clone(&store));

            match fetcher.fetch(&VideoId::new(id)).await? {
                AudioOutcome::Downloaded(path) => println!("Audio saved: {}", path.display()),
                AudioOutcome::Cached(path) => println!("Audio already cached: {}", path.display()),
                AudioOutcome::LockedOrPrivate => println!("Video is locked or private"),
                AudioOutcome::RateLimited => println!("Rate limited"),
                AudioOutcome::IpBlocked => println!("IP-block signal from the remote source"),
                AudioOutcome::MissingDependency(detail) => {
                    println!("Missing runtime dependency: {}", detail)
                }
                AudioOutcome::Failed(detail) => println!("Audio download failed: {}", detail),
            }
        }
        Commands::Transcribe { id, model, language } => {
            let store = Arc::new(ContentStore::new(&config.store.root)?);
            let transcriber =
                WhisperCliTranscriber::new(&config.tools, config.whisper.clone(), Arc::clone(&store))
                    .with_overrides(model, language);

            match transcriber.transcribe(&VideoId::new(id)).await? {
                TranscribeOutcome::Transcribed(record) => {
                    println!("Whisper transcript saved ({} segments)", record.segments.len())
                }
                TranscribeOutcome::Cached(record) => {
                    println!("Transcript already cached ({} segments)", record.segments.len())
                }
                TranscribeOutcome::MissingAudio => {
                    println!("No audio asset for this id; download it first")
                }
                TranscribeOutcome::Failed(detail) => println!("Transcription failed: {}", detail),
            }
        }
    }

    Ok(())
}

async fn ensure_ytdlp_available(config: &Config) -> Result<()> {
    let builder = YtDlpCommandBuilder::new(&config.tools.ytdlp_path);
    if !builder.check_availability().await {
        anyhow::bail!(
            "{} is not available; install yt-dlp and ensure it is on PATH",
            config.tools.ytdlp_path
        );
    }
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".tubescribe").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "tubescribe.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
