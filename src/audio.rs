//! Idempotent audio acquisition for the transcription fallback path.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::{classify_stderr, FailureKind};
use crate::config::{AudioConfig, ToolsConfig};
use crate::error::Result;
use crate::store::ContentStore;
use crate::transcript::VideoId;
use crate::ytdlp::YtDlpCommandBuilder;

/// Result of one audio fetch attempt.
#[derive(Debug, Clone)]
pub enum AudioOutcome {
    /// A new asset was downloaded and verified on disk.
    Downloaded(PathBuf),
    /// The asset already existed; no network call was made.
    Cached(PathBuf),
    LockedOrPrivate,
    RateLimited,
    IpBlocked,
    /// Required runtime tool absent (ffmpeg/ffprobe).
    MissingDependency(String),
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, id: &VideoId) -> Result<AudioOutcome>;
}

pub struct YtDlpAudioFetcher {
    builder: YtDlpCommandBuilder,
    config: AudioConfig,
    store: Arc<ContentStore>,
}

impl YtDlpAudioFetcher {
    pub fn new(tools: &ToolsConfig, config: AudioConfig, store: Arc<ContentStore>) -> Self {
        Self {
            builder: YtDlpCommandBuilder::new(&tools.ytdlp_path),
            config,
            store,
        }
    }
}

#[async_trait]
impl AudioFetcher for YtDlpAudioFetcher {
    async fn fetch(&self, id: &VideoId) -> Result<AudioOutcome> {
        let out_path = self.store.audio_path(id);
        if out_path.exists() {
            debug!("Audio already exists for {}", id);
            return Ok(AudioOutcome::Cached(out_path));
        }

        info!("Downloading audio for {}", id);
        let output = self
            .builder
            .download_audio(
                &id.watch_url(),
                &self.config,
                &self.store.audio_output_template(),
            )
            .run()
            .await?;

        if !output.success {
            let stderr = output.stderr.trim().to_string();
            return Ok(match classify_stderr(&stderr) {
                FailureKind::IpBlocked => {
                    warn!("IP-block signal while downloading audio for {}", id);
                    AudioOutcome::IpBlocked
                }
                FailureKind::LockedOrPrivate => AudioOutcome::LockedOrPrivate,
                FailureKind::RateLimited => AudioOutcome::RateLimited,
                FailureKind::MissingDependency => {
                    warn!("Missing runtime dependency: {}", stderr);
                    AudioOutcome::MissingDependency(stderr)
                }
                FailureKind::Other => {
                    warn!("Audio download failed for {}: {}", id, stderr);
                    AudioOutcome::Failed(if stderr.is_empty() {
                        "yt-dlp audio download failed".to_string()
                    } else {
                        stderr
                    })
                }
            });
        }

        // The tool can exit zero without producing the expected file.
        if !out_path.exists() {
            return Ok(AudioOutcome::Failed(
                "audio download finished but mp3 file not found".to_string(),
            ));
        }

        info!("Audio saved: {}", out_path.display());
        Ok(AudioOutcome::Downloaded(out_path))
    }
}
