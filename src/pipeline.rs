//! Acquisition orchestrator: the per-video state machine and run loop.
//!
//! Per identifier, in list order: skip-if-done, try captions, try audio,
//! try transcription. Single-threaded and sequential; the only shared
//! resource is the on-disk store, guarded by check-then-write.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audio::{AudioFetcher, AudioOutcome, YtDlpAudioFetcher};
use crate::captions::{CaptionFetcher, CaptionOutcome, YtDlpCaptionFetcher};
use crate::config::Config;
use crate::error::Result;
use crate::lister::{VideoLister, YtDlpLister};
use crate::pacing::Pacer;
use crate::store::ContentStore;
use crate::transcriber::{SpeechTranscriber, TranscribeOutcome, WhisperCliTranscriber};
use crate::transcript::VideoId;

/// Per-video result of one orchestrator pass. Emitted for observability and
/// the run-level halt decision; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    SkippedCached,
    CaptionsSaved,
    AudioThenTranscribed,
    NoTranscript,
    RateLimited,
    IpBlocked,
    LockedOrPrivate,
    Error,
}

impl std::fmt::Display for AcquisitionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            AcquisitionOutcome::SkippedCached => "skipped_cached",
            AcquisitionOutcome::CaptionsSaved => "captions_saved",
            AcquisitionOutcome::AudioThenTranscribed => "audio_then_transcribed",
            AcquisitionOutcome::NoTranscript => "no_transcript",
            AcquisitionOutcome::RateLimited => "rate_limited",
            AcquisitionOutcome::IpBlocked => "ip_blocked",
            AcquisitionOutcome::LockedOrPrivate => "locked_or_private",
            AcquisitionOutcome::Error => "error",
        };
        write!(f, "{}", tag)
    }
}

/// Aggregate counts for one run, printed as the end-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub skipped_cached: usize,
    pub captions_saved: usize,
    pub audio_then_transcribed: usize,
    pub no_transcript: usize,
    pub rate_limited: usize,
    pub ip_blocked: usize,
    pub locked_or_private: usize,
    pub errors: usize,
    /// Run stopped early because of an IP-block signal.
    pub halted: bool,
    /// Run stopped early by operator interrupt.
    pub interrupted: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: AcquisitionOutcome) {
        match outcome {
            AcquisitionOutcome::SkippedCached => self.skipped_cached += 1,
            AcquisitionOutcome::CaptionsSaved => self.captions_saved += 1,
            AcquisitionOutcome::AudioThenTranscribed => self.audio_then_transcribed += 1,
            AcquisitionOutcome::NoTranscript => self.no_transcript += 1,
            AcquisitionOutcome::RateLimited => self.rate_limited += 1,
            AcquisitionOutcome::IpBlocked => self.ip_blocked += 1,
            AcquisitionOutcome::LockedOrPrivate => self.locked_or_private += 1,
            AcquisitionOutcome::Error => self.errors += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.skipped_cached
            + self.captions_saved
            + self.audio_then_transcribed
            + self.no_transcript
            + self.rate_limited
            + self.ip_blocked
            + self.locked_or_private
            + self.errors
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Processed: {}", self.processed())?;
        writeln!(f, "  skipped_cached:         {}", self.skipped_cached)?;
        writeln!(f, "  captions_saved:         {}", self.captions_saved)?;
        writeln!(f, "  audio_then_transcribed: {}", self.audio_then_transcribed)?;
        writeln!(f, "  no_transcript:          {}", self.no_transcript)?;
        writeln!(f, "  rate_limited:           {}", self.rate_limited)?;
        writeln!(f, "  locked_or_private:      {}", self.locked_or_private)?;
        writeln!(f, "  ip_blocked:             {}", self.ip_blocked)?;
        writeln!(f, "  errors:                 {}", self.errors)?;
        if self.halted {
            writeln!(f, "Run halted early: IP-block signal from the remote source")?;
        }
        if self.interrupted {
            writeln!(f, "Run interrupted by operator; partial results are on disk")?;
        }
        Ok(())
    }
}

pub struct Pipeline {
    channel_url: String,
    lister: Box<dyn VideoLister>,
    captions: Box<dyn CaptionFetcher>,
    audio: Box<dyn AudioFetcher>,
    transcriber: Box<dyn SpeechTranscriber>,
    store: Arc<ContentStore>,
    pacer: Pacer,
    interrupted: Arc<AtomicBool>,
}

impl Pipeline {
    /// Wire the real yt-dlp/ffmpeg/whisper components from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let store = Arc::new(ContentStore::new(&config.store.root)?);

        Ok(Self::with_components(
            config.channel_url.clone(),
            Box::new(YtDlpLister::new(&config.tools)),
            Box::new(YtDlpCaptionFetcher::new(
                &config.tools,
                config.captions.clone(),
                Arc::clone(&store),
            )),
            Box::new(YtDlpAudioFetcher::new(
                &config.tools,
                config.audio.clone(),
                Arc::clone(&store),
            )),
            Box::new(WhisperCliTranscriber::new(
                &config.tools,
                config.whisper.clone(),
                Arc::clone(&store),
            )),
            store,
            Pacer::new(config.pacing.clone()),
        ))
    }

    pub fn with_components(
        channel_url: String,
        lister: Box<dyn VideoLister>,
        captions: Box<dyn CaptionFetcher>,
        audio: Box<dyn AudioFetcher>,
        transcriber: Box<dyn SpeechTranscriber>,
        store: Arc<ContentStore>,
        pacer: Pacer,
    ) -> Self {
        Self {
            channel_url,
            lister,
            captions,
            audio,
            transcriber,
            store,
            pacer,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between items; set by the Ctrl-C handler so the run ends
    /// cleanly with a partial summary instead of corrupt on-disk state.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Process the channel, stopping early on interrupt or IP-block.
    pub async fn run(&self, limit: Option<usize>) -> Result<RunSummary> {
        let mut ids = self.lister.list(&self.channel_url).await?;

        if let Some(limit) = limit {
            ids.truncate(limit);
            info!("Processing first {} videos (limit)", ids.len());
        }

        let progress = ProgressBar::new(ids.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{pos}/{len} [{bar:30}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut summary = RunSummary::default();

        for (idx, id) in ids.iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                warn!("Interrupt received, stopping after {} items", idx);
                summary.interrupted = true;
                break;
            }

            let outcome = self.process_one(id).await?;
            info!("[{}/{}] {}: {}", idx + 1, ids.len(), id, outcome);
            progress.set_message(format!("{}: {}", id, outcome));
            progress.inc(1);
            summary.record(outcome);

            if outcome == AcquisitionOutcome::IpBlocked {
                // Continuing a blocked run only worsens the ban.
                error!("IP-block detected, aborting the remaining run");
                summary.halted = true;
                break;
            }
        }

        progress.finish_and_clear();
        Ok(summary)
    }

    /// One pass of the per-video state machine.
    async fn process_one(&self, id: &VideoId) -> Result<AcquisitionOutcome> {
        if self.store.transcript_exists(id) {
            return Ok(AcquisitionOutcome::SkippedCached);
        }

        self.pacer.pause_between_videos().await;

        match self.captions.fetch(id).await? {
            CaptionOutcome::Saved(_) | CaptionOutcome::Cached(_) => {
                return Ok(AcquisitionOutcome::CaptionsSaved);
            }
            CaptionOutcome::IpBlocked => return Ok(AcquisitionOutcome::IpBlocked),
            CaptionOutcome::NoTranscript
            | CaptionOutcome::LockedOrPrivate
            | CaptionOutcome::RateLimited
            | CaptionOutcome::Failed(_) => {
                // Fall through to the audio path.
            }
        }

        // Pause only ahead of an actual download; a cached asset is free.
        if !self.store.audio_exists(id) {
            self.pacer.pause_before_audio().await;
        }

        match self.audio.fetch(id).await? {
            AudioOutcome::Downloaded(_) | AudioOutcome::Cached(_) => {}
            AudioOutcome::IpBlocked => return Ok(AcquisitionOutcome::IpBlocked),
            AudioOutcome::LockedOrPrivate => {
                return Ok(AcquisitionOutcome::LockedOrPrivate);
            }
            AudioOutcome::RateLimited => return Ok(AcquisitionOutcome::RateLimited),
            AudioOutcome::MissingDependency(detail) => {
                error!("Audio fetch for {} blocked by environment: {}", id, detail);
                return Ok(AcquisitionOutcome::Error);
            }
            AudioOutcome::Failed(detail) => {
                warn!("Audio fetch failed for {}: {}", id, detail);
                return Ok(AcquisitionOutcome::Error);
            }
        }

        match self.transcriber.transcribe(id).await? {
            TranscribeOutcome::Transcribed(_) | TranscribeOutcome::Cached(_) => {
                Ok(AcquisitionOutcome::AudioThenTranscribed)
            }
            TranscribeOutcome::MissingAudio => {
                warn!("Audio asset vanished before transcription of {}", id);
                Ok(AcquisitionOutcome::Error)
            }
            TranscribeOutcome::Failed(detail) => {
                warn!("Transcription failed for {}: {}", id, detail);
                Ok(AcquisitionOutcome::Error)
            }
        }
    }
}
