//! Caption acquisition: prefer a platform-hosted track over transcription.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::classify::{classify_stderr, FailureKind};
use crate::config::{CaptionsConfig, ToolsConfig};
use crate::error::Result;
use crate::pacing::Backoff;
use crate::store::ContentStore;
use crate::transcript::{TranscriptRecord, VideoId};
use crate::vtt;
use crate::ytdlp::YtDlpCommandBuilder;

/// Result of one caption fetch attempt, distinguishable by the orchestrator.
#[derive(Debug, Clone)]
pub enum CaptionOutcome {
    /// A new record was written.
    Saved(TranscriptRecord),
    /// A record already existed; no network call was made.
    Cached(TranscriptRecord),
    /// No caption track exists, or none matched the language policy.
    NoTranscript,
    /// Members-only / private / removed / gated. Not retried.
    LockedOrPrivate,
    /// Rate-limit retries exhausted.
    RateLimited,
    /// The calling address is denied; the whole run must stop.
    IpBlocked,
    /// Anything else, with the raw diagnostic preserved.
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    async fn fetch(&self, id: &VideoId) -> Result<CaptionOutcome>;
}

pub struct YtDlpCaptionFetcher {
    builder: YtDlpCommandBuilder,
    config: CaptionsConfig,
    backoff: Backoff,
    store: Arc<ContentStore>,
}

impl YtDlpCaptionFetcher {
    pub fn new(tools: &ToolsConfig, config: CaptionsConfig, store: Arc<ContentStore>) -> Self {
        let backoff = config.backoff();
        Self {
            builder: YtDlpCommandBuilder::new(&tools.ytdlp_path),
            config,
            backoff,
            store,
        }
    }

    /// Run the subtitle download, retrying rate-limited attempts with backoff.
    /// Returns `Ok(None)` when the download succeeded, `Ok(Some(outcome))`
    /// when a classified failure ends the attempt.
    async fn download_tracks(&self, id: &VideoId, url: &str) -> Result<Option<CaptionOutcome>> {
        let cmd = self.builder.download_subtitles(
            url,
            &self.config.languages,
            &self.store.subtitle_output_template(),
        );

        let mut attempt = 1u32;
        loop {
            let output = cmd.run().await?;
            if output.success {
                return Ok(None);
            }

            let stderr = output.stderr.trim().to_string();
            match classify_stderr(&stderr) {
                FailureKind::IpBlocked => {
                    warn!("IP-block signal while fetching captions for {}", id);
                    return Ok(Some(CaptionOutcome::IpBlocked));
                }
                FailureKind::LockedOrPrivate => {
                    info!("Locked/private video, no captions for {}", id);
                    return Ok(Some(CaptionOutcome::LockedOrPrivate));
                }
                FailureKind::RateLimited if attempt <= self.backoff.max_attempts => {
                    info!(
                        "Rate limited fetching captions for {} (attempt {}/{})",
                        id, attempt, self.backoff.max_attempts
                    );
                    self.backoff.wait(attempt).await;
                    attempt += 1;
                }
                FailureKind::RateLimited => {
                    warn!("Rate-limit retries exhausted for {}", id);
                    return Ok(Some(CaptionOutcome::RateLimited));
                }
                FailureKind::MissingDependency | FailureKind::Other => {
                    self.store
                        .write_captions_error(id, &output.stdout, &output.stderr)
                        .await?;
                    warn!("Caption download failed for {}: {}", id, stderr);
                    return Ok(Some(CaptionOutcome::Failed(stderr)));
                }
            }
        }
    }

    /// Pick a downloaded track by the fixed language preference order.
    fn choose_track<'a>(&self, candidates: &'a [std::path::PathBuf]) -> Option<&'a Path> {
        for lang in &self.config.languages {
            let marker = format!(".{}.vtt", lang);
            if let Some(path) = candidates
                .iter()
                .find(|p| p.to_string_lossy().ends_with(&marker))
            {
                return Some(path.as_path());
            }
        }

        if self.config.strict_language {
            None
        } else {
            candidates.first().map(|p| p.as_path())
        }
    }
}

/// Language tag embedded in a `<id>.<lang>.vtt` file name.
fn track_language(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let stem = name.strip_suffix(".vtt")?;
    let (_, lang) = stem.rsplit_once('.')?;
    Some(lang.to_string())
}

#[async_trait]
impl CaptionFetcher for YtDlpCaptionFetcher {
    async fn fetch(&self, id: &VideoId) -> Result<CaptionOutcome> {
        if let Some(record) = self.store.load_transcript(id).await? {
            debug!("Transcript already exists for {}", id);
            return Ok(CaptionOutcome::Cached(record));
        }

        let url = id.watch_url();

        // Track listing is diagnostic only; the outcome is decided by the
        // download itself.
        let listing = self.builder.list_subtitles(&url).run().await?;
        self.store
            .write_subs_listing(id, &listing.stdout, &listing.stderr)
            .await?;

        if let Some(outcome) = self.download_tracks(id, &url).await? {
            return Ok(outcome);
        }

        let candidates = self.store.vtt_candidates(id).await?;
        if candidates.is_empty() {
            info!("No caption tracks downloaded for {}", id);
            return Ok(CaptionOutcome::NoTranscript);
        }

        let Some(chosen) = self.choose_track(&candidates) else {
            info!(
                "Caption tracks for {} do not match the language policy",
                id
            );
            self.store.remove_vtt_artifacts(id).await?;
            return Ok(CaptionOutcome::NoTranscript);
        };

        let language = track_language(chosen);
        let vtt_text = fs::read_to_string(chosen).await?;
        let segments = vtt::parse_vtt(&vtt_text);

        if segments.is_empty() {
            // An empty track is "no transcript", never a valid cached record.
            warn!("Caption track for {} parsed to zero segments", id);
            self.store.remove_vtt_artifacts(id).await?;
            return Ok(CaptionOutcome::NoTranscript);
        }

        let record = TranscriptRecord::from_captions(id.clone(), language, segments);
        let saved = self.store.save_transcript(record).await?;
        self.store.remove_vtt_artifacts(id).await?;

        info!(
            "Captions saved for {} ({} segments)",
            id,
            saved.segments.len()
        );
        Ok(CaptionOutcome::Saved(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fetcher(strict: bool) -> (YtDlpCaptionFetcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::new(dir.path()).unwrap());
        let tools = crate::config::Config::default().tools;
        let mut config = crate::config::Config::default().captions;
        config.strict_language = strict;
        (YtDlpCaptionFetcher::new(&tools, config, store), dir)
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_choose_track_prefers_most_specific_language() {
        let (f, _dir) = fetcher(false);
        let candidates = paths(&["x.hr.vtt", "x.sr-Latn.vtt", "x.sr.vtt"]);
        let chosen = f.choose_track(&candidates).unwrap();
        assert!(chosen.to_string_lossy().ends_with(".sr-Latn.vtt"));
    }

    #[test]
    fn test_choose_track_falls_back_to_first_when_lenient() {
        let (f, _dir) = fetcher(false);
        let candidates = paths(&["x.de.vtt", "x.en.vtt"]);
        let chosen = f.choose_track(&candidates).unwrap();
        assert!(chosen.to_string_lossy().ends_with(".de.vtt"));
    }

    #[test]
    fn test_choose_track_strict_rejects_preference_miss() {
        let (f, _dir) = fetcher(true);
        let candidates = paths(&["x.de.vtt", "x.en.vtt"]);
        assert!(f.choose_track(&candidates).is_none());
    }

    /// Fake yt-dlp that always fails with a 429 on stderr and counts every
    /// subtitle download attempt in a side file.
    #[cfg(unix)]
    fn write_rate_limited_stub(dir: &Path, count_path: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script_path = dir.join("fake-yt-dlp.sh");
        let script = format!(
            "#!/bin/sh\ncase \"$*\" in *--write-subs*) echo x >> {};; esac\n\
             echo 'ERROR: HTTP Error 429: Too Many Requests' >&2\nexit 1\n",
            count_path.display()
        );
        std::fs::write(&script_path, script).unwrap();
        let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).unwrap();
        script_path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rate_limit_retries_bound_at_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::new(dir.path()).unwrap());
        let count_path = dir.path().join("downloads.count");
        let script_path = write_rate_limited_stub(dir.path(), &count_path);

        let mut tools = crate::config::Config::default().tools;
        tools.ytdlp_path = script_path.to_string_lossy().to_string();
        let mut config = crate::config::Config::default().captions;
        config.backoff_base_secs = 0;
        config.backoff_cap_secs = 0;
        config.backoff_jitter_max_secs = 0;
        config.backoff_max_attempts = 3;

        let f = YtDlpCaptionFetcher::new(&tools, config, store);
        let outcome = f.fetch(&VideoId::new("throttled1")).await.unwrap();
        assert!(matches!(outcome, CaptionOutcome::RateLimited));

        // Initial download plus exactly max_attempts retries, then give up.
        let attempts = std::fs::read_to_string(&count_path)
            .unwrap()
            .lines()
            .count();
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_without_tool_calls() {
        let (f, _dir) = fetcher(false);
        let id = VideoId::new("cached1");
        let record = TranscriptRecord::from_captions(
            id.clone(),
            Some("sr".to_string()),
            vec![crate::transcript::TranscriptSegment {
                start: 0.0,
                duration: 1.0,
                text: "tekst".to_string(),
            }],
        );
        f.store.save_transcript(record.clone()).await.unwrap();

        // The configured binary does not exist; a cache hit must not run it.
        let outcome = f.fetch(&id).await.unwrap();
        match outcome {
            CaptionOutcome::Cached(cached) => assert_eq!(cached, record),
            other => panic!("expected cached outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_track_language_from_file_name() {
        assert_eq!(
            track_language(Path::new("t/abc123.sr-Latn.vtt")).as_deref(),
            Some("sr-Latn")
        );
        assert_eq!(track_language(Path::new("t/abc123.vtt")), None);
    }
}
