//! On-disk content store keyed by video identifier.
//!
//! Layout under the configured root:
//!   audio/<id>.mp3             one immutable audio asset per id
//!   transcripts/<id>.json      one immutable transcript record per id
//!   transcripts/<id>.list-subs.txt      diagnostic, never read back
//!   transcripts/<id>.captions-error.txt diagnostic, never read back
//!
//! The existence check immediately before any write is the pipeline's sole
//! concurrency-safety mechanism; it is sufficient only single-process.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, TubeError};
use crate::transcript::{StoredTranscript, TranscriptRecord, VideoId};

pub struct ContentStore {
    audio_dir: PathBuf,
    transcripts_dir: PathBuf,
}

impl ContentStore {
    /// Open the store, creating the directory layout if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let audio_dir = root.join("audio");
        let transcripts_dir = root.join("transcripts");

        std::fs::create_dir_all(&audio_dir)
            .map_err(|e| TubeError::Store(format!("Failed to create audio dir: {}", e)))?;
        std::fs::create_dir_all(&transcripts_dir)
            .map_err(|e| TubeError::Store(format!("Failed to create transcripts dir: {}", e)))?;

        Ok(Self {
            audio_dir,
            transcripts_dir,
        })
    }

    pub fn audio_path(&self, id: &VideoId) -> PathBuf {
        self.audio_dir.join(format!("{}.mp3", id))
    }

    pub fn transcript_path(&self, id: &VideoId) -> PathBuf {
        self.transcripts_dir.join(format!("{}.json", id))
    }

    /// Output template handed to the audio download tool.
    pub fn audio_output_template(&self) -> String {
        self.audio_dir.join("%(id)s.%(ext)s").to_string_lossy().to_string()
    }

    /// Output template handed to the caption download tool.
    pub fn subtitle_output_template(&self) -> String {
        self.transcripts_dir
            .join("%(id)s.%(ext)s")
            .to_string_lossy()
            .to_string()
    }

    pub fn audio_exists(&self, id: &VideoId) -> bool {
        self.audio_path(id).exists()
    }

    pub fn transcript_exists(&self, id: &VideoId) -> bool {
        self.transcript_path(id).exists()
    }

    /// Load a record, accepting both the wrapped and the legacy bare-array
    /// shapes and normalizing to the canonical record.
    pub async fn load_transcript(&self, id: &VideoId) -> Result<Option<TranscriptRecord>> {
        let path = self.transcript_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let stored: StoredTranscript = serde_json::from_str(&content)
            .map_err(|e| TubeError::Store(format!("Corrupt transcript {}: {}", path.display(), e)))?;

        Ok(Some(stored.into_record(id)))
    }

    /// Persist a record unless one already exists. An existing record is
    /// authoritative cached work and is returned unchanged.
    pub async fn save_transcript(&self, record: TranscriptRecord) -> Result<TranscriptRecord> {
        if let Some(existing) = self.load_transcript(&record.video_id).await? {
            warn!(
                "Transcript already exists for {}, keeping the existing record",
                record.video_id
            );
            return Ok(existing);
        }

        let path = self.transcript_path(&record.video_id);
        let content = serde_json::to_string_pretty(&record)?;
        fs::write(&path, content).await?;
        debug!("Transcript saved: {}", path.display());

        Ok(record)
    }

    /// Write the caption track listing verbatim for operator inspection.
    pub async fn write_subs_listing(&self, id: &VideoId, stdout: &str, stderr: &str) -> Result<()> {
        let path = self.transcripts_dir.join(format!("{}.list-subs.txt", id));
        fs::write(&path, format!("{}\n\nSTDERR:\n{}", stdout, stderr)).await?;
        Ok(())
    }

    /// Preserve a failed caption download's full diagnostics verbatim.
    pub async fn write_captions_error(
        &self,
        id: &VideoId,
        stdout: &str,
        stderr: &str,
    ) -> Result<()> {
        let path = self.transcripts_dir.join(format!("{}.captions-error.txt", id));
        let content = format!(
            "# {}\n{}\n\nSTDERR:\n{}",
            Utc::now().to_rfc3339(),
            stdout,
            stderr
        );
        fs::write(&path, content).await?;
        Ok(())
    }

    /// Downloaded subtitle tracks for one id, sorted by file name.
    pub async fn vtt_candidates(&self, id: &VideoId) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}.", id);
        let mut candidates = Vec::new();

        let mut entries = fs::read_dir(&self.transcripts_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".vtt") {
                candidates.push(entry.path());
            }
        }

        candidates.sort();
        Ok(candidates)
    }

    /// Delete transient subtitle files after conversion; best effort.
    pub async fn remove_vtt_artifacts(&self, id: &VideoId) -> Result<()> {
        for path in self.vtt_candidates(id).await? {
            if let Err(e) = fs::remove_file(&path).await {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{TranscriptSegment, TranscriptSource};

    fn segment(start: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            duration: 1.0,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let id = VideoId::new("vid1");

        let record =
            TranscriptRecord::from_captions(id.clone(), Some("sr".to_string()), vec![segment(0.0, "a")]);
        store.save_transcript(record.clone()).await.unwrap();

        assert!(store.transcript_exists(&id));
        let loaded = store.load_transcript(&id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_save_never_overwrites_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let id = VideoId::new("vid1");

        let first =
            TranscriptRecord::from_captions(id.clone(), Some("sr".to_string()), vec![segment(0.0, "first")]);
        store.save_transcript(first.clone()).await.unwrap();

        let second = TranscriptRecord::from_whisper(
            id.clone(),
            "medium".to_string(),
            "sr".to_string(),
            "second".to_string(),
            vec![segment(0.0, "second")],
        );
        let kept = store.save_transcript(second).await.unwrap();

        assert_eq!(kept.text, "first");
        assert_eq!(kept.source, TranscriptSource::Captions);
        let loaded = store.load_transcript(&id).await.unwrap().unwrap();
        assert_eq!(loaded.text, "first");
    }

    #[tokio::test]
    async fn test_load_accepts_legacy_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let id = VideoId::new("legacy1");

        let legacy = r#"[{"start": 1.0, "duration": 2.0, "text": "stari zapis"}]"#;
        std::fs::write(store.transcript_path(&id), legacy).unwrap();

        let loaded = store.load_transcript(&id).await.unwrap().unwrap();
        assert_eq!(loaded.source, TranscriptSource::Captions);
        assert_eq!(loaded.segments.len(), 1);
        assert_eq!(loaded.text, "stari zapis");
    }

    #[tokio::test]
    async fn test_vtt_artifacts_scoped_to_one_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        let id = VideoId::new("vid1");
        let other = VideoId::new("vid2");

        let tdir = dir.path().join("transcripts");
        std::fs::write(tdir.join("vid1.sr-Latn.vtt"), "WEBVTT").unwrap();
        std::fs::write(tdir.join("vid1.hr.vtt"), "WEBVTT").unwrap();
        std::fs::write(tdir.join("vid2.sr.vtt"), "WEBVTT").unwrap();

        let candidates = store.vtt_candidates(&id).await.unwrap();
        assert_eq!(candidates.len(), 2);

        store.remove_vtt_artifacts(&id).await.unwrap();
        assert!(store.vtt_candidates(&id).await.unwrap().is_empty());
        assert_eq!(store.vtt_candidates(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_transcript_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        assert!(store
            .load_transcript(&VideoId::new("absent"))
            .await
            .unwrap()
            .is_none());
    }
}
