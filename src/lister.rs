use async_trait::async_trait;
use tracing::info;

use crate::config::ToolsConfig;
use crate::error::{Result, TubeError};
use crate::transcript::VideoId;
use crate::ytdlp::YtDlpCommandBuilder;

/// Enumerates the ordered video identifiers of a channel.
///
/// A listing failure is fatal for the run; with no identifiers there is
/// nothing to process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoLister: Send + Sync {
    async fn list(&self, channel_url: &str) -> Result<Vec<VideoId>>;
}

/// yt-dlp flat-playlist listing; the tool handles pagination internally.
pub struct YtDlpLister {
    builder: YtDlpCommandBuilder,
}

impl YtDlpLister {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            builder: YtDlpCommandBuilder::new(&tools.ytdlp_path),
        }
    }
}

#[async_trait]
impl VideoLister for YtDlpLister {
    async fn list(&self, channel_url: &str) -> Result<Vec<VideoId>> {
        info!("Listing videos for channel: {}", channel_url);

        let output = self.builder.list_channel(channel_url).run().await?;

        if !output.success {
            let stderr = output.stderr.trim();
            let detail = if stderr.is_empty() {
                "yt-dlp listing failed".to_string()
            } else {
                stderr.to_string()
            };
            return Err(TubeError::Listing(detail));
        }

        let ids: Vec<VideoId> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(VideoId::from)
            .collect();

        if ids.is_empty() {
            return Err(TubeError::Listing(
                "channel listing returned no video identifiers".to_string(),
            ));
        }

        info!("Found {} video identifiers", ids.len());
        Ok(ids)
    }
}
