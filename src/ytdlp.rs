//! Thin invocation layer over the yt-dlp binary.
//!
//! Commands are assembled declaratively and executed with captured output,
//! because every caller needs the raw stderr text for failure classification.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::AudioConfig;
use crate::error::Result;

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// One assembled yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    binary_path: String,
    args: Vec<String>,
    description: String,
}

impl YtDlpCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Skip the media download itself (caption-only operations).
    pub fn skip_download(self) -> Self {
        self.arg("--skip-download")
    }

    /// Output template for files the tool writes.
    pub fn output_template<S: Into<String>>(self, template: S) -> Self {
        self.arg("-o").arg(template)
    }

    /// Target URL, always the final argument.
    pub fn url<S: Into<String>>(self, url: S) -> Self {
        self.arg(url)
    }

    /// Execute and capture stdout/stderr for classification.
    pub async fn run(&self) -> Result<ToolOutput> {
        debug!(
            "Running {} ({}): {:?}",
            self.binary_path, self.description, self.args
        );

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Builder for the pipeline's yt-dlp operations.
pub struct YtDlpCommandBuilder {
    binary_path: String,
}

impl YtDlpCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Enumerate video ids of a channel without downloading anything.
    pub fn list_channel(&self, channel_url: &str) -> YtDlpCommand {
        YtDlpCommand::new(&self.binary_path, "Channel listing")
            .arg("--flat-playlist")
            .args(["--sleep-interval", "1"])
            .args(["--max-sleep-interval", "3"])
            .args(["--retries", "5"])
            .args(["--print", "%(id)s"])
            .url(channel_url)
    }

    /// List the available caption tracks for one video.
    pub fn list_subtitles(&self, url: &str) -> YtDlpCommand {
        YtDlpCommand::new(&self.binary_path, "Caption track listing")
            .arg("--list-subs")
            .skip_download()
            .url(url)
    }

    /// Download caption tracks (manual and auto-generated) in VTT form.
    pub fn download_subtitles(
        &self,
        url: &str,
        languages: &[String],
        output_template: &str,
    ) -> YtDlpCommand {
        YtDlpCommand::new(&self.binary_path, "Caption download")
            .skip_download()
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .args(["--sub-langs", &languages.join(",")])
            .args(["--sub-format", "vtt"])
            .output_template(output_template)
            .url(url)
    }

    /// Download the audio track as mp3 with the tool's own rate-limited,
    /// randomized-interval, bounded-retry configuration.
    pub fn download_audio(
        &self,
        url: &str,
        config: &AudioConfig,
        output_template: &str,
    ) -> YtDlpCommand {
        YtDlpCommand::new(&self.binary_path, "Audio download")
            .args(["--sleep-interval", &config.sleep_interval_secs.to_string()])
            .args([
                "--max-sleep-interval",
                &config.max_sleep_interval_secs.to_string(),
            ])
            .args(["--retries", &config.retries.to_string()])
            .args(["--fragment-retries", &config.fragment_retries.to_string()])
            .args(["--retry-sleep", &config.retry_sleep])
            .args(["--limit-rate", &config.limit_rate])
            .arg("-x")
            .args(["--audio-format", "mp3"])
            .output_template(output_template)
            .url(url)
    }

    /// Build version check command.
    pub fn version_check(&self) -> YtDlpCommand {
        YtDlpCommand::new(&self.binary_path, "Version check").arg("--version")
    }

    /// Check that the binary is present and runnable.
    pub async fn check_availability(&self) -> bool {
        matches!(self.version_check().run().await, Ok(out) if out.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_command_carries_tool_retry_flags() {
        let builder = YtDlpCommandBuilder::new("yt-dlp");
        let config = crate::config::Config::default().audio;
        let cmd = builder.download_audio("https://example/watch?v=x", &config, "audio/%(id)s.%(ext)s");

        let rendered = cmd.args.join(" ");
        assert!(rendered.contains("--limit-rate 750K"));
        assert!(rendered.contains("--fragment-retries 5"));
        assert!(rendered.contains("-x --audio-format mp3"));
        assert_eq!(cmd.args.last().unwrap(), "https://example/watch?v=x");
    }

    #[test]
    fn test_subtitle_command_joins_language_preferences() {
        let builder = YtDlpCommandBuilder::new("yt-dlp");
        let langs = vec!["sr-Latn".to_string(), "sr".to_string()];
        let cmd = builder.download_subtitles("url", &langs, "t/%(id)s.%(ext)s");

        let rendered = cmd.args.join(" ");
        assert!(rendered.contains("--sub-langs sr-Latn,sr"));
        assert!(rendered.contains("--skip-download"));
        assert!(rendered.contains("--write-auto-subs"));
    }
}
