//! Traffic shaping for the remote source.
//!
//! Two mechanisms: randomized politeness pauses between external calls, and
//! exponential backoff with jitter for rate-limit retries. Both live on an
//! explicit object owned by the pipeline rather than in process-wide state.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::config::PacingConfig;

/// Randomized inter-call delays that keep request cadence below the remote
/// source's abuse thresholds. This is a correctness control, not tuning.
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Pause before moving to the next video's network calls.
    pub async fn pause_between_videos(&self) {
        self.pause_range(
            self.config.between_videos_min_secs,
            self.config.between_videos_max_secs,
        )
        .await;
    }

    /// Pause before starting an audio download attempt.
    pub async fn pause_before_audio(&self) {
        self.pause_range(
            self.config.before_audio_min_secs,
            self.config.before_audio_max_secs,
        )
        .await;
    }

    async fn pause_range(&self, min_secs: f64, max_secs: f64) {
        let duration = draw_uniform(min_secs, max_secs);
        debug!("Politeness pause: {:.1}s", duration.as_secs_f64());
        sleep(duration).await;
    }
}

fn draw_uniform(min_secs: f64, max_secs: f64) -> Duration {
    let max_secs = max_secs.max(min_secs);
    let secs = if max_secs > min_secs {
        rand::thread_rng().gen_range(min_secs..=max_secs)
    } else {
        min_secs
    };
    Duration::from_secs_f64(secs)
}

/// Bounded exponential backoff for transient rate-limit failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub base_secs: u64,
    pub cap_secs: u64,
    pub max_attempts: u32,
    pub jitter_max_secs: u64,
}

impl Backoff {
    /// Uncapped-attempt delay for a 1-based attempt number, before jitter.
    pub fn raw_delay_secs(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt);
        self.cap_secs.min(factor.saturating_mul(self.base_secs))
    }

    /// Full delay including random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_max_secs > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_max_secs)
        } else {
            0
        };
        Duration::from_secs(self.raw_delay_secs(attempt) + jitter)
    }

    /// Wait out one rate-limit attempt.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        debug!(
            "Rate-limit backoff: attempt {}/{}, waiting {}s",
            attempt,
            self.max_attempts,
            delay.as_secs()
        );
        sleep(delay).await;
    }
}
