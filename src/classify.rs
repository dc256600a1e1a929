//! Failure classification for external tool diagnostics.
//!
//! The remote platform reports everything through stderr text, so the
//! classifier is an explicit substring table over the lowercased message.
//! It decides whether a failure is retryable, permanent for the item, or
//! fatal for the whole run, and is tested without any network.

/// Classified failure of an external fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429 class. Transient, retried with backoff.
    RateLimited,
    /// The calling address itself is denied. Fatal for the whole run.
    IpBlocked,
    /// Members-only, private, removed, or sign-in gated. Never retried.
    LockedOrPrivate,
    /// Required runtime tool absent (ffmpeg/ffprobe). Permanent until the
    /// environment is fixed.
    MissingDependency,
    /// Anything else; logged verbatim, item skipped.
    Other,
}

const RATE_LIMITED_MARKERS: &[&str] = &["http error 429", "too many requests"];

const IP_BLOCKED_MARKERS: &[&str] = &[
    "all player responses are invalid",
    "your ip",
    "blocked it from this app",
    "confirm you're not a bot",
    "confirm you\u{2019}re not a bot",
];

const LOCKED_MARKERS: &[&str] = &[
    "members-only",
    "this video is available to this channel's members",
    "private video",
    "unavailable",
    "has been removed",
    "sign in to confirm",
    "join this channel to get access",
];

const MISSING_DEPENDENCY_MARKERS: &[&str] = &[
    "ffprobe and ffmpeg not found",
    "ffmpeg not found",
    "ffprobe not found",
];

/// Classify a tool's stderr text.
///
/// Precedence matters: "sign in to confirm you're not a bot" is an IP-level
/// block even though "sign in to confirm" alone marks gated content.
pub fn classify_stderr(stderr: &str) -> FailureKind {
    let s = stderr.to_lowercase();

    if IP_BLOCKED_MARKERS.iter().any(|m| s.contains(m)) {
        FailureKind::IpBlocked
    } else if RATE_LIMITED_MARKERS.iter().any(|m| s.contains(m)) {
        FailureKind::RateLimited
    } else if LOCKED_MARKERS.iter().any(|m| s.contains(m)) {
        FailureKind::LockedOrPrivate
    } else if MISSING_DEPENDENCY_MARKERS.iter().any(|m| s.contains(m)) {
        FailureKind::MissingDependency
    } else {
        FailureKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_429_is_rate_limited() {
        assert_eq!(
            classify_stderr("ERROR: unable to download: HTTP Error 429: Too Many Requests"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_stderr("too many requests, slow down"),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn test_members_only_is_locked() {
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: This video is members-only content"),
            FailureKind::LockedOrPrivate
        );
        assert_eq!(
            classify_stderr("ERROR: Private video. Sign in if you've been granted access"),
            FailureKind::LockedOrPrivate
        );
        assert_eq!(
            classify_stderr("ERROR: This video has been removed by the uploader"),
            FailureKind::LockedOrPrivate
        );
    }

    #[test]
    fn test_bot_check_is_ip_blocked_despite_sign_in_phrase() {
        assert_eq!(
            classify_stderr("ERROR: Sign in to confirm you're not a bot"),
            FailureKind::IpBlocked
        );
    }

    #[test]
    fn test_age_gate_sign_in_stays_locked() {
        assert_eq!(
            classify_stderr("ERROR: Sign in to confirm your age"),
            FailureKind::LockedOrPrivate
        );
    }

    #[test]
    fn test_ip_block_markers() {
        assert_eq!(
            classify_stderr("ERROR: All player responses are invalid"),
            FailureKind::IpBlocked
        );
        assert_eq!(
            classify_stderr("YouTube said: Your IP has been temporarily blocked"),
            FailureKind::IpBlocked
        );
    }

    #[test]
    fn test_missing_ffmpeg() {
        assert_eq!(
            classify_stderr("ERROR: ffprobe and ffmpeg not found; please install"),
            FailureKind::MissingDependency
        );
    }

    #[test]
    fn test_unrelated_text_is_other() {
        assert_eq!(
            classify_stderr("ERROR: connection reset by peer"),
            FailureKind::Other
        );
        assert_eq!(classify_stderr(""), FailureKind::Other);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(
            classify_stderr("HTTP ERROR 429"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_stderr("MEMBERS-ONLY content"),
            FailureKind::LockedOrPrivate
        );
    }
}
