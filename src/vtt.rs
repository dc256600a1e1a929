//! Minimal WebVTT parsing for caption tracks downloaded by yt-dlp.
//!
//! Only what the ingestion pipeline needs: cue timing lines and cue text,
//! normalized into playback-ordered segments.

use crate::error::{Result, TubeError};
use crate::transcript::TranscriptSegment;

/// Parse a `HH:MM:SS.mmm` or `MM:SS.mmm` timestamp into seconds.
///
/// A comma millisecond separator (SRT style) is accepted and treated as a dot.
pub fn parse_timestamp(ts: &str) -> Result<f64> {
    let normalized = ts.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => {
            return Err(TubeError::Captions(format!(
                "unparseable cue timestamp: {}",
                ts
            )))
        }
    };

    let hours: u64 = hours
        .parse()
        .map_err(|_| TubeError::Captions(format!("unparseable cue timestamp: {}", ts)))?;
    let minutes: u64 = minutes
        .parse()
        .map_err(|_| TubeError::Captions(format!("unparseable cue timestamp: {}", ts)))?;
    let seconds: f64 = seconds
        .parse()
        .map_err(|_| TubeError::Captions(format!("unparseable cue timestamp: {}", ts)))?;

    Ok((hours * 3600 + minutes * 60) as f64 + seconds)
}

/// Split a cue timing line (`start --> end [settings]`) into its timestamps.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start_part, end_part) = line.split_once("-->")?;
    // Cue settings (position, alignment) may trail the end timestamp.
    let end_token = end_part.trim().split_whitespace().next()?;

    let start = parse_timestamp(start_part).ok()?;
    let end = parse_timestamp(end_token).ok()?;
    Some((start, end))
}

/// Parse VTT text into segments, preserving source cue order.
///
/// Multi-line cue text joins with a single space; `WEBVTT`/`NOTE` headers
/// and cues that are empty after stripping are dropped.
pub fn parse_vtt(vtt_text: &str) -> Vec<TranscriptSegment> {
    let lines: Vec<&str> = vtt_text
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .collect();

    let mut segments = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some((start, end)) = parse_timing_line(lines[i]) else {
            i += 1;
            continue;
        };
        i += 1;

        let mut text_lines = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() && parse_timing_line(lines[i]).is_none()
        {
            let line = lines[i].trim();
            if !line.starts_with("NOTE") && !line.starts_with("WEBVTT") {
                text_lines.push(line);
            }
            i += 1;
        }

        let text = text_lines.join(" ").trim().to_string();
        if !text.is_empty() {
            segments.push(TranscriptSegment {
                start,
                duration: (end - start).max(0.0),
                text,
            });
        }

        i += 1;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_three_fields() {
        assert_eq!(parse_timestamp("00:01:02.500").unwrap(), 62.5);
        assert_eq!(parse_timestamp("01:00:01.000").unwrap(), 3601.0);
    }

    #[test]
    fn test_parse_timestamp_two_fields_matches_three() {
        assert_eq!(
            parse_timestamp("01:02.500").unwrap(),
            parse_timestamp("00:01:02.500").unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_comma_separator() {
        assert_eq!(parse_timestamp("00:00:05,250").unwrap(), 5.25);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
        assert!(parse_timestamp("1:2:3:4.000").is_err());
    }

    #[test]
    fn test_parse_vtt_basic_cues() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nzdravo\n\n00:00:03.000 --> 00:00:06.500\nsvima dobrodosli\n";
        let segments = parse_vtt(vtt);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[0].text, "zdravo");
        assert_eq!(segments[1].start, 3.0);
        assert_eq!(segments[1].duration, 3.5);
    }

    #[test]
    fn test_parse_vtt_multiline_cue_joins_with_space() {
        let vtt = "WEBVTT\n\n00:00.000 --> 00:02.000\nprvi red\ndrugi red\n";
        let segments = parse_vtt(vtt);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "prvi red drugi red");
    }

    #[test]
    fn test_parse_vtt_drops_empty_cues_and_headers() {
        let vtt = "WEBVTT\n\nNOTE generated\n\n00:00.000 --> 00:01.000\nNOTE inline header\n\n00:01.000 --> 00:02.000\nstvaran tekst\n";
        let segments = parse_vtt(vtt);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "stvaran tekst");
    }

    #[test]
    fn test_parse_vtt_preserves_cue_order() {
        let vtt = "00:00:10.000 --> 00:00:12.000\nkasnije\n\n00:00:01.000 --> 00:00:02.000\nranije\n";
        let segments = parse_vtt(vtt);

        // Source cue order is playback order; the parser does not reorder.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "kasnije");
        assert_eq!(segments[1].text, "ranije");
    }

    #[test]
    fn test_parse_vtt_cue_settings_after_end_timestamp() {
        let vtt = "00:00:01.000 --> 00:00:02.000 align:start position:0%\ntekst\n";
        let segments = parse_vtt(vtt);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration, 1.0);
    }

    #[test]
    fn test_parse_vtt_strips_bom() {
        let vtt = "\u{feff}WEBVTT\n\n00:00.000 --> 00:01.000\ntekst\n";
        assert_eq!(parse_vtt(vtt).len(), 1);
    }

    #[test]
    fn test_negative_duration_clamped() {
        let vtt = "00:00:05.000 --> 00:00:04.000\ntekst\n";
        let segments = parse_vtt(vtt);
        assert_eq!(segments[0].duration, 0.0);
    }
}
