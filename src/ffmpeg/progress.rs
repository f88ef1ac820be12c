use std::sync::OnceLock;

use regex::Regex;

static TIME_MARKER: OnceLock<Regex> = OnceLock::new();

/// Extracts the `time=HH:MM:SS.ffffff` marker ffmpeg prints on its stderr
/// stats lines, as total elapsed seconds. Lines without a marker, or with a
/// malformed one, yield None.
pub fn parse_progress(line: &str) -> Option<f64> {
    let re = TIME_MARKER
        .get_or_init(|| Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").unwrap());
    let captures = re.captures(line)?;
    let hours: f64 = captures[1].parse().ok()?;
    let minutes: f64 = captures[2].parse().ok()?;
    let seconds: f64 = captures[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
