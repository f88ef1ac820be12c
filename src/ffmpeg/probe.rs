use std::path::Path;
use std::process::Command;
use serde::{Deserialize, Serialize};
use serde_json;

use crate::error::ProbeError;

/// Source audio encoding parameters, known only for containers that carry
/// variable audio settings (webm). Absence disables the preserve-source
/// optimization, nothing else.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioStreamInfo {
    pub bit_rate: Option<u64>,
    pub sample_rate: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct ProbeResult {
    pub duration_seconds: f64,
    pub audio: AudioStreamInfo,
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonOutput {
    #[serde(default)]
    pub streams: Vec<FFProbeJsonStream>,
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonStream {
    pub bit_rate: Option<String>,
    pub sample_rate: Option<String>,
}

/// Probes duration, and for webm inputs the first audio stream's encoding
/// parameters. An unknown duration is an error; unknown audio parameters
/// are not.
pub fn probe_file(path: &Path) -> Result<ProbeResult, ProbeError> {
    let duration_seconds = probe_duration(path)?;
    let audio = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("webm") => probe_audio_stream(path),
        _ => AudioStreamInfo::default(),
    };
    Ok(ProbeResult {
        duration_seconds,
        audio,
    })
}

pub fn probe_duration(path: &Path) -> Result<f64, ProbeError> {
    let output = Command::new("ffprobe")
        .arg("-i")
        .arg(path)
        .args([
            "-show_entries",
            "format=duration",
            "-v",
            "quiet",
            "-of",
            "csv=p=0",
        ])
        .output()
        .map_err(|err| ProbeError::for_file(path, &format!("unable to run ffprobe: {}", err)))?;
    if output.status.success() {
        let utf8 = String::from_utf8(output.stdout)
            .map_err(|_| ProbeError::for_file(path, "ffprobe output was not utf-8"))?;
        parse_duration_output(path, &utf8)
    } else {
        Err(ProbeError::for_file(path, "ffprobe did not exit successfully."))
    }
}

/// Best effort; any failure degrades to "unknown" rather than failing the
/// probe.
pub fn probe_audio_stream(path: &Path) -> AudioStreamInfo {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-of", "json", "-show_streams", "-select_streams", "a:0"])
        .arg(path)
        .output();
    match output {
        Ok(output) if output.status.success() => match String::from_utf8(output.stdout) {
            Ok(utf8) => parse_audio_streams(&utf8),
            Err(_) => AudioStreamInfo::default(),
        },
        _ => AudioStreamInfo::default(),
    }
}

fn parse_duration_output(path: &Path, stdout: &str) -> Result<f64, ProbeError> {
    let trimmed = stdout.trim();
    // "nan" and "inf" parse as f64 but are useless as a progress bound
    match trimmed.parse::<f64>() {
        Ok(duration) if duration.is_finite() && duration >= 0.0 => Ok(duration),
        _ => Err(ProbeError::for_file(
            path,
            &format!("unusable duration '{}' from ffprobe", trimmed),
        )),
    }
}

fn parse_audio_streams(json: &str) -> AudioStreamInfo {
    match serde_json::from_str::<FFProbeJsonOutput>(json) {
        Ok(deserialized) => match deserialized.streams.first() {
            Some(stream) => AudioStreamInfo {
                bit_rate: stream.bit_rate.as_ref().and_then(|s| s.parse().ok()),
                sample_rate: stream.sample_rate.as_ref().and_then(|s| s.parse().ok()),
            },
            None => AudioStreamInfo::default(),
        },
        Err(_) => AudioStreamInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_duration_output() {
        let path = PathBuf::from("in.mp4");
        assert_eq!(parse_duration_output(&path, "123.456\n").unwrap(), 123.456);
        assert_eq!(parse_duration_output(&path, "0.04\n").unwrap(), 0.04);
        assert!(parse_duration_output(&path, "N/A\n").is_err());
        assert!(parse_duration_output(&path, "").is_err());
    }

    #[test]
    fn test_parse_duration_output_rejects_unusable_values() {
        let path = PathBuf::from("in.mp4");
        assert!(parse_duration_output(&path, "nan\n").is_err());
        assert!(parse_duration_output(&path, "inf\n").is_err());
        assert!(parse_duration_output(&path, "-inf\n").is_err());
        assert!(parse_duration_output(&path, "-1.5\n").is_err());
        assert_eq!(parse_duration_output(&path, "0\n").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_audio_streams() {
        let json = r#"{"streams": [{"bit_rate": "128000", "sample_rate": "44100"}]}"#;
        assert_eq!(
            parse_audio_streams(json),
            AudioStreamInfo {
                bit_rate: Some(128000),
                sample_rate: Some(44100),
            }
        );
    }

    #[test]
    fn test_parse_audio_streams_degrades_to_unknown() {
        // no audio stream at all
        assert_eq!(parse_audio_streams(r#"{"streams": []}"#), AudioStreamInfo::default());
        // fields missing
        assert_eq!(
            parse_audio_streams(r#"{"streams": [{}]}"#),
            AudioStreamInfo::default()
        );
        // field present but not numeric
        assert_eq!(
            parse_audio_streams(r#"{"streams": [{"bit_rate": "N/A"}]}"#),
            AudioStreamInfo::default()
        );
        // not json at all
        assert_eq!(parse_audio_streams("oops"), AudioStreamInfo::default());
    }
}
