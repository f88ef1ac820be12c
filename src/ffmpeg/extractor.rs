use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use human_repr::HumanCount;
use kdam::{term, tqdm, BarExt};
use log::warn;

use crate::ffmpeg::probe::{probe_file, AudioStreamInfo};
use crate::ffmpeg::progress::parse_progress;
use crate::quality::{QualityConfig, QualityMode};
use crate::registry::TaskRegistry;
use crate::task::{ConversionTask, Outcome};

const DESCRIPTION_WIDTH: usize = 40;

/// Runs one video-to-mp3 conversion as an ffmpeg subprocess, rendering a
/// progress bar sized to the probed duration from the stderr stats lines.
pub struct AudioExtractor {
    program: String,
    cancel: Arc<AtomicBool>,
    position: u16,
}

impl AudioExtractor {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        AudioExtractor {
            cancel,
            program: String::from("ffmpeg"),
            position: 0,
        }
    }

    /// Row this extractor's progress bar renders on; one per worker slot.
    pub fn position(mut self, position: u16) -> Self {
        self.position = position;
        self
    }

    pub fn program(mut self, program: &str) -> Self {
        self.program = String::from(program);
        self
    }

    /// Canonical order: existence-check, then probe, then transcode. The
    /// output path is registered for cleanup only around the transcode
    /// itself and deregistered on every exit path.
    pub fn extract(
        &self,
        task: &ConversionTask,
        quality: &QualityConfig,
        registry: &TaskRegistry,
    ) -> Outcome {
        if task.output.exists() {
            return Outcome::Skipped(String::from("target exists"));
        }
        if self.is_cancelled() {
            return Outcome::Cancelled;
        }

        let probe = match probe_file(&task.input) {
            Ok(probe) => probe,
            Err(err) => return Outcome::Failure(format!("duration unavailable: {}", err)),
        };

        let args = build_args(&task.input, &task.output, quality, &probe.audio);
        let _guard = registry.register(&task.output);
        self.run_transcode(task, &args, probe.duration_seconds)
    }

    fn run_transcode(&self, task: &ConversionTask, args: &[PathBuf], duration: f64) -> Outcome {
        let mut child = match Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return Outcome::Failure(format!(
                    "unable to launch {}: {}",
                    &self.program, err
                ));
            },
        };

        let cancelled = self.consume_stderr(child.stderr.take(), task, duration);
        if cancelled {
            if let Err(err) = child.kill() {
                warn!("error killing transcoder process ({}): {}", child.id(), err);
            }
            let _ = child.wait();
            remove_partial_output(&task.output);
            return Outcome::Cancelled;
        }

        match child.wait() {
            Ok(status) if status.success() => Outcome::Success,
            Ok(status) => {
                remove_partial_output(&task.output);
                match status.code() {
                    Some(code) => {
                        Outcome::Failure(format!("transcoder exited with status {}", code))
                    },
                    None => Outcome::Failure(String::from("transcoder was killed by a signal")),
                }
            },
            Err(err) => {
                remove_partial_output(&task.output);
                Outcome::Failure(format!("error waiting for transcoder: {}", err))
            },
        }
    }

    /// Pumps stderr through the progress parser until the stream closes.
    /// Returns true when the run was cancelled mid-stream.
    fn consume_stderr(
        &self,
        stderr: Option<ChildStderr>,
        task: &ConversionTask,
        duration: f64,
    ) -> bool {
        let Some(stderr) = stderr else {
            return self.is_cancelled();
        };

        term::init(false);
        let mut pbar = tqdm!(
            total = duration.ceil() as usize,
            desc = format!(
                "{} ({})",
                right_shorten(&task.input.display().to_string(), DESCRIPTION_WIDTH),
                get_file_size(&task.input).human_count_bytes()
            ),
            position = self.position,
            force_refresh = true
        );

        let stderr_reader = BufReader::new(stderr);
        for line in stderr_reader.lines() {
            let Ok(line) = line else { break };
            if let Some(elapsed) = parse_progress(&line) {
                let _ = pbar.update_to(elapsed.clamp(0.0, duration).round() as usize);
            }

            if self.is_cancelled() {
                return true;
            }
        }

        self.is_cancelled()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

fn build_args(
    input: &Path,
    output: &Path,
    quality: &QualityConfig,
    audio: &AudioStreamInfo,
) -> Vec<PathBuf> {
    let mut args = vec![
        PathBuf::from("-hide_banner"),
        PathBuf::from("-i"), PathBuf::from(input),
        PathBuf::from("-vn"),
        PathBuf::from("-c:a"), PathBuf::from("libmp3lame"),
    ];

    for arg in quality_args(quality, audio) {
        args.push(PathBuf::from(arg));
    }

    args.push(PathBuf::from(output));
    args
}

/// VBR encodes with -q:a; CBR with -b:a. CBR additionally preserves the
/// source bitrate and sample rate when the probe knows them, so webm audio
/// is not inflated to the configured target.
fn quality_args(quality: &QualityConfig, audio: &AudioStreamInfo) -> Vec<String> {
    match quality.mode {
        QualityMode::Vbr => vec![
            String::from("-q:a"), String::from(quality.vbr_level()),
        ],
        QualityMode::Cbr => {
            let mut args = vec![String::from("-b:a")];
            match audio.bit_rate {
                Some(bits_per_second) => args.push(format!("{}k", bits_per_second / 1000)),
                None => args.push(String::from(quality.cbr_bitrate())),
            }
            if let Some(sample_rate) = audio.sample_rate {
                args.push(String::from("-ar"));
                args.push(sample_rate.to_string());
            }
            args
        },
    }
}

fn remove_partial_output(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("unable to remove partial output {:?}: {}", path, err);
        }
    }
}

fn get_file_size(input: &Path) -> usize {
    match fs::metadata(input) {
        Ok(fi) => fi.len().try_into().unwrap_or(0),
        Err(_) => 0,
    }
}

fn right_shorten(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return String::from(text);
    }
    let tail = max_length.saturating_sub(3);
    let mut start = text.len() - tail;
    // advance to a char boundary
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
