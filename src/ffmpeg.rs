use std::process::Command;
pub mod extractor;
pub mod probe;
pub mod progress;

pub struct FFmpeg {
}

impl FFmpeg {
    pub fn new() -> Self {
        FFmpeg {  }
    }

    /// Both the transcoder and the inspection tool must be present.
    pub fn is_installed(&self) -> bool {
        runs_ok("ffmpeg") && runs_ok("ffprobe")
    }
}

fn runs_ok(program: &str) -> bool {
    let cmd = Command::new(program)
        .arg("-version")
        .output();
    match cmd {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
