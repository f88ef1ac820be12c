use std::path::PathBuf;

/// One input video to one output mp3. Owned by the worker executing it;
/// the output path is tracked in the TaskRegistry while the transcode runs.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionTask {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ConversionTask {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        ConversionTask { input, output }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success,
    Skipped(String),
    Failure(String),
    Cancelled,
}
