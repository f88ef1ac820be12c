use std::error::Error;
use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ConfigError {
    msg: String,
}

impl ConfigError {
    pub fn new(msg: &str) -> Self {
        ConfigError {
            msg: String::from(msg),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", &self.msg)
    }
}

#[derive(Debug)]
pub struct ProbeError {
    path: PathBuf,
    msg: String,
}

impl ProbeError {
    pub fn for_file(path: &Path, msg: &str) -> Self {
        ProbeError {
            path: PathBuf::from(path),
            msg: String::from(msg),
        }
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error probing {:?}: {}", &self.path, &self.msg)
    }
}

#[derive(Debug)]
pub struct BatchError {
    path: PathBuf,
    msg: String,
}

impl BatchError {
    pub fn for_file(path: &Path, msg: &str) -> Self {
        BatchError {
            path: PathBuf::from(path),
            msg: String::from(msg),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error processing {:?}: {}", &self.path, &self.msg)
    }
}
