use std::fmt::Display;

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QualityMode {
    Vbr,
    Cbr,
}

impl QualityMode {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "vbr" => Ok(QualityMode::Vbr),
            "cbr" => Ok(QualityMode::Cbr),
            _ => Err(ConfigError::new(&format!(
                "unknown quality mode '{}', expected one of [vbr, cbr]",
                s
            ))),
        }
    }
}

impl Display for QualityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityMode::Vbr => write!(f, "vbr"),
            QualityMode::Cbr => write!(f, "cbr"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QualityLevel {
    High,
    Mid,
    Low,
}

impl QualityLevel {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "high" => Ok(QualityLevel::High),
            "mid" => Ok(QualityLevel::Mid),
            "low" => Ok(QualityLevel::Low),
            _ => Err(ConfigError::new(&format!(
                "unknown quality level '{}', expected one of [high, mid, low]",
                s
            ))),
        }
    }
}

impl Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityLevel::High => write!(f, "high"),
            QualityLevel::Mid => write!(f, "mid"),
            QualityLevel::Low => write!(f, "low"),
        }
    }
}

/// Validated (mode, level) pair. Built once at startup, before any task is
/// scheduled; tasks never re-validate it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityConfig {
    pub mode: QualityMode,
    pub level: QualityLevel,
}

impl QualityConfig {
    pub fn from_args(mode: &str, level: &str) -> Result<Self, ConfigError> {
        Ok(QualityConfig {
            mode: QualityMode::from_str(mode)?,
            level: QualityLevel::from_str(level)?,
        })
    }

    /// libmp3lame -q:a level; lower means higher quality.
    pub fn vbr_level(&self) -> &'static str {
        match self.level {
            QualityLevel::High => "0",
            QualityLevel::Mid => "2",
            QualityLevel::Low => "5",
        }
    }

    /// libmp3lame -b:a target bitrate.
    pub fn cbr_bitrate(&self) -> &'static str {
        match self.level {
            QualityLevel::High => "320k",
            QualityLevel::Mid => "192k",
            QualityLevel::Low => "128k",
        }
    }
}
