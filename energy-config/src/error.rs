//! Errors raised while building a scan configuration

use std::path::PathBuf;

/// Rejected configuration. Always raised before the scan touches either store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric setting was given a negative value.
    #[error("{field} must not be negative, received {value}")]
    Negative { field: &'static str, value: i64 },
    /// `progress_interval` of zero would never report.
    #[error("progress interval must be at least 1, received {0}")]
    ZeroProgressInterval(u64),
    /// `top_k` larger than the selector is allowed to hold.
    #[error("top-k of {requested} exceeds the maximum of {max}")]
    TopKTooLarge { requested: u64, max: usize },
    /// Output sink name could not be recognised.
    #[error("unknown output sink \"{0}\", expected one of console, log or file")]
    UnknownOutputSink(String),
    /// A file sink was selected without a destination.
    #[error("output sink \"file\" requires an output path")]
    MissingOutputPath,
    /// An output path was given for a sink that does not write to a file.
    #[error("output sink \"{0}\" does not take an output path")]
    UnexpectedOutputPath(String),
    /// No directory could be determined for log files.
    #[error("couldn't determine a log directory")]
    NoLogDirectory,
    /// Log directory exists but could not be created or written.
    #[error("couldn't create log directory {path:?}: {reason}")]
    LogDirectory { path: PathBuf, reason: String },
    /// log4rs rejected the logging configuration.
    #[error("logging configuration error. {0}")]
    Logging(String),
}
