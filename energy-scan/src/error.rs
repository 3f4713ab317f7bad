//! Top level error module for the crate

use energy_config::ConfigError;

/// Top level error enum for everything that can stop a scan from producing a report.
///
/// Per-item store failures never appear here, see [`crate::scan::error::ScanEvent`].
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Configuration was rejected before any store was read.
    #[error("Invalid configuration. {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// No start height was configured and the chain head could not be read.
    #[error("Chain head unavailable. {0}")]
    HeadUnavailable(String),
    /// The report could not be written to its sink.
    #[error("Report error. {0}")]
    Report(#[from] std::io::Error),
    /// The background worker panicked or was aborted.
    #[error("Scan task failed. {0}")]
    TaskFailed(String),
}
