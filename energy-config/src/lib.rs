#![forbid(unsafe_code)]
//! Configuration for the contract energy scan.
//!
//! Every value the background job used to hardcode lives here, together with the
//! logging setup for hosts that want scan logs in a rolling file.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};

pub mod error;

pub use error::ConfigError;

pub const DEFAULT_MAX_DEPTH: u64 = 10_000_000;
pub const DEFAULT_TOP_K: usize = 10_000;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;
/// Upper bound on `top_k`, keeps the retained set's memory bounded even when misconfigured.
pub const MAX_TOP_K: usize = 1 << 24;
pub const DEFAULT_LOGFILE_NAME: &str = "energy-scan.debug.log";
pub const DEFAULT_LOG_DIR_NAME: &str = ".energy-scan";

/// Where the final report lines are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputSink {
    /// Standard output.
    #[default]
    Console,
    /// `info` level log events.
    Log,
    /// A file, created or truncated when the report is written.
    File(PathBuf),
}

impl OutputSink {
    /// Builds a sink from its command line name and an optional path.
    ///
    /// A path is required by the file sink and rejected by every other sink.
    pub fn from_parts(kind: &str, path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let sink = match kind {
            "console" | "stdout" => OutputSink::Console,
            "log" => OutputSink::Log,
            "file" => return path.map(OutputSink::File).ok_or(ConfigError::MissingOutputPath),
            other => return Err(ConfigError::UnknownOutputSink(other.to_string())),
        };
        match path {
            Some(_) => Err(ConfigError::UnexpectedOutputPath(kind.to_string())),
            None => Ok(sink),
        }
    }
}

impl std::fmt::Display for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputSink::Console => write!(f, "console"),
            OutputSink::Log => write!(f, "log"),
            OutputSink::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Validated settings for one scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Height the scan counts back from. `None` means the chain head at scan start.
    pub start_height: Option<u64>,
    /// Maximum number of heights visited below `start_height`.
    pub max_depth: u64,
    /// Number of candidates retained.
    pub top_k: usize,
    /// A progress signal is emitted every `progress_interval` heights.
    pub progress_interval: u64,
    /// Stop the scan once it has been running this long.
    pub max_runtime: Option<Duration>,
    pub output: OutputSink,
    /// The directory where logfiles will be created. By default, this will be in ~/.energy-scan
    pub log_dir: Option<PathBuf>,
    /// The filename of the logfile. This will be created in the `log_dir`.
    pub logfile_name: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            start_height: None,
            max_depth: DEFAULT_MAX_DEPTH,
            top_k: DEFAULT_TOP_K,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_runtime: None,
            output: OutputSink::Console,
            log_dir: None,
            logfile_name: DEFAULT_LOGFILE_NAME.into(),
        }
    }
}

impl ScanConfig {
    /// Checks the invariants the scan relies on. Called again by the scan before any IO.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_interval == 0 {
            return Err(ConfigError::ZeroProgressInterval(self.progress_interval));
        }
        if self.top_k > MAX_TOP_K {
            return Err(ConfigError::TopKTooLarge {
                requested: self.top_k as u64,
                max: MAX_TOP_K,
            });
        }
        if let OutputSink::File(path) = &self.output {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingOutputPath);
            }
        }

        Ok(())
    }

    pub fn set_log_dir(&mut self, dir_str: String) {
        self.log_dir = Some(PathBuf::from(dir_str));
    }

    /// Returns the log directory, creating it if needed.
    pub fn get_log_dir(&self) -> Result<Box<Path>, ConfigError> {
        let log_dir = match &self.log_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut home = dirs::home_dir().ok_or(ConfigError::NoLogDirectory)?;
                home.push(DEFAULT_LOG_DIR_NAME);
                home
            }
        };

        std::fs::create_dir_all(&log_dir).map_err(|e| ConfigError::LogDirectory {
            path: log_dir.clone(),
            reason: e.to_string(),
        })?;

        Ok(log_dir.into_boxed_path())
    }

    pub fn get_log_path(&self) -> Result<Box<Path>, ConfigError> {
        let mut log_path = self.get_log_dir()?.into_path_buf();
        log_path.push(&self.logfile_name);

        Ok(log_path.into_boxed_path())
    }

    /// Build the Logging config
    pub fn get_log_config(&self) -> Result<Config, ConfigError> {
        let log_path = self.get_log_path()?;
        let window_size = 3; // log0, log1, log2
        let roll_pattern = format!("{}.{{}}", log_path.display());
        let fixed_window_roller = FixedWindowRoller::builder()
            .build(&roll_pattern, window_size)
            .map_err(|e| ConfigError::Logging(e.to_string()))?;
        let size_limit = 5 * 1024 * 1024; // 5MB as max log file size to roll
        let size_trigger = SizeTrigger::new(size_limit);
        let compound_policy =
            CompoundPolicy::new(Box::new(size_trigger), Box::new(fixed_window_roller));

        let logfile = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} {t}::{m}{n}")))
            .build(&log_path, Box::new(compound_policy))
            .map_err(|e| ConfigError::Logging(e.to_string()))?;

        Config::builder()
            .appender(
                Appender::builder()
                    .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                    .build("logfile", Box::new(logfile)),
            )
            .build(Root::builder().appender("logfile").build(LevelFilter::Debug))
            .map_err(|e| ConfigError::Logging(e.to_string()))
    }
}

/// Unvalidated settings as they arrive from a command line or a host process.
///
/// Numeric fields are signed so that a negative input is reported as
/// [`ConfigError::Negative`] instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawScanConfig {
    pub start_height: Option<i64>,
    pub max_depth: i64,
    pub top_k: i64,
    pub progress_interval: i64,
    pub max_runtime_secs: Option<i64>,
    pub output: OutputSink,
    pub log_dir: Option<PathBuf>,
}

impl Default for RawScanConfig {
    fn default() -> Self {
        RawScanConfig {
            start_height: None,
            max_depth: DEFAULT_MAX_DEPTH as i64,
            top_k: DEFAULT_TOP_K as i64,
            progress_interval: DEFAULT_PROGRESS_INTERVAL as i64,
            max_runtime_secs: None,
            output: OutputSink::Console,
            log_dir: None,
        }
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Negative { field, value })
}

impl TryFrom<RawScanConfig> for ScanConfig {
    type Error = ConfigError;

    fn try_from(raw: RawScanConfig) -> Result<Self, Self::Error> {
        let start_height = raw
            .start_height
            .map(|height| non_negative("start_height", height))
            .transpose()?;
        let max_depth = non_negative("max_depth", raw.max_depth)?;
        let top_k = non_negative("top_k", raw.top_k)?;
        let top_k = usize::try_from(top_k)
            .ok()
            .filter(|k| *k <= MAX_TOP_K)
            .ok_or(ConfigError::TopKTooLarge {
                requested: top_k,
                max: MAX_TOP_K,
            })?;
        let progress_interval = non_negative("progress_interval", raw.progress_interval)?;
        let max_runtime = raw
            .max_runtime_secs
            .map(|secs| non_negative("max_runtime_secs", secs).map(Duration::from_secs))
            .transpose()?;

        let config = ScanConfig {
            start_height,
            max_depth,
            top_k,
            progress_interval,
            max_runtime,
            output: raw.output,
            log_dir: raw.log_dir,
            logfile_name: DEFAULT_LOGFILE_NAME.into(),
        };
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn defaults_match_the_historical_job() {
        let config = ScanConfig::default();
        assert_eq!(config.start_height, None);
        assert_eq!(config.max_depth, 10_000_000);
        assert_eq!(config.top_k, 10_000);
        assert_eq!(config.progress_interval, 1_000);
        assert_eq!(config.output, OutputSink::Console);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn raw_defaults_convert_to_defaults() {
        let config = ScanConfig::try_from(RawScanConfig::default()).unwrap();
        assert_eq!(config, ScanConfig::default());
    }

    #[test_case(RawScanConfig { top_k: -1, ..Default::default() }, "top_k" ; "negative top k")]
    #[test_case(RawScanConfig { max_depth: -5, ..Default::default() }, "max_depth" ; "negative max depth")]
    #[test_case(RawScanConfig { start_height: Some(-2), ..Default::default() }, "start_height" ; "negative start height")]
    #[test_case(RawScanConfig { progress_interval: -1, ..Default::default() }, "progress_interval" ; "negative progress interval")]
    #[test_case(RawScanConfig { max_runtime_secs: Some(-30), ..Default::default() }, "max_runtime_secs" ; "negative runtime")]
    fn negative_values_are_rejected(raw: RawScanConfig, expected_field: &'static str) {
        match ScanConfig::try_from(raw) {
            Err(ConfigError::Negative { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected a negative value error, got {other:?}"),
        }
    }

    #[test]
    fn zero_progress_interval_is_rejected() {
        let raw = RawScanConfig {
            progress_interval: 0,
            ..Default::default()
        };
        assert_eq!(
            ScanConfig::try_from(raw),
            Err(ConfigError::ZeroProgressInterval(0))
        );
    }

    #[test]
    fn oversized_top_k_is_rejected() {
        let raw = RawScanConfig {
            top_k: MAX_TOP_K as i64 + 1,
            ..Default::default()
        };
        assert!(matches!(
            ScanConfig::try_from(raw),
            Err(ConfigError::TopKTooLarge { .. })
        ));
    }

    #[test]
    fn zero_top_k_and_depth_are_valid() {
        let raw = RawScanConfig {
            top_k: 0,
            max_depth: 0,
            ..Default::default()
        };
        let config = ScanConfig::try_from(raw).unwrap();
        assert_eq!(config.top_k, 0);
        assert_eq!(config.max_depth, 0);
    }

    #[test_case("console", None, Ok(OutputSink::Console))]
    #[test_case("log", None, Ok(OutputSink::Log))]
    #[test_case("file", Some("top.txt"), Ok(OutputSink::File(PathBuf::from("top.txt"))))]
    #[test_case("file", None, Err(ConfigError::MissingOutputPath))]
    #[test_case("syslog", None, Err(ConfigError::UnknownOutputSink("syslog".to_string())))]
    #[test_case("console", Some("top.txt"), Err(ConfigError::UnexpectedOutputPath("console".to_string())))]
    #[test_case("log", Some("top.txt"), Err(ConfigError::UnexpectedOutputPath("log".to_string())))]
    fn output_sink_from_parts(
        kind: &str,
        path: Option<&str>,
        expected: Result<OutputSink, ConfigError>,
    ) {
        assert_eq!(OutputSink::from_parts(kind, path.map(PathBuf::from)), expected);
    }

    #[test]
    fn log_path_lives_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ScanConfig::default();
        config.set_log_dir(dir.path().join("logs").to_string_lossy().to_string());

        let log_path = config.get_log_path().unwrap();
        assert_eq!(
            log_path.as_ref(),
            dir.path().join("logs").join(DEFAULT_LOGFILE_NAME)
        );
        assert!(dir.path().join("logs").is_dir());
        assert!(config.get_log_config().is_ok());
    }
}
