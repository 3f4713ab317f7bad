#![forbid(unsafe_code)]
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use clap::{self, Arg};
use energy_config::{ConfigError, OutputSink, RawScanConfig, ScanConfig};
use energy_scan::ledger::{LedgerError, MemoryLedger};
use energy_scan::scan::ScanOutcome;
use energy_scan::{spawn_scan, ScanError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_clap_app() -> clap::Command {
    clap::Command::new("Energy Scan CLI").version(VERSION)
            .about("Reports the contract transactions with the highest energy usage below the chain head.")
            .arg(Arg::new("ledger")
                .long("ledger")
                .short('l')
                .value_name("ledger")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true)
                .help("JSON ledger dump holding blocks and receipts."))
            .arg(Arg::new("start-height")
                .long("start-height")
                .value_name("start-height")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Height to count back from. Defaults to the chain head."))
            .arg(Arg::new("max-depth")
                .long("max-depth")
                .short('d')
                .value_name("max-depth")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Maximum number of blocks to scan below the start height. Defaults to 10,000,000."))
            .arg(Arg::new("top-k")
                .long("top-k")
                .short('k')
                .value_name("top-k")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Number of transactions to report. Defaults to 10,000."))
            .arg(Arg::new("progress-interval")
                .long("progress-interval")
                .value_name("progress-interval")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Log progress every this many blocks. Defaults to 1,000."))
            .arg(Arg::new("max-runtime-secs")
                .long("max-runtime-secs")
                .value_name("max-runtime-secs")
                .value_parser(clap::value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Stop scanning after this many seconds and report what was found."))
            .arg(Arg::new("output")
                .long("output")
                .short('o')
                .value_name("output")
                .help(r#"Where to write the report. One of "console", "log" or "file". Defaults to "console", or "file" when --output-file is given."#))
            .arg(Arg::new("output-file")
                .long("output-file")
                .value_name("output-file")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Report destination for the file output."))
            .arg(Arg::new("log-dir")
                .long("log-dir")
                .value_name("log-dir")
                .help("Write logs to a rolling logfile in this directory instead of standard error."))
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateFillError {
    #[error("{0}")]
    InvalidConfiguration(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Argument error. {0}")]
    Template(#[from] TemplateFillError),
    #[error("Ledger error. {0}")]
    Ledger(#[from] LedgerError),
    #[error("Scan error. {0}")]
    Scan(#[from] ScanError),
    #[error("Runtime error. {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Logging error. {0}")]
    Logging(String),
}

/// Settings collected from the command line.
#[derive(Debug)]
pub struct ConfigTemplate {
    pub ledger_path: PathBuf,
    pub log_to_file: bool,
    pub scan_config: ScanConfig,
}

impl ConfigTemplate {
    pub fn fill(matches: clap::ArgMatches) -> Result<Self, TemplateFillError> {
        let ledger_path = matches
            .get_one::<PathBuf>("ledger")
            .cloned()
            .unwrap_or_default();
        let defaults = RawScanConfig::default();

        let output_file = matches.get_one::<PathBuf>("output-file").cloned();
        let output = match matches.get_one::<String>("output") {
            Some(kind) => OutputSink::from_parts(kind, output_file)?,
            None => output_file.map(OutputSink::File).unwrap_or_default(),
        };
        let log_dir = matches.get_one::<String>("log-dir").map(PathBuf::from);
        let log_to_file = log_dir.is_some();

        let raw = RawScanConfig {
            start_height: matches.get_one::<i64>("start-height").copied(),
            max_depth: matches
                .get_one::<i64>("max-depth")
                .copied()
                .unwrap_or(defaults.max_depth),
            top_k: matches
                .get_one::<i64>("top-k")
                .copied()
                .unwrap_or(defaults.top_k),
            progress_interval: matches
                .get_one::<i64>("progress-interval")
                .copied()
                .unwrap_or(defaults.progress_interval),
            max_runtime_secs: matches.get_one::<i64>("max-runtime-secs").copied(),
            output,
            log_dir,
        };

        Ok(Self {
            ledger_path,
            log_to_file,
            scan_config: ScanConfig::try_from(raw)?,
        })
    }
}

fn init_logging(template: &ConfigTemplate) -> Result<(), CliError> {
    if template.log_to_file {
        let log_config = template
            .scan_config
            .get_log_config()
            .map_err(|e| CliError::Logging(e.to_string()))?;
        log4rs::init_config(log_config).map_err(|e| CliError::Logging(e.to_string()))?;
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| CliError::Logging(e.to_string()))?;
    }

    Ok(())
}

/// Loads the ledger, runs the scan to completion and returns its outcome.
///
/// Ctrl-C cancels the scan; the report of what was collected so far is still written.
pub fn startup(template: &ConfigTemplate) -> Result<ScanOutcome, CliError> {
    let ledger = Arc::new(MemoryLedger::load(&template.ledger_path)?);
    info!(
        "Loaded ledger {} ({} blocks, {} receipts)",
        template.ledger_path.display(),
        ledger.block_count(),
        ledger.receipt_count()
    );
    info!("Scan config {:?}", template.scan_config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let handle = spawn_scan(
            template.scan_config.clone(),
            Arc::clone(&ledger),
            ledger,
            None,
        )?;
        info!("Scanning back from height {}", handle.head());

        let cancel_token = handle.cancel_token();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("CTRL-C");
                cancel_token.cancel();
            }
        });
        let outcome = handle.join().await;
        ctrl_c.abort();

        Ok::<ScanOutcome, CliError>(outcome?)
    })
}

fn print_summary(outcome: &ScanOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(summary) => eprintln!("{summary}"),
        Err(e) => error!("Couldn't serialise scan summary: {e}"),
    }
}

/// Returns the process exit code.
pub fn run_cli() -> i32 {
    let template = match ConfigTemplate::fill(build_clap_app().get_matches()) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("{e}");
            return 2;
        }
    };
    if let Err(e) = init_logging(&template) {
        eprintln!("Could not initialize logging: {e}")
    };

    match startup(&template) {
        Ok(outcome) => {
            print_summary(&outcome);
            0
        }
        Err(e) => {
            let emsg = format!("Error during scan:\n{}\n", e);
            eprintln!("{}", emsg);
            error!("{}", emsg);
            1
        }
    }
}
