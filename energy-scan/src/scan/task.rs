//! Runs a scan as a single background worker owned by a [`ScanHandle`]

use std::sync::{
    atomic::{self, AtomicBool},
    Arc,
};

use tokio::{sync::mpsc, task::JoinHandle};

use energy_config::ScanConfig;

use crate::error::ScanError;
use crate::report::Reporter;
use crate::traits::{BlockSource, ReceiptStore};

use super::{ScanDriver, ScanOutcome, ScanUpdate};

/// Clonable stop signal for a running scan, usable after the [`ScanHandle`] has been moved.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Same as [`ScanHandle::cancel`].
    pub fn cancel(&self) {
        self.0.store(true, atomic::Ordering::Release);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(atomic::Ordering::Acquire)
    }
}

/// Owner's side of a running scan.
///
/// Dropping the handle detaches the worker, the scan then runs to completion on its own.
pub struct ScanHandle {
    handle: JoinHandle<Result<ScanOutcome, ScanError>>,
    interrupt: Arc<AtomicBool>,
    head: u64,
}

impl ScanHandle {
    /// Height the scan counts back from.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Asks the worker to stop. It finishes the height in progress and still writes a report.
    pub fn cancel(&self) {
        self.interrupt.store(true, atomic::Ordering::Release);
    }

    /// Returns `true` once cancellation has been requested, by this handle or a token.
    pub fn is_cancelled(&self) -> bool {
        self.interrupt.load(atomic::Ordering::Acquire)
    }

    /// Returns a token that cancels this scan and outlives the handle.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken(Arc::clone(&self.interrupt))
    }

    /// Returns `true` once the worker has returned, report included.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns its outcome.
    pub async fn join(self) -> Result<ScanOutcome, ScanError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ScanError::TaskFailed(e.to_string())),
        }
    }
}

/// Resolves the height the scan counts back from: the configured start height, otherwise the
/// chain head as of now.
pub fn resolve_head<B>(config: &ScanConfig, blocks: &B) -> Result<u64, ScanError>
where
    B: BlockSource,
{
    match config.start_height {
        Some(height) => Ok(height),
        None => blocks
            .head_height()
            .map_err(|e| ScanError::HeadUnavailable(e.to_string())),
    }
}

/// Runs a complete scan on the current thread, then writes the report.
///
/// Configuration is validated before either store is read.
pub fn scan_blocking<B, R>(
    config: &ScanConfig,
    blocks: &B,
    receipts: &R,
    interrupt: &AtomicBool,
    progress: Option<mpsc::Sender<ScanUpdate>>,
) -> Result<ScanOutcome, ScanError>
where
    B: BlockSource,
    R: ReceiptStore,
{
    config.validate()?;
    let head = resolve_head(config, blocks)?;

    run_and_report(config, blocks, receipts, head, interrupt, progress)
}

fn run_and_report<B, R>(
    config: &ScanConfig,
    blocks: &B,
    receipts: &R,
    head: u64,
    interrupt: &AtomicBool,
    progress: Option<mpsc::Sender<ScanUpdate>>,
) -> Result<ScanOutcome, ScanError>
where
    B: BlockSource,
    R: ReceiptStore,
{
    let mut driver = ScanDriver::new(blocks, receipts, head, config);
    if let Some(sender) = progress {
        driver = driver.with_progress(sender);
    }
    let outcome = driver.run(interrupt);

    Reporter::new(config.output.clone()).emit(outcome.candidates())?;

    Ok(outcome)
}

/// Starts a scan on a blocking worker and returns without waiting for it.
///
/// Fails fast with [`ScanError::InvalidConfiguration`] or [`ScanError::HeadUnavailable`]
/// before the worker is spawned. The head is read once, here, and never again.
///
/// Must be called from within a tokio runtime.
pub fn spawn_scan<B, R>(
    config: ScanConfig,
    blocks: Arc<B>,
    receipts: Arc<R>,
    progress: Option<mpsc::Sender<ScanUpdate>>,
) -> Result<ScanHandle, ScanError>
where
    B: BlockSource + Send + Sync + 'static,
    R: ReceiptStore + Send + Sync + 'static,
{
    config.validate()?;
    let head = resolve_head(&config, blocks.as_ref())?;

    let interrupt = Arc::new(AtomicBool::new(false));
    let worker_interrupt = Arc::clone(&interrupt);
    let handle = tokio::task::spawn_blocking(move || {
        run_and_report(
            &config,
            blocks.as_ref(),
            receipts.as_ref(),
            head,
            &worker_interrupt,
            progress,
        )
    });

    Ok(ScanHandle {
        handle,
        interrupt,
        head,
    })
}
