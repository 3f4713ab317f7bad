//! Backward traversal of the ledger
//!
//! [`ScanDriver`] visits `head - 1` down to `head - max_depth`, stopping at genesis, and feeds
//! every contract transaction with a receipt into an [`EnergySelector`]. Missing or unreadable
//! records are recorded as [`ScanEvent`]s and skipped, they never end the scan.

use std::sync::atomic::{self, AtomicBool};
use std::time::Instant;

use getset::{CopyGetters, Getters};
use serde::Serialize;
use tokio::sync::mpsc;

use energy_config::ScanConfig;

use crate::filter::ContractFilter;
use crate::primitives::{Candidate, Transaction};
use crate::report;
use crate::selector::{EnergySelector, Offer};
use crate::traits::{BlockSource, ReceiptStore};

use self::error::{ScanEvent, StoreKind};

pub mod error;
pub mod task;

/// Capacity of the channel returned by [`progress_channel`].
pub const PROGRESS_CHANNEL_CAPACITY: usize = 1_024;

/// Creates a bounded channel for [`ScanUpdate`]s.
///
/// The scan never waits on a full channel, updates that do not fit are dropped and counted in
/// [`ScanStats::updates_dropped`].
pub fn progress_channel() -> (mpsc::Sender<ScanUpdate>, mpsc::Receiver<ScanUpdate>) {
    mpsc::channel(PROGRESS_CHANNEL_CAPACITY)
}

/// Why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// `max_depth` heights were visited.
    DepthExhausted,
    /// Height 0 was visited, or the head itself was at genesis.
    GenesisReached,
    /// The owner raised the interrupt flag.
    Cancelled,
    /// `max_runtime` elapsed.
    DeadlineElapsed,
}

/// Counters describing a scan. Advisory, they never affect the result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct ScanStats {
    /// Heights visited, including those whose block was missing.
    heights_scanned: u64,
    /// [`ScanEvent::MissingBlock`] count.
    missing_blocks: u64,
    /// [`ScanEvent::MissingReceipt`] count.
    missing_receipts: u64,
    /// [`ScanEvent::StoreIoError`] count.
    store_io_errors: u64,
    /// Contract transactions seen, with or without a receipt.
    contract_transactions: u64,
    /// Candidates offered to the selector.
    candidates_offered: u64,
    /// Offers that were retained, with or without an eviction.
    candidates_inserted: u64,
    /// Retained candidates displaced by a higher energy.
    candidates_evicted: u64,
    /// Offers that did not beat the retained minimum.
    candidates_discarded: u64,
    /// Updates not delivered because the progress channel was full.
    updates_dropped: u64,
}

/// Sent over the optional progress channel while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    /// Emitted every `progress_interval` heights.
    Progress {
        /// Heights visited so far.
        heights_scanned: u64,
        /// Height just visited.
        height: u64,
        /// Candidates currently retained.
        retained: usize,
        /// Counters so far, including events that could not be delivered.
        stats: ScanStats,
    },
    /// A record was missing or unreadable and has been skipped.
    Event(ScanEvent),
}

/// Terminal state of a scan.
#[derive(Debug, Clone, Getters, CopyGetters, Serialize)]
pub struct ScanOutcome {
    /// Height the scan counted back from.
    #[getset(get_copy = "pub")]
    head: u64,
    /// Lowest height visited, `None` if no height was visited.
    #[getset(get_copy = "pub")]
    lowest_height: Option<u64>,
    /// Why the scan stopped.
    #[getset(get_copy = "pub")]
    termination: Termination,
    /// Counters at the time the scan stopped.
    #[getset(get_copy = "pub")]
    stats: ScanStats,
    /// Retained candidates in report order.
    #[getset(get = "pub")]
    #[serde(skip)]
    candidates: Vec<Candidate>,
}

/// Walks the ledger for one scan. Consumed by [`ScanDriver::run`].
pub struct ScanDriver<'a, B, R> {
    blocks: &'a B,
    receipts: &'a R,
    filter: ContractFilter,
    head: u64,
    max_depth: u64,
    progress_interval: u64,
    max_runtime: Option<std::time::Duration>,
    selector: EnergySelector,
    stats: ScanStats,
    lowest_height: Option<u64>,
    next_sequence: u64,
    progress_sender: Option<mpsc::Sender<ScanUpdate>>,
}

impl<'a, B, R> ScanDriver<'a, B, R>
where
    B: BlockSource,
    R: ReceiptStore,
{
    /// `head` is the snapshot the scan counts back from; it is never re-read.
    pub fn new(blocks: &'a B, receipts: &'a R, head: u64, config: &ScanConfig) -> Self {
        Self {
            blocks,
            receipts,
            filter: ContractFilter,
            head,
            max_depth: config.max_depth,
            progress_interval: config.progress_interval.max(1),
            max_runtime: config.max_runtime,
            selector: EnergySelector::new(config.top_k),
            stats: ScanStats::default(),
            lowest_height: None,
            next_sequence: 0,
            progress_sender: None,
        }
    }

    /// Forward progress signals and per-item events to `sender`.
    ///
    /// Updates are sent without waiting; when the channel is full they are dropped.
    pub fn with_progress(mut self, sender: mpsc::Sender<ScanUpdate>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    /// Runs the scan to its terminal state. `interrupt` is checked before every height.
    pub fn run(mut self, interrupt: &AtomicBool) -> ScanOutcome {
        tracing::info!(
            head = self.head,
            max_depth = self.max_depth,
            top_k = self.selector.top_k(),
            "Scanning contract energy..."
        );
        // a runtime too long to represent as an instant never elapses
        let deadline = self
            .max_runtime
            .and_then(|runtime| Instant::now().checked_add(runtime));

        let mut termination = Termination::DepthExhausted;
        let mut depth = 0;
        while depth < self.max_depth {
            if interrupt.load(atomic::Ordering::Acquire) {
                termination = Termination::Cancelled;
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                termination = Termination::DeadlineElapsed;
                break;
            }
            let Some(height) = self.head.checked_sub(depth + 1) else {
                termination = Termination::GenesisReached;
                break;
            };

            self.scan_height(height);
            depth += 1;
            self.stats.heights_scanned = depth;
            self.lowest_height = Some(height);

            if depth % self.progress_interval == 0 {
                self.report_progress(height);
            }
            if height == 0 {
                termination = Termination::GenesisReached;
                break;
            }
        }

        tracing::info!(
            termination = ?termination,
            heights_scanned = self.stats.heights_scanned,
            lowest_height = ?self.lowest_height,
            retained = self.selector.len(),
            missing_blocks = self.stats.missing_blocks,
            missing_receipts = self.stats.missing_receipts,
            store_io_errors = self.stats.store_io_errors,
            "Scan finished"
        );

        ScanOutcome {
            head: self.head,
            lowest_height: self.lowest_height,
            termination,
            stats: self.stats,
            candidates: report::rank(self.selector.into_vec()),
        }
    }

    fn scan_height(&mut self, height: u64) {
        let block = match self.blocks.get_block(height) {
            Ok(Some(block)) => block,
            Ok(None) => {
                self.record(ScanEvent::MissingBlock { height });
                return;
            }
            Err(e) => {
                self.record(ScanEvent::StoreIoError {
                    store: StoreKind::Blocks,
                    height,
                    txid: None,
                    reason: e.to_string(),
                });
                return;
            }
        };

        for transaction in block.transactions() {
            if self.filter.is_eligible(transaction) {
                self.scan_transaction(height, transaction);
            }
        }
    }

    fn scan_transaction(&mut self, height: u64, transaction: &Transaction) {
        self.stats.contract_transactions += 1;

        let receipt = match self.receipts.get_receipt(transaction.txid()) {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                self.record(ScanEvent::MissingReceipt {
                    height,
                    txid: transaction.txid().clone(),
                });
                return;
            }
            Err(e) => {
                self.record(ScanEvent::StoreIoError {
                    store: StoreKind::Receipts,
                    height,
                    txid: Some(transaction.txid().clone()),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let candidate = Candidate::from_parts(
            transaction.txid().clone(),
            receipt.energy_usage_total(),
            transaction.outcome(),
            height,
            self.next_sequence,
        );
        self.next_sequence += 1;
        self.stats.candidates_offered += 1;

        match self.selector.offer(candidate) {
            Offer::Inserted => self.stats.candidates_inserted += 1,
            Offer::Replaced(_) => {
                self.stats.candidates_inserted += 1;
                self.stats.candidates_evicted += 1;
            }
            Offer::Discarded(_) => self.stats.candidates_discarded += 1,
        }
    }

    fn record(&mut self, event: ScanEvent) {
        match &event {
            ScanEvent::MissingBlock { height } => {
                self.stats.missing_blocks += 1;
                tracing::debug!(height, "Missing block, skipping height");
            }
            ScanEvent::MissingReceipt { height, txid } => {
                self.stats.missing_receipts += 1;
                tracing::debug!(height, %txid, "Missing receipt, skipping transaction");
            }
            ScanEvent::StoreIoError { .. } => {
                self.stats.store_io_errors += 1;
                tracing::warn!("{}", event);
            }
        }

        self.send_update(ScanUpdate::Event(event));
    }

    fn report_progress(&mut self, height: u64) {
        tracing::info!(
            heights_scanned = self.stats.heights_scanned,
            height,
            retained = self.selector.len(),
            "Scan progress"
        );
        self.send_update(ScanUpdate::Progress {
            heights_scanned: self.stats.heights_scanned,
            height,
            retained: self.selector.len(),
            stats: self.stats,
        });
    }

    fn send_update(&mut self, update: ScanUpdate) {
        let Some(sender) = &self.progress_sender else {
            return;
        };
        match sender.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => self.stats.updates_dropped += 1,
            // progress listeners are optional, a dropped receiver is not an error
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
