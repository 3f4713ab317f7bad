//! Per-item scan errors

use crate::primitives::TxId;

/// Which store a lookup was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// [`crate::traits::BlockSource`]
    Blocks,
    /// [`crate::traits::ReceiptStore`]
    Receipts,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Blocks => write!(f, "block store"),
            StoreKind::Receipts => write!(f, "receipt store"),
        }
    }
}

/// Per-item failures. Each is absorbed by the scan: the item is skipped and the scan continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanEvent {
    /// No block is stored at the height, the whole height is skipped.
    #[error("Missing block. No block stored at height {height}")]
    MissingBlock {
        /// Height that was skipped
        height: u64,
    },
    /// A contract transaction has no receipt, only that transaction is skipped.
    #[error("Missing receipt. Contract transaction {txid} at height {height} has no receipt")]
    MissingReceipt {
        /// Height of the block holding the transaction
        height: u64,
        /// Transaction that was skipped
        txid: TxId,
    },
    /// A store read failed. The record is treated as absent.
    #[error("Store IO error. Reading {store} at height {height} failed: {reason}")]
    StoreIoError {
        /// Store that failed
        store: StoreKind,
        /// Height being scanned
        height: u64,
        /// Transaction whose receipt was requested, `None` for block reads
        txid: Option<TxId>,
        /// Error reported by the store
        reason: String,
    },
}
