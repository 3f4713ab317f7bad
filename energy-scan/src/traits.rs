//! Traits for interfacing the ledger stores with the scan engine
//!
//! Both stores are read-only from the scan's point of view. Implementations must tolerate
//! concurrent reads while other writers append blocks.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::primitives::{Block, Receipt, TxId};

/// Height-indexed block lookup
pub trait BlockSource {
    /// Errors other than "not found", e.g. a failed disk read
    type Error: Debug + Display;

    /// Returns the height of the highest block known to the store
    fn head_height(&self) -> Result<u64, Self::Error>;

    /// Get a block by height
    /// Must return `Ok(None)` if no block is stored at this height
    fn get_block(&self, height: u64) -> Result<Option<Block>, Self::Error>;
}

/// Receipt lookup by transaction id
pub trait ReceiptStore {
    /// Errors other than "not found", e.g. a failed disk read
    type Error: Debug + Display;

    /// Get the execution receipt of a transaction
    /// Must return `Ok(None)` if the receipt was never recorded or has been pruned
    fn get_receipt(&self, txid: &TxId) -> Result<Option<Receipt>, Self::Error>;
}

impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    type Error = T::Error;

    fn head_height(&self) -> Result<u64, Self::Error> {
        self.as_ref().head_height()
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>, Self::Error> {
        self.as_ref().get_block(height)
    }
}

impl<T: ReceiptStore + ?Sized> ReceiptStore for Arc<T> {
    type Error = T::Error;

    fn get_receipt(&self, txid: &TxId) -> Result<Option<Receipt>, Self::Error> {
        self.as_ref().get_receipt(txid)
    }
}
