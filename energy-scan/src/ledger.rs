//! In-memory ledger implementing both store traits
//!
//! Loaded from a JSON ledger dump by the command line front-end. Read failures can be
//! injected per height or per transaction to exercise the scan's error handling.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::primitives::{Block, Receipt, TxId};
use crate::traits::{BlockSource, ReceiptStore};

/// Errors associated with the in-memory ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Injected failure reading a block
    #[error("Simulated IO failure reading block at height {0}")]
    BlockIo(u64),
    /// Injected failure reading a receipt
    #[error("Simulated IO failure reading receipt {0}")]
    ReceiptIo(TxId),
    /// Ledger holds no blocks and no head was declared
    #[error("Ledger is empty, chain head unknown")]
    EmptyLedger,
    /// Ledger dump could not be read
    #[error("Ledger dump IO error. {0}")]
    Io(#[from] std::io::Error),
    /// Ledger dump is not valid JSON or does not match the dump format
    #[error("Ledger dump parse error. {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serialized form of a [`MemoryLedger`]
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerDump {
    /// Declared chain head. Defaults to the highest stored block.
    #[serde(default)]
    pub head: Option<u64>,
    /// Stored blocks, in any order.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Stored receipts, in any order.
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

/// Block and receipt stores held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    head: Option<u64>,
    blocks: BTreeMap<u64, Block>,
    receipts: HashMap<TxId, Receipt>,
    failing_heights: HashSet<u64>,
    failing_receipts: HashSet<TxId>,
}

impl MemoryLedger {
    /// Creates an empty ledger with no declared head.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from a deserialized dump.
    pub fn from_dump(dump: LedgerDump) -> Self {
        let mut ledger = MemoryLedger {
            head: dump.head,
            ..Default::default()
        };
        for block in dump.blocks {
            ledger.insert_block(block);
        }
        for receipt in dump.receipts {
            ledger.insert_receipt(receipt);
        }
        ledger
    }

    /// Parses a JSON ledger dump.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LedgerError> {
        let dump: LedgerDump = serde_json::from_reader(reader)?;
        Ok(Self::from_dump(dump))
    }

    /// Reads a JSON ledger dump from disk.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Declares the chain head, overriding the highest stored block.
    pub fn set_head(&mut self, head: u64) {
        self.head = Some(head);
    }

    /// Stores a block, replacing any block at the same height.
    pub fn insert_block(&mut self, block: Block) {
        self.blocks.insert(block.height(), block);
    }

    /// Removes the block at `height`, leaving a gap in the chain.
    pub fn remove_block(&mut self, height: u64) -> Option<Block> {
        self.blocks.remove(&height)
    }

    /// Stores a receipt, replacing any receipt for the same transaction.
    pub fn insert_receipt(&mut self, receipt: Receipt) {
        self.receipts.insert(receipt.txid().clone(), receipt);
    }

    /// Removes a receipt, as pruning would.
    pub fn remove_receipt(&mut self, txid: &TxId) -> Option<Receipt> {
        self.receipts.remove(txid)
    }

    /// Every read of the block at `height` fails with [`LedgerError::BlockIo`].
    pub fn fail_block_reads_at(&mut self, height: u64) {
        self.failing_heights.insert(height);
    }

    /// Every read of the receipt for `txid` fails with [`LedgerError::ReceiptIo`].
    pub fn fail_receipt_reads_for(&mut self, txid: TxId) {
        self.failing_receipts.insert(txid);
    }

    /// Number of stored blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of stored receipts.
    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }
}

impl BlockSource for MemoryLedger {
    type Error = LedgerError;

    fn head_height(&self) -> Result<u64, Self::Error> {
        self.head
            .or_else(|| self.blocks.keys().next_back().copied())
            .ok_or(LedgerError::EmptyLedger)
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>, Self::Error> {
        if self.failing_heights.contains(&height) {
            return Err(LedgerError::BlockIo(height));
        }
        Ok(self.blocks.get(&height).cloned())
    }
}

impl ReceiptStore for MemoryLedger {
    type Error = LedgerError;

    fn get_receipt(&self, txid: &TxId) -> Result<Option<Receipt>, Self::Error> {
        if self.failing_receipts.contains(txid) {
            return Err(LedgerError::ReceiptIo(txid.clone()));
        }
        Ok(self.receipts.get(txid).cloned())
    }
}
