//! Module for primitive structs associated with the scan engine

use std::fmt;

use getset::{CopyGetters, Getters};
use memuse::DynamicUsage;
use serde::{Deserialize, Serialize};

/// Transaction id. Arbitrary bytes, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(Vec<u8>);

impl TxId {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        TxId(bytes.into())
    }

    pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(encoded).map(TxId)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for TxId {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TxId::from_hex(&value)
    }
}

impl From<TxId> for String {
    fn from(value: TxId) -> Self {
        value.to_hex()
    }
}

impl DynamicUsage for TxId {
    fn dynamic_usage(&self) -> usize {
        self.0.dynamic_usage()
    }

    fn dynamic_usage_bounds(&self) -> (usize, Option<usize>) {
        self.0.dynamic_usage_bounds()
    }
}

/// Contract type carried by a transaction, as recorded on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "TransferContract")]
    Transfer,
    #[serde(rename = "TransferAssetContract")]
    TransferAsset,
    #[serde(rename = "CreateSmartContract")]
    CreateSmartContract,
    #[serde(rename = "TriggerSmartContract")]
    TriggerSmartContract,
    /// Any other contract type, by its ledger code.
    Other(i32),
}

impl TransactionKind {
    /// Ledger code of the contract type.
    pub fn code(&self) -> i32 {
        match self {
            TransactionKind::Transfer => 1,
            TransactionKind::TransferAsset => 2,
            TransactionKind::CreateSmartContract => 30,
            TransactionKind::TriggerSmartContract => 31,
            TransactionKind::Other(code) => *code,
        }
    }

    /// True for transactions that create or call a smart contract.
    pub fn is_contract_invocation(&self) -> bool {
        matches!(
            self,
            TransactionKind::CreateSmartContract | TransactionKind::TriggerSmartContract
        )
    }
}

impl From<i32> for TransactionKind {
    fn from(code: i32) -> Self {
        match code {
            1 => TransactionKind::Transfer,
            2 => TransactionKind::TransferAsset,
            30 => TransactionKind::CreateSmartContract,
            31 => TransactionKind::TriggerSmartContract,
            other => TransactionKind::Other(other),
        }
    }
}

/// Result code the virtual machine recorded for a contract transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeCode {
    #[default]
    Default,
    Success,
    Revert,
    BadJumpDestination,
    OutOfMemory,
    PrecompiledContract,
    StackTooSmall,
    StackTooLarge,
    IllegalOperation,
    StackOverflow,
    OutOfEnergy,
    OutOfTime,
    JvmStackOverFlow,
    Unknown,
    TransferFailed,
    InvalidCode,
    /// A code this build does not know the name of.
    Unrecognised(i32),
}

impl OutcomeCode {
    pub fn code(&self) -> i32 {
        use OutcomeCode::*;
        match self {
            Default => 0,
            Success => 1,
            Revert => 2,
            BadJumpDestination => 3,
            OutOfMemory => 4,
            PrecompiledContract => 5,
            StackTooSmall => 6,
            StackTooLarge => 7,
            IllegalOperation => 8,
            StackOverflow => 9,
            OutOfEnergy => 10,
            OutOfTime => 11,
            JvmStackOverFlow => 12,
            Unknown => 13,
            TransferFailed => 14,
            InvalidCode => 15,
            Unrecognised(code) => *code,
        }
    }
}

impl From<i32> for OutcomeCode {
    fn from(code: i32) -> Self {
        use OutcomeCode::*;
        match code {
            0 => Default,
            1 => Success,
            2 => Revert,
            3 => BadJumpDestination,
            4 => OutOfMemory,
            5 => PrecompiledContract,
            6 => StackTooSmall,
            7 => StackTooLarge,
            8 => IllegalOperation,
            9 => StackOverflow,
            10 => OutOfEnergy,
            11 => OutOfTime,
            12 => JvmStackOverFlow,
            13 => Unknown,
            14 => TransferFailed,
            15 => InvalidCode,
            other => Unrecognised(other),
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OutcomeCode::*;
        let name = match self {
            Default => "DEFAULT",
            Success => "SUCCESS",
            Revert => "REVERT",
            BadJumpDestination => "BAD_JUMP_DESTINATION",
            OutOfMemory => "OUT_OF_MEMORY",
            PrecompiledContract => "PRECOMPILED_CONTRACT",
            StackTooSmall => "STACK_TOO_SMALL",
            StackTooLarge => "STACK_TOO_LARGE",
            IllegalOperation => "ILLEGAL_OPERATION",
            StackOverflow => "STACK_OVERFLOW",
            OutOfEnergy => "OUT_OF_ENERGY",
            OutOfTime => "OUT_OF_TIME",
            JvmStackOverFlow => "JVM_STACK_OVER_FLOW",
            Unknown => "UNKNOWN",
            TransferFailed => "TRANSFER_FAILED",
            InvalidCode => "INVALID_CODE",
            Unrecognised(code) => return write!(f, "UNRECOGNISED({code})"),
        };
        write!(f, "{name}")
    }
}

/// Ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct Transaction {
    #[getset(get = "pub")]
    #[serde(rename = "id")]
    txid: TxId,
    #[getset(get_copy = "pub")]
    kind: TransactionKind,
    #[getset(get_copy = "pub")]
    #[serde(default)]
    outcome: OutcomeCode,
}

impl Transaction {
    pub fn from_parts(txid: TxId, kind: TransactionKind, outcome: OutcomeCode) -> Self {
        Self {
            txid,
            kind,
            outcome,
        }
    }
}

/// Ledger block. Transactions are kept in block order.
#[derive(Debug, Clone, PartialEq, Eq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct Block {
    height: u64,
    #[getset(skip)]
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn from_parts(height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            transactions,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

/// Execution receipt of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct Receipt {
    #[getset(get = "pub")]
    #[serde(rename = "id")]
    txid: TxId,
    #[getset(get_copy = "pub")]
    energy_usage_total: u64,
}

impl Receipt {
    pub fn from_parts(txid: TxId, energy_usage_total: u64) -> Self {
        Self {
            txid,
            energy_usage_total,
        }
    }
}

/// A contract transaction with a resolved receipt, offered to the selector.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize)]
pub struct Candidate {
    #[getset(get = "pub")]
    txid: TxId,
    #[getset(get_copy = "pub")]
    energy: u64,
    #[getset(get_copy = "pub")]
    outcome: OutcomeCode,
    /// Height of the block the transaction was found in.
    #[getset(get_copy = "pub")]
    height: u64,
    /// Order in which the scan first saw this candidate.
    #[getset(get_copy = "pub")]
    sequence: u64,
}

impl Candidate {
    pub fn from_parts(
        txid: TxId,
        energy: u64,
        outcome: OutcomeCode,
        height: u64,
        sequence: u64,
    ) -> Self {
        Self {
            txid,
            energy,
            outcome,
            height,
            sequence,
        }
    }
}

/// One report line: `<hex txid>: <energy> <outcome>`
impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.txid, self.energy, self.outcome)
    }
}

impl DynamicUsage for Candidate {
    fn dynamic_usage(&self) -> usize {
        self.txid.dynamic_usage()
    }

    fn dynamic_usage_bounds(&self) -> (usize, Option<usize>) {
        self.txid.dynamic_usage_bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_renders_as_report_line() {
        let candidate = Candidate::from_parts(
            TxId::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]),
            123_456,
            OutcomeCode::OutOfEnergy,
            42,
            0,
        );
        assert_eq!(candidate.to_string(), "deadbeef: 123456 OUT_OF_ENERGY");
    }

    #[test]
    fn outcome_codes_round_trip_through_numbers() {
        for code in 0..=15 {
            assert_eq!(OutcomeCode::from(code).code(), code);
        }
        assert_eq!(OutcomeCode::from(99), OutcomeCode::Unrecognised(99));
        assert_eq!(OutcomeCode::from(99).to_string(), "UNRECOGNISED(99)");
    }

    #[test]
    fn only_create_and_trigger_are_contract_invocations() {
        assert!(TransactionKind::TriggerSmartContract.is_contract_invocation());
        assert!(TransactionKind::CreateSmartContract.is_contract_invocation());
        assert!(!TransactionKind::Transfer.is_contract_invocation());
        assert!(!TransactionKind::TransferAsset.is_contract_invocation());
        assert!(!TransactionKind::Other(4).is_contract_invocation());
        assert_eq!(TransactionKind::from(31), TransactionKind::TriggerSmartContract);
    }

    #[test]
    fn transaction_deserialises_from_ledger_dump() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id": "00ff", "kind": "TriggerSmartContract", "outcome": "REVERT"}"#,
        )
        .unwrap();
        assert_eq!(tx.txid().as_bytes(), &[0x00, 0xff]);
        assert_eq!(tx.kind(), TransactionKind::TriggerSmartContract);
        assert_eq!(tx.outcome(), OutcomeCode::Revert);

        let bad = serde_json::from_str::<Transaction>(
            r#"{"id": "zz", "kind": "TransferContract"}"#,
        );
        assert!(bad.is_err());
    }
}
