//! Selects the transactions the scan fetches receipts for

use crate::primitives::Transaction;

/// Stateless predicate matching contract creations and calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractFilter;

impl ContractFilter {
    /// Returns `true` if the transaction invokes or creates a smart contract.
    pub fn is_eligible(&self, transaction: &Transaction) -> bool {
        transaction.kind().is_contract_invocation()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::primitives::{OutcomeCode, TransactionKind, TxId};

    #[test_case(TransactionKind::TriggerSmartContract => true)]
    #[test_case(TransactionKind::CreateSmartContract => true)]
    #[test_case(TransactionKind::Transfer => false)]
    #[test_case(TransactionKind::TransferAsset => false)]
    #[test_case(TransactionKind::Other(46) => false)]
    fn eligibility(kind: TransactionKind) -> bool {
        let transaction =
            Transaction::from_parts(TxId::from_bytes(vec![1]), kind, OutcomeCode::Success);
        ContractFilter.is_eligible(&transaction)
    }
}
