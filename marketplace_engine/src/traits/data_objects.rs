use serde::{Deserialize, Serialize};

use crate::db_types::{PayoutBalance, PayoutTransaction};

/// The outcome of crediting an order to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditOrderResult {
    /// The order was credited. Holds the new transaction and the updated balance.
    Credited(PayoutTransaction, PayoutBalance),
    /// The order had been credited before. Holds the transactions that were recorded at the time.
    AlreadyCredited(Vec<PayoutTransaction>),
}

impl CreditOrderResult {
    pub fn transactions(&self) -> Vec<PayoutTransaction> {
        match self {
            CreditOrderResult::Credited(tx, _) => vec![tx.clone()],
            CreditOrderResult::AlreadyCredited(txs) => txs.clone(),
        }
    }
}
