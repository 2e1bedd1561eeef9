use serde::{Deserialize, Serialize};

use crate::db_types::{MinorUnits, Payout, PayoutAccount, PayoutBalance, PayoutTransaction};

/// Everything the ledger knows about one payout account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account: PayoutAccount,
    pub balances: Vec<PayoutBalance>,
    pub transactions: Vec<PayoutTransaction>,
    pub payouts: Vec<Payout>,
}

impl AccountStatement {
    pub fn new(account: PayoutAccount) -> Self {
        Self { account, balances: Vec::new(), transactions: Vec::new(), payouts: Vec::new() }
    }

    pub fn with_balances(mut self, balances: Vec<PayoutBalance>) -> Self {
        self.balances = balances;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<PayoutTransaction>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_payouts(mut self, payouts: Vec<Payout>) -> Self {
        self.payouts = payouts;
        self
    }

    /// The stored balance for the currency, or zero if the account has never held it.
    pub fn balance(&self, currency_code: &str) -> MinorUnits {
        self.balances.iter().find(|b| b.currency_code == currency_code).map(|b| b.balance).unwrap_or_default()
    }

    /// The sum of the journal entries for the currency. For a consistent ledger this equals [`Self::balance`].
    pub fn journal_total(&self, currency_code: &str) -> MinorUnits {
        self.transactions.iter().filter(|t| t.currency_code == currency_code).map(|t| t.amount).sum()
    }

    /// True if every balance matches the sum of its journal entries.
    pub fn is_reconciled(&self) -> bool {
        self.balances.iter().all(|b| self.journal_total(&b.currency_code) == b.balance)
    }
}
