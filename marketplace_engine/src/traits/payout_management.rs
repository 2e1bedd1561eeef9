use thiserror::Error;

use crate::{
    db_types::{
        MinorUnits,
        Payout,
        PayoutAccount,
        PayoutBalance,
        PayoutStatus,
        PayoutTransaction,
        RecordedCommissionLine,
        SellerOrder,
        TransactionReference,
    },
    helpers::RateValidationError,
    traits::data_objects::CreditOrderResult,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid ledger request. {0}")]
    ValidationError(String),
    #[error("Seller {0} does not have a payout account")]
    SellerAccountNotFound(String),
    #[error("Payout account {0} does not exist")]
    AccountNotFound(i64),
    #[error("Payout {0} does not exist")]
    PayoutNotFound(i64),
    #[error(
        "Insufficient balance in account {account_id} to pay out {requested} {currency_code}. Only {available} is \
         available"
    )]
    InsufficientBalance { account_id: i64, currency_code: String, requested: MinorUnits, available: MinorUnits },
    #[error("Order {order_id} has commissions of {commission} exceeding its total of {total}")]
    NegativeNetEarning { order_id: String, total: MinorUnits, commission: MinorUnits },
    #[error("Payout {0} has already been settled as {1}")]
    PayoutAlreadySettled(i64, PayoutStatus),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

impl From<RateValidationError> for LedgerError {
    fn from(e: RateValidationError) -> Self {
        LedgerError::ValidationError(e.to_string())
    }
}

/// The `PayoutManagement` trait defines the behaviour of the seller payout ledger backend.
///
/// A seller has one [`PayoutAccount`], which holds one [`PayoutBalance`] per currency. Every change to a balance is
/// mirrored by an append-only [`PayoutTransaction`], so the transactions of an `(account, currency)` pair always sum
/// to its balance.
///
/// Backends must guarantee that
/// * a balance can never go below zero, even under concurrent debits,
/// * crediting the same order twice is a no-op,
/// * every multi-row change is committed atomically.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement {
    /// Creates the payout account for a seller. If the seller already has an account, it is returned unchanged.
    async fn create_payout_account(&self, seller_id: &str) -> Result<PayoutAccount, LedgerError>;

    async fn fetch_payout_account(&self, account_id: i64) -> Result<Option<PayoutAccount>, LedgerError>;

    async fn fetch_payout_account_for_seller(&self, seller_id: &str) -> Result<Option<PayoutAccount>, LedgerError>;

    /// Fetches the balance of an account in one currency. If the account has never held that currency, `None` is
    /// returned.
    async fn fetch_balance(&self, account_id: i64, currency_code: &str) -> Result<Option<PayoutBalance>, LedgerError>;

    async fn fetch_balances(&self, account_id: i64) -> Result<Vec<PayoutBalance>, LedgerError>;

    /// Fetches the transaction journal for an account, oldest first.
    async fn fetch_transactions(&self, account_id: i64) -> Result<Vec<PayoutTransaction>, LedgerError>;

    async fn fetch_transactions_for_reference(
        &self,
        reference: TransactionReference,
        reference_id: &str,
    ) -> Result<Vec<PayoutTransaction>, LedgerError>;

    async fn fetch_payouts(&self, account_id: i64) -> Result<Vec<Payout>, LedgerError>;

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<Payout>, LedgerError>;

    /// The commission lines recorded when `order_id` was credited to the account.
    async fn fetch_commission_lines_for_order(
        &self,
        account_id: i64,
        order_id: &str,
    ) -> Result<Vec<RecordedCommissionLine>, LedgerError>;

    /// Credits the net earning of `order` to the account, in a single atomic transaction:
    /// * appends an `order` transaction for the net earning. If one already exists for the order and account, nothing
    ///   further is done and [`CreditOrderResult::AlreadyCredited`] is returned.
    /// * increments (or creates) the balance for the order's currency.
    /// * records the order's commission lines.
    async fn credit_order(&self, account_id: i64, order: &SellerOrder) -> Result<CreditOrderResult, LedgerError>;

    /// Debits `amount` from the balance and creates a `Pending` payout, in a single atomic transaction.
    ///
    /// The debit is conditional on the balance covering the full amount. If it does not, nothing is changed and
    /// [`LedgerError::InsufficientBalance`] is returned.
    async fn debit_for_payout(
        &self,
        account_id: i64,
        amount: MinorUnits,
        currency_code: &str,
    ) -> Result<(Payout, PayoutTransaction), LedgerError>;

    /// Moves a `Pending` payout to `Paid` or `Failed`. Failing a payout returns its amount to the balance with a
    /// `payout_reversal` transaction in the same storage transaction.
    async fn settle_payout(&self, payout_id: i64, status: PayoutStatus) -> Result<Payout, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError>;
}
