//! The seller payout ledger.

use std::fmt::Debug;

use log::*;

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
    },
    events::{EventProducers, OrderCreditedEvent, PayoutCreatedEvent},
    helpers::normalize_currency_code,
    ledger_objects::AccountStatement,
    traits::{CreditOrderResult, LedgerError, PayoutManagement},
};

/// `LedgerApi` moves money in and out of seller payout accounts.
///
/// Sellers are credited with the net earning of each order (the order total less the marketplace's commission), and
/// paid out from the resulting balance. Every change is journalled, balances never go below zero, and each order is
/// credited at most once.
pub struct LedgerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> LedgerApi<B>
where B: PayoutManagement
{
    /// Opens a payout account for the seller. Opening an account that already exists returns the existing account.
    pub async fn open_account(&self, seller_id: &str) -> Result<PayoutAccount, LedgerError> {
        let seller_id = seller_id.trim();
        if seller_id.is_empty() {
            return Err(LedgerError::ValidationError("A payout account needs a seller id".into()));
        }
        let account = self.db.create_payout_account(seller_id).await?;
        debug!("🏦️ Payout account #{} is open for seller {seller_id}", account.id);
        Ok(account)
    }

    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<PayoutAccount>, LedgerError> {
        self.db.fetch_payout_account(account_id).await
    }

    pub async fn account_for_seller(&self, seller_id: &str) -> Result<Option<PayoutAccount>, LedgerError> {
        self.db.fetch_payout_account_for_seller(seller_id.trim()).await
    }

    /// Credits the net earning of the order to its seller's payout account, and returns the journal entries for the
    /// order.
    ///
    /// Crediting an order a second time changes nothing and returns the entries from the first credit. Subscribers to
    /// [`OrderCreditedEvent`] are only notified the first time. Commission lines may not be negative.
    pub async fn credit_order(&self, mut order: SellerOrder) -> Result<Vec<PayoutTransaction>, LedgerError> {
        order.currency_code = normalize_currency_code(&order.currency_code)?;
        if let Some(line) = order.commission_lines.iter().find(|l| l.amount.is_negative()) {
            return Err(LedgerError::ValidationError(format!(
                "Commission line for {} on order {} has a negative amount ({})",
                line.item_id, order.order_id, line.amount
            )));
        }
        let account = self
            .db
            .fetch_payout_account_for_seller(&order.seller_id)
            .await?
            .ok_or_else(|| LedgerError::SellerAccountNotFound(order.seller_id.clone()))?;
        let result = self.db.credit_order(account.id, &order).await?;
        let transactions = result.transactions();
        match result {
            CreditOrderResult::Credited(transaction, balance) => {
                info!(
                    "🏦️ Order {} credited {} {} to seller {}. Balance is now {}",
                    order.order_id, transaction.amount, order.currency_code, order.seller_id, balance.balance
                );
                let event = OrderCreditedEvent::new(order.seller_id, order.order_id, transaction, balance);
                self.call_order_credited_hook(event).await;
            },
            CreditOrderResult::AlreadyCredited(_) => {
                debug!("🏦️ Order {} was already credited to seller {}", order.order_id, order.seller_id);
            },
        }
        Ok(transactions)
    }

    async fn call_order_credited_hook(&self, event: OrderCreditedEvent) {
        for emitter in &self.producers.order_credited_producer {
            debug!("🏦️ Notifying order credited hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    /// Debits `amount` from the account's balance in `currency_code` and creates a pending payout for it.
    ///
    /// If the balance does not cover the full amount, [`LedgerError::InsufficientBalance`] is returned and nothing
    /// changes. There are no partial payouts.
    pub async fn authorize_payout(
        &self,
        account_id: i64,
        amount: MinorUnits,
        currency_code: &str,
    ) -> Result<Payout, LedgerError> {
        let currency_code = normalize_currency_code(currency_code)?;
        if !amount.is_positive() {
            return Err(LedgerError::ValidationError(format!("Payout amount must be positive, but was {amount}")));
        }
        let (payout, _journal) = self.db.debit_for_payout(account_id, amount, &currency_code).await?;
        info!("🏦️ Payout #{} of {amount} {currency_code} authorized for account #{account_id}", payout.id);
        self.call_payout_created_hook(&payout).await;
        Ok(payout)
    }

    /// An alias for [`Self::authorize_payout`].
    pub async fn create_payout(
        &self,
        account_id: i64,
        amount: MinorUnits,
        currency_code: &str,
    ) -> Result<Payout, LedgerError> {
        self.authorize_payout(account_id, amount, currency_code).await
    }

    async fn call_payout_created_hook(&self, payout: &Payout) {
        for emitter in &self.producers.payout_created_producer {
            debug!("🏦️ Notifying payout created hook subscribers");
            emitter.publish_event(PayoutCreatedEvent::new(payout.clone())).await;
        }
    }

    /// Marks a pending payout as paid. Paid is final.
    pub async fn mark_payout_paid(&self, payout_id: i64) -> Result<Payout, LedgerError> {
        let payout = self.db.settle_payout(payout_id, PayoutStatus::Paid).await?;
        info!("🏦️ Payout #{payout_id} marked as paid");
        Ok(payout)
    }

    /// Marks a pending payout as failed, and returns its amount to the account's balance.
    pub async fn mark_payout_failed(&self, payout_id: i64) -> Result<Payout, LedgerError> {
        let payout = self.db.settle_payout(payout_id, PayoutStatus::Failed).await?;
        warn!(
            "🏦️ Payout #{payout_id} failed. {} {} has been returned to account #{}",
            payout.amount, payout.currency_code, payout.account_id
        );
        Ok(payout)
    }

    /// The account's balance in one currency. Currencies the account has never held have a zero balance.
    pub async fn balance(&self, account_id: i64, currency_code: &str) -> Result<MinorUnits, LedgerError> {
        let currency_code = normalize_currency_code(currency_code)?;
        let balance = self.db.fetch_balance(account_id, &currency_code).await?;
        Ok(balance.map(|b| b.balance).unwrap_or_default())
    }

    pub async fn balances(&self, account_id: i64) -> Result<Vec<PayoutBalance>, LedgerError> {
        self.db.fetch_balances(account_id).await
    }

    pub async fn transactions(&self, account_id: i64) -> Result<Vec<PayoutTransaction>, LedgerError> {
        self.db.fetch_transactions(account_id).await
    }

    pub async fn payouts(&self, account_id: i64) -> Result<Vec<Payout>, LedgerError> {
        self.db.fetch_payouts(account_id).await
    }

    pub async fn payout(&self, payout_id: i64) -> Result<Option<Payout>, LedgerError> {
        self.db.fetch_payout(payout_id).await
    }

    /// The commission lines that were deducted when the order was credited to the account.
    pub async fn commission_lines_for_order(
        &self,
        account_id: i64,
        order_id: &str,
    ) -> Result<Vec<RecordedCommissionLine>, LedgerError> {
        self.db.fetch_commission_lines_for_order(account_id, order_id).await
    }

    /// Collects the balances, journal and payouts of an account.
    pub async fn statement(&self, account_id: i64) -> Result<AccountStatement, LedgerError> {
        let account =
            self.db.fetch_payout_account(account_id).await?.ok_or(LedgerError::AccountNotFound(account_id))?;
        let balances = self.db.fetch_balances(account_id).await?;
        let transactions = self.db.fetch_transactions(account_id).await?;
        let payouts = self.db.fetch_payouts(account_id).await?;
        trace!(
            "🏦️ Statement for account #{account_id}: {} balances, {} transactions, {} payouts",
            balances.len(),
            transactions.len(),
            payouts.len()
        );
        Ok(AccountStatement::new(account).with_balances(balances).with_transactions(transactions).with_payouts(payouts))
    }
}
