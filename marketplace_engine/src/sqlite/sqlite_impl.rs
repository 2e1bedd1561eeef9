//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{new_pool, payouts, rates, transactions};
use crate::{
    config::EngineConfig,
    db_types::{
        CommissionRate,
        CommissionRule,
        MinorUnits,
        NewCommissionRate,
        NewCommissionRule,
        NewPayoutTransaction,
        Payout,
        PayoutAccount,
        PayoutBalance,
        PayoutStatus,
        PayoutTransaction,
        RecordedCommissionLine,
        SellerOrder,
        TransactionReference,
    },
    rate_objects::{RateQueryFilter, UpdateCommissionRate},
    traits::{CommissionApiError, CommissionRateManagement, CreditOrderResult, LedgerError, PayoutManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CommissionRateManagement for SqliteDatabase {
    async fn insert_rate(&self, rate: NewCommissionRate) -> Result<CommissionRate, CommissionApiError> {
        let mut tx = self.pool.begin().await?;
        let stored = rates::insert_rate(&rate, &mut tx).await?;
        let rules = rates::insert_rules(stored.id, &rate.rules, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Commission rate '{}' saved with id {} and {} rules", stored.code, stored.id, rules.len());
        Ok(stored.with_rules(rules))
    }

    async fn fetch_rate(&self, id: i64) -> Result<Option<CommissionRate>, CommissionApiError> {
        let mut conn = self.pool.acquire().await?;
        let rate = rates::fetch_rate(id, &mut conn).await?;
        Ok(rate)
    }

    async fn fetch_rate_by_code(&self, code: &str) -> Result<Option<CommissionRate>, CommissionApiError> {
        let mut conn = self.pool.acquire().await?;
        let rate = rates::fetch_rate_by_code(code, &mut conn).await?;
        Ok(rate)
    }

    async fn search_rates(&self, query: RateQueryFilter) -> Result<Vec<CommissionRate>, CommissionApiError> {
        let mut conn = self.pool.acquire().await?;
        let rates = rates::search_rates(query, &mut conn).await?;
        Ok(rates)
    }

    async fn update_rate(&self, id: i64, update: UpdateCommissionRate) -> Result<CommissionRate, CommissionApiError> {
        let mut tx = self.pool.begin().await?;
        let rate = rates::update_rate(id, &update, &mut tx)
            .await?
            .ok_or_else(|| CommissionApiError::RateNotFound(id.to_string()))?;
        let rules = match &update.rules {
            Some(new_rules) => {
                let old = rates::delete_rules_for_rate(id, &mut tx).await?;
                trace!("🗃️ Replacing {} rules on rate #{id} with {}", old.len(), new_rules.len());
                rates::insert_rules(id, new_rules, &mut tx).await?
            },
            None => rates::fetch_rules_for_rates(&[id], &mut tx).await?.remove(&id).unwrap_or_default(),
        };
        tx.commit().await?;
        debug!("🗃️ Commission rate #{id} updated");
        Ok(rate.with_rules(rules))
    }

    async fn add_rule(&self, rate_id: i64, rule: NewCommissionRule) -> Result<CommissionRule, CommissionApiError> {
        let mut tx = self.pool.begin().await?;
        if !rates::touch_rate(rate_id, &mut tx).await? {
            return Err(CommissionApiError::RateNotFound(rate_id.to_string()));
        }
        let mut rules = rates::insert_rules(rate_id, &[rule], &mut tx).await?;
        tx.commit().await?;
        let rule = rules.pop().ok_or_else(|| CommissionApiError::DatabaseError("Rule was not inserted".into()))?;
        debug!("🗃️ Rule #{} ({} = {}) added to rate #{rate_id}", rule.id, rule.reference, rule.reference_id);
        Ok(rule)
    }

    async fn remove_rule(&self, rule_id: i64) -> Result<(), CommissionApiError> {
        let mut tx = self.pool.begin().await?;
        let rule = rates::delete_rule(rule_id, &mut tx).await?.ok_or(CommissionApiError::RuleNotFound(rule_id))?;
        rates::touch_rate(rule.rate_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Rule #{rule_id} removed from rate #{}", rule.rate_id);
        Ok(())
    }

    async fn delete_rate(&self, id: i64) -> Result<CommissionRate, CommissionApiError> {
        let mut tx = self.pool.begin().await?;
        let rate =
            rates::delete_rate(id, &mut tx).await?.ok_or_else(|| CommissionApiError::RateNotFound(id.to_string()))?;
        tx.commit().await?;
        debug!("🗃️ Commission rate #{id} ({}) deleted", rate.code);
        Ok(rate)
    }

    async fn close(&mut self) -> Result<(), CommissionApiError> {
        self.pool.close().await;
        Ok(())
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn create_payout_account(&self, seller_id: &str) -> Result<PayoutAccount, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let (account, created) = payouts::idempotent_insert_account(seller_id, &mut tx).await?;
        tx.commit().await?;
        if created {
            debug!("🗃️ Payout account #{} committed for seller {seller_id}", account.id);
        }
        Ok(account)
    }

    async fn fetch_payout_account(&self, account_id: i64) -> Result<Option<PayoutAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = payouts::fetch_account(account_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_payout_account_for_seller(&self, seller_id: &str) -> Result<Option<PayoutAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = payouts::fetch_account_for_seller(seller_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_balance(&self, account_id: i64, currency_code: &str) -> Result<Option<PayoutBalance>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let balance = payouts::fetch_balance(account_id, currency_code, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_balances(&self, account_id: i64) -> Result<Vec<PayoutBalance>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let balances = payouts::fetch_balances(account_id, &mut conn).await?;
        Ok(balances)
    }

    async fn fetch_transactions(&self, account_id: i64) -> Result<Vec<PayoutTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let transactions = transactions::fetch_transactions(account_id, &mut conn).await?;
        Ok(transactions)
    }

    async fn fetch_transactions_for_reference(
        &self,
        reference: TransactionReference,
        reference_id: &str,
    ) -> Result<Vec<PayoutTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let transactions = transactions::fetch_transactions_for_reference(reference, reference_id, &mut conn).await?;
        Ok(transactions)
    }

    async fn fetch_payouts(&self, account_id: i64) -> Result<Vec<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let payouts = payouts::fetch_payouts(account_id, &mut conn).await?;
        Ok(payouts)
    }

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<Payout>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::fetch_payout(payout_id, &mut conn).await?;
        Ok(payout)
    }

    async fn fetch_commission_lines_for_order(
        &self,
        account_id: i64,
        order_id: &str,
    ) -> Result<Vec<RecordedCommissionLine>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let lines = transactions::fetch_commission_lines_for_order(account_id, order_id, &mut conn).await?;
        Ok(lines)
    }

    /// Takes a confirmed seller order, and in a single atomic transaction,
    /// * appends the `order` journal entry for the net earning. If the entry already exists, the transaction is
    ///   abandoned and the existing entries are returned.
    /// * increments the account's balance in the order currency.
    /// * records the commission lines that were deducted.
    async fn credit_order(&self, account_id: i64, order: &SellerOrder) -> Result<CreditOrderResult, LedgerError> {
        let overflow = || LedgerError::ValidationError(format!("The amounts on order {} overflow", order.order_id));
        let commission = order.commission_total().ok_or_else(overflow)?;
        let net = order.total.checked_sub(commission).ok_or_else(overflow)?;
        if net.is_negative() {
            let order_id = order.order_id.clone();
            return Err(LedgerError::NegativeNetEarning { order_id, total: order.total, commission });
        }
        let entry = NewPayoutTransaction::new(
            account_id,
            order.currency_code.as_str(),
            net,
            TransactionReference::Order,
            order.order_id.as_str(),
        );
        let mut tx = self.pool.begin().await?;
        let inserted = transactions::idempotent_insert(entry, &mut tx).await.map_err(|e| match e {
            sqlx::Error::Database(err) if err.is_foreign_key_violation() => LedgerError::AccountNotFound(account_id),
            _ => LedgerError::from(e),
        })?;
        let Some(journal) = inserted else {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            let existing =
                transactions::fetch_transactions_for_reference(TransactionReference::Order, &order.order_id, &mut conn)
                    .await?
                    .into_iter()
                    .filter(|t| t.account_id == account_id)
                    .collect();
            info!("🗃️ Order {} has already been credited to account #{account_id}", order.order_id);
            return Ok(CreditOrderResult::AlreadyCredited(existing));
        };
        let balance = payouts::increment_balance(account_id, &order.currency_code, net, &mut tx).await?;
        let lines = transactions::insert_commission_lines(
            journal.id,
            &order.order_id,
            &order.currency_code,
            &order.commission_lines,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {} credited {net} {} to account #{account_id} ({} commission lines recorded)",
            order.order_id,
            order.currency_code,
            lines.len()
        );
        Ok(CreditOrderResult::Credited(journal, balance))
    }

    /// Takes a payout request, and in a single atomic transaction,
    /// * debits the balance, on condition that it covers the full amount. Otherwise nothing is changed, and the
    ///   balance the decision was made on is reported in the error.
    /// * creates the `Pending` payout record.
    /// * appends a negative `payout` journal entry.
    async fn debit_for_payout(
        &self,
        account_id: i64,
        amount: MinorUnits,
        currency_code: &str,
    ) -> Result<(Payout, PayoutTransaction), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValidationError(format!("Payout amount must be positive, but was {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        if payouts::try_debit_balance(account_id, currency_code, amount, &mut tx).await?.is_none() {
            // Still inside the write transaction, so no other writer can have moved the balance since the debit failed
            let account = payouts::fetch_account(account_id, &mut tx).await?;
            let balance = payouts::fetch_balance(account_id, currency_code, &mut tx).await?;
            let available = balance.map(|b| b.balance).unwrap_or_default();
            tx.rollback().await?;
            if account.is_none() {
                return Err(LedgerError::AccountNotFound(account_id));
            }
            warn!(
                "🗃️ Payout of {amount} {currency_code} from account #{account_id} rejected. Only {available} is \
                 available"
            );
            return Err(LedgerError::InsufficientBalance {
                account_id,
                currency_code: currency_code.to_string(),
                requested: amount,
                available,
            });
        }
        let payout = payouts::insert_payout(account_id, amount, currency_code, &mut tx).await?;
        let entry = NewPayoutTransaction::new(
            account_id,
            currency_code,
            -amount,
            TransactionReference::Payout,
            payout.id.to_string(),
        );
        let journal = transactions::idempotent_insert(entry, &mut tx).await?.ok_or_else(|| {
            LedgerError::DatabaseError(format!("A journal entry for payout #{} already exists", payout.id))
        })?;
        tx.commit().await?;
        debug!("🗃️ Payout #{} of {amount} {currency_code} created for account #{account_id}", payout.id);
        Ok((payout, journal))
    }

    async fn settle_payout(&self, payout_id: i64, status: PayoutStatus) -> Result<Payout, LedgerError> {
        if status == PayoutStatus::Pending {
            return Err(LedgerError::ValidationError("A payout cannot be settled as Pending".into()));
        }
        let mut tx = self.pool.begin().await?;
        let Some(payout) = payouts::settle_pending_payout(payout_id, status, &mut tx).await? else {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            return match payouts::fetch_payout(payout_id, &mut conn).await? {
                Some(existing) => Err(LedgerError::PayoutAlreadySettled(payout_id, existing.status)),
                None => Err(LedgerError::PayoutNotFound(payout_id)),
            };
        };
        if status == PayoutStatus::Failed {
            let balance = payouts::increment_balance(payout.account_id, &payout.currency_code, payout.amount, &mut tx)
                .await?;
            let entry = NewPayoutTransaction::new(
                payout.account_id,
                payout.currency_code.as_str(),
                payout.amount,
                TransactionReference::PayoutReversal,
                payout_id.to_string(),
            );
            transactions::idempotent_insert(entry, &mut tx).await?;
            debug!(
                "🗃️ Payout #{payout_id} failed. {} {} returned to account #{}; balance is now {}",
                payout.amount, payout.currency_code, payout.account_id, balance.balance
            );
        }
        tx.commit().await?;
        Ok(payout)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, configured from the environment
    pub async fn new() -> Result<Self, sqlx::Error> {
        let config = EngineConfig::from_env_or_default();
        SqliteDatabase::new_with_config(&config).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let config = EngineConfig::new(url).with_max_connections(max_connections);
        SqliteDatabase::new_with_config(&config).await
    }

    pub async fn new_with_config(config: &EngineConfig) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {}", config.database_url);
        let pool = new_pool(config).await?;
        let url = config.database_url.clone();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Migrations that have already been applied are skipped.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
