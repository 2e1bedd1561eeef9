use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{MinorUnits, Payout, PayoutAccount, PayoutBalance, PayoutStatus};

/// Creates the payout account for the seller if it does not exist yet. The boolean is `true` if a new account was
/// created.
pub async fn idempotent_insert_account(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(PayoutAccount, bool), sqlx::Error> {
    let inserted: Option<PayoutAccount> = sqlx::query_as(
        "INSERT INTO payout_accounts (seller_id) VALUES (?) ON CONFLICT (seller_id) DO NOTHING RETURNING *",
    )
    .bind(seller_id)
    .fetch_all(&mut *conn)
    .await?
    .pop();
    match inserted {
        Some(account) => {
            debug!("🗃️ Created payout account #{} for seller {seller_id}", account.id);
            Ok((account, true))
        },
        None => {
            let account = sqlx::query_as("SELECT * FROM payout_accounts WHERE seller_id = ?")
                .bind(seller_id)
                .fetch_one(conn)
                .await?;
            Ok((account, false))
        },
    }
}

pub async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<PayoutAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_accounts WHERE id = ?").bind(account_id).fetch_optional(conn).await
}

pub async fn fetch_account_for_seller(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_accounts WHERE seller_id = ?").bind(seller_id).fetch_optional(conn).await
}

pub async fn fetch_balance(
    account_id: i64,
    currency_code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutBalance>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_balances WHERE account_id = ? AND currency_code = ?")
        .bind(account_id)
        .bind(currency_code)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_balances(account_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PayoutBalance>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_balances WHERE account_id = ? ORDER BY currency_code ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await
}

/// Atomically adds `amount` to the balance, creating the balance row if the account has never held the currency.
pub async fn increment_balance(
    account_id: i64,
    currency_code: &str,
    amount: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<PayoutBalance, sqlx::Error> {
    let balance: PayoutBalance = sqlx::query_as(
        r#"
            INSERT INTO payout_balances (account_id, currency_code, balance) VALUES (?, ?, ?)
            ON CONFLICT (account_id, currency_code) DO UPDATE
                SET balance = balance + excluded.balance, updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(account_id)
    .bind(currency_code)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Balance of account #{account_id} incremented by {amount} {currency_code} to {}", balance.balance);
    Ok(balance)
}

/// Atomically subtracts `amount` from the balance, but only if the balance covers it in full.
///
/// Returns `None`, and changes nothing, if the balance is too small or does not exist.
pub async fn try_debit_balance(
    account_id: i64,
    currency_code: &str,
    amount: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutBalance>, sqlx::Error> {
    let balance: Option<PayoutBalance> = sqlx::query_as(
        r#"
            UPDATE payout_balances SET balance = balance - ?, updated_at = CURRENT_TIMESTAMP
            WHERE account_id = ? AND currency_code = ? AND balance >= ?
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(account_id)
    .bind(currency_code)
    .bind(amount)
    .fetch_all(conn)
    .await?
    .pop();
    match &balance {
        Some(b) => trace!("🗃️ Debited {amount} {currency_code} from account #{account_id}. {} remains", b.balance),
        None => trace!("🗃️ Could not debit {amount} {currency_code} from account #{account_id}"),
    }
    Ok(balance)
}

pub async fn insert_payout(
    account_id: i64,
    amount: MinorUnits,
    currency_code: &str,
    conn: &mut SqliteConnection,
) -> Result<Payout, sqlx::Error> {
    sqlx::query_as("INSERT INTO payouts (account_id, amount, currency_code) VALUES (?, ?, ?) RETURNING *")
        .bind(account_id)
        .bind(amount)
        .bind(currency_code)
        .fetch_one(conn)
        .await
}

pub async fn fetch_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE id = ?").bind(payout_id).fetch_optional(conn).await
}

pub async fn fetch_payouts(account_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE account_id = ? ORDER BY id ASC").bind(account_id).fetch_all(conn).await
}

/// Moves a `Pending` payout to `status`. Returns `None` if the payout does not exist or is no longer pending.
pub async fn settle_pending_payout(
    payout_id: i64,
    status: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payouts SET status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payout_id)
    .fetch_all(conn)
    .await
    .map(|mut rows| rows.pop())
}
