use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{
    CommissionLine,
    NewPayoutTransaction,
    PayoutTransaction,
    RecordedCommissionLine,
    TransactionReference,
};

/// Appends a transaction to the journal. This function is idempotent due to the uniqueness constraint on
/// `(reference, reference_id, account_id)`: if the transaction already exists, nothing is written and `None` is
/// returned.
pub async fn idempotent_insert(
    transaction: NewPayoutTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutTransaction>, sqlx::Error> {
    let result: Option<PayoutTransaction> = sqlx::query_as(
        r#"
            INSERT INTO payout_transactions (account_id, currency_code, amount, reference, reference_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (reference, reference_id, account_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(transaction.account_id)
    .bind(transaction.currency_code.as_str())
    .bind(transaction.amount)
    .bind(transaction.reference)
    .bind(transaction.reference_id.as_str())
    .fetch_all(conn)
    .await?
    .pop();
    match &result {
        Some(tx) => trace!(
            "🗃️ Journal entry #{} recorded: {} {} for {} {}",
            tx.id,
            tx.amount,
            tx.currency_code,
            tx.reference,
            tx.reference_id
        ),
        None => debug!(
            "🗃️ Journal entry for {} {} on account #{} already exists",
            transaction.reference, transaction.reference_id, transaction.account_id
        ),
    }
    Ok(result)
}

pub async fn fetch_transactions(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_transactions WHERE account_id = ? ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_transactions_for_reference(
    reference: TransactionReference,
    reference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_transactions WHERE reference = ? AND reference_id = ? ORDER BY id ASC")
        .bind(reference)
        .bind(reference_id)
        .fetch_all(conn)
        .await
}

/// Stores value copies of an order's commission lines against the journal entry that credited the order.
pub async fn insert_commission_lines(
    transaction_id: i64,
    order_id: &str,
    currency_code: &str,
    lines: &[CommissionLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<RecordedCommissionLine>, sqlx::Error> {
    let mut result = Vec::with_capacity(lines.len());
    for line in lines {
        let recorded: RecordedCommissionLine = sqlx::query_as(
            r#"
                INSERT INTO commission_lines (transaction_id, order_id, item_id, code, rate, amount, currency_code)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING *;
            "#,
        )
        .bind(transaction_id)
        .bind(order_id)
        .bind(line.item_id.as_str())
        .bind(line.code.as_str())
        .bind(line.rate)
        .bind(line.amount)
        .bind(currency_code)
        .fetch_one(&mut *conn)
        .await?;
        result.push(recorded);
    }
    Ok(result)
}

/// The commission lines for an order, scoped to the account the order was credited to. Split orders share an order
/// id across sellers.
pub async fn fetch_commission_lines_for_order(
    account_id: i64,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<RecordedCommissionLine>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT commission_lines.* FROM commission_lines
            JOIN payout_transactions ON payout_transactions.id = commission_lines.transaction_id
            WHERE payout_transactions.account_id = ? AND commission_lines.order_id = ?
            ORDER BY commission_lines.id ASC;
        "#,
    )
    .bind(account_id)
    .bind(order_id)
    .fetch_all(conn)
    .await
}
