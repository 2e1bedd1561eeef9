use std::collections::HashMap;

use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{CommissionRate, CommissionRule, NewCommissionRate, NewCommissionRule},
    rate_objects::{RateQueryFilter, UpdateCommissionRate},
    traits::CommissionApiError,
};

fn code_conflict(code: &str) -> impl FnOnce(sqlx::Error) -> CommissionApiError + '_ {
    move |e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            CommissionApiError::CodeAlreadyExists(code.to_string())
        },
        _ => CommissionApiError::from(e),
    }
}

/// Inserts the rate row only. Rules are stored separately with [`insert_rules`].
pub async fn insert_rate(
    rate: &NewCommissionRate,
    conn: &mut SqliteConnection,
) -> Result<CommissionRate, CommissionApiError> {
    let result: CommissionRate = sqlx::query_as(
        r#"
            INSERT INTO commission_rates
                (name, code, rate_type, target, value, currency_code, min_amount, include_tax, is_enabled, priority)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(rate.name.as_str())
    .bind(rate.code.as_str())
    .bind(rate.rate_type)
    .bind(rate.target)
    .bind(rate.value)
    .bind(rate.currency_code.clone())
    .bind(rate.min_amount)
    .bind(rate.include_tax)
    .bind(rate.is_enabled)
    .bind(rate.priority)
    .fetch_one(conn)
    .await
    .map_err(code_conflict(&rate.code))?;
    trace!("🗃️ Inserted commission rate #{} ({})", result.id, result.code);
    Ok(result)
}

/// Inserts the rules for a rate. Rules that the rate already has are not duplicated; the existing row is returned in
/// their place.
pub async fn insert_rules(
    rate_id: i64,
    rules: &[NewCommissionRule],
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRule>, sqlx::Error> {
    let mut result = Vec::with_capacity(rules.len());
    for rule in rules {
        let rule: CommissionRule = sqlx::query_as(
            r#"
                INSERT INTO commission_rules (rate_id, reference, reference_id) VALUES (?, ?, ?)
                ON CONFLICT (rate_id, reference, reference_id) DO UPDATE SET reference_id = excluded.reference_id
                RETURNING *;
            "#,
        )
        .bind(rate_id)
        .bind(rule.reference)
        .bind(rule.reference_id.as_str())
        .fetch_one(&mut *conn)
        .await?;
        result.push(rule);
    }
    Ok(result)
}

pub async fn delete_rules_for_rate(
    rate_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRule>, sqlx::Error> {
    sqlx::query_as("DELETE FROM commission_rules WHERE rate_id = ? RETURNING *").bind(rate_id).fetch_all(conn).await
}

pub async fn delete_rule(rule_id: i64, conn: &mut SqliteConnection) -> Result<Option<CommissionRule>, sqlx::Error> {
    let deleted: Vec<CommissionRule> =
        sqlx::query_as("DELETE FROM commission_rules WHERE id = ? RETURNING *").bind(rule_id).fetch_all(conn).await?;
    Ok(deleted.into_iter().next())
}

/// Bumps `updated_at` on the rate. Returns `false` if the rate does not exist.
pub async fn touch_rate(rate_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE commission_rates SET updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(rate_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_rules_for_rates(
    rate_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, Vec<CommissionRule>>, sqlx::Error> {
    let mut result: HashMap<i64, Vec<CommissionRule>> = HashMap::new();
    if rate_ids.is_empty() {
        return Ok(result);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM commission_rules WHERE rate_id IN (");
    let mut ids = builder.separated(", ");
    for id in rate_ids {
        ids.push_bind(*id);
    }
    builder.push(") ORDER BY id ASC");
    let rules = builder.build_query_as::<CommissionRule>().fetch_all(conn).await?;
    for rule in rules {
        result.entry(rule.rate_id).or_default().push(rule);
    }
    Ok(result)
}

/// Loads the rules for each of the given rates.
pub async fn attach_rules(
    rates: Vec<CommissionRate>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRate>, sqlx::Error> {
    let ids = rates.iter().map(|r| r.id).collect::<Vec<i64>>();
    let mut rules = fetch_rules_for_rates(&ids, conn).await?;
    let rates = rates
        .into_iter()
        .map(|rate| {
            let rate_rules = rules.remove(&rate.id).unwrap_or_default();
            rate.with_rules(rate_rules)
        })
        .collect();
    Ok(rates)
}

pub async fn fetch_rate(id: i64, conn: &mut SqliteConnection) -> Result<Option<CommissionRate>, sqlx::Error> {
    let rate: Option<CommissionRate> =
        sqlx::query_as("SELECT * FROM commission_rates WHERE id = ?").bind(id).fetch_optional(&mut *conn).await?;
    match rate {
        Some(rate) => Ok(attach_rules(vec![rate], conn).await?.pop()),
        None => Ok(None),
    }
}

pub async fn fetch_rate_by_code(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRate>, sqlx::Error> {
    let rate: Option<CommissionRate> =
        sqlx::query_as("SELECT * FROM commission_rates WHERE code = ?").bind(code).fetch_optional(&mut *conn).await?;
    match rate {
        Some(rate) => Ok(attach_rules(vec![rate], conn).await?.pop()),
        None => Ok(None),
    }
}

pub async fn search_rates(
    query: RateQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRate>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
    SELECT * FROM commission_rates
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(code) = query.code {
        where_clause.push("code = ");
        where_clause.push_bind_unseparated(code);
    }
    if let Some(target) = query.target {
        where_clause.push("target = ");
        where_clause.push_bind_unseparated(target);
    }
    if let Some(currency) = query.currency_code {
        if query.include_currency_fallback {
            where_clause.push("(currency_code IS NULL OR currency_code = ");
            where_clause.push_bind_unseparated(currency);
            where_clause.push_unseparated(")");
        } else {
            where_clause.push("currency_code = ");
            where_clause.push_bind_unseparated(currency);
        }
    }
    if let Some(enabled) = query.is_enabled {
        where_clause.push("is_enabled = ");
        where_clause.push_bind_unseparated(enabled);
    }
    builder.push(" ORDER BY id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let rates = builder.build_query_as::<CommissionRate>().fetch_all(&mut *conn).await?;
    trace!("🗃️ Result of search_rates: {} rates", rates.len());
    attach_rules(rates, conn).await
}

/// Applies the scalar fields of the update to the rate row. The rules are not touched.
///
/// Returns `None` if the rate does not exist.
pub async fn update_rate(
    id: i64,
    update: &UpdateCommissionRate,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRate>, CommissionApiError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE commission_rates SET ");
    let mut set_clause = builder.separated(", ");
    set_clause.push("updated_at = CURRENT_TIMESTAMP");
    if let Some(name) = &update.name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name.clone());
    }
    if let Some(code) = &update.code {
        set_clause.push("code = ");
        set_clause.push_bind_unseparated(code.clone());
    }
    if let Some(rate_type) = update.rate_type {
        set_clause.push("rate_type = ");
        set_clause.push_bind_unseparated(rate_type);
    }
    if let Some(target) = update.target {
        set_clause.push("target = ");
        set_clause.push_bind_unseparated(target);
    }
    if let Some(value) = update.value {
        set_clause.push("value = ");
        set_clause.push_bind_unseparated(value);
    }
    if let Some(currency_code) = &update.currency_code {
        set_clause.push("currency_code = ");
        set_clause.push_bind_unseparated(currency_code.clone());
    }
    if let Some(min_amount) = update.min_amount {
        set_clause.push("min_amount = ");
        set_clause.push_bind_unseparated(min_amount);
    }
    if let Some(include_tax) = update.include_tax {
        set_clause.push("include_tax = ");
        set_clause.push_bind_unseparated(include_tax);
    }
    if let Some(is_enabled) = update.is_enabled {
        set_clause.push("is_enabled = ");
        set_clause.push_bind_unseparated(is_enabled);
    }
    if let Some(priority) = update.priority {
        set_clause.push("priority = ");
        set_clause.push_bind_unseparated(priority);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let code = update.code.clone().unwrap_or_default();
    let rate = builder
        .build_query_as::<CommissionRate>()
        .fetch_all(conn)
        .await
        .map_err(code_conflict(&code))?
        .pop();
    Ok(rate)
}

/// Deletes the rate and its rules, returning the deleted rate with its rules attached.
pub async fn delete_rate(id: i64, conn: &mut SqliteConnection) -> Result<Option<CommissionRate>, sqlx::Error> {
    let rules = delete_rules_for_rate(id, &mut *conn).await?;
    let deleted: Vec<CommissionRate> =
        sqlx::query_as("DELETE FROM commission_rates WHERE id = ? RETURNING *").bind(id).fetch_all(conn).await?;
    Ok(deleted.into_iter().next().map(|r| r.with_rules(rules)))
}
