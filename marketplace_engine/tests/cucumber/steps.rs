use cucumber::{gherkin::Step, given, then, when};
use marketplace_engine::{
    commission::{Candidate, CandidateProduct, ResolveCommissionRequest},
    db_types::{
        CommissionLine,
        CommissionTarget,
        CommissionType,
        MinorUnits,
        NewCommissionRate,
        NewCommissionRule,
        PayoutStatus,
        SellerOrder,
    },
    LedgerError,
};

use crate::cucumber::MarketplaceWorld;

/// Returns the data rows of the step's table as `(header, value)` pairs, skipping blank and `-` cells.
fn table_rows(step: &Step) -> Vec<Vec<(String, String)>> {
    let table = step.table.as_ref().expect("This step needs a table");
    let (header, rows) = table.rows.split_first().expect("The table needs a header row");
    rows.iter()
        .map(|row| {
            header
                .iter()
                .zip(row.iter())
                .filter(|(_, v)| !v.trim().is_empty() && v.trim() != "-")
                .map(|(h, v)| (h.trim().to_string(), v.trim().to_string()))
                .collect()
        })
        .collect()
}

fn parse_rule(rule: &str) -> NewCommissionRule {
    let (reference, id) = rule.split_once(':').expect("Rules are written as reference:id");
    NewCommissionRule::new(reference.trim().parse().expect("Not a valid rule reference"), id.trim())
}

#[given("the commission rates")]
async fn create_rates(world: &mut MarketplaceWorld, step: &Step) {
    for row in table_rows(step) {
        let field = |name: &str| row.iter().find(|(h, _)| h == name).map(|(_, v)| v.as_str());
        let code = field("code").expect("A rate needs a code");
        let rate_type: CommissionType = field("type").expect("A rate needs a type").parse().expect("Invalid type");
        let target: CommissionTarget = field("target").unwrap_or("item").parse().expect("Invalid target");
        let value: f64 = field("value").expect("A rate needs a value").parse().expect("Invalid value");
        let mut rate = NewCommissionRate::new(code, rate_type, target, value);
        if let Some(currency) = field("currency") {
            rate = rate.with_currency(currency);
        }
        if let Some(min_amount) = field("min_amount") {
            rate = rate.with_min_amount(min_amount.parse().expect("Invalid min_amount"));
        }
        if field("include_tax") == Some("yes") {
            rate = rate.with_tax_included();
        }
        if let Some(priority) = field("priority") {
            rate = rate.with_priority(priority.parse().expect("Invalid priority"));
        }
        if field("enabled") == Some("no") {
            rate = rate.disabled();
        }
        for rule in field("rules").map(|r| r.split(',').collect::<Vec<_>>()).unwrap_or_default() {
            rate = rate.with_rule(parse_rule(rule));
        }
        world.commission().create_rate(rate).await.expect("Error creating rate");
    }
}

#[given("the order items")]
async fn order_items(world: &mut MarketplaceWorld, step: &Step) {
    for row in table_rows(step) {
        let field = |name: &str| row.iter().find(|(h, _)| h == name).map(|(_, v)| v.as_str());
        let id = field("id").expect("An item needs an id");
        let subtotal = field("subtotal").expect("An item needs a subtotal").parse().expect("Invalid subtotal");
        let mut item = Candidate::new(id, subtotal);
        if let Some(tax) = field("tax") {
            item = item.with_tax(tax.parse().expect("Invalid tax"));
        }
        let mut product = CandidateProduct::new(field("product").unwrap_or_default());
        if let Some(seller) = field("seller") {
            product = product.with_seller(seller);
        }
        if let Some(type_id) = field("product_type") {
            product = product.with_type(type_id);
        }
        for category in field("categories").map(|c| c.split(',').collect::<Vec<_>>()).unwrap_or_default() {
            product = product.with_category(category.trim());
        }
        item = item.with_product(product);
        world.request_mut().items.push(item);
    }
}

#[given("the shipping methods")]
async fn shipping_methods(world: &mut MarketplaceWorld, step: &Step) {
    for row in table_rows(step) {
        let field = |name: &str| row.iter().find(|(h, _)| h == name).map(|(_, v)| v.as_str());
        let id = field("id").expect("A shipping method needs an id");
        let subtotal = field("subtotal").expect("A shipping method needs a subtotal");
        let subtotal = subtotal.parse().expect("Invalid subtotal");
        let mut method = Candidate::new(id, subtotal);
        if let Some(option_type) = field("option_type") {
            method = method.with_shipping_option_type(option_type);
        }
        if let Some(seller) = field("seller") {
            method = method.with_shipping_seller(seller);
        }
        world.request_mut().shipping_methods.push(method);
    }
}

#[when(expr = "I resolve the commissions in {string}")]
async fn resolve_commissions(world: &mut MarketplaceWorld, currency: String) {
    let mut request = world.request.take().unwrap_or_else(|| ResolveCommissionRequest::new(currency.as_str()));
    request.currency_code = currency;
    world.lines = world.commission().resolve(request).await.expect("Error resolving commissions");
}

#[then("the commission lines are")]
async fn check_lines(world: &mut MarketplaceWorld, step: &Step) {
    let expected = table_rows(step)
        .into_iter()
        .map(|row| {
            let field = |name: &str| {
                row.iter().find(|(h, _)| h == name).map(|(_, v)| v.clone()).unwrap_or_else(|| panic!("{name} missing"))
            };
            let amount: i64 = field("amount").parse().expect("Invalid amount");
            (field("item_id"), field("code"), amount)
        })
        .collect::<Vec<_>>();
    let actual = world.lines.iter().map(|l| (l.item_id.clone(), l.code.clone(), l.amount.value())).collect::<Vec<_>>();
    assert_eq!(actual, expected);
}

#[then("there are no commission lines")]
async fn check_no_lines(world: &mut MarketplaceWorld) {
    assert!(world.lines.is_empty(), "Expected no lines, but got {:?}", world.lines);
}

#[given(expr = "seller {string} has a payout account")]
async fn open_account(world: &mut MarketplaceWorld, seller_id: String) {
    world.ledger().open_account(&seller_id).await.expect("Error opening account");
}

async fn account_id(world: &MarketplaceWorld, seller_id: &str) -> i64 {
    world
        .ledger()
        .account_for_seller(seller_id)
        .await
        .expect("Error fetching account")
        .unwrap_or_else(|| panic!("Seller {seller_id} has no payout account"))
        .id
}

#[when(expr = "order {string} for {int} {word} is credited to seller {string} with {int} commission")]
async fn credit_order(
    world: &mut MarketplaceWorld,
    order_id: String,
    total: i64,
    currency: String,
    seller_id: String,
    commission: i64,
) {
    let line = CommissionLine {
        item_id: format!("{order_id}-item"),
        code: "default".into(),
        rate: 0.0,
        amount: MinorUnits::from(commission),
    };
    let order =
        SellerOrder::new(order_id, seller_id, currency, MinorUnits::from(total)).with_commission_lines(vec![line]);
    world.last_credit = Some(world.ledger().credit_order(order).await);
}

#[then(expr = "the credit is rejected because {word}")]
async fn credit_rejected(world: &mut MarketplaceWorld, reason: String) {
    match (reason.as_str(), &world.last_credit) {
        ("commissions_exceed_total", Some(Err(LedgerError::NegativeNetEarning { .. }))) => {},
        ("no_account", Some(Err(LedgerError::SellerAccountNotFound(_)))) => {},
        (reason, result) => panic!("Expected a rejection because {reason}, got {result:?}"),
    }
}

#[when(expr = "seller {string} requests a payout of {int} {word}")]
async fn request_payout(world: &mut MarketplaceWorld, seller_id: String, amount: i64, currency: String) {
    let account_id = account_id(world, &seller_id).await;
    world.last_payout = Some(world.ledger().create_payout(account_id, MinorUnits::from(amount), &currency).await);
}

#[then("the payout is rejected for insufficient balance")]
async fn payout_rejected(world: &mut MarketplaceWorld) {
    assert!(
        matches!(world.last_payout, Some(Err(LedgerError::InsufficientBalance { .. }))),
        "Expected InsufficientBalance, got {:?}",
        world.last_payout
    );
}

#[when(expr = "the payout is marked as {word}")]
async fn settle_payout(world: &mut MarketplaceWorld, status: String) {
    let payout_id = world.last_payout_id();
    let payout = match status.as_str() {
        "paid" => world.ledger().mark_payout_paid(payout_id).await,
        "failed" => world.ledger().mark_payout_failed(payout_id).await,
        s => panic!("Unknown payout status {s}"),
    };
    world.last_payout = Some(payout);
}

#[then(expr = "the payout is {word}")]
async fn check_payout_status(world: &mut MarketplaceWorld, status: String) {
    let expected: PayoutStatus = status.parse().expect("Not a valid payout status");
    match &world.last_payout {
        Some(Ok(payout)) => assert_eq!(payout.status, expected),
        other => panic!("Expected a {expected} payout, got {other:?}"),
    }
}

#[then(expr = "the {word} balance of seller {string} is {int}")]
async fn check_balance(world: &mut MarketplaceWorld, currency: String, seller_id: String, expected: i64) {
    let account_id = account_id(world, &seller_id).await;
    let balance = world.ledger().balance(account_id, &currency).await.expect("Error fetching balance");
    assert_eq!(balance, MinorUnits::from(expected));
}

#[then(expr = "the journal of seller {string} has {int} entries and is reconciled")]
async fn check_journal(world: &mut MarketplaceWorld, seller_id: String, entries: usize) {
    let account_id = account_id(world, &seller_id).await;
    let statement = world.ledger().statement(account_id).await.expect("Error fetching statement");
    assert_eq!(statement.transactions.len(), entries);
    assert!(statement.is_reconciled(), "Journal does not match balances: {statement:?}");
}
