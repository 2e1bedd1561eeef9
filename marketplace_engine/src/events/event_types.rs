use serde::{Deserialize, Serialize};

use crate::db_types::{MinorUnits, Payout, PayoutBalance, PayoutTransaction};

/// Published when an order's net earning has been credited to a seller for the first time. Replayed credits do not
/// produce events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreditedEvent {
    pub seller_id: String,
    pub order_id: String,
    pub transaction: PayoutTransaction,
    pub balance: PayoutBalance,
}

impl OrderCreditedEvent {
    pub fn new(seller_id: String, order_id: String, transaction: PayoutTransaction, balance: PayoutBalance) -> Self {
        Self { seller_id, order_id, transaction, balance }
    }

    pub fn amount(&self) -> MinorUnits {
        self.transaction.amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCreatedEvent {
    pub payout: Payout,
}

impl PayoutCreatedEvent {
    pub fn new(payout: Payout) -> Self {
        Self { payout }
    }
}
