use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use futures_util::FutureExt;
use log::*;
use marketplace_engine::{
    config::EngineConfig,
    db_types::{MinorUnits, SellerOrder},
    events::{EventHandlers, EventHooks},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerApi,
    PayoutManagement,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI64>,
    total: Arc<AtomicI64>,
}

impl HookCalled {
    pub fn called(&self, amount: MinorUnits) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
        let _ = self.total.fetch_add(amount.value(), Ordering::SeqCst);
    }

    pub fn count(&self) -> i64 {
        self.called.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn ledger_hooks_fire_once_per_change() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let credited = HookCalled::default();
    let paid_out = HookCalled::default();

    let mut hooks = EventHooks::default();
    let credited_copy = credited.clone();
    hooks.on_order_credited(move |ev| {
        info!("🪝️ Order {} credited {} to {}", ev.order_id, ev.amount(), ev.seller_id);
        credited_copy.called(ev.amount());
        async {}.boxed()
    });
    let paid_out_copy = paid_out.clone();
    hooks.on_payout_created(move |ev| {
        info!("🪝️ Payout #{} created", ev.payout.id);
        paid_out_copy.called(ev.payout.amount);
        async {}.boxed()
    });
    let config = EngineConfig::new(url.as_str());
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();

    let db = SqliteDatabase::new_with_config(&config).await.expect("Error creating database");
    let mut api = LedgerApi::new(db, producers);
    let account = api.open_account("seller-1").await.unwrap();
    let order = SellerOrder::new("o-1", "seller-1", "usd", MinorUnits::from(2_000));
    api.credit_order(order.clone()).await.unwrap();
    api.credit_order(order).await.unwrap();
    api.credit_order(SellerOrder::new("o-2", "seller-1", "usd", MinorUnits::from(500))).await.unwrap();
    api.create_payout(account.id, MinorUnits::from(1_500), "usd").await.unwrap();
    assert!(api.create_payout(account.id, MinorUnits::from(1_500), "usd").await.is_err());

    PayoutManagement::close(api.db_mut()).await.unwrap();
    Sqlite::drop_database(api.db().url()).await.unwrap();
    // Dropping the API drops the producers, so the handlers finish once the buffered events are handled.
    drop(api);
    let EventHandlers { on_order_credited, on_payout_created } = handlers;
    on_order_credited.expect("Order credited handler missing").start_handler().await;
    on_payout_created.expect("Payout created handler missing").start_handler().await;

    assert_eq!(credited.count(), 2, "Replayed credits must not publish events");
    assert_eq!(credited.total(), 2_500);
    assert_eq!(paid_out.count(), 1);
    assert_eq!(paid_out.total(), 1_500);
}
