use futures_util::future::join_all;
use log::*;
use marketplace_engine::{
    db_types::{MinorUnits, SellerOrder},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerApi,
    LedgerError,
    PayoutManagement,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Builder;

const NUM_ORDERS: i64 = 20;
const ORDER_TOTAL: i64 = 1_000;
const NUM_PAYOUTS: i64 = 40;
const PAYOUT_AMOUNT: i64 = 700;

#[test]
fn burst_credits_and_payouts() {
    info!("🚀️ Starting payout burst test");
    let sys = Builder::new_multi_thread().worker_threads(4).enable_all().build().unwrap();

    sys.block_on(async move {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let mut api = LedgerApi::new(db, EventProducers::default());
        let account = api.open_account("burst-seller").await.unwrap();

        let credits = (0..NUM_ORDERS).map(|i| {
            let order = SellerOrder::new(format!("burst-{i}"), "burst-seller", "usd", MinorUnits::from(ORDER_TOTAL));
            api.credit_order(order)
        });
        // Every order is submitted twice to exercise the idempotency guard under contention
        let replays = (0..NUM_ORDERS).map(|i| {
            let order = SellerOrder::new(format!("burst-{i}"), "burst-seller", "usd", MinorUnits::from(ORDER_TOTAL));
            api.credit_order(order)
        });
        let payouts = (0..NUM_PAYOUTS).map(|_| api.create_payout(account.id, MinorUnits::from(PAYOUT_AMOUNT), "usd"));

        let (credit_results, replay_results, payout_results) =
            tokio::join!(join_all(credits), join_all(replays), join_all(payouts));
        for result in credit_results.into_iter().chain(replay_results) {
            let txs = result.expect("Crediting an order failed");
            assert_eq!(txs.len(), 1);
        }
        let mut successful = 0;
        for result in payout_results {
            match result {
                Ok(_) => successful += 1,
                // `available` is the balance the payout was refused on, not whatever it is by the time we look
                Err(LedgerError::InsufficientBalance { available, requested, .. }) => {
                    assert_eq!(requested, MinorUnits::from(PAYOUT_AMOUNT));
                    assert!(!available.is_negative());
                    assert!(available < requested, "Refused {requested} with {available} available");
                },
                Err(e) => panic!("Unexpected payout error: {e}"),
            }
        }
        info!("🚀️ {successful} of {NUM_PAYOUTS} payouts succeeded");

        let balance = api.balance(account.id, "usd").await.unwrap();
        assert!(!balance.is_negative());
        assert_eq!(balance + MinorUnits::from(successful * PAYOUT_AMOUNT), MinorUnits::from(NUM_ORDERS * ORDER_TOTAL));
        let statement = api.statement(account.id).await.unwrap();
        assert!(statement.is_reconciled());
        assert_eq!(statement.payouts.len() as i64, successful);
        assert_eq!(statement.transactions.len() as i64, NUM_ORDERS + successful);

        PayoutManagement::close(api.db_mut()).await.unwrap();
        Sqlite::drop_database(&url).await.unwrap();
    });
    info!("🚀️ test complete");
}
