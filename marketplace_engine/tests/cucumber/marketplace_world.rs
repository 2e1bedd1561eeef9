use cucumber::World;
use log::*;
use marketplace_engine::{
    commission::ResolveCommissionRequest,
    db_types::{CommissionLine, Payout, PayoutTransaction},
    events::EventProducers,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    CommissionApi,
    LedgerApi,
    LedgerError,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    pub request: Option<ResolveCommissionRequest>,
    pub lines: Vec<CommissionLine>,
    pub last_credit: Option<Result<Vec<PayoutTransaction>, LedgerError>>,
    pub last_payout: Option<Result<Payout, LedgerError>>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub commission: CommissionApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
}

impl MarketplaceWorld {
    pub fn commission(&self) -> &CommissionApi<SqliteDatabase> {
        &self.system.as_ref().expect("Marketplace system not initialised").commission
    }

    pub fn ledger(&self) -> &LedgerApi<SqliteDatabase> {
        &self.system.as_ref().expect("Marketplace system not initialised").ledger
    }

    pub fn request_mut(&mut self) -> &mut ResolveCommissionRequest {
        self.request.get_or_insert_with(|| ResolveCommissionRequest::new("usd"))
    }

    /// The id of the payout created by the last successful payout request.
    pub fn last_payout_id(&self) -> i64 {
        match &self.last_payout {
            Some(Ok(payout)) => payout.id,
            other => panic!("No payout has been created. Last result: {other:?}"),
        }
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 2).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let commission = CommissionApi::new(db.clone());
        let ledger = LedgerApi::new(db, EventProducers::default());
        Self { db_path: url, commission, ledger }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
