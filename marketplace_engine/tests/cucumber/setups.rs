use cucumber::given;

use crate::cucumber::{marketplace_world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}
