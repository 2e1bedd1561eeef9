pub mod marketplace_world;
pub mod setups;
pub mod steps;

pub use marketplace_world::MarketplaceWorld;
