mod climate;
mod ecosystem;
mod settlement;

pub use climate::ClimateSystem;
pub use ecosystem::EcosystemSystem;
pub use settlement::SettlementSystem;
