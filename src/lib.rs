pub mod clock;
pub mod ecosystem;
pub mod engine;
pub mod environment;
pub mod events;
pub mod rng;
pub mod scenario;
pub mod settlement;
pub mod snapshot;
pub mod systems;
pub mod technology;
pub mod web;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, TickFrame};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::World;
