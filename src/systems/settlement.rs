use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

pub struct SettlementSystem;

impl SettlementSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SettlementSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SettlementSystem {
    fn name(&self) -> &str {
        "settlement"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let catalog = world.catalog_handle();
        world.settlement.update(
            &catalog,
            &mut world.ecosystem,
            &world.environment,
            ctx.dt_days,
            rng,
            &mut world.events,
        );
        Ok(())
    }
}
