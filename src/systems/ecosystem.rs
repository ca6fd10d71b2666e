use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

pub struct EcosystemSystem;

impl EcosystemSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EcosystemSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EcosystemSystem {
    fn name(&self) -> &str {
        "ecosystem"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        world
            .ecosystem
            .update(&world.environment, ctx.dt_days, rng, &mut world.events);
        Ok(())
    }
}
