use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

/// Advances the calendar and weather ahead of everything else in the tick.
pub struct ClimateSystem;

impl ClimateSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClimateSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ClimateSystem {
    fn name(&self) -> &str {
        "climate"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        world
            .environment
            .advance(ctx.dt_days, rng, &mut world.events);
        Ok(())
    }
}
