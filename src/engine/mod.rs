use std::path::PathBuf;

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::{
    rng::{RngManager, SystemRng},
    snapshot::{SimulationSnapshot, SnapshotWriter},
    systems::{ClimateSystem, EcosystemSystem, SettlementSystem},
    world::{ResearchView, World},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Climate, then ecosystem, then settlement.
    pub fn with_standard_systems(self) -> Self {
        self.with_system(ClimateSystem::new())
            .with_system(EcosystemSystem::new())
            .with_system(SettlementSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

/// State handed to run hooks after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickFrame {
    pub tick: u64,
    pub days_passed: f64,
    pub snapshot: SimulationSnapshot,
    pub research: ResearchView,
}

impl TickFrame {
    pub fn capture(world: &World, scenario_name: &str) -> Self {
        Self {
            tick: world.tick(),
            days_passed: world.environment.days_passed,
            snapshot: SimulationSnapshot::capture(world, scenario_name),
            research: world.research_view(),
        }
    }
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            let day_fraction = world.day_fraction();
            self.step(world, day_fraction)?;
        }
        Ok(())
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(TickFrame),
    {
        for _ in 0..ticks {
            let day_fraction = world.day_fraction();
            self.step(world, day_fraction)?;
            hook(TickFrame::capture(world, &self.settings.scenario_name));
        }
        Ok(())
    }

    /// Runs one tick covering `day_fraction` days. The delta is checked
    /// before any state is touched.
    pub fn step(&mut self, world: &mut World, day_fraction: f64) -> Result<()> {
        ensure!(
            day_fraction.is_finite() && day_fraction >= 0.0,
            "day fraction must be a finite, non-negative number of days (got {day_fraction})"
        );

        let current_tick = world.tick() + 1;
        world
            .events
            .set_clock(current_tick, world.environment.days_passed + day_fraction);
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            let ctx = SystemContext {
                tick: current_tick,
                dt_days: day_fraction,
                scenario_name: &self.settings.scenario_name,
            };
            system.run(&ctx, world, &mut rng_stream)?;
        }
        world.advance_time();
        self.snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;
        Ok(())
    }
}

pub struct SystemContext<'a> {
    /// The tick being run, counting from 1.
    pub tick: u64,
    pub dt_days: f64,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
