use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::clock::GameSpeed;
use crate::settlement::ResourceKind;
use crate::technology::{TechId, TechnologyCatalog};
use crate::world::World;

fn default_day_fraction() -> f64 {
    1.0
}

fn default_snapshot_interval_ticks() -> u64 {
    30
}

const DEFAULT_TICKS: u64 = 360;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_day_fraction")]
    pub day_fraction: f64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    /// Technology catalog file, relative to the loader's base directory.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub speed: GameSpeed,
    #[serde(default)]
    pub initial: InitialState,
}

/// Overrides applied on top of the standard starting settlement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitialState {
    #[serde(default)]
    pub population: Option<u32>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceKind, f64>,
    #[serde(default)]
    pub discovered: Vec<TechId>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if !(scenario.day_fraction.is_finite() && scenario.day_fraction >= 0.0) {
            bail!(
                "scenario {} has an invalid day_fraction {}",
                path.display(),
                scenario.day_fraction
            );
        }
        scenario.catalog = scenario.catalog.map(|catalog| self.base_dir.join(catalog));
        Ok(scenario)
    }
}

impl Scenario {
    pub fn load_catalog(&self) -> Result<Arc<TechnologyCatalog>> {
        let catalog = match &self.catalog {
            Some(path) => TechnologyCatalog::load(path).with_context(|| {
                format!("Failed to load technology catalog {}", path.display())
            })?,
            None => {
                TechnologyCatalog::standard().context("Built-in technology catalog is invalid")?
            }
        };
        Ok(Arc::new(catalog))
    }

    pub fn build_world(&self) -> Result<World> {
        let catalog = self.load_catalog()?;
        let mut world = World::new(Arc::clone(&catalog), self.day_fraction);
        let settlement = &mut world.settlement;

        if let Some(population) = self.initial.population {
            settlement.population.total = population.max(1);
            settlement.assign_population();
        }
        for (kind, amount) in &self.initial.resources {
            settlement.resources.set(*kind, *amount);
        }
        for id in &self.initial.discovered {
            settlement
                .research
                .grant(&catalog, id.as_str())
                .with_context(|| format!("Scenario '{}' grants {id}", self.name))?;
        }
        tracing::info!(
            scenario = %self.name,
            seed = self.seed,
            population = settlement.population.total,
            "world built"
        );
        Ok(world)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(DEFAULT_TICKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_fields() {
        let scenario: Scenario = serde_yaml::from_str("name: bare\nseed: 3\n").unwrap();
        assert_eq!(scenario.day_fraction, 1.0);
        assert_eq!(scenario.snapshot_interval_ticks, 30);
        assert_eq!(scenario.speed, GameSpeed::Normal);
        assert_eq!(scenario.ticks(None), 360);
        assert_eq!(scenario.ticks(Some(12)), 12);
    }

    #[test]
    fn initial_overrides_shape_the_world() {
        let scenario: Scenario = serde_yaml::from_str(
            "name: seeded\nseed: 1\ninitial:\n  population: 20\n  resources:\n    clay: 12\n  discovered: [stone_tools]\n",
        )
        .unwrap();
        let world = scenario.build_world().unwrap();
        let settlement = &world.settlement;
        assert_eq!(settlement.population.total, 20);
        assert_eq!(settlement.population.groups.total(), 20);
        assert_eq!(settlement.resources.get(ResourceKind::Clay), 12.0);
        assert!(settlement.research.is_discovered("stone_tools"));
    }

    #[test]
    fn unknown_discovered_technology_is_rejected() {
        let scenario: Scenario =
            serde_yaml::from_str("name: bad\nseed: 1\ninitial:\n  discovered: [warp_drive]\n")
                .unwrap();
        assert!(scenario.build_world().is_err());
    }

    #[test]
    fn negative_day_fraction_is_rejected() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("s.yaml"), "name: x\nseed: 1\nday_fraction: -1\n").unwrap();
        let loader = ScenarioLoader::new(temp.path());
        assert!(loader.load("s.yaml").is_err());
    }
}
