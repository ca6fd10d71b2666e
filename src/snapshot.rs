//! Persisted simulation state.
//!
//! A snapshot carries everything needed to rebuild an equivalent [`World`]:
//! environment, ecosystem, settlement state and the technology sets with
//! their progress. The technology catalog itself is not persisted; restore
//! checks the snapshot against whichever catalog it is given.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ecosystem::Ecosystem;
use crate::environment::Environment;
use crate::events::LoggedEvent;
use crate::settlement::{
    BuildingProgress, PerActivity, Population, Settlement, ShortageAlerts, Stats, Stockpile,
};
use crate::technology::{ResearchLedger, TechId, TechnologyCatalog};
use crate::world::World;

pub const SNAPSHOT_EVENT_COUNT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot references unknown technology `{0}`")]
    UnknownTechnology(TechId),
    #[error("technology `{0}` is both discovered and in progress")]
    ConflictingTechnology(TechId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSnapshot {
    pub population: Population,
    pub resources: Stockpile,
    pub stats: Stats,
    pub activity_preferences: PerActivity<f64>,
    pub building_progress: BuildingProgress,
    pub success_rates: PerActivity<f64>,
    #[serde(default)]
    pub alerts: ShortageAlerts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologySnapshot {
    pub discovered: BTreeSet<TechId>,
    /// Progress percentage per in-progress technology.
    pub in_progress: BTreeMap<TechId, f64>,
    #[serde(default)]
    pub eurekas: BTreeSet<TechId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub scenario: String,
    pub saved_at: DateTime<Utc>,
    pub tick: u64,
    pub day_fraction: f64,
    pub environment: Environment,
    pub ecosystem: Ecosystem,
    pub settlement: SettlementSnapshot,
    pub technologies: TechnologySnapshot,
    #[serde(default)]
    pub recent_events: Vec<LoggedEvent>,
}

impl SimulationSnapshot {
    pub fn capture(world: &World, scenario: &str) -> Self {
        let settlement = &world.settlement;
        let research = &settlement.research;
        Self {
            scenario: scenario.to_string(),
            saved_at: Utc::now(),
            tick: world.tick(),
            day_fraction: world.day_fraction(),
            environment: world.environment.clone(),
            ecosystem: world.ecosystem.clone(),
            settlement: SettlementSnapshot {
                population: settlement.population.clone(),
                resources: settlement.resources.clone(),
                stats: settlement.stats.clone(),
                activity_preferences: settlement.preferences,
                building_progress: settlement.buildings.clone(),
                success_rates: settlement.success_rates,
                alerts: settlement.alerts,
            },
            technologies: TechnologySnapshot {
                discovered: research.discovered_ids(),
                in_progress: research.in_progress_percentages(),
                eurekas: research.eureka_ids(),
            },
            recent_events: world.events.recent(SNAPSHOT_EVENT_COUNT),
        }
    }

    /// Rebuilds a world against `catalog`. Ids the catalog does not know, or
    /// an id in both technology sets, reject the snapshot.
    pub fn restore(&self, catalog: Arc<TechnologyCatalog>) -> Result<World, SnapshotError> {
        let techs = &self.technologies;
        for id in techs
            .discovered
            .iter()
            .chain(techs.in_progress.keys())
            .chain(techs.eurekas.iter())
        {
            if !catalog.contains(id.as_str()) {
                return Err(SnapshotError::UnknownTechnology(id.clone()));
            }
        }
        if let Some(id) = techs
            .in_progress
            .keys()
            .find(|id| techs.discovered.contains(*id))
        {
            return Err(SnapshotError::ConflictingTechnology(id.clone()));
        }

        let research = ResearchLedger::from_parts(
            &catalog,
            &techs.discovered,
            &techs.in_progress,
            &techs.eurekas,
        );
        let saved = &self.settlement;
        let settlement = Settlement {
            population: saved.population.clone(),
            resources: saved.resources.clone(),
            stats: saved.stats.clone(),
            preferences: saved.activity_preferences,
            buildings: saved.building_progress.clone(),
            success_rates: saved.success_rates,
            research,
            alerts: saved.alerts,
        };

        let mut world = World::from_parts(
            catalog,
            self.environment.clone(),
            self.ecosystem.clone(),
            settlement,
            self.tick,
            self.day_fraction,
        );
        world.events.extend_restored(self.recent_events.iter().cloned());
        Ok(world)
    }
}

pub fn write_snapshot(path: &Path, snapshot: &SimulationSnapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SnapshotError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<SimulationSnapshot, SnapshotError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

/// Writes a snapshot every `interval` completed ticks. An interval of zero
/// disables writing.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn path_for(&self, scenario: &str, tick: u64) -> PathBuf {
        self.output_dir
            .join(scenario)
            .join(format!("tick_{tick:06}.json"))
    }

    pub fn maybe_write(
        &self,
        world: &World,
        scenario: &str,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        let tick = world.tick();
        if self.interval == 0 || tick == 0 || tick % self.interval != 0 {
            return Ok(None);
        }
        let path = self.path_for(scenario, tick);
        write_snapshot(&path, &SimulationSnapshot::capture(world, scenario))?;
        tracing::debug!(path = %path.display(), tick, "snapshot written");
        Ok(Some(path))
    }
}
