use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{activity_multiplier, TechDefinition, TechId, TechPhase, TechnologyCatalog};
use crate::events::{EventSink, SimEvent};
use crate::rng::RandomSource;
use crate::settlement::{Activity, Stockpile};

/// Spontaneous research never pushes the in-progress set past this size.
pub const MAX_CONCURRENT_RESEARCH: usize = 2;
const SPONTANEOUS_DISCOVERY_SCALE: f64 = 0.01;
const START_COST_SHARE: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    #[default]
    Undiscovered,
    InProgress,
    Discovered,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechProgress {
    pub status: ResearchStatus,
    pub progress_percent: f64,
    #[serde(default)]
    pub eureka: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResearchError {
    #[error("unknown technology `{0}`")]
    UnknownTechnology(TechId),
    #[error("technology `{0}` is already discovered")]
    AlreadyDiscovered(TechId),
    #[error("technology `{0}` is already being researched")]
    AlreadyInProgress(TechId),
    #[error("technology `{0}` has undiscovered requirements")]
    RequirementsUnmet(TechId),
    #[error("cannot afford to start researching `{0}`")]
    Unaffordable(TechId),
    #[error("technology `{0}` is not being researched")]
    NotInProgress(TechId),
}

/// Per-settlement research state, one entry per catalog technology.
///
/// `Discovered` and `InProgress` are exclusive by construction, and nothing
/// enters `InProgress` without its requirements discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResearchLedger {
    entries: BTreeMap<TechId, TechProgress>,
}

impl ResearchLedger {
    pub fn new(catalog: &TechnologyCatalog) -> Self {
        Self {
            entries: catalog
                .iter()
                .map(|def| (def.id.clone(), TechProgress::default()))
                .collect(),
        }
    }

    pub fn progress(&self, id: &str) -> Option<&TechProgress> {
        self.entries.get(id)
    }

    pub fn status(&self, id: &str) -> ResearchStatus {
        self.entries
            .get(id)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    pub fn is_discovered(&self, id: &str) -> bool {
        self.status(id) == ResearchStatus::Discovered
    }

    pub fn requirements_met(&self, def: &TechDefinition) -> bool {
        def.requirements.iter().all(|req| self.is_discovered(req.as_str()))
    }

    /// Undiscovered, not started, and every requirement discovered.
    pub fn researchable<'c>(&self, catalog: &'c TechnologyCatalog) -> Vec<&'c TechDefinition> {
        catalog
            .iter()
            .filter(|def| {
                self.status(def.id.as_str()) == ResearchStatus::Undiscovered
                    && self.requirements_met(def)
            })
            .collect()
    }

    pub fn in_progress<'c>(&self, catalog: &'c TechnologyCatalog) -> Vec<&'c TechDefinition> {
        self.with_status(catalog, ResearchStatus::InProgress)
    }

    pub fn discovered<'c>(&self, catalog: &'c TechnologyCatalog) -> Vec<&'c TechDefinition> {
        self.with_status(catalog, ResearchStatus::Discovered)
    }

    pub fn by_phase<'c>(
        &self,
        catalog: &'c TechnologyCatalog,
        phase: TechPhase,
    ) -> Vec<(&'c TechDefinition, TechProgress)> {
        catalog
            .by_phase(phase)
            .into_iter()
            .map(|def| {
                let progress = self.entries.get(&def.id).cloned().unwrap_or_default();
                (def, progress)
            })
            .collect()
    }

    fn with_status<'c>(
        &self,
        catalog: &'c TechnologyCatalog,
        status: ResearchStatus,
    ) -> Vec<&'c TechDefinition> {
        catalog
            .iter()
            .filter(|def| self.status(def.id.as_str()) == status)
            .collect()
    }

    pub fn discovered_ids(&self) -> BTreeSet<TechId> {
        self.ids_with(ResearchStatus::Discovered)
    }

    pub fn in_progress_ids(&self) -> BTreeSet<TechId> {
        self.ids_with(ResearchStatus::InProgress)
    }

    pub fn eureka_ids(&self) -> BTreeSet<TechId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.eureka)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn ids_with(&self, status: ResearchStatus) -> BTreeSet<TechId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.status == status)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn discovered_count(&self) -> usize {
        self.count(ResearchStatus::Discovered)
    }

    pub fn in_progress_count(&self) -> usize {
        self.count(ResearchStatus::InProgress)
    }

    fn count(&self, status: ResearchStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Rolls a spontaneous start for every researchable technology, in catalog
    /// order, until the concurrency cap is reached. Returns the ids started.
    pub fn select_spontaneous(
        &mut self,
        catalog: &TechnologyCatalog,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) -> Vec<TechId> {
        let mut started = Vec::new();
        for def in catalog.iter() {
            if self.status(def.id.as_str()) != ResearchStatus::Undiscovered
                || !self.requirements_met(def)
            {
                continue;
            }
            let roll = rng.chance(def.discovery_chance * SPONTANEOUS_DISCOVERY_SCALE);
            if roll && self.in_progress_count() < MAX_CONCURRENT_RESEARCH {
                self.mark_in_progress(&def.id);
                events.emit(SimEvent::ResearchStarted {
                    technology: def.id.clone(),
                });
                started.push(def.id.clone());
            }
        }
        started
    }

    /// Manual start: charges a tenth of each resource cost (rounded up) and
    /// ignores the spontaneous concurrency cap.
    pub fn start_research(
        &mut self,
        catalog: &TechnologyCatalog,
        id: &str,
        stockpile: &mut Stockpile,
        events: &mut dyn EventSink,
    ) -> Result<(), ResearchError> {
        let def = catalog
            .get(id)
            .ok_or_else(|| ResearchError::UnknownTechnology(TechId::from(id)))?;
        match self.status(id) {
            ResearchStatus::Discovered => {
                return Err(ResearchError::AlreadyDiscovered(def.id.clone()))
            }
            ResearchStatus::InProgress => {
                return Err(ResearchError::AlreadyInProgress(def.id.clone()))
            }
            ResearchStatus::Undiscovered => {}
        }
        if !self.requirements_met(def) {
            return Err(ResearchError::RequirementsUnmet(def.id.clone()));
        }

        let upfront: BTreeMap<_, _> = def
            .resource_cost
            .iter()
            .map(|(kind, amount)| (*kind, (amount * START_COST_SHARE).ceil()))
            .collect();
        if !stockpile.can_afford(&upfront) {
            return Err(ResearchError::Unaffordable(def.id.clone()));
        }
        for (kind, amount) in &upfront {
            stockpile.take(*kind, *amount);
        }

        self.mark_in_progress(&def.id);
        events.emit(SimEvent::ResearchStarted {
            technology: def.id.clone(),
        });
        Ok(())
    }

    /// Drops an in-progress technology back to researchable with no progress.
    pub fn cancel_research(
        &mut self,
        id: &str,
        events: &mut dyn EventSink,
    ) -> Result<(), ResearchError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ResearchError::UnknownTechnology(TechId::from(id)))?;
        if entry.status != ResearchStatus::InProgress {
            return Err(ResearchError::NotInProgress(TechId::from(id)));
        }
        entry.status = ResearchStatus::Undiscovered;
        entry.progress_percent = 0.0;
        events.emit(SimEvent::ResearchCancelled {
            technology: TechId::from(id),
        });
        Ok(())
    }

    /// Adds progress to an in-progress technology. Returns `true` when this
    /// call completed it; the entry is then discovered at exactly 100%.
    pub fn advance(&mut self, id: &str, percent: f64) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.status != ResearchStatus::InProgress {
            return false;
        }
        entry.progress_percent += percent.max(0.0);
        if entry.progress_percent >= 100.0 {
            entry.progress_percent = 100.0;
            entry.status = ResearchStatus::Discovered;
            return true;
        }
        false
    }

    /// Marks a technology discovered outright, as scenario setup does.
    pub fn grant(&mut self, catalog: &TechnologyCatalog, id: &str) -> Result<(), ResearchError> {
        let def = catalog
            .get(id)
            .ok_or_else(|| ResearchError::UnknownTechnology(TechId::from(id)))?;
        let entry = self.entries.entry(def.id.clone()).or_default();
        entry.status = ResearchStatus::Discovered;
        entry.progress_percent = 100.0;
        Ok(())
    }

    pub fn grant_eureka(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.eureka = true;
        }
    }

    /// Combined efficiency factor from every discovered technology, including
    /// granted eureka bundles, for one activity.
    pub fn multiplier(&self, catalog: &TechnologyCatalog, activity: Activity) -> f64 {
        catalog
            .iter()
            .filter_map(|def| {
                let entry = self.entries.get(&def.id)?;
                if entry.status != ResearchStatus::Discovered {
                    return None;
                }
                let mut factor = activity_multiplier(&def.effects, activity);
                if entry.eureka {
                    if let Some(eureka) = &def.eureka {
                        factor *= activity_multiplier(&eureka.effects, activity);
                    }
                }
                Some(factor)
            })
            .product()
    }

    fn mark_in_progress(&mut self, id: &TechId) {
        let entry = self.entries.entry(id.clone()).or_default();
        entry.status = ResearchStatus::InProgress;
        entry.progress_percent = 0.0;
    }

    /// Rebuilds a ledger from persisted sets. Progress is taken as given for
    /// in-progress entries; anything whose requirements are no longer met is
    /// dropped back to undiscovered.
    pub fn from_parts(
        catalog: &TechnologyCatalog,
        discovered: &BTreeSet<TechId>,
        in_progress: &BTreeMap<TechId, f64>,
        eurekas: &BTreeSet<TechId>,
    ) -> Self {
        let mut ledger = Self::new(catalog);
        for id in discovered {
            if let Some(entry) = ledger.entries.get_mut(id) {
                entry.status = ResearchStatus::Discovered;
                entry.progress_percent = 100.0;
                entry.eureka = eurekas.contains(id);
            }
        }
        for (id, percent) in in_progress {
            let Some(def) = catalog.get(id.as_str()) else {
                continue;
            };
            if !ledger.requirements_met(def) {
                tracing::warn!(
                    technology = %id,
                    "restored research has undiscovered requirements; resetting"
                );
                continue;
            }
            if let Some(entry) = ledger.entries.get_mut(id) {
                entry.status = ResearchStatus::InProgress;
                entry.progress_percent = percent.clamp(0.0, 100.0);
                entry.eureka = eurekas.contains(id);
            }
        }
        ledger
    }

    /// Progress of every in-progress technology, keyed by id.
    pub fn in_progress_percentages(&self) -> BTreeMap<TechId, f64> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.status == ResearchStatus::InProgress)
            .map(|(id, entry)| (id.clone(), entry.progress_percent))
            .collect()
    }
}
