use std::sync::Arc;

use serde::Serialize;

use crate::ecosystem::Ecosystem;
use crate::environment::Environment;
use crate::events::EventLog;
use crate::settlement::Settlement;
use crate::technology::{
    ResearchError, TechDefinition, TechId, TechPhase, TechProgress, TechnologyCatalog,
};

/// Simulation root. Owns every piece of mutable state; systems receive it
/// one at a time, so no tick is ever observed half-applied.
#[derive(Debug, Clone)]
pub struct World {
    pub environment: Environment,
    pub ecosystem: Ecosystem,
    pub settlement: Settlement,
    pub events: EventLog,
    catalog: Arc<TechnologyCatalog>,
    tick: u64,
    day_fraction: f64,
}

impl World {
    pub fn new(catalog: Arc<TechnologyCatalog>, day_fraction: f64) -> Self {
        let settlement = Settlement::new(&catalog);
        Self {
            environment: Environment::default(),
            ecosystem: Ecosystem::default(),
            settlement,
            events: EventLog::default(),
            catalog,
            tick: 0,
            day_fraction,
        }
    }

    pub(crate) fn from_parts(
        catalog: Arc<TechnologyCatalog>,
        environment: Environment,
        ecosystem: Ecosystem,
        settlement: Settlement,
        tick: u64,
        day_fraction: f64,
    ) -> Self {
        Self {
            environment,
            ecosystem,
            settlement,
            events: EventLog::default(),
            catalog,
            tick,
            day_fraction,
        }
    }

    /// Completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn day_fraction(&self) -> f64 {
        self.day_fraction
    }

    pub fn set_day_fraction(&mut self, day_fraction: f64) {
        self.day_fraction = day_fraction;
    }

    pub fn catalog(&self) -> &TechnologyCatalog {
        &self.catalog
    }

    pub fn catalog_handle(&self) -> Arc<TechnologyCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn advance_time(&mut self) {
        self.tick += 1;
    }

    pub fn start_research(&mut self, id: &str) -> Result<(), ResearchError> {
        let settlement = &mut self.settlement;
        settlement.research.start_research(
            &self.catalog,
            id,
            &mut settlement.resources,
            &mut self.events,
        )
    }

    pub fn cancel_research(&mut self, id: &str) -> Result<(), ResearchError> {
        self.settlement
            .research
            .cancel_research(id, &mut self.events)
    }

    pub fn research_view(&self) -> ResearchView {
        let ledger = &self.settlement.research;
        let summarize = |defs: Vec<&TechDefinition>| -> Vec<TechSummary> {
            defs.into_iter()
                .map(|def| {
                    let progress = ledger.progress(def.id.as_str()).cloned();
                    TechSummary::new(def, progress.unwrap_or_default())
                })
                .collect()
        };
        ResearchView {
            discovered: summarize(ledger.discovered(&self.catalog)),
            in_progress: summarize(ledger.in_progress(&self.catalog)),
            researchable: summarize(ledger.researchable(&self.catalog)),
        }
    }

    pub fn technologies_by_phase(&self, phase: TechPhase) -> Vec<TechSummary> {
        self.settlement
            .research
            .by_phase(&self.catalog, phase)
            .into_iter()
            .map(|(def, progress)| TechSummary::new(def, progress))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechSummary {
    pub id: TechId,
    pub name: String,
    pub phase: TechPhase,
    pub progress_percent: f64,
    pub eureka: bool,
}

impl TechSummary {
    fn new(def: &TechDefinition, progress: TechProgress) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            phase: def.phase,
            progress_percent: progress.progress_percent,
            eureka: progress.eureka,
        }
    }
}

/// Derived technology lists for read-only consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchView {
    pub discovered: Vec<TechSummary>,
    pub in_progress: Vec<TechSummary>,
    pub researchable: Vec<TechSummary>,
}
