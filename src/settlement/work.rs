use std::collections::BTreeMap;

use super::{Activity, BuildingKind, ResourceKind, Settlement, MILESTONE_PERCENT};
use crate::ecosystem::Ecosystem;
use crate::events::{EventSink, SimEvent};
use crate::rng::RandomSource;
use crate::technology::TechnologyCatalog;

const WORK_LEARNING_RATE: f64 = 0.01;
const RESEARCH_LEARNING_RATE: f64 = 0.005;
const WOOD_PER_BUILDING_POWER: f64 = 0.5;
const RESEARCH_AREA_BONUS_THRESHOLD: f64 = 50.0;

/// `rate × (1 − α) + outcome × α`, with both the outcome and α kept in [0, 1].
fn ema(rate: f64, outcome: f64, alpha: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    let outcome = if outcome.is_finite() {
        outcome.clamp(0.0, 1.0)
    } else {
        0.0
    };
    rate * (1.0 - alpha) + outcome * alpha
}

impl Settlement {
    /// Base efficiency compounded with discovered technology effects, plus
    /// the research-area bonus for researchers.
    pub fn activity_efficiency(&self, catalog: &TechnologyCatalog, activity: Activity) -> f64 {
        let mut efficiency = self.stats.efficiency * self.research.multiplier(catalog, activity);
        if activity == Activity::Researching
            && self.buildings.research_area > RESEARCH_AREA_BONUS_THRESHOLD
        {
            efficiency *= 1.0 + self.buildings.research_area / 200.0;
        }
        efficiency
    }

    /// Returns `(efficiency, power)` for the workers assigned to `activity`.
    fn work_power(
        &self,
        catalog: &TechnologyCatalog,
        activity: Activity,
        day_fraction: f64,
    ) -> (f64, f64) {
        let efficiency = self.activity_efficiency(catalog, activity);
        let workers = f64::from(self.population.groups.get(activity));
        (efficiency, workers * efficiency * day_fraction)
    }

    fn record_find(&mut self, kind: ResourceKind, amount: f64, events: &mut dyn EventSink) {
        if amount <= 0.0 {
            return;
        }
        let first = self.resources.get(kind) <= 0.0;
        self.resources.add(kind, amount);
        if first {
            events.emit(SimEvent::ResourceFound { resource: kind });
        }
    }

    pub fn perform_gathering(
        &mut self,
        catalog: &TechnologyCatalog,
        ecosystem: &mut Ecosystem,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        let (efficiency, power) = self.work_power(catalog, Activity::Gathering, day_fraction);

        let plant_food = f64::from(ecosystem.gather_plants(efficiency, power * 0.6));
        let water = (power * 0.4 * ecosystem.water_availability).floor().max(0.0);
        self.resources.add(ResourceKind::Food, plant_food);
        self.resources
            .add(ResourceKind::PlantFiber, (plant_food * 0.2).floor());
        self.resources.add(ResourceKind::Water, water);
        self.resources
            .add(ResourceKind::Wood, (power * 0.3).floor().max(0.0));

        let found_clay = rng.chance(0.05 * day_fraction);
        if found_clay && power > 10.0 {
            let clay = f64::from(rng.below(5)) * day_fraction;
            self.record_find(ResourceKind::Clay, clay, events);
        }

        self.success_rates.gathering = ema(
            self.success_rates.gathering,
            (plant_food + water) / (power + 0.1),
            WORK_LEARNING_RATE * day_fraction,
        );
    }

    pub fn perform_hunting(
        &mut self,
        catalog: &TechnologyCatalog,
        ecosystem: &mut Ecosystem,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        let (efficiency, power) = self.work_power(catalog, Activity::Hunting, day_fraction);

        let haul = ecosystem.hunt_animals(efficiency, power);
        self.resources.add(ResourceKind::Food, f64::from(haul.food));
        self.resources
            .add(ResourceKind::AnimalHide, f64::from(haul.animal_hide));

        // stone picked up along the way, about a tenth of the hunting power
        let hunters = f64::from(self.population.groups.hunting);
        let stone = ecosystem.gather_minerals(efficiency, hunters * day_fraction * 0.1);
        self.resources.add(ResourceKind::Stone, f64::from(stone));

        let found_ore = rng.chance(0.03 * day_fraction);
        if found_ore && power > 5.0 {
            let ore = f64::from(rng.below(3)) * day_fraction;
            self.record_find(ResourceKind::MetalOre, ore, events);
        }

        self.success_rates.hunting = ema(
            self.success_rates.hunting,
            f64::from(haul.food) / (power * 10.0 + 0.1),
            WORK_LEARNING_RATE * day_fraction,
        );
    }

    /// Spreads building power over unfinished buildings, weighted toward the
    /// least complete, and scales it down when wood runs short.
    pub fn perform_building(
        &mut self,
        catalog: &TechnologyCatalog,
        day_fraction: f64,
        events: &mut dyn EventSink,
    ) {
        if self.buildings.all_complete() {
            // nothing left to build, so builders produce nothing
            self.success_rates.building = ema(
                self.success_rates.building,
                0.0,
                WORK_LEARNING_RATE * day_fraction,
            );
            return;
        }
        let (_, power) = self.work_power(catalog, Activity::Building, day_fraction);

        let nominal_wood = power * WOOD_PER_BUILDING_POWER;
        let wood_used = self.resources.take(ResourceKind::Wood, nominal_wood);
        let supply = if nominal_wood > 0.0 {
            wood_used / nominal_wood
        } else {
            0.0
        };

        let priorities = BuildingKind::ALL.map(|kind| 1.0 - self.buildings.get(kind) / 100.0);
        let total_priority: f64 = priorities.iter().sum();
        for (kind, priority) in BuildingKind::ALL.into_iter().zip(priorities) {
            let increment = priority / total_priority * power * supply;
            let progress = self.buildings.get_mut(kind);
            let before = *progress;
            *progress = (before + increment).min(100.0);
            if before < MILESTONE_PERCENT && *progress >= MILESTONE_PERCENT {
                self.reach_milestone(kind, events);
            }
        }

        self.success_rates.building = ema(
            self.success_rates.building,
            wood_used / (power + 0.1),
            WORK_LEARNING_RATE * day_fraction,
        );
    }

    fn reach_milestone(&mut self, kind: BuildingKind, events: &mut dyn EventSink) {
        match kind {
            BuildingKind::Shelter => {
                self.stats.health = (self.stats.health + 5.0).min(100.0);
                self.stats.happiness = (self.stats.happiness + 10.0).min(100.0);
            }
            BuildingKind::ResearchArea => {
                self.stats.knowledge_level = (self.stats.knowledge_level + 5.0).min(100.0);
            }
            BuildingKind::StorageArea | BuildingKind::CraftingArea => {}
        }
        events.emit(SimEvent::BuildingMilestone { building: kind });
    }

    /// Splits research power evenly over in-progress technologies. A
    /// technology that cannot pay this tick's share of its cost gets nothing.
    pub fn perform_research(
        &mut self,
        catalog: &TechnologyCatalog,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        let (_, power) = self.work_power(catalog, Activity::Researching, day_fraction);
        if power <= 0.0 {
            return;
        }

        self.research.select_spontaneous(catalog, rng, events);
        let active = self.research.in_progress(catalog);
        if active.is_empty() {
            return;
        }
        let share = power / active.len() as f64;

        for def in active {
            let cost: BTreeMap<_, _> = def
                .resource_cost
                .iter()
                .map(|(kind, amount)| (*kind, amount / def.time_to_discover * day_fraction))
                .collect();
            if !self.resources.can_afford(&cost) {
                tracing::debug!(technology = %def.id, "research stalled on resources");
                continue;
            }
            for (kind, amount) in &cost {
                self.resources.take(*kind, *amount);
            }

            let completed = self
                .research
                .advance(def.id.as_str(), share / def.time_to_discover * 100.0);
            if !completed {
                continue;
            }
            events.emit(SimEvent::TechnologyDiscovered {
                technology: def.id.clone(),
            });
            if let Some(eureka) = &def.eureka {
                if rng.chance(def.discovery_chance) {
                    self.research.grant_eureka(def.id.as_str());
                    events.emit(SimEvent::Eureka {
                        technology: def.id.clone(),
                        name: eureka.name.clone(),
                    });
                }
            }
        }

        let outcome = if self.research.in_progress_count() > 0 {
            0.5
        } else {
            0.0
        };
        self.success_rates.researching = ema(
            self.success_rates.researching,
            outcome,
            RESEARCH_LEARNING_RATE * day_fraction,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRandom;
    use crate::settlement::PerActivity;
    use crate::technology::{ResearchStatus, TechnologyCatalog};

    fn setup() -> (TechnologyCatalog, Settlement) {
        let catalog = TechnologyCatalog::standard().unwrap();
        let settlement = Settlement::new(&catalog);
        (catalog, settlement)
    }

    fn start(settlement: &mut Settlement, catalog: &TechnologyCatalog, id: &str) {
        settlement
            .research
            .start_research(catalog, id, &mut settlement.resources, &mut Vec::new())
            .unwrap();
    }

    #[test]
    fn gathering_draws_on_plants_and_water() {
        let (catalog, mut settlement) = setup();
        let mut ecosystem = Ecosystem::default();
        settlement.population.groups = PerActivity::new(5, 0, 0, 5);
        // chance roll misses clay
        settlement.perform_gathering(
            &catalog,
            &mut ecosystem,
            1.0,
            &mut ScriptedRandom::constant(0.9),
            &mut Vec::new(),
        );
        // power 5: plants min(20, 3) = 3, water floor(2 * 0.8) = 1, wood floor(1.5) = 1
        assert_eq!(ecosystem.plants.quantity, 97);
        assert_eq!(settlement.resources.get(ResourceKind::Food), 103.0);
        assert_eq!(settlement.resources.get(ResourceKind::Water), 101.0);
        assert_eq!(settlement.resources.get(ResourceKind::Wood), 51.0);
        assert_eq!(settlement.resources.get(ResourceKind::PlantFiber), 10.0);
    }

    #[test]
    fn first_clay_find_is_announced() {
        let (catalog, mut settlement) = setup();
        let mut ecosystem = Ecosystem::default();
        settlement.population.groups = PerActivity::new(10, 0, 0, 0);
        settlement.stats.efficiency = 2.0;
        let mut events = Vec::new();
        // clay roll hits, then below(5) draws 0.7 -> 3
        let mut rng = ScriptedRandom::new([0.0, 0.7], 0.9);
        settlement.perform_gathering(&catalog, &mut ecosystem, 1.0, &mut rng, &mut events);
        assert_eq!(settlement.resources.get(ResourceKind::Clay), 3.0);
        assert_eq!(
            events,
            vec![SimEvent::ResourceFound {
                resource: ResourceKind::Clay
            }]
        );
    }

    #[test]
    fn hunting_brings_food_hide_and_stone() {
        let (catalog, mut settlement) = setup();
        let mut ecosystem = Ecosystem::default();
        settlement.population.groups = PerActivity::new(0, 10, 0, 0);
        settlement.perform_hunting(
            &catalog,
            &mut ecosystem,
            1.0,
            &mut ScriptedRandom::constant(0.9),
            &mut Vec::new(),
        );
        // power 10 against 50 animals: 10% share = 5 hunted
        assert_eq!(ecosystem.animals.population, 45);
        assert_eq!(settlement.resources.get(ResourceKind::Food), 125.0);
        assert_eq!(settlement.resources.get(ResourceKind::AnimalHide), 3.0);
        assert_eq!(settlement.resources.get(ResourceKind::Stone), 21.0);
        assert_eq!(ecosystem.minerals.available_surface, 99);
    }

    #[test]
    fn building_is_limited_by_wood() {
        let (catalog, mut settlement) = setup();
        settlement.population.groups = PerActivity::new(0, 0, 8, 0);
        settlement.resources.set(ResourceKind::Wood, 2.0);
        settlement.perform_building(&catalog, 1.0, &mut Vec::new());
        // power 8 wants 4 wood; half the supply halves every increment
        assert_eq!(settlement.resources.get(ResourceKind::Wood), 0.0);
        assert_eq!(settlement.buildings.shelter, 1.0);
        assert_eq!(settlement.buildings.research_area, 1.0);
    }

    #[test]
    fn shelter_milestone_fires_once_even_when_jumped() {
        let (catalog, mut settlement) = setup();
        settlement.population.groups = PerActivity::new(0, 0, 40, 0);
        settlement.buildings.shelter = 45.0;
        settlement.buildings.storage_area = 100.0;
        settlement.buildings.crafting_area = 100.0;
        settlement.buildings.research_area = 100.0;
        let mut events = Vec::new();
        settlement.perform_building(&catalog, 1.0, &mut events);
        assert_eq!(settlement.buildings.shelter, 85.0);
        assert_eq!(settlement.stats.health, 80.0);
        assert_eq!(settlement.stats.happiness, 60.0);
        settlement.perform_building(&catalog, 1.0, &mut events);
        assert_eq!(
            events,
            vec![SimEvent::BuildingMilestone {
                building: BuildingKind::Shelter
            }]
        );
    }

    #[test]
    fn idle_builders_lose_their_success_rate() {
        let (catalog, mut settlement) = setup();
        settlement.population.groups = PerActivity::new(0, 0, 10, 0);
        for kind in BuildingKind::ALL {
            *settlement.buildings.get_mut(kind) = 100.0;
        }
        let before = settlement.success_rates.building;
        let wood = settlement.resources.get(ResourceKind::Wood);
        let mut events: Vec<SimEvent> = Vec::new();
        for _ in 0..100 {
            settlement.perform_building(&catalog, 1.0, &mut events);
        }
        assert!(settlement.success_rates.building < before);
        assert_eq!(settlement.resources.get(ResourceKind::Wood), wood);
        assert!(settlement.buildings.all_complete());
        assert!(events.is_empty());
    }

    #[test]
    fn research_completes_and_may_grant_a_eureka() {
        let (catalog, mut settlement) = setup();
        for id in ["stone_tools", "wooden_tools"] {
            settlement.research.grant(&catalog, id).unwrap();
        }
        start(&mut settlement, &catalog, "combined_tools");
        settlement.population.groups = PerActivity::new(0, 0, 0, 5);
        let mut events = Vec::new();
        // spontaneous rolls miss at 0.5, the eureka roll (chance 0.7) hits
        let mut rng = ScriptedRandom::constant(0.5);
        for _ in 0..3 {
            settlement.perform_research(&catalog, 1.0, &mut rng, &mut events);
        }
        assert_eq!(
            settlement.research.progress("combined_tools").unwrap().progress_percent,
            75.0
        );
        settlement.perform_research(&catalog, 1.0, &mut rng, &mut events);
        assert_eq!(
            settlement.research.status("combined_tools"),
            ResearchStatus::Discovered
        );
        assert!(settlement.research.progress("combined_tools").unwrap().eureka);
        assert!(events.contains(&SimEvent::Eureka {
            technology: "combined_tools".into(),
            name: "Flint Techniques".into(),
        }));
    }

    #[test]
    fn eureka_needs_a_roll_under_the_discovery_chance() {
        let (catalog, mut settlement) = setup();
        for id in ["stone_tools", "wooden_tools"] {
            settlement.research.grant(&catalog, id).unwrap();
        }
        start(&mut settlement, &catalog, "combined_tools");
        settlement.population.groups = PerActivity::new(0, 0, 0, 20);
        let mut events = Vec::new();
        let mut rng = ScriptedRandom::constant(0.9);
        settlement.perform_research(&catalog, 1.0, &mut rng, &mut events);
        let entry = settlement.research.progress("combined_tools").unwrap();
        assert_eq!(entry.status, ResearchStatus::Discovered);
        assert!(!entry.eureka);
        assert!(!events.iter().any(|event| matches!(event, SimEvent::Eureka { .. })));
    }

    #[test]
    fn unaffordable_research_is_skipped() {
        let (catalog, mut settlement) = setup();
        start(&mut settlement, &catalog, "stone_tools");
        settlement.resources.set(ResourceKind::Stone, 0.5);
        settlement.population.groups = PerActivity::new(0, 0, 0, 5);
        let mut rng = ScriptedRandom::constant(0.9);
        settlement.perform_research(&catalog, 1.0, &mut rng, &mut Vec::new());
        assert_eq!(
            settlement.research.progress("stone_tools").unwrap().progress_percent,
            0.0
        );
        assert_eq!(settlement.resources.get(ResourceKind::Stone), 0.5);
    }

    #[test]
    fn no_researchers_means_no_research() {
        let (catalog, mut settlement) = setup();
        settlement.population.groups = PerActivity::new(10, 0, 0, 0);
        let before = settlement.success_rates.researching;
        let mut rng = ScriptedRandom::constant(0.0);
        settlement.perform_research(&catalog, 1.0, &mut rng, &mut Vec::new());
        assert_eq!(settlement.research.in_progress_count(), 0);
        assert_eq!(settlement.success_rates.researching, before);
    }

    #[test]
    fn technology_effects_raise_efficiency() {
        let (catalog, mut settlement) = setup();
        settlement.research.grant(&catalog, "stone_tools").unwrap();
        settlement.buildings.research_area = 60.0;
        assert!(
            (settlement.activity_efficiency(&catalog, Activity::Gathering) - 1.2).abs() < 1e-12
        );
        assert!(
            (settlement.activity_efficiency(&catalog, Activity::Researching) - 1.3).abs() < 1e-12
        );
    }
}
