//! The settlement and its per-tick economic update.
//!
//! [`Settlement::update`] runs a fixed sequence every tick: consume food and
//! water, reassign the population, work (gather, hunt, build, research),
//! grow or shrink the population, learn from the outcomes and react to
//! shortages. Nothing in the sequence fails; shortfalls degrade stats instead.

mod buildings;
mod labor;
mod stockpile;
mod work;

use serde::{Deserialize, Serialize};

use crate::ecosystem::Ecosystem;
use crate::environment::{Environment, Season};
use crate::events::{EventSink, SimEvent};
use crate::rng::RandomSource;
use crate::technology::{ResearchLedger, TechnologyCatalog};

pub use buildings::{BuildingKind, BuildingProgress, MILESTONE_PERCENT};
pub use labor::{assign_population, Activity, Needs, PerActivity};
pub use stockpile::{ResourceKind, Stockpile};

const FOOD_SHORTAGE_PER_CAPITA: f64 = 5.0;
const WATER_SHORTAGE_PER_CAPITA: f64 = 7.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub total: u32,
    /// Net change applied by the most recent population update.
    pub growth: i64,
    pub death_rate: f64,
    pub food_consumption_per_day: f64,
    pub water_consumption_per_day: f64,
    pub groups: PerActivity<u32>,
}

impl Default for Population {
    fn default() -> Self {
        Self {
            total: 10,
            growth: 0,
            death_rate: 0.0,
            food_consumption_per_day: 2.0,
            water_consumption_per_day: 3.0,
            groups: PerActivity::new(5, 3, 2, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub happiness: f64,
    pub health: f64,
    pub knowledge_level: f64,
    pub efficiency: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            happiness: 50.0,
            health: 75.0,
            knowledge_level: 10.0,
            efficiency: 1.0,
        }
    }
}

/// Which shortage warnings are currently active, so each onset is reported once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageAlerts {
    #[serde(default)]
    pub food: bool,
    #[serde(default)]
    pub water: bool,
}

/// Unmet demand from one consumption step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Shortfall {
    pub food: f64,
    pub water: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub population: Population,
    pub resources: Stockpile,
    pub stats: Stats,
    pub preferences: PerActivity<f64>,
    pub buildings: BuildingProgress,
    pub success_rates: PerActivity<f64>,
    pub research: ResearchLedger,
    pub alerts: ShortageAlerts,
}

impl Settlement {
    pub fn new(catalog: &TechnologyCatalog) -> Self {
        Self {
            population: Population::default(),
            resources: Stockpile::starting(),
            stats: Stats::default(),
            preferences: PerActivity::new(0.5, 0.3, 0.1, 0.1),
            buildings: BuildingProgress::default(),
            success_rates: PerActivity::new(0.6, 0.4, 0.5, 0.3),
            research: ResearchLedger::new(catalog),
            alerts: ShortageAlerts::default(),
        }
    }

    pub fn update(
        &mut self,
        catalog: &TechnologyCatalog,
        ecosystem: &mut Ecosystem,
        environment: &Environment,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        self.consume_resources(day_fraction);
        self.assign_population();
        self.perform_gathering(catalog, ecosystem, day_fraction, rng, events);
        self.perform_hunting(catalog, ecosystem, day_fraction, rng, events);
        self.perform_building(catalog, day_fraction, events);
        self.perform_research(catalog, day_fraction, rng, events);
        self.update_population(environment, day_fraction);
        self.update_learning();
        self.check_resource_shortages(events);
        tracing::debug!(
            population = self.population.total,
            food = self.resources.get(ResourceKind::Food),
            water = self.resources.get(ResourceKind::Water),
            health = self.stats.health,
            "settlement updated"
        );
    }

    /// Eats and drinks for `day_fraction` days. Whatever the stores cannot
    /// cover is returned and costs health and happiness.
    pub fn consume_resources(&mut self, day_fraction: f64) -> Shortfall {
        let total = f64::from(self.population.total);
        let food_needed = total * self.population.food_consumption_per_day * day_fraction;
        let water_needed = total * self.population.water_consumption_per_day * day_fraction;

        let shortfall = Shortfall {
            food: (food_needed - self.resources.take(ResourceKind::Food, food_needed)).max(0.0),
            water: (water_needed - self.resources.take(ResourceKind::Water, water_needed))
                .max(0.0),
        };

        if shortfall.food > 0.0 || shortfall.water > 0.0 {
            let stats = &mut self.stats;
            stats.health -= (shortfall.food * 0.2 + shortfall.water * 0.3) * day_fraction;
            stats.happiness -= (shortfall.food * 0.3 + shortfall.water * 0.4) * day_fraction;
            stats.health = stats.health.clamp(0.0, 100.0);
            stats.happiness = stats.happiness.clamp(0.0, 100.0);
        }
        shortfall
    }

    pub fn needs(&self) -> Needs {
        Needs::compute(
            self.population.total,
            self.resources.get(ResourceKind::Food),
            self.resources.get(ResourceKind::Water),
            self.buildings.average_completion(),
            self.research.discovered_count(),
        )
    }

    pub fn assign_population(&mut self) {
        self.population.groups = assign_population(
            self.population.total,
            &self.needs(),
            &self.preferences,
            &self.success_rates,
        );
    }

    pub fn update_population(&mut self, environment: &Environment, day_fraction: f64) {
        let total = f64::from(self.population.total);
        let food_factor = (self.resources.get(ResourceKind::Food) / (total * 5.0)).min(1.0);
        let water_factor = (self.resources.get(ResourceKind::Water) / (total * 7.0)).min(1.0);
        let health_factor = self.stats.health / 100.0;

        let season_factor = match environment.season {
            Season::Spring => 1.2,
            Season::Winter => 0.8,
            Season::Summer | Season::Autumn => 1.0,
        };
        let growth_rate =
            0.001 * day_fraction * food_factor * water_factor * health_factor * season_factor;

        let mut death_rate = 0.0005 * day_fraction;
        if self.stats.health < 50.0 {
            death_rate += (50.0 - self.stats.health) * 0.0001 * day_fraction;
        }
        if food_factor < 0.5 || water_factor < 0.5 {
            death_rate += 0.001 * day_fraction;
        }

        let net = (total * growth_rate - total * death_rate).floor() as i64;
        let previous = i64::from(self.population.total);
        let next = (previous + net).clamp(1, i64::from(u32::MAX));
        self.population.total = next as u32;
        self.population.growth = next - previous;
        self.population.death_rate = death_rate;
        self.rebalance_groups();
    }

    /// Brings the groups back in line with `total` after births or deaths.
    /// Newcomers become researchers; losses come from researchers first.
    fn rebalance_groups(&mut self) {
        let total = self.population.total;
        let groups = &mut self.population.groups;
        let assigned = groups.total();
        if assigned < total {
            groups.researching += total - assigned;
            return;
        }
        let mut excess = assigned - total;
        for activity in [
            Activity::Researching,
            Activity::Building,
            Activity::Hunting,
            Activity::Gathering,
        ] {
            let group = groups.get_mut(activity);
            let removed = excess.min(*group);
            *group -= removed;
            excess -= removed;
        }
    }

    pub fn update_learning(&mut self) {
        for activity in Activity::ALL {
            let preference = self.preferences.get_mut(activity);
            *preference = *preference * 0.95 + self.success_rates.get(activity) * 0.05;
        }
        self.preferences.normalize();

        self.stats.efficiency = 1.0 + self.stats.knowledge_level / 100.0;
        self.stats.knowledge_level = (self.stats.knowledge_level
            + f64::from(self.population.groups.researching) * 0.01)
            .min(100.0);
    }

    pub fn check_resource_shortages(&mut self, events: &mut dyn EventSink) {
        let total = f64::from(self.population.total);
        let food_per_capita = self.resources.get(ResourceKind::Food) / total;
        let water_per_capita = self.resources.get(ResourceKind::Water) / total;

        if food_per_capita < FOOD_SHORTAGE_PER_CAPITA {
            if !self.alerts.food {
                events.emit(SimEvent::FoodShortage {
                    per_capita: food_per_capita,
                });
            }
            self.alerts.food = true;
            self.preferences.gathering += 0.1;
            self.preferences.hunting += 0.1;
            self.preferences.normalize();
        } else {
            self.alerts.food = false;
        }

        if water_per_capita < WATER_SHORTAGE_PER_CAPITA {
            if !self.alerts.water {
                events.emit(SimEvent::WaterShortage {
                    per_capita: water_per_capita,
                });
            }
            self.alerts.water = true;
            self.preferences.gathering += 0.15;
            self.preferences.normalize();
        } else {
            self.alerts.water = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRandom;

    fn settlement() -> (TechnologyCatalog, Settlement) {
        let catalog = TechnologyCatalog::standard().unwrap();
        let settlement = Settlement::new(&catalog);
        (catalog, settlement)
    }

    #[test]
    fn one_day_of_consumption() {
        let (_, mut settlement) = settlement();
        let shortfall = settlement.consume_resources(1.0);
        assert_eq!(settlement.resources.get(ResourceKind::Food), 80.0);
        assert_eq!(settlement.resources.get(ResourceKind::Water), 70.0);
        assert_eq!(shortfall, Shortfall::default());
        assert_eq!(settlement.stats.health, 75.0);
    }

    #[test]
    fn shortfall_costs_health_and_happiness() {
        let (_, mut settlement) = settlement();
        settlement.resources.set(ResourceKind::Food, 15.0);
        let shortfall = settlement.consume_resources(1.0);
        assert_eq!(shortfall.food, 5.0);
        assert_eq!(settlement.resources.get(ResourceKind::Food), 0.0);
        assert_eq!(settlement.stats.health, 74.0);
        assert_eq!(settlement.stats.happiness, 48.5);
    }

    #[test]
    fn stats_are_clamped_under_severe_shortage() {
        let (_, mut settlement) = settlement();
        settlement.resources.set(ResourceKind::Food, 0.0);
        settlement.resources.set(ResourceKind::Water, 0.0);
        settlement.population.total = 500;
        settlement.consume_resources(1.0);
        assert_eq!(settlement.stats.health, 0.0);
        assert_eq!(settlement.stats.happiness, 0.0);
    }

    #[test]
    fn population_never_drops_below_one() {
        let (_, mut settlement) = settlement();
        settlement.population.total = 1;
        settlement.population.groups = PerActivity::new(1, 0, 0, 0);
        settlement.stats.health = 0.0;
        settlement.resources.set(ResourceKind::Food, 0.0);
        settlement.update_population(&Environment::default(), 1000.0);
        assert_eq!(settlement.population.total, 1);
        assert_eq!(settlement.population.groups.total(), 1);
    }

    #[test]
    fn deaths_come_out_of_researchers_first() {
        let (_, mut settlement) = settlement();
        settlement.population.total = 100;
        settlement.population.groups = PerActivity::new(40, 30, 20, 10);
        settlement.stats.health = 0.0;
        settlement.resources.set(ResourceKind::Food, 0.0);
        // death rate 0.0005 + 0.005 + 0.001 per day over 20 days
        settlement.update_population(&Environment::default(), 20.0);
        assert_eq!(settlement.population.total, 87);
        assert_eq!(settlement.population.growth, -13);
        assert_eq!(settlement.population.groups, PerActivity::new(40, 30, 17, 0));
    }

    #[test]
    fn learning_keeps_preferences_normalized() {
        let (_, mut settlement) = settlement();
        settlement.population.groups.researching = 4;
        settlement.update_learning();
        assert!((settlement.preferences.sum() - 1.0).abs() < 1e-9);
        assert_eq!(settlement.stats.efficiency, 1.1);
        assert!((settlement.stats.knowledge_level - 10.04).abs() < 1e-9);
    }

    #[test]
    fn shortages_shift_work_toward_food_and_water() {
        let (_, mut settlement) = settlement();
        settlement.resources.set(ResourceKind::Food, 20.0);
        settlement.resources.set(ResourceKind::Water, 20.0);
        let mut events = Vec::new();
        settlement.check_resource_shortages(&mut events);
        // +0.1/+0.1 then /1.2, then gathering +0.15 and /1.15
        let expected_gathering = (0.6 / 1.2 + 0.15) / 1.15;
        assert!((settlement.preferences.gathering - expected_gathering).abs() < 1e-9);
        assert!((settlement.preferences.sum() - 1.0).abs() < 1e-9);
        assert_eq!(events.len(), 2);

        settlement.check_resource_shortages(&mut events);
        assert_eq!(events.len(), 2, "ongoing shortages are reported once");
    }

    #[test]
    fn full_update_keeps_invariants() {
        let (catalog, mut settlement) = settlement();
        let mut ecosystem = Ecosystem::default();
        let environment = Environment::default();
        let mut rng = ScriptedRandom::constant(0.5);
        let mut events = Vec::new();
        for _ in 0..50 {
            settlement.update(
                &catalog,
                &mut ecosystem,
                &environment,
                1.0,
                &mut rng,
                &mut events,
            );
            assert_eq!(
                settlement.population.groups.total(),
                settlement.population.total
            );
            assert!((settlement.preferences.sum() - 1.0).abs() < 1e-9);
            assert!(settlement.resources.iter().all(|(_, amount)| amount >= 0.0));
        }
    }
}
