//! Wild stock around the settlement: plants, game animals and minerals.
//!
//! Regeneration is stochastic and driven once per tick by [`Ecosystem::update`];
//! the settlement draws on the stock only through the extraction methods,
//! which never remove more than is there.

use serde::{Deserialize, Serialize};

use crate::environment::{Environment, Season, Weather};
use crate::events::{EventSink, SimEvent};
use crate::rng::RandomSource;

pub const ANIMAL_FLOOR: u32 = 5;
pub const ANIMAL_CARRYING_CAPACITY: u32 = 100;
pub const HAZARD_CHANCE_PER_TICK: f64 = 0.01;

const PLANT_HARVEST_SHARE: f64 = 0.2;
const ANIMAL_HUNT_SHARE: f64 = 0.1;
const FOOD_PER_ANIMAL: u32 = 5;
const HIDE_PER_ANIMAL: f64 = 0.7;
const DIVERSITY_DRIFT_PER_DAY: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plants {
    pub quantity: u32,
    /// Growth accumulated but not yet realised as whole plants.
    pub growth: f64,
    pub diversity: u8,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animals {
    pub population: u32,
    pub diversity: u32,
    pub reproduction_rate: f64,
    pub migration_chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minerals {
    pub available_surface: u32,
    pub hidden_deposits: u32,
    pub erosion_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuntYield {
    pub hunted: u32,
    pub food: u32,
    pub animal_hide: u32,
}

struct SeasonalProfile {
    growth_rate: f64,
    reproduction_rate: f64,
    water_availability: f64,
    migration_chance: f64,
}

fn seasonal_profile(season: Season) -> SeasonalProfile {
    match season {
        Season::Spring => SeasonalProfile {
            growth_rate: 0.08,
            reproduction_rate: 0.04,
            water_availability: 0.9,
            migration_chance: 0.1,
        },
        Season::Summer => SeasonalProfile {
            growth_rate: 0.05,
            reproduction_rate: 0.02,
            water_availability: 0.6,
            migration_chance: 0.1,
        },
        Season::Autumn => SeasonalProfile {
            growth_rate: 0.03,
            reproduction_rate: 0.01,
            water_availability: 0.7,
            migration_chance: 0.1,
        },
        Season::Winter => SeasonalProfile {
            growth_rate: 0.01,
            reproduction_rate: 0.005,
            water_availability: 0.8,
            migration_chance: 0.2,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ecosystem {
    pub plants: Plants,
    pub animals: Animals,
    pub minerals: Minerals,
    pub soil_fertility: f64,
    pub water_availability: f64,
}

impl Default for Ecosystem {
    fn default() -> Self {
        Self {
            plants: Plants {
                quantity: 100,
                growth: 0.0,
                diversity: 5,
                growth_rate: 0.05,
            },
            animals: Animals {
                population: 50,
                diversity: 3,
                reproduction_rate: 0.02,
                migration_chance: 0.1,
            },
            minerals: Minerals {
                available_surface: 100,
                hidden_deposits: 500,
                erosion_rate: 0.01,
            },
            soil_fertility: 0.7,
            water_availability: 0.8,
        }
    }
}

impl Ecosystem {
    pub fn update(
        &mut self,
        environment: &Environment,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        self.apply_seasonal_effects(environment);
        self.update_plants(environment, day_fraction, rng);
        self.update_animals(day_fraction, rng, events);
        self.update_minerals(day_fraction, events);
        self.handle_environmental_events(environment, rng, events);
    }

    /// Resets the season-driven rates, then lets the weather perturb them.
    pub fn apply_seasonal_effects(&mut self, environment: &Environment) {
        let profile = seasonal_profile(environment.season);
        self.plants.growth_rate = profile.growth_rate;
        self.animals.reproduction_rate = profile.reproduction_rate;
        self.animals.migration_chance = profile.migration_chance;
        self.water_availability = profile.water_availability;

        match environment.weather {
            Weather::Rainy => {
                self.water_availability = (self.water_availability + 0.2).min(1.0);
                self.plants.growth_rate += 0.02;
            }
            Weather::Dry => {
                self.water_availability = (self.water_availability - 0.1).max(0.2);
                self.plants.growth_rate -= 0.02;
            }
            Weather::Stormy => self.animals.migration_chance += 0.1,
            Weather::Clear | Weather::Cloudy | Weather::Snowy => {}
        }
    }

    pub fn update_plants(
        &mut self,
        environment: &Environment,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
    ) {
        let modifier =
            self.soil_fertility * self.water_availability * (environment.temperature / 20.0);
        let plants = &mut self.plants;
        // frost can stall growth but never reverse banked progress below zero
        plants.growth = (plants.growth + plants.growth_rate * modifier * day_fraction).max(0.0);

        if plants.growth >= 1.0 {
            let realized = plants.growth.floor();
            plants.quantity = plants.quantity.saturating_add(realized as u32);
            plants.growth -= realized;

            if rng.chance(DIVERSITY_DRIFT_PER_DAY * day_fraction) {
                let step: i16 = if rng.chance(0.5) { 1 } else { -1 };
                plants.diversity = (i16::from(plants.diversity) + step).clamp(1, 10) as u8;
            }
        }
    }

    pub fn update_animals(
        &mut self,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        let animals = &mut self.animals;
        let births = (f64::from(animals.population) * animals.reproduction_rate * day_fraction)
            .floor()
            .max(0.0) as u32;
        animals.population = animals.population.saturating_add(births);

        if rng.chance(animals.migration_chance * day_fraction) {
            let swing = ((rng.next_f64() - 0.5) * 10.0 * day_fraction).floor() as i64;
            let before = i64::from(animals.population);
            let after = (before + swing).max(i64::from(ANIMAL_FLOOR));
            animals.population = after as u32;
            let change = after - before;
            if change > 0 {
                events.emit(SimEvent::AnimalsArrived {
                    count: change as u32,
                });
            } else if change < 0 {
                events.emit(SimEvent::AnimalsDeparted {
                    count: change.unsigned_abs() as u32,
                });
            }
        }

        if animals.population > ANIMAL_CARRYING_CAPACITY {
            let excess = animals.population - ANIMAL_CARRYING_CAPACITY;
            let culled = ((f64::from(excess) * 0.1 * day_fraction).floor() as u32).min(excess);
            animals.population -= culled;
        }
    }

    pub fn update_minerals(&mut self, day_fraction: f64, events: &mut dyn EventSink) {
        let minerals = &mut self.minerals;
        let erosion = f64::from(minerals.hidden_deposits) * minerals.erosion_rate * day_fraction;
        if erosion > 0.1 {
            let exposed = (erosion.floor() as u32).min(minerals.hidden_deposits);
            minerals.available_surface = minerals.available_surface.saturating_add(exposed);
            minerals.hidden_deposits -= exposed;
            if exposed > 5 {
                events.emit(SimEvent::MineralsExposed { amount: exposed });
            }
        }
    }

    /// Fixed per-tick background hazard; deliberately not scaled by the
    /// day fraction.
    pub fn handle_environmental_events(
        &mut self,
        environment: &Environment,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        if !rng.chance(HAZARD_CHANCE_PER_TICK) {
            return;
        }
        if environment.weather == Weather::Dry && environment.temperature > 25.0 {
            let remaining = (f64::from(self.plants.quantity) * 0.8).floor() as u32;
            let plants_lost = self.plants.quantity - remaining;
            self.plants.quantity = remaining;
            events.emit(SimEvent::Wildfire { plants_lost });
        } else if environment.weather == Weather::Rainy && environment.rainfall > 20.0 {
            let before = self.animals.population;
            let remaining = ((f64::from(before) * 0.9).floor() as u32).max(ANIMAL_FLOOR.min(before));
            self.animals.population = remaining;
            events.emit(SimEvent::Flood {
                animals_lost: before - remaining,
            });
        }
    }

    /// Takes up to 20% of standing plants, scaled by `efficiency`.
    pub fn gather_plants(&mut self, efficiency: f64, requested: f64) -> u32 {
        let reachable = (f64::from(self.plants.quantity) * PLANT_HARVEST_SHARE).min(requested);
        let gathered = extract(reachable, efficiency).min(self.plants.quantity);
        self.plants.quantity -= gathered;
        gathered
    }

    /// Hunts up to 10% of the herd, scaled by `hunting_success`. The herd is
    /// never hunted below its floor.
    pub fn hunt_animals(&mut self, hunting_success: f64, requested: f64) -> HuntYield {
        let reachable = (f64::from(self.animals.population) * ANIMAL_HUNT_SHARE).min(requested);
        let huntable = self.animals.population.saturating_sub(ANIMAL_FLOOR);
        let hunted = extract(reachable, hunting_success).min(huntable);
        self.animals.population -= hunted;
        HuntYield {
            hunted,
            food: hunted * FOOD_PER_ANIMAL,
            animal_hide: (f64::from(hunted) * HIDE_PER_ANIMAL).floor() as u32,
        }
    }

    pub fn gather_minerals(&mut self, efficiency: f64, requested: f64) -> u32 {
        let reachable = f64::from(self.minerals.available_surface).min(requested);
        let gathered = extract(reachable, efficiency).min(self.minerals.available_surface);
        self.minerals.available_surface -= gathered;
        gathered
    }
}

fn extract(reachable: f64, efficiency: f64) -> u32 {
    (reachable * efficiency).floor().max(0.0) as u32
}
