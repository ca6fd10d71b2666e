use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::environment::{Season, Weather};
use crate::settlement::{BuildingKind, ResourceKind};
use crate::technology::TechId;

pub const EVENT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    SeasonChanged { season: Season },
    WeatherChanged { from: Weather, to: Weather },
    Wildfire { plants_lost: u32 },
    Flood { animals_lost: u32 },
    AnimalsArrived { count: u32 },
    AnimalsDeparted { count: u32 },
    MineralsExposed { amount: u32 },
    ResourceFound { resource: ResourceKind },
    FoodShortage { per_capita: f64 },
    WaterShortage { per_capita: f64 },
    ResearchStarted { technology: TechId },
    ResearchCancelled { technology: TechId },
    TechnologyDiscovered { technology: TechId },
    Eureka { technology: TechId, name: String },
    BuildingMilestone { building: BuildingKind },
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::SeasonChanged { season } => write!(f, "The season turned to {season}."),
            SimEvent::WeatherChanged { to, .. } => write!(f, "Weather changed to {to}."),
            SimEvent::Wildfire { plants_lost } => {
                write!(f, "A wildfire destroyed {plants_lost} plants.")
            }
            SimEvent::Flood { animals_lost } => {
                write!(f, "A flood killed {animals_lost} animals.")
            }
            SimEvent::AnimalsArrived { count } => {
                write!(f, "A group of {count} animals migrated into the area.")
            }
            SimEvent::AnimalsDeparted { count } => {
                write!(f, "A group of {count} animals migrated away from the area.")
            }
            SimEvent::MineralsExposed { amount } => {
                write!(f, "Erosion exposed {amount} units of surface minerals.")
            }
            SimEvent::ResourceFound { resource } => {
                write!(f, "Workers found their first {resource}.")
            }
            SimEvent::FoodShortage { per_capita } => {
                write!(f, "Food supplies are critically low ({per_capita:.1} per person).")
            }
            SimEvent::WaterShortage { per_capita } => {
                write!(f, "Water supplies are critically low ({per_capita:.1} per person).")
            }
            SimEvent::ResearchStarted { technology } => {
                write!(f, "Started researching {technology}.")
            }
            SimEvent::ResearchCancelled { technology } => {
                write!(f, "Cancelled research on {technology}.")
            }
            SimEvent::TechnologyDiscovered { technology } => {
                write!(f, "Technology discovered: {technology}.")
            }
            SimEvent::Eureka { technology, name } => write!(f, "Eureka! {name} ({technology})."),
            SimEvent::BuildingMilestone { building } => {
                write!(f, "The {building} reached its first milestone.")
            }
        }
    }
}

/// Fire-and-forget destination for simulation events.
pub trait EventSink {
    fn emit(&mut self, event: SimEvent);
}

impl EventSink for Vec<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub tick: u64,
    pub day: f64,
    pub event: SimEvent,
}

/// Bounded log of recent events, stamped with the tick that produced them.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LoggedEvent>,
    capacity: usize,
    tick: u64,
    day: f64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(EVENT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            tick: 0,
            day: 0.0,
        }
    }

    pub fn set_clock(&mut self, tick: u64, day: f64) {
        self.tick = tick;
        self.day = day;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.entries.iter()
    }

    /// Most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LoggedEvent> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn extend_restored(&mut self, entries: impl IntoIterator<Item = LoggedEvent>) {
        for entry in entries {
            self.push(entry);
        }
    }

    fn push(&mut self, entry: LoggedEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EVENT_LOG_CAPACITY)
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: SimEvent) {
        match &event {
            SimEvent::FoodShortage { .. } | SimEvent::WaterShortage { .. } => {
                tracing::warn!(target: "homestead::events", tick = self.tick, "{event}");
            }
            _ => tracing::info!(target: "homestead::events", tick = self.tick, "{event}"),
        }
        self.push(LoggedEvent {
            tick: self.tick,
            day: self.day,
            event,
        });
    }
}
