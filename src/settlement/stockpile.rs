use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Food,
    Water,
    Wood,
    Stone,
    PlantFiber,
    AnimalHide,
    Clay,
    MetalOre,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Food,
        ResourceKind::Water,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::PlantFiber,
        ResourceKind::AnimalHide,
        ResourceKind::Clay,
        ResourceKind::MetalOre,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Food => "food",
            ResourceKind::Water => "water",
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::PlantFiber => "plant fiber",
            ResourceKind::AnimalHide => "animal hide",
            ResourceKind::Clay => "clay",
            ResourceKind::MetalOre => "metal ore",
        };
        f.write_str(label)
    }
}

/// Settlement stores. Amounts never go below zero; missing kinds read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stockpile(BTreeMap<ResourceKind, f64>);

impl Stockpile {
    pub fn starting() -> Self {
        let mut stockpile = Self::default();
        for kind in ResourceKind::ALL {
            let amount = match kind {
                ResourceKind::Food | ResourceKind::Water => 100.0,
                ResourceKind::Wood => 50.0,
                ResourceKind::Stone => 20.0,
                ResourceKind::PlantFiber => 10.0,
                ResourceKind::AnimalHide | ResourceKind::Clay | ResourceKind::MetalOre => 0.0,
            };
            stockpile.set(kind, amount);
        }
        stockpile
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, kind: ResourceKind, amount: f64) {
        self.0.insert(kind, amount.max(0.0));
    }

    pub fn add(&mut self, kind: ResourceKind, amount: f64) {
        let current = self.get(kind);
        self.set(kind, current + amount.max(0.0));
    }

    /// Removes up to `amount` and returns what was actually removed.
    pub fn take(&mut self, kind: ResourceKind, amount: f64) -> f64 {
        let current = self.get(kind);
        let taken = amount.max(0.0).min(current);
        self.set(kind, current - taken);
        taken
    }

    pub fn can_afford(&self, cost: &BTreeMap<ResourceKind, f64>) -> bool {
        cost.iter().all(|(kind, amount)| self.get(*kind) >= *amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, f64)> + '_ {
        self.0.iter().map(|(kind, amount)| (*kind, *amount))
    }
}
