use std::fmt;

use serde::{Deserialize, Serialize};

pub const MILESTONE_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Shelter,
    StorageArea,
    CraftingArea,
    ResearchArea,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 4] = [
        BuildingKind::Shelter,
        BuildingKind::StorageArea,
        BuildingKind::CraftingArea,
        BuildingKind::ResearchArea,
    ];
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildingKind::Shelter => "shelter",
            BuildingKind::StorageArea => "storage area",
            BuildingKind::CraftingArea => "crafting area",
            BuildingKind::ResearchArea => "research area",
        };
        f.write_str(label)
    }
}

/// Completion percentage per building, each in `[0, 100]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingProgress {
    pub shelter: f64,
    pub storage_area: f64,
    pub crafting_area: f64,
    pub research_area: f64,
}

impl BuildingProgress {
    pub fn get(&self, kind: BuildingKind) -> f64 {
        match kind {
            BuildingKind::Shelter => self.shelter,
            BuildingKind::StorageArea => self.storage_area,
            BuildingKind::CraftingArea => self.crafting_area,
            BuildingKind::ResearchArea => self.research_area,
        }
    }

    pub fn get_mut(&mut self, kind: BuildingKind) -> &mut f64 {
        match kind {
            BuildingKind::Shelter => &mut self.shelter,
            BuildingKind::StorageArea => &mut self.storage_area,
            BuildingKind::CraftingArea => &mut self.crafting_area,
            BuildingKind::ResearchArea => &mut self.research_area,
        }
    }

    /// Mean completion as a fraction in `[0, 1]`.
    pub fn average_completion(&self) -> f64 {
        BuildingKind::ALL
            .iter()
            .map(|kind| self.get(*kind))
            .sum::<f64>()
            / 400.0
    }

    pub fn all_complete(&self) -> bool {
        BuildingKind::ALL.iter().all(|kind| self.get(*kind) >= 100.0)
    }
}
