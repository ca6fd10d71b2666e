//! Static technology catalog.
//!
//! Definitions are immutable once loaded; per-settlement discovery state lives
//! in [`ResearchLedger`]. A catalog is validated when it is built, so a bad
//! prerequisite or a requirement cycle fails at load time rather than in the
//! middle of a run.

mod research;

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::settlement::{Activity, ResourceKind};

pub use research::{
    ResearchError, ResearchLedger, ResearchStatus, TechProgress, MAX_CONCURRENT_RESEARCH,
};

const PRIMITIVE_CATALOG: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/catalogs/primitive.yaml"
));

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechId(String);

impl TechId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TechId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TechId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TechId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechPhase {
    #[default]
    Primitive,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    GatheringEfficiency,
    WoodGatheringRate,
    FoodGatheringRate,
    HuntingSuccess,
    BuildingEfficiency,
    ResearchEfficiency,
    TechnologicalAdvancement,
    FoodPreservation,
    FireEfficiency,
    FoodVariety,
    PlantKnowledge,
    FoodProduction,
    SettlementStability,
    AgriculturalEfficiency,
    FoodSecurity,
    ToolDurability,
    NightActivity,
    SettlementFocus,
    IndependentFireCreation,
}

impl EffectKind {
    /// The activity whose efficiency this effect compounds, if any.
    pub fn activity(self) -> Option<Activity> {
        match self {
            EffectKind::GatheringEfficiency | EffectKind::WoodGatheringRate => {
                Some(Activity::Gathering)
            }
            EffectKind::HuntingSuccess => Some(Activity::Hunting),
            EffectKind::BuildingEfficiency => Some(Activity::Building),
            EffectKind::ResearchEfficiency | EffectKind::TechnologicalAdvancement => {
                Some(Activity::Researching)
            }
            EffectKind::FoodGatheringRate
            | EffectKind::FoodPreservation
            | EffectKind::FireEfficiency
            | EffectKind::FoodVariety
            | EffectKind::PlantKnowledge
            | EffectKind::FoodProduction
            | EffectKind::SettlementStability
            | EffectKind::AgriculturalEfficiency
            | EffectKind::FoodSecurity
            | EffectKind::ToolDurability
            | EffectKind::NightActivity
            | EffectKind::SettlementFocus
            | EffectKind::IndependentFireCreation => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectValue {
    Flag(bool),
    Multiplier(f64),
}

pub type Effects = BTreeMap<EffectKind, EffectValue>;

/// Product of every multiplier in `effects` that applies to `activity`.
pub fn activity_multiplier(effects: &Effects, activity: Activity) -> f64 {
    effects
        .iter()
        .filter(|(kind, _)| kind.activity() == Some(activity))
        .map(|(_, value)| match value {
            EffectValue::Multiplier(factor) => *factor,
            EffectValue::Flag(_) => 1.0,
        })
        .product()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eureka {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Effects,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechDefinition {
    pub id: TechId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phase: TechPhase,
    #[serde(default)]
    pub requirements: Vec<TechId>,
    #[serde(default)]
    pub resource_cost: BTreeMap<ResourceKind, f64>,
    pub discovery_chance: f64,
    pub time_to_discover: f64,
    #[serde(default)]
    pub effects: Effects,
    #[serde(default)]
    pub eureka: Option<Eureka>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read technology catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse technology catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("technology `{0}` is defined more than once")]
    DuplicateId(TechId),
    #[error("technology `{technology}` requires unknown technology `{requirement}`")]
    UnknownRequirement {
        technology: TechId,
        requirement: TechId,
    },
    #[error("technology requirements form a cycle through `{0}`")]
    RequirementCycle(TechId),
    #[error("technology `{0}` must take a positive time to discover")]
    InvalidDuration(TechId),
    #[error("technology `{0}` has a discovery chance outside [0, 1]")]
    InvalidDiscoveryChance(TechId),
    #[error("technology `{0}` has a negative resource cost")]
    NegativeCost(TechId),
}

#[derive(Debug, Clone)]
pub struct TechnologyCatalog {
    definitions: Vec<TechDefinition>,
    index: HashMap<TechId, usize>,
}

impl TechnologyCatalog {
    pub fn new(definitions: Vec<TechDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, def) in definitions.iter().enumerate() {
            if index.insert(def.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(def.id.clone()));
            }
        }

        for def in &definitions {
            if !(def.time_to_discover > 0.0) {
                return Err(CatalogError::InvalidDuration(def.id.clone()));
            }
            if !(0.0..=1.0).contains(&def.discovery_chance) {
                return Err(CatalogError::InvalidDiscoveryChance(def.id.clone()));
            }
            if def.resource_cost.values().any(|amount| !(*amount >= 0.0)) {
                return Err(CatalogError::NegativeCost(def.id.clone()));
            }
            for requirement in &def.requirements {
                if !index.contains_key(requirement) {
                    return Err(CatalogError::UnknownRequirement {
                        technology: def.id.clone(),
                        requirement: requirement.clone(),
                    });
                }
            }
        }

        let catalog = Self { definitions, index };
        catalog.check_acyclic()?;
        Ok(catalog)
    }

    /// The built-in primitive-era tree.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::from_yaml_str(PRIMITIVE_CATALOG)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let definitions: Vec<TechDefinition> = serde_yaml::from_str(text)?;
        Self::new(definitions)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn get(&self, id: &str) -> Option<&TechDefinition> {
        self.index.get(id).map(|position| &self.definitions[*position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &TechDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn by_phase(&self, phase: TechPhase) -> Vec<&TechDefinition> {
        self.definitions
            .iter()
            .filter(|def| def.phase == phase)
            .collect()
    }

    fn check_acyclic(&self) -> Result<(), CatalogError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.definitions.len()];
        for start in 0..self.definitions.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // iterative DFS: (node, next requirement to inspect)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Visiting;
            while let Some((node, cursor)) = stack.pop() {
                let requirements = &self.definitions[node].requirements;
                if cursor == requirements.len() {
                    marks[node] = Mark::Done;
                    continue;
                }
                stack.push((node, cursor + 1));
                let next = self.index[&requirements[cursor]];
                match marks[next] {
                    Mark::Visiting => {
                        return Err(CatalogError::RequirementCycle(
                            self.definitions[next].id.clone(),
                        ))
                    }
                    Mark::Unvisited => {
                        marks[next] = Mark::Visiting;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }
}
