//! Activities and the population-allocation heuristic.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Gathering,
    Hunting,
    Building,
    Researching,
}

impl Activity {
    pub const ALL: [Activity; 4] = [
        Activity::Gathering,
        Activity::Hunting,
        Activity::Building,
        Activity::Researching,
    ];
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Activity::Gathering => "gathering",
            Activity::Hunting => "hunting",
            Activity::Building => "building",
            Activity::Researching => "researching",
        };
        f.write_str(label)
    }
}

/// One value per activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerActivity<T> {
    pub gathering: T,
    pub hunting: T,
    pub building: T,
    pub researching: T,
}

impl<T: Copy> PerActivity<T> {
    pub fn new(gathering: T, hunting: T, building: T, researching: T) -> Self {
        Self {
            gathering,
            hunting,
            building,
            researching,
        }
    }

    pub fn get(&self, activity: Activity) -> T {
        match activity {
            Activity::Gathering => self.gathering,
            Activity::Hunting => self.hunting,
            Activity::Building => self.building,
            Activity::Researching => self.researching,
        }
    }

    pub fn get_mut(&mut self, activity: Activity) -> &mut T {
        match activity {
            Activity::Gathering => &mut self.gathering,
            Activity::Hunting => &mut self.hunting,
            Activity::Building => &mut self.building,
            Activity::Researching => &mut self.researching,
        }
    }
}

impl PerActivity<f64> {
    pub fn sum(&self) -> f64 {
        self.gathering + self.hunting + self.building + self.researching
    }

    /// Rescales so the four weights sum to 1. A degenerate total leaves an
    /// even split.
    pub fn normalize(&mut self) {
        let total = self.sum();
        if !(total.is_finite() && total > 0.0) {
            *self = Self::new(0.25, 0.25, 0.25, 0.25);
            return;
        }
        for activity in Activity::ALL {
            *self.get_mut(activity) /= total;
        }
    }
}

impl PerActivity<u32> {
    pub fn total(&self) -> u32 {
        self.gathering + self.hunting + self.building + self.researching
    }
}

/// Urgency signals feeding the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub food: f64,
    /// Reported for inspection; the allocation weights do not read it.
    pub water: f64,
    pub building: f64,
    pub research: f64,
}

impl Needs {
    pub fn compute(
        population: u32,
        food: f64,
        water: f64,
        average_building_completion: f64,
        discovered_technologies: usize,
    ) -> Self {
        let population = f64::from(population.max(1));
        let research = if discovered_technologies == 0 {
            0.7
        } else {
            (0.5 - discovered_technologies as f64 * 0.05).max(0.1)
        };
        Self {
            food: (1.0 - food / (population * 10.0)).max(0.0),
            water: (1.0 - water / (population * 15.0)).max(0.0),
            building: (0.5 - average_building_completion / 2.0).max(0.0),
            research,
        }
    }
}

/// Splits `total` across the four activities.
///
/// Each need is blended with the standing preference and scaled by the
/// activity's success rate. Shares are floored and researchers absorb the
/// remainder, so the result always sums to `total`.
pub fn assign_population(
    total: u32,
    needs: &Needs,
    preferences: &PerActivity<f64>,
    success_rates: &PerActivity<f64>,
) -> PerActivity<u32> {
    let mut weights = PerActivity::new(
        (needs.food * 0.7 + preferences.gathering * 0.3) * success_rates.gathering,
        (needs.food * 0.6 + preferences.hunting * 0.4) * success_rates.hunting,
        (needs.building * 0.6 + preferences.building * 0.4) * success_rates.building,
        (needs.research * 0.5 + preferences.researching * 0.5) * success_rates.researching,
    );
    let mut weight_total = weights.sum();
    if !(weight_total.is_finite() && weight_total > 0.0) {
        weights = *preferences;
        weight_total = weights.sum();
    }

    let share = |weight: f64| -> u32 {
        if weight_total > 0.0 {
            ((weight / weight_total) * f64::from(total)).floor().max(0.0) as u32
        } else {
            0
        }
    };
    let gathering = share(weights.gathering).min(total);
    let hunting = share(weights.hunting).min(total - gathering);
    let building = share(weights.building).min(total - gathering - hunting);
    let researching = total - gathering - hunting - building;
    PerActivity::new(gathering, hunting, building, researching)
}
