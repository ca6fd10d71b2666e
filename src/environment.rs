use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{EventSink, SimEvent};
use crate::rng::RandomSource;

pub const DAYS_PER_SEASON: f64 = 90.0;
pub const DAYS_PER_YEAR: f64 = DAYS_PER_SEASON * 4.0;
const WEATHER_CHANGE_PER_DAY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_day(days_passed: f64) -> Self {
        let year_day = days_passed.rem_euclid(DAYS_PER_YEAR);
        if year_day < DAYS_PER_SEASON {
            Season::Spring
        } else if year_day < DAYS_PER_SEASON * 2.0 {
            Season::Summer
        } else if year_day < DAYS_PER_SEASON * 3.0 {
            Season::Autumn
        } else {
            Season::Winter
        }
    }

    fn base_temperature(self) -> f64 {
        match self {
            Season::Spring => 15.0,
            Season::Summer => 25.0,
            Season::Autumn => 15.0,
            Season::Winter => 5.0,
        }
    }

    fn base_day_length(self) -> f64 {
        match self {
            Season::Spring => 12.0,
            Season::Summer => 14.0,
            Season::Autumn => 10.0,
            Season::Winter => 8.0,
        }
    }

    /// Weather redraw probabilities, in `Weather::ALL` order.
    fn weather_odds(self) -> [f64; 6] {
        match self {
            Season::Spring => [0.3, 0.3, 0.3, 0.1, 0.0, 0.0],
            Season::Summer => [0.4, 0.2, 0.1, 0.1, 0.0, 0.2],
            Season::Autumn => [0.2, 0.3, 0.3, 0.2, 0.0, 0.0],
            Season::Winter => [0.3, 0.2, 0.1, 0.1, 0.3, 0.0],
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Cloudy,
    Rainy,
    Stormy,
    Snowy,
    Dry,
}

impl Weather {
    pub const ALL: [Weather; 6] = [
        Weather::Clear,
        Weather::Cloudy,
        Weather::Rainy,
        Weather::Stormy,
        Weather::Snowy,
        Weather::Dry,
    ];

    fn temperature_offset(self) -> f64 {
        match self {
            Weather::Clear => 2.0,
            Weather::Cloudy => 0.0,
            Weather::Rainy => -3.0,
            Weather::Stormy => -5.0,
            Weather::Snowy => -8.0,
            Weather::Dry => 4.0,
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Weather::Clear => "clear",
            Weather::Cloudy => "cloudy",
            Weather::Rainy => "rainy",
            Weather::Stormy => "stormy",
            Weather::Snowy => "snowy",
            Weather::Dry => "dry",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub season: Season,
    pub temperature: f64,
    pub weather: Weather,
    pub day_length: f64,
    pub rainfall: f64,
    pub days_passed: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            season: Season::Spring,
            temperature: 15.0,
            weather: Weather::Clear,
            day_length: 12.0,
            rainfall: 0.0,
            days_passed: 0.0,
        }
    }
}

impl Environment {
    /// Advances the calendar and redraws temperature, rainfall, weather and
    /// day length for the new day position.
    pub fn advance(
        &mut self,
        day_fraction: f64,
        rng: &mut dyn RandomSource,
        events: &mut dyn EventSink,
    ) {
        self.days_passed += day_fraction.max(0.0);

        let season = Season::from_day(self.days_passed);
        if season != self.season {
            self.season = season;
            events.emit(SimEvent::SeasonChanged { season });
        }

        self.update_temperature(rng);

        if rng.chance(WEATHER_CHANGE_PER_DAY * day_fraction) {
            self.redraw_weather(rng, events);
        }

        self.day_length = self.season.base_day_length() + (rng.next_f64() - 0.5);
    }

    fn update_temperature(&mut self, rng: &mut dyn RandomSource) {
        let variation = rng.between(-5.0, 5.0);
        self.temperature =
            self.season.base_temperature() + variation + self.weather.temperature_offset();
        self.rainfall = match self.weather {
            Weather::Rainy | Weather::Stormy => (15.0 - self.temperature / 5.0).max(5.0),
            Weather::Clear | Weather::Cloudy | Weather::Snowy | Weather::Dry => 0.0,
        };
    }

    fn redraw_weather(&mut self, rng: &mut dyn RandomSource, events: &mut dyn EventSink) {
        let roll = rng.next_f64();
        let mut cumulative = 0.0;
        let mut next = self.weather;
        for (weather, odds) in Weather::ALL.iter().zip(self.season.weather_odds()) {
            cumulative += odds;
            if roll < cumulative {
                next = *weather;
                break;
            }
        }
        if next != self.weather {
            let from = self.weather;
            self.weather = next;
            events.emit(SimEvent::WeatherChanged { from, to: next });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRandom;

    #[test]
    fn seasons_cycle_every_ninety_days() {
        assert_eq!(Season::from_day(0.0), Season::Spring);
        assert_eq!(Season::from_day(89.9), Season::Spring);
        assert_eq!(Season::from_day(90.0), Season::Summer);
        assert_eq!(Season::from_day(200.0), Season::Autumn);
        assert_eq!(Season::from_day(300.0), Season::Winter);
        assert_eq!(Season::from_day(361.0), Season::Spring);
    }

    #[test]
    fn crossing_into_summer_raises_an_event() {
        let mut env = Environment {
            days_passed: 89.5,
            ..Environment::default()
        };
        let mut events = Vec::new();
        // variation draw, weather-change roll (miss), day-length draw
        let mut rng = ScriptedRandom::new([0.5, 0.99, 0.5], 0.5);
        env.advance(1.0, &mut rng, &mut events);
        assert_eq!(env.season, Season::Summer);
        assert_eq!(env.temperature, 25.0 + 2.0);
        assert_eq!(env.day_length, 14.0);
        assert_eq!(
            events,
            vec![SimEvent::SeasonChanged {
                season: Season::Summer
            }]
        );
    }

    #[test]
    fn weather_redraw_follows_the_seasonal_table() {
        let mut env = Environment::default();
        let mut events = Vec::new();
        // variation, change roll (hit), weather roll 0.65 -> rainy in spring
        let mut rng = ScriptedRandom::new([0.5, 0.0, 0.65], 0.5);
        env.advance(1.0, &mut rng, &mut events);
        assert_eq!(env.weather, Weather::Rainy);
        assert_eq!(
            events,
            vec![SimEvent::WeatherChanged {
                from: Weather::Clear,
                to: Weather::Rainy
            }]
        );
    }

    #[test]
    fn rain_sets_rainfall_from_temperature() {
        let mut env = Environment {
            weather: Weather::Stormy,
            ..Environment::default()
        };
        let mut rng = ScriptedRandom::new([0.5, 0.99], 0.5);
        env.advance(1.0, &mut rng, &mut Vec::new());
        // 15 base - 5 stormy = 10 degrees
        assert_eq!(env.temperature, 10.0);
        assert_eq!(env.rainfall, 13.0);
    }
}
