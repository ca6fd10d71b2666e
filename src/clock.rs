use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSpeed {
    Paused,
    #[default]
    Normal,
    Fast,
}

impl GameSpeed {
    pub fn factor(self) -> f64 {
        match self {
            GameSpeed::Paused => 0.0,
            GameSpeed::Normal => 1.0,
            GameSpeed::Fast => 2.0,
        }
    }

    pub fn tick_interval(self) -> Duration {
        match self {
            GameSpeed::Paused | GameSpeed::Normal => Duration::from_millis(1000),
            GameSpeed::Fast => Duration::from_millis(500),
        }
    }
}

/// Turns wall-clock time into simulated days for real-time runs.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    speed: GameSpeed,
    last_tick: Instant,
}

impl SimulationClock {
    pub fn new(speed: GameSpeed, now: Instant) -> Self {
        Self {
            speed,
            last_tick: now,
        }
    }

    pub fn speed(&self) -> GameSpeed {
        self.speed
    }

    pub fn tick_interval(&self) -> Duration {
        self.speed.tick_interval()
    }

    /// Days covered by `elapsed` wall time at the current speed. Never
    /// negative; zero while paused.
    pub fn day_fraction_for(&self, elapsed: Duration) -> f64 {
        let interval = self.tick_interval().as_secs_f64();
        elapsed.as_secs_f64() / interval * self.speed.factor()
    }

    /// Consumes the time since the previous call.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.day_fraction_for(elapsed)
    }
}
