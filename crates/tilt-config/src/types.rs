use serde::{Deserialize, Serialize};
use std::time::Duration;
use tilt_sensor::{PipelineError, PipelineSettings};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Smoothing and easing.
    pub pipeline: PipelineConfig,
    /// Sensor discovery.
    pub sensors: SensorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Moving-average window per axis.
    pub smoother_capacity: usize,
    /// Base easing step per tick. Higher = snappier, more visible jitter.
    pub base_delta: f64,
    /// Step multiplier when far from the target, divisor when close.
    pub acceleration: f64,
    /// Easing tick period in milliseconds.
    pub tick_period_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoother_capacity: 5,
            base_delta: 12.0,
            acceleration: 3.0,
            tick_period_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Pipeline settings these values describe.
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            smoother_capacity: self.smoother_capacity,
            base_delta: self.base_delta,
            acceleration: self.acceleration,
            tick_period: self.tick_period(),
        }
    }

    /// Reject a zero window, a non-positive or non-finite step or
    /// acceleration, and a zero tick period.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.settings().validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Forget sensors not heard from for this many seconds.
    pub timeout_secs: u64,
    /// How often stale sensors are pruned, in milliseconds.
    pub prune_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            prune_interval_ms: 1000,
        }
    }
}

impl SensorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}
