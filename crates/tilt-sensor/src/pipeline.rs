use crate::integrator::OrientationIntegrator;
use crate::smoother::MovingAverage;
use crate::types::{Axis, AxisReading, Orientation};
use glam::DVec3;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("sample {value} on axis {axis} is outside the signed byte range")]
    InvalidSample { axis: Axis, value: i32 },
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),
}

/// Tuning constants for the smoothing and easing stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Moving-average window per axis.
    pub smoother_capacity: usize,
    /// Base easing step per tick, in raw sample units.
    pub base_delta: f64,
    /// Factor by which the step grows when far from the target and shrinks when close.
    pub acceleration: f64,
    /// Period of the easing tick.
    pub tick_period: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            smoother_capacity: 5,
            base_delta: 12.0,
            acceleration: 3.0,
            tick_period: Duration::from_millis(100),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.tick_period.is_zero() {
            return Err(PipelineError::InvalidConfiguration(
                "tick period must be non-zero".into(),
            ));
        }
        // Constructing the stages checks the remaining fields.
        TiltPipeline::new(self).map(|_| ())
    }
}

/// Raw samples in, eased orientation out.
///
/// Owns one moving average per axis and the integrator that eases the
/// displayed vector toward the smoothed targets. Samples and ticks are
/// independent: ticks keep easing toward the last target when samples stop.
#[derive(Debug, Clone)]
pub struct TiltPipeline {
    smoothers: [MovingAverage; 3],
    integrator: OrientationIntegrator,
}

impl TiltPipeline {
    pub fn new(settings: &PipelineSettings) -> Result<Self, PipelineError> {
        let capacity = settings.smoother_capacity;
        Ok(Self {
            smoothers: [
                MovingAverage::new(capacity)?,
                MovingAverage::new(capacity)?,
                MovingAverage::new(capacity)?,
            ],
            integrator: OrientationIntegrator::new(settings.base_delta, settings.acceleration)?,
        })
    }

    /// Feed one raw sample for `axis` and update that axis's target.
    ///
    /// Values outside `i8` are rejected before any state changes.
    pub fn submit_sample(&mut self, axis: Axis, value: i32) -> Result<f64, PipelineError> {
        let sample = i8::try_from(value).map_err(|_| PipelineError::InvalidSample { axis, value })?;
        Ok(self.push(axis, sample))
    }

    /// Feed a full reading; the three targets are updated together.
    pub fn submit_reading(&mut self, reading: AxisReading) -> DVec3 {
        for axis in Axis::ALL {
            self.push(axis, reading.get(axis));
        }
        self.integrator.target()
    }

    fn push(&mut self, axis: Axis, sample: i8) -> f64 {
        let average = self.smoothers[axis.index()].submit(i32::from(sample));
        self.integrator.set_target_axis(axis, average);
        average
    }

    /// Run one easing step.
    pub fn tick(&mut self) -> Orientation {
        self.integrator.tick()
    }

    /// Copy of the current display orientation.
    pub fn orientation(&self) -> Orientation {
        self.integrator.orientation()
    }

    /// Smoothed target vector the display is converging on.
    pub fn target(&self) -> DVec3 {
        self.integrator.target()
    }

    pub fn ticks(&self) -> u64 {
        self.integrator.ticks()
    }

    /// Clear smoother history. The displayed vector keeps easing toward the last target.
    pub fn reset_smoothing(&mut self) {
        self.smoothers.iter_mut().for_each(MovingAverage::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> TiltPipeline {
        TiltPipeline::new(&PipelineSettings::default()).unwrap()
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(PipelineSettings::default().validate().is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let zero_window = PipelineSettings {
            smoother_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            TiltPipeline::new(&zero_window),
            Err(PipelineError::InvalidConfiguration(_))
        ));

        let zero_period = PipelineSettings {
            tick_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_period.validate().is_err());
    }

    #[test]
    fn out_of_range_sample_leaves_state_untouched() {
        let mut p = pipeline();
        p.submit_sample(Axis::X, 40).unwrap();

        let err = p.submit_sample(Axis::X, 128).unwrap_err();
        assert_eq!(err, PipelineError::InvalidSample { axis: Axis::X, value: 128 });
        assert!(p.submit_sample(Axis::Y, -129).is_err());

        assert_eq!(p.target(), DVec3::new(40.0, 0.0, 0.0));
    }

    #[test]
    fn byte_range_edges_are_accepted() {
        let mut p = pipeline();
        assert_eq!(p.submit_sample(Axis::Z, -128).unwrap(), -128.0);
        assert_eq!(p.submit_sample(Axis::Y, 127).unwrap(), 127.0);
    }

    #[test]
    fn axes_are_smoothed_independently() {
        let mut p = pipeline();
        for i in 0..5 {
            p.submit_reading(AxisReading { x: 10, y: -i, z: 64 });
        }
        let target = p.submit_reading(AxisReading { x: 20, y: 0, z: 64 });
        assert_eq!(target, DVec3::new(12.0, -2.0, 64.0));
    }

    #[test]
    fn ticks_converge_on_smoothed_target() {
        let mut p = pipeline();
        p.submit_reading(AxisReading { x: 0, y: 0, z: 10 });
        for _ in 0..5 {
            p.tick();
        }
        let o = p.orientation();
        assert_eq!(o.vector(), DVec3::new(0.0, 0.0, 10.0));
        assert_eq!(o.tilt, 0.0);
    }

    #[test]
    fn orientation_is_a_copy() {
        let mut p = pipeline();
        p.submit_reading(AxisReading { x: 10, y: 0, z: 0 });
        let mut snapshot = p.orientation();
        snapshot.x = 99.0;
        assert_eq!(p.orientation().x, 0.0);
    }

    #[test]
    fn reset_smoothing_restarts_warm_up() {
        let mut p = pipeline();
        p.submit_sample(Axis::X, 100).unwrap();
        p.reset_smoothing();
        assert_eq!(p.submit_sample(Axis::X, -20).unwrap(), -20.0);
    }
}
