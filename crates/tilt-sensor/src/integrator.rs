use crate::pipeline::PipelineError;
use crate::types::{Axis, Orientation};
use glam::DVec3;
use std::f64::consts::{FRAC_PI_2, PI};

/// Distance, in multiples of the base step, beyond which the step is accelerated.
const FAR_FACTOR: f64 = 5.0;

/// Eases a displayed axis vector toward a target vector, one fixed step per tick.
///
/// Far from the target the step grows by the acceleration factor, close to it
/// the step shrinks by the same factor, and once the remaining distance fits
/// inside a single step the axis snaps onto the target. Orientation angles are
/// recomputed from the displayed vector after every mutation.
#[derive(Debug, Clone)]
pub struct OrientationIntegrator {
    base_delta: f64,
    acceleration: f64,
    target: DVec3,
    displayed: DVec3,
    orientation: Orientation,
    ticks: u64,
}

impl OrientationIntegrator {
    pub fn new(base_delta: f64, acceleration: f64) -> Result<Self, PipelineError> {
        if !(base_delta.is_finite() && base_delta > 0.0) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "base delta must be positive, got {base_delta}"
            )));
        }
        if !(acceleration.is_finite() && acceleration > 0.0) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "acceleration must be positive, got {acceleration}"
            )));
        }
        Ok(Self {
            base_delta,
            acceleration,
            target: DVec3::ZERO,
            displayed: DVec3::ZERO,
            orientation: derive_orientation(DVec3::ZERO),
            ticks: 0,
        })
    }

    pub fn target(&self) -> DVec3 {
        self.target
    }

    pub fn set_target(&mut self, target: DVec3) {
        self.target = target;
    }

    pub fn set_target_axis(&mut self, axis: Axis, value: f64) {
        self.target[axis.index()] = value;
    }

    pub fn displayed(&self) -> DVec3 {
        self.displayed
    }

    /// Place the displayed vector directly, bypassing easing.
    pub fn set_displayed(&mut self, displayed: DVec3) {
        self.displayed = displayed;
        self.orientation = derive_orientation(displayed);
    }

    /// Latest orientation derived from the displayed vector.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Move every displayed axis one step toward its target and recompute angles.
    pub fn tick(&mut self) -> Orientation {
        let mut next = self.displayed;
        for axis in Axis::ALL {
            let i = axis.index();
            next[i] = ease_axis(next[i], self.target[i], self.base_delta, self.acceleration);
        }
        self.ticks += 1;
        self.set_displayed(next);
        self.orientation
    }
}

/// Step size for the remaining distance `diff`.
pub fn adaptive_step(diff: f64, base_delta: f64, acceleration: f64) -> f64 {
    if diff > FAR_FACTOR * base_delta {
        base_delta * acceleration
    } else if diff < base_delta {
        base_delta / acceleration
    } else {
        base_delta
    }
}

/// One easing step for a single axis.
pub fn ease_axis(displayed: f64, target: f64, base_delta: f64, acceleration: f64) -> f64 {
    let step = adaptive_step((displayed - target).abs(), base_delta, acceleration);
    if displayed > target + step {
        displayed - step
    } else if displayed < target - step {
        displayed + step
    } else {
        target
    }
}

/// `atan(num / den)` with the on-axis cases pinned: `x / 0` is `sign(x) * pi/2`
/// and `0 / 0` is 0.
fn atan_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        if num == 0.0 {
            0.0
        } else {
            num.signum() * FRAC_PI_2
        }
    } else {
        (num / den).atan()
    }
}

/// Derive tilt angles from an axis vector.
pub fn derive_orientation(v: DVec3) -> Orientation {
    let theta = atan_ratio(v.x, (v.y * v.y + v.z * v.z).sqrt());
    let psi = atan_ratio(v.y, (v.x * v.x + v.z * v.z).sqrt());
    let phi = atan_ratio((v.x * v.x + v.y * v.y).sqrt(), v.z);
    let tilt = -(theta / FRAC_PI_2) * 90.0;

    Orientation {
        x: v.x,
        y: v.y,
        z: v.z,
        theta,
        psi,
        phi,
        tilt,
        tilt_radians: tilt * PI / 180.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn integrator() -> OrientationIntegrator {
        OrientationIntegrator::new(12.0, 3.0).unwrap()
    }

    #[test]
    fn rejects_non_positive_constants() {
        assert!(OrientationIntegrator::new(0.0, 3.0).is_err());
        assert!(OrientationIntegrator::new(12.0, -1.0).is_err());
        assert!(OrientationIntegrator::new(f64::NAN, 3.0).is_err());
    }

    #[test]
    fn step_tiers() {
        assert_eq!(adaptive_step(100.0, 12.0, 3.0), 36.0);
        assert_eq!(adaptive_step(60.0, 12.0, 3.0), 12.0);
        assert_eq!(adaptive_step(12.0, 12.0, 3.0), 12.0);
        assert_eq!(adaptive_step(11.9, 12.0, 3.0), 4.0);
    }

    #[test]
    fn far_target_accelerates_then_snaps() {
        let mut integ = integrator();
        integ.set_target(DVec3::new(100.0, 0.0, 0.0));

        let mut xs = Vec::new();
        for _ in 0..6 {
            xs.push(integ.tick().x);
        }
        assert_eq!(xs, vec![36.0, 72.0, 84.0, 96.0, 100.0, 100.0]);
    }

    #[test]
    fn converges_without_overshoot() {
        for target in [-127.0, -50.5, -3.0, 0.25, 17.0, 127.0] {
            let mut integ = integrator();
            integ.set_target(DVec3::new(target, -target, target / 2.0));

            let mut ticks = 0;
            while integ.displayed() != integ.target() {
                let before = integ.displayed();
                integ.tick();
                let after = integ.displayed();
                for i in 0..3 {
                    let t = integ.target()[i];
                    // Never crosses to the far side of the target.
                    assert!((before[i] - t) * (after[i] - t) >= 0.0);
                }
                ticks += 1;
                assert!(ticks <= 20, "no convergence toward {target}");
            }
        }
    }

    #[test]
    fn approach_from_below_is_monotonic() {
        let mut integ = integrator();
        integ.set_displayed(DVec3::new(-120.0, 0.0, 0.0));
        integ.set_target(DVec3::new(45.0, 0.0, 0.0));

        let mut last = integ.displayed().x;
        while integ.displayed().x < 45.0 {
            let x = integ.tick().x;
            assert!(x >= last);
            last = x;
        }
        assert_eq!(last, 45.0);
    }

    #[test]
    fn keeps_easing_without_new_targets() {
        let mut integ = integrator();
        integ.set_target_axis(Axis::Z, -30.0);
        integ.tick();
        integ.tick();
        assert_eq!(integ.displayed().z, -24.0);
        assert_eq!(integ.ticks(), 2);
    }

    #[test]
    fn level_sensor_has_zero_angles() {
        let o = derive_orientation(DVec3::new(0.0, 0.0, 10.0));
        assert_eq!(o.theta, 0.0);
        assert_eq!(o.psi, 0.0);
        assert_eq!(o.phi, 0.0);
        assert_eq!(o.tilt, 0.0);
    }

    #[test]
    fn on_x_axis_reads_minus_ninety() {
        let o = derive_orientation(DVec3::new(10.0, 0.0, 0.0));
        assert!((o.theta - FRAC_PI_2).abs() < EPS);
        assert!((o.tilt + 90.0).abs() < EPS);
        assert!((o.tilt_radians + FRAC_PI_2).abs() < EPS);
        assert!((o.phi - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn negative_x_on_axis() {
        let o = derive_orientation(DVec3::new(-4.0, 0.0, 0.0));
        assert!((o.theta + FRAC_PI_2).abs() < EPS);
        assert!((o.tilt - 90.0).abs() < EPS);
    }

    #[test]
    fn zero_vector_is_stable() {
        let o = derive_orientation(DVec3::ZERO);
        assert!(o.is_finite());
        assert_eq!(o.tilt, 0.0);
    }

    #[test]
    fn forty_five_degrees() {
        let o = derive_orientation(DVec3::new(10.0, 0.0, 10.0));
        assert!((o.theta - FRAC_PI_2 / 2.0).abs() < EPS);
        assert!((o.tilt + 45.0).abs() < 1e-9);
    }

    #[test]
    fn upside_down_phi_is_negative() {
        let o = derive_orientation(DVec3::new(5.0, 0.0, -5.0));
        assert!(o.phi < 0.0);
    }
}
