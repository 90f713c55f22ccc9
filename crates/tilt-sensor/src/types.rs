use glam::DVec3;
use std::fmt;

/// One of the three accelerometer axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in a `[x, y, z]` array.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// Raw signed reading for all three axes from a single advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisReading {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

impl AxisReading {
    pub fn get(&self, axis: Axis) -> i8 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Display-ready orientation derived from the eased axis vector.
///
/// Angles are in radians except `tilt`, which is signed degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub theta: f64,
    pub psi: f64,
    pub phi: f64,
    pub tilt: f64,
    pub tilt_radians: f64,
}

impl Orientation {
    /// The axis vector this orientation was derived from.
    pub fn vector(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    /// Whether every derived angle is a number. Renderers skip fields that aren't.
    pub fn is_finite(&self) -> bool {
        [self.theta, self.psi, self.phi, self.tilt, self.tilt_radians]
            .iter()
            .all(|v| v.is_finite())
    }
}
