//! Rotating shaft primitive shared by the engine, the wheels and the
//! differential carriers.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

/// Inertia of the fixed sentinel shaft. Large enough that no impulse the
/// solver can produce moves it measurably.
const FIXED_INERTIA: Real = 1e18;

/// A 1-DOF rotating inertia. The angle advances only through [`integrate`],
/// the velocity only through [`apply_impulse`] (or an explicit override).
///
/// [`integrate`]: Shaft::integrate
/// [`apply_impulse`]: Shaft::apply_impulse
#[derive(Clone, Copy, Debug)]
pub struct Shaft {
    inertia: Real,
    inv_inertia: Real,
    angular_velocity: Real,
    angle: Real,
}

impl Default for Shaft {
    fn default() -> Self {
        Self::fixed()
    }
}

impl Shaft {
    pub fn new(inertia: Real) -> Self {
        debug_assert!(inertia > 0.0);
        Self {
            inertia,
            inv_inertia: 1.0 / inertia,
            angular_velocity: 0.0,
            angle: 0.0,
        }
    }

    /// Immovable shaft, stands in as the ground reference of ungrounded
    /// joints.
    pub fn fixed() -> Self {
        Self::new(FIXED_INERTIA)
    }

    /// Current rotation angle in rad.
    pub fn angle(&self) -> Real {
        self.angle
    }

    /// Current angular velocity in rad/s.
    pub fn angular_velocity(&self) -> Real {
        self.angular_velocity
    }

    pub fn inertia(&self) -> Real {
        self.inertia
    }

    pub fn inv_inertia(&self) -> Real {
        self.inv_inertia
    }

    pub fn set_inertia(&mut self, value: Real) {
        debug_assert!(value > 0.0);
        self.inertia = value;
        self.inv_inertia = 1.0 / value;
    }

    /// Override the shaft velocity in rad/s.
    pub fn set_angular_velocity(&mut self, value: Real) {
        self.angular_velocity = value;
    }

    /// Apply an angular impulse (torque * dt) to the shaft.
    pub fn apply_impulse(&mut self, impulse: Real) {
        self.angular_velocity += self.inv_inertia * impulse;
    }

    /// Advance the rotation angle.
    pub fn integrate(&mut self, dt: Real) {
        self.angle += self.angular_velocity * dt;
    }
}

/// Reference to a shaft owned somewhere in a vehicle's drivetrain.
///
/// Wheel and differential indices must stay within the owning vehicle's
/// arrays, and the link graph formed by differential outputs and the
/// transmission link has to remain a tree. Both are init-time conventions,
/// checked by debug assertions only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaftId {
    /// The immovable ground reference.
    #[default]
    Fixed,
    /// The engine crankshaft.
    Engine,
    /// The shaft of wheel `i`.
    Wheel(usize),
    /// The carrier shaft of differential `i`.
    Differential(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_scales_by_inverse_inertia() {
        let mut shaft = Shaft::new(2.0);
        shaft.apply_impulse(4.0);
        assert!((shaft.angular_velocity() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_shaft_barely_moves() {
        let mut shaft = Shaft::fixed();
        shaft.apply_impulse(1e6);
        assert!(shaft.angular_velocity().abs() < 1e-9);
    }

    #[test]
    fn integrate_advances_angle() {
        let mut shaft = Shaft::new(1.0);
        shaft.set_angular_velocity(3.0);
        shaft.integrate(0.5);
        assert!((shaft.angle() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn inverse_inertia_tracks_inertia() {
        let mut shaft = Shaft::new(1.0);
        shaft.set_inertia(4.0);
        assert!((shaft.inertia() * shaft.inv_inertia() - 1.0).abs() < 1e-6);
    }
}
