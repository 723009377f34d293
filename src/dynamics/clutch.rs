//! Friction clutch: torque capacity scales linearly with the engagement
//! position.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClutchInfo {
    /// Sliding friction coefficient of the plates.
    pub friction: Real,
    /// Effective clutch radius, m.
    pub radius: Real,
    /// Plate surface area, m^2.
    pub area: Real,
    /// Maximum clamping pressure, Pa.
    pub max_pressure: Real,
}

impl Default for ClutchInfo {
    fn default() -> Self {
        Self {
            friction: 0.27,
            radius: 0.15,
            area: 0.75,
            max_pressure: 11079.26,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Clutch {
    torque_max: Real,
    torque: Real,
    position: Real,
}

impl Clutch {
    pub fn new(info: &ClutchInfo) -> Self {
        Self {
            torque_max: info.friction * info.max_pressure * info.area * info.radius,
            torque: 0.0,
            position: 0.0,
        }
    }

    /// Engagement from 0 (open) to 1 (fully engaged).
    pub fn set_position(&mut self, value: Real) {
        self.position = value;
        self.torque = self.torque_max * value;
    }

    pub fn position(&self) -> Real {
        self.position
    }

    /// Torque capacity at the current engagement, Nm.
    pub fn torque(&self) -> Real {
        self.torque
    }

    /// Torque capacity when fully engaged, Nm.
    pub fn torque_max(&self) -> Real {
        self.torque_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_scales_with_position() {
        let mut clutch = Clutch::new(&ClutchInfo::default());
        assert_eq!(clutch.torque(), 0.0);
        clutch.set_position(0.5);
        assert!((clutch.torque() - 0.5 * clutch.torque_max()).abs() < 1e-5);
        clutch.set_position(1.0);
        assert!((clutch.torque() - clutch.torque_max()).abs() < 1e-5);
    }
}
