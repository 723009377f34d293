//! Disc brake torque from pad friction, pressure, pad area and rotor
//! radius. The handbrake has its own factor so ABS corrections never touch
//! the handbrake channel.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BrakeInfo {
    /// Sliding friction coefficient of the pads on the rotor.
    pub friction: Real,
    /// Maximum line pressure, Pa.
    pub max_pressure: Real,
    /// Effective rotor radius, m.
    pub radius: Real,
    /// Pad area, m^2.
    pub area: Real,
    /// Fraction of the pressure applied to this brake.
    pub bias: Real,
    /// Friction factor applied when the handbrake is pulled; 0 disables.
    pub handbrake: Real,
}

impl Default for BrakeInfo {
    fn default() -> Self {
        Self {
            friction: 0.73,
            max_pressure: 4e6,
            radius: 0.14,
            area: 0.015,
            bias: 1.0,
            handbrake: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Brake {
    max_torque: Real,
    handbrake: Real,
    brake_factor: Real,
    handbrake_factor: Real,
}

impl Brake {
    pub fn new(info: &BrakeInfo) -> Self {
        Self {
            max_torque: info.bias * info.max_pressure * info.area * info.friction * info.radius,
            handbrake: info.handbrake,
            brake_factor: 0.0,
            handbrake_factor: 0.0,
        }
    }

    /// Pedal position from 0 (released) to 1 (fully applied).
    pub fn set_brake_factor(&mut self, value: Real) {
        self.brake_factor = value;
    }

    /// Handbrake position from 0 (released) to 1 (fully applied).
    pub fn set_handbrake_factor(&mut self, value: Real) {
        self.handbrake_factor = value;
    }

    pub fn brake_factor(&self) -> Real {
        self.brake_factor
    }

    pub fn max_torque(&self) -> Real {
        self.max_torque
    }

    /// Current brake torque; the stronger of pedal and handbrake channel.
    pub fn torque(&self) -> Real {
        let factor = self.brake_factor.max(self.handbrake * self.handbrake_factor);
        self.max_torque * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torque_follows_the_stronger_channel() {
        let mut brake = Brake::new(&BrakeInfo {
            handbrake: 1.0,
            ..BrakeInfo::default()
        });
        brake.set_brake_factor(0.25);
        let pedal = brake.torque();
        brake.set_handbrake_factor(1.0);
        assert!(brake.torque() > pedal);
        assert!((brake.torque() - brake.max_torque()).abs() < 1e-3);
    }

    #[test]
    fn no_handbrake_support_means_pedal_only() {
        let mut brake = Brake::new(&BrakeInfo::default());
        brake.set_handbrake_factor(1.0);
        assert_eq!(brake.torque(), 0.0);
    }
}
