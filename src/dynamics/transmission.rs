//! Gearbox: a ratio table indexed by the selected gear, linked to one
//! driven shaft of the drivetrain graph.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use super::shaft::ShaftId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransmissionInfo {
    /// Ratios for reverse gears, one neutral (0.0) and forward gears, in
    /// ascending gear order.
    pub gear_ratios: Vec<Real>,
    /// Shift duration in seconds.
    pub shift_time: Real,
    pub forward_gears: i32,
    pub reverse_gears: i32,
}

impl Default for TransmissionInfo {
    /// No gears; neutral only.
    fn default() -> Self {
        Self {
            gear_ratios: vec![0.0],
            shift_time: 0.2,
            forward_gears: 0,
            reverse_gears: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Transmission {
    info: TransmissionInfo,
    drive_shaft: ShaftId,
    gear: i32,
}

impl Transmission {
    pub fn new(info: &TransmissionInfo, drive_shaft: ShaftId) -> Self {
        debug_assert_eq!(
            info.gear_ratios.len() as i32,
            info.reverse_gears + 1 + info.forward_gears
        );
        Self {
            info: info.clone(),
            drive_shaft,
            gear: 0,
        }
    }

    /// Select a gear in `[-reverse_gears, forward_gears]`; out-of-range
    /// requests are ignored.
    pub fn shift(&mut self, new_gear: i32) {
        if new_gear != self.gear
            && new_gear <= self.info.forward_gears
            && new_gear >= -self.info.reverse_gears
        {
            self.gear = new_gear;
        }
    }

    /// The driven shaft of the drivetrain graph.
    pub fn link(&self) -> ShaftId {
        self.drive_shaft
    }

    pub fn gear(&self) -> i32 {
        self.gear
    }

    pub fn forward_gears(&self) -> i32 {
        self.info.forward_gears
    }

    pub fn reverse_gears(&self) -> i32 {
        self.info.reverse_gears
    }

    pub fn gear_ratio(&self, gear: i32) -> Real {
        let index = (gear + self.info.reverse_gears) as usize;
        self.info.gear_ratios[index]
    }

    /// Ratio of the currently selected gear.
    pub fn current_gear_ratio(&self) -> Real {
        self.gear_ratio(self.gear)
    }

    pub fn shift_time(&self) -> Real {
        self.info.shift_time
    }

    /// Engine-side rpm implied by the drive shaft velocity and the current
    /// gear ratio.
    pub fn clutch_rpm(&self, drive_shaft_velocity: Real) -> Real {
        self.current_gear_ratio() * drive_shaft_velocity * 30.0 / PI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gearbox() -> Transmission {
        Transmission::new(
            &TransmissionInfo {
                gear_ratios: vec![-2.8, 0.0, 3.1, 2.0, 1.5],
                shift_time: 0.2,
                forward_gears: 3,
                reverse_gears: 1,
            },
            ShaftId::Wheel(0),
        )
    }

    #[test]
    fn shifts_within_range_only() {
        let mut transmission = gearbox();
        transmission.shift(2);
        assert_eq!(transmission.gear(), 2);
        transmission.shift(9);
        assert_eq!(transmission.gear(), 2);
        transmission.shift(-1);
        assert_eq!(transmission.gear(), -1);
        assert!((transmission.current_gear_ratio() + 2.8).abs() < 1e-6);
    }

    #[test]
    fn clutch_rpm_scales_with_gear_ratio() {
        let mut transmission = gearbox();
        transmission.shift(1);
        let rpm = transmission.clutch_rpm(100.0);
        assert!((rpm - 3.1 * 100.0 * 30.0 / PI).abs() < 1e-2);
    }
}
