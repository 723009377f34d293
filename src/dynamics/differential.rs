//! Differential: a carrier shaft geared to two output shafts. The open
//! split itself is solved by a
//! [`DifferentialJoint`](super::joints::DifferentialJoint); the anti-slip
//! torque feeds the one-way limited-slip clutch joint between the outputs.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

use super::shaft::{Shaft, ShaftId};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DifferentialInfo {
    /// Gear ratio between the carrier and the output shafts.
    pub final_drive: Real,
    /// Maximum anti-slip coupling torque, Nm.
    pub anti_slip: Real,
    /// Rotational inertia of the carrier plus its driving shaft.
    pub inertia: Real,
    /// First output shaft link.
    pub output_a: ShaftId,
    /// Second output shaft link.
    pub output_b: ShaftId,
}

impl Default for DifferentialInfo {
    fn default() -> Self {
        Self {
            final_drive: 4.1,
            anti_slip: 600.0,
            inertia: 0.25,
            output_a: ShaftId::Fixed,
            output_b: ShaftId::Fixed,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Differential {
    shaft: Shaft,
    final_drive: Real,
    anti_slip: Real,
    output_a: ShaftId,
    output_b: ShaftId,
}

impl Differential {
    pub fn new(info: &DifferentialInfo) -> Self {
        Self {
            shaft: Shaft::new(info.inertia),
            final_drive: info.final_drive,
            anti_slip: info.anti_slip,
            output_a: info.output_a,
            output_b: info.output_b,
        }
    }

    /// Maximum friction coupling torque between the outputs, Nm.
    pub fn anti_slip_torque(&self) -> Real {
        self.anti_slip
    }

    /// Gear ratio between the carrier and the outputs.
    pub fn final_drive(&self) -> Real {
        self.final_drive
    }

    /// The carrier shaft.
    pub fn shaft(&self) -> &Shaft {
        &self.shaft
    }

    pub fn shaft_mut(&mut self) -> &mut Shaft {
        &mut self.shaft
    }

    pub fn output_a(&self) -> ShaftId {
        self.output_a
    }

    pub fn output_b(&self) -> ShaftId {
        self.output_b
    }
}
