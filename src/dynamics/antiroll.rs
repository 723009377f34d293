//! Anti-roll bar: couples the suspension stiffness of the two wheels on an
//! axle. The redistribution itself happens in the vehicle tick before
//! contact rows are built.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AntiRollBar {
    /// Bar stiffness, N/m.
    pub stiffness: Real,
    /// Index of the first coupled wheel.
    pub wheel0: usize,
    /// Index of the second coupled wheel.
    pub wheel1: usize,
}
