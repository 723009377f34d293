//! Per-wheel ground contact: one suspension-response row plus two friction
//! rows against the hit body, with the cached kinematics the solver loop
//! needs. Contacts are rebuilt from scratch for grounded wheels every tick;
//! the backing array lives in the vehicle and is reused.

use rapier3d::math::{Real, Vector};

use super::solver::ConstraintRow;

#[derive(Clone, Copy, Debug, Default)]
pub struct WheelContact {
    /// Index of the owning wheel.
    pub wheel: usize,
    /// Solver-body arena index of the chassis.
    pub body_a: usize,
    /// Solver-body arena index of the hit body (or the fixed stand-in).
    pub body_b: usize,
    /// Lever arm from the chassis center of mass to the contact point.
    pub r_a: Vector<Real>,
    /// Lever arm from the hit body's center of mass to the contact point.
    pub r_b: Vector<Real>,

    /// Suspension response along the contact normal.
    pub response: ConstraintRow,
    /// Friction along the rolling direction; limits are widened by the
    /// solver loop from tire force and driveline reaction.
    pub friction_lon: ConstraintRow,
    /// Friction along the wheel's lateral direction.
    pub friction_lat: ConstraintRow,

    /// Contact-point relative velocity along the rolling direction at
    /// contact build time.
    pub v1: Real,
    /// Contact-point relative velocity along the lateral direction.
    pub v2: Real,
    /// Rim surface speed (omega * r) at contact build time.
    pub v_r: Real,
    /// Wheel camber against the contact normal, rad.
    pub camber: Real,
    /// Blended tire/surface friction coefficient.
    pub friction_coeff: Real,
}
