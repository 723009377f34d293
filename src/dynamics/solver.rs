//! Generic scalar sequential-impulse constraint row and the per-tick
//! solver-body arena the vehicle solve runs against.
//!
//! The 8-iteration solve has to revisit the same pair of rigid bodies many
//! times per tick while wheel contacts, drivetrain joints and tire forces
//! feed back into each other. Instead of fighting the borrow rules of
//! `RigidBodySet`, the tick snapshots every involved body into a
//! [`SolverBody`] (velocities, inverse mass, world inverse inertia), solves
//! against the snapshots in place and writes the velocities back once at the
//! end. Static hit bodies map onto a shared immovable entry.

use rapier3d::math::{AngularInertia, Point, Real, Vector};
use rapier3d::prelude::{RigidBody, RigidBodyHandle, RigidBodySet};

/// Arena index of the immovable stand-in body.
pub const FIXED_BODY: usize = 0;
/// Arena index of the vehicle chassis.
pub const CHASSIS_BODY: usize = 1;

/// A 1-D velocity constraint between two bodies along `normal`.
///
/// `accum_impulse` persists across solver iterations within one tick and is
/// clamped to `[lower_limit, upper_limit]` after every solve.
#[derive(Clone, Copy, Debug)]
pub struct ConstraintRow {
    pub normal: Vector<Real>,
    /// Angular velocity response of body A per unit impulse.
    pub angular_comp_a: Vector<Real>,
    /// Angular velocity response of body B per unit impulse.
    pub angular_comp_b: Vector<Real>,
    /// Right-hand-side bias (already premultiplied by `jac_diag_inv`).
    pub rhs: Real,
    /// Constraint-force-mixing term softening the row.
    pub cfm: Real,
    /// Inverse effective mass of the row.
    pub jac_diag_inv: Real,
    pub lower_limit: Real,
    pub upper_limit: Real,
    pub accum_impulse: Real,
}

impl Default for ConstraintRow {
    fn default() -> Self {
        Self {
            normal: Vector::zeros(),
            angular_comp_a: Vector::zeros(),
            angular_comp_b: Vector::zeros(),
            rhs: 0.0,
            cfm: 0.0,
            jac_diag_inv: 0.0,
            lower_limit: 0.0,
            upper_limit: 0.0,
            accum_impulse: 0.0,
        }
    }
}

/// Velocity-level snapshot of a rigid body.
#[derive(Clone, Copy)]
pub struct SolverBody {
    pub linvel: Vector<Real>,
    pub angvel: Vector<Real>,
    pub inv_mass: Real,
    pub com: Point<Real>,
    inv_inertia_sqrt: AngularInertia<Real>,
}

impl SolverBody {
    /// The immovable stand-in used when a wheel rests on a static collider.
    pub fn fixed() -> Self {
        Self {
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            inv_mass: 0.0,
            com: Point::origin(),
            inv_inertia_sqrt: AngularInertia::zero(),
        }
    }

    pub fn from_body(body: &RigidBody) -> Self {
        let mass = body.mass();
        Self {
            linvel: *body.linvel(),
            angvel: *body.angvel(),
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            com: *body.center_of_mass(),
            inv_inertia_sqrt: body.mass_properties().effective_world_inv_inertia_sqrt,
        }
    }

    /// World inverse inertia applied to `v`.
    pub fn inv_inertia_mul(&self, v: Vector<Real>) -> Vector<Real> {
        self.inv_inertia_sqrt * (self.inv_inertia_sqrt * v)
    }

    /// Velocity of the point at lever arm `r` from the center of mass.
    pub fn velocity_at(&self, r: Vector<Real>) -> Vector<Real> {
        self.linvel + self.angvel.cross(&r)
    }

    /// Effective-mass denominator of a unit impulse applied along `normal`
    /// at lever arm `r`.
    pub fn impulse_denominator(&self, r: Vector<Real>, normal: &Vector<Real>) -> Real {
        let c = self.inv_inertia_mul(r.cross(normal));
        self.inv_mass + c.cross(&r).dot(normal)
    }
}

/// Per-tick arena of solver bodies. Entry 0 is the fixed stand-in, entry 1
/// the chassis; dynamic hit bodies are appended as wheels discover them.
/// The allocation is reused across ticks.
#[derive(Default)]
pub struct SolverBodies {
    bodies: Vec<SolverBody>,
    handles: Vec<Option<RigidBodyHandle>>,
}

impl SolverBodies {
    /// Reset the arena for a new tick around the given chassis.
    pub fn begin(&mut self, chassis: RigidBodyHandle, bodies: &RigidBodySet) {
        self.bodies.clear();
        self.handles.clear();
        self.bodies.push(SolverBody::fixed());
        self.handles.push(None);
        self.bodies.push(SolverBody::from_body(&bodies[chassis]));
        self.handles.push(Some(chassis));
    }

    /// Arena index for a ray-hit body. Dynamic bodies get (or reuse) a live
    /// entry; static bodies and stale handles map to the fixed entry.
    pub fn resolve(&mut self, handle: Option<RigidBodyHandle>, bodies: &RigidBodySet) -> usize {
        let Some(handle) = handle else {
            return FIXED_BODY;
        };
        let Some(body) = bodies.get(handle) else {
            return FIXED_BODY;
        };
        if !body.is_dynamic() {
            return FIXED_BODY;
        }
        if let Some(i) = self.handles.iter().position(|h| *h == Some(handle)) {
            return i;
        }
        self.bodies.push(SolverBody::from_body(body));
        self.handles.push(Some(handle));
        self.bodies.len() - 1
    }

    pub fn get(&self, i: usize) -> &SolverBody {
        &self.bodies[i]
    }

    pub fn get_mut(&mut self, i: usize) -> &mut SolverBody {
        &mut self.bodies[i]
    }

    /// Disjoint mutable access to two distinct entries.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut SolverBody, &mut SolverBody) {
        debug_assert!(a != b);
        if a < b {
            let (lo, hi) = self.bodies.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.bodies.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Write the solved velocities back to the rapier bodies. The fixed
    /// entry has no handle and is skipped.
    pub fn finish(&self, bodies: &mut RigidBodySet) {
        for (solver_body, handle) in self.bodies.iter().zip(&self.handles) {
            let Some(handle) = handle else { continue };
            if let Some(body) = bodies.get_mut(*handle) {
                body.set_linvel(solver_body.linvel, true);
                body.set_angvel(solver_body.angvel, true);
            }
        }
    }
}

/// One sequential-impulse iteration of `row` between arena entries `a` and
/// `b` with lever arms `r_a`/`r_b`. `extra_velocity_error` folds in velocity
/// terms living outside the two bodies (e.g. the wheel rim speed).
pub fn solve_constraint_row(
    row: &mut ConstraintRow,
    bodies: &mut SolverBodies,
    a: usize,
    b: usize,
    r_a: Vector<Real>,
    r_b: Vector<Real>,
    extra_velocity_error: Real,
) {
    let (body_a, body_b) = bodies.pair_mut(a, b);
    let normal = row.normal;
    let dv_a = body_a.linvel + body_a.angvel.cross(&r_a);
    let dv_b = body_b.linvel + body_b.angvel.cross(&r_b);
    let velocity_error = extra_velocity_error + normal.dot(&(dv_a - dv_b));
    let mut delta = row.rhs + row.cfm * row.accum_impulse - velocity_error * row.jac_diag_inv;

    let old = row.accum_impulse;
    row.accum_impulse = (old + delta).max(row.lower_limit).min(row.upper_limit);
    delta = row.accum_impulse - old;

    body_a.linvel += normal * (delta * body_a.inv_mass);
    body_a.angvel += row.angular_comp_a * delta;
    body_b.linvel -= normal * (delta * body_b.inv_mass);
    body_b.angvel -= row.angular_comp_b * delta;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn two_fixed_arena() -> SolverBodies {
        // Hand-built arena: entry 0 fixed, entry 1 a unit-mass free body.
        let mut arena = SolverBodies::default();
        arena.bodies.push(SolverBody::fixed());
        arena.handles.push(None);
        arena.bodies.push(SolverBody {
            inv_mass: 1.0,
            ..SolverBody::fixed()
        });
        arena.handles.push(None);
        arena
    }

    #[test]
    fn accumulated_impulse_stays_within_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut arena = two_fixed_arena();
        let mut row = ConstraintRow {
            normal: Vector::z(),
            jac_diag_inv: 1.0,
            lower_limit: -2.5,
            upper_limit: 1.5,
            ..Default::default()
        };
        for _ in 0..200 {
            row.rhs = rng.gen_range(-10.0..10.0);
            row.cfm = rng.gen_range(-0.5..0.0);
            let extra = rng.gen_range(-20.0..20.0);
            solve_constraint_row(&mut row, &mut arena, CHASSIS_BODY, FIXED_BODY, Vector::zeros(), Vector::zeros(), extra);
            assert!(row.accum_impulse >= row.lower_limit - 1e-6);
            assert!(row.accum_impulse <= row.upper_limit + 1e-6);
        }
    }

    #[test]
    fn fixed_body_never_moves() {
        let mut arena = two_fixed_arena();
        let mut row = ConstraintRow {
            normal: Vector::z(),
            jac_diag_inv: 1.0,
            lower_limit: -100.0,
            upper_limit: 100.0,
            ..Default::default()
        };
        arena.get_mut(CHASSIS_BODY).linvel = Vector::new(0.0, 0.0, 5.0);
        solve_constraint_row(&mut row, &mut arena, CHASSIS_BODY, FIXED_BODY, Vector::zeros(), Vector::zeros(), 0.0);
        assert_eq!(arena.get(FIXED_BODY).linvel, Vector::zeros());
        // the constraint removed relative velocity along the row normal
        assert!(arena.get(CHASSIS_BODY).linvel.z.abs() < 1e-5);
    }
}
