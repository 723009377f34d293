//! Drivetrain joints: shaft-to-shaft and shaft-to-target velocity
//! constraints solved by clamped sequential impulses.
//!
//! All joints share the same two-phase contract: `init` computes the
//! effective inertia and resets the impulse accumulator, `solve` runs one
//! relaxation step. Shafts are addressed through [`ShaftId`] and resolved
//! against a [`Shafts`] view so joints stay plain copyable descriptors that
//! can live in reusable scratch arrays.

use rapier3d::math::Real;

use super::differential::Differential;
use super::engine::Engine;
use super::shaft::{Shaft, ShaftId};
use super::wheel::Wheel;

/// Split-borrow view over every shaft owner in a vehicle.
pub struct Shafts<'a> {
    pub wheels: &'a mut [Wheel],
    pub differentials: &'a mut [Differential],
    pub engine: &'a mut Engine,
    pub fixed: &'a mut Shaft,
}

impl Shafts<'_> {
    pub fn get(&self, id: ShaftId) -> &Shaft {
        match id {
            ShaftId::Fixed => self.fixed,
            ShaftId::Engine => self.engine.shaft(),
            ShaftId::Wheel(i) => &self.wheels[i].shaft,
            ShaftId::Differential(i) => self.differentials[i].shaft(),
        }
    }

    pub fn get_mut(&mut self, id: ShaftId) -> &mut Shaft {
        match id {
            ShaftId::Fixed => self.fixed,
            ShaftId::Engine => self.engine.shaft_mut(),
            ShaftId::Wheel(i) => &mut self.wheels[i].shaft,
            ShaftId::Differential(i) => self.differentials[i].shaft_mut(),
        }
    }

    fn velocity(&self, id: ShaftId) -> Real {
        self.get(id).angular_velocity()
    }
}

/// Drives one shaft toward `target_velocity` under a symmetric impulse
/// budget (torque capacity x dt). Brake torque, engine torque and the tire
/// reaction torque all enter the solve through this joint.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotorJoint {
    pub shaft: ShaftId,
    pub target_velocity: Real,
    pub impulse_limit: Real,
    pub accumulated_impulse: Real,
}

impl MotorJoint {
    pub fn init(&mut self) {
        self.accumulated_impulse = 0.0;
    }

    /// One solver iteration.
    pub fn solve(&mut self, shafts: &mut Shafts) {
        let shaft = shafts.get(self.shaft);
        let velocity_error = shaft.angular_velocity() - self.target_velocity;
        let lambda = -velocity_error * shaft.inertia();

        let old = self.accumulated_impulse;
        self.accumulated_impulse = (old + lambda)
            .max(-self.impulse_limit)
            .min(self.impulse_limit);
        shafts
            .get_mut(self.shaft)
            .apply_impulse(self.accumulated_impulse - old);
    }
}

/// Couples two co-rotating shafts through a gear ratio. The symmetric
/// impulse limit yields a slipping clutch; if the limit is never reached the
/// shafts lock to equal geared velocity. `gear_ratio` has to stay nonzero
/// whenever `impulse_limit` is nonzero.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClutchJoint {
    pub shaft1: ShaftId,
    pub shaft2: ShaftId,
    pub gear_ratio: Real,
    pub impulse_limit: Real,
    pub inertia_eff: Real,
    pub accumulated_impulse: Real,
}

impl ClutchJoint {
    /// Effective inertia from the harmonic combination of the linked
    /// shafts, the far side scaled by gear ratio squared; resets the
    /// accumulator.
    pub fn init(&mut self, shafts: &Shafts) {
        self.accumulated_impulse = 0.0;
        self.inertia_eff = 1.0
            / (shafts.get(self.shaft1).inv_inertia()
                + self.gear_ratio * self.gear_ratio * shafts.get(self.shaft2).inv_inertia());
    }

    /// One solver iteration.
    pub fn solve(&mut self, shafts: &mut Shafts) {
        let velocity_error =
            shafts.velocity(self.shaft1) - self.gear_ratio * shafts.velocity(self.shaft2);
        let mut lambda = -velocity_error * self.inertia_eff;

        let old = self.accumulated_impulse;
        self.accumulated_impulse = (old + lambda)
            .max(-self.impulse_limit)
            .min(self.impulse_limit);
        lambda = self.accumulated_impulse - old;

        shafts.get_mut(self.shaft1).apply_impulse(lambda);
        shafts
            .get_mut(self.shaft2)
            .apply_impulse(-lambda * self.gear_ratio);
    }
}

/// Couples a carrier shaft to the averaged angular velocity of its two
/// output shafts scaled by the final drive ratio: the open-differential
/// split. Limited-slip behavior comes from pairing it with a [`ClutchJoint`]
/// directly between the two outputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DifferentialJoint {
    pub shaft1: ShaftId,
    pub shaft2a: ShaftId,
    pub shaft2b: ShaftId,
    pub gear_ratio: Real,
    pub impulse_limit: Real,
    pub inertia_eff: Real,
    pub accumulated_impulse: Real,
}

impl DifferentialJoint {
    pub fn init(&mut self, shafts: &Shafts) {
        self.accumulated_impulse = 0.0;
        self.impulse_limit = Real::INFINITY;
        self.inertia_eff = 1.0
            / (shafts.get(self.shaft1).inv_inertia()
                + self.gear_ratio * self.gear_ratio
                    / (shafts.get(self.shaft2a).inertia() + shafts.get(self.shaft2b).inertia()));
    }

    /// Carrier velocity minus the geared average of the outputs; positive
    /// while the carrier is driving the outputs.
    pub fn velocity_delta(&self, shafts: &Shafts) -> Real {
        shafts.velocity(self.shaft1)
            - 0.5
                * self.gear_ratio
                * (shafts.velocity(self.shaft2a) + shafts.velocity(self.shaft2b))
    }

    /// One solver iteration.
    pub fn solve(&mut self, shafts: &mut Shafts) {
        let velocity_error = self.velocity_delta(shafts);
        let mut lambda = -velocity_error * self.inertia_eff;

        let old = self.accumulated_impulse;
        self.accumulated_impulse = (old + lambda)
            .max(-self.impulse_limit)
            .min(self.impulse_limit);
        lambda = self.accumulated_impulse - old;

        shafts.get_mut(self.shaft1).apply_impulse(lambda);
        shafts
            .get_mut(self.shaft2a)
            .apply_impulse(-lambda * 0.5 * self.gear_ratio);
        shafts
            .get_mut(self.shaft2b)
            .apply_impulse(-lambda * 0.5 * self.gear_ratio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::differential::DifferentialInfo;
    use crate::dynamics::engine::EngineInfo;
    use crate::dynamics::wheel::WheelInfo;

    struct Rig {
        wheels: Vec<Wheel>,
        differentials: Vec<Differential>,
        engine: Engine,
        fixed: Shaft,
    }

    impl Rig {
        fn new(wheel_count: usize) -> Self {
            let winfo = WheelInfo::default();
            Self {
                wheels: (0..wheel_count).map(|_| Wheel::new(&winfo)).collect(),
                differentials: vec![Differential::new(&DifferentialInfo {
                    output_a: ShaftId::Wheel(0),
                    output_b: ShaftId::Wheel(1),
                    ..DifferentialInfo::default()
                })],
                engine: Engine::new(&EngineInfo::default()),
                fixed: Shaft::fixed(),
            }
        }

        fn shafts(&mut self) -> Shafts<'_> {
            Shafts {
                wheels: &mut self.wheels,
                differentials: &mut self.differentials,
                engine: &mut self.engine,
                fixed: &mut self.fixed,
            }
        }
    }

    #[test]
    fn clutch_joint_locks_shafts_to_geared_velocity() {
        let mut rig = Rig::new(2);
        rig.wheels[0].shaft.set_angular_velocity(50.0);
        rig.wheels[1].shaft.set_angular_velocity(10.0);
        let mut joint = ClutchJoint {
            shaft1: ShaftId::Wheel(0),
            shaft2: ShaftId::Wheel(1),
            gear_ratio: 1.0,
            impulse_limit: 1e6,
            ..Default::default()
        };
        let mut shafts = rig.shafts();
        joint.init(&shafts);
        for _ in 0..20 {
            joint.solve(&mut shafts);
        }
        let delta =
            shafts.velocity(ShaftId::Wheel(0)) - shafts.velocity(ShaftId::Wheel(1));
        assert!(delta.abs() < 1e-3, "unlocked, delta = {delta}");
    }

    #[test]
    fn clutch_joint_slips_at_impulse_limit() {
        let mut rig = Rig::new(2);
        rig.wheels[0].shaft.set_angular_velocity(100.0);
        let mut joint = ClutchJoint {
            shaft1: ShaftId::Wheel(0),
            shaft2: ShaftId::Wheel(1),
            gear_ratio: 1.0,
            impulse_limit: 0.5,
            ..Default::default()
        };
        let mut shafts = rig.shafts();
        joint.init(&shafts);
        for _ in 0..20 {
            joint.solve(&mut shafts);
        }
        assert!(joint.accumulated_impulse.abs() <= 0.5 + 1e-6);
        assert!(shafts.velocity(ShaftId::Wheel(0)) > shafts.velocity(ShaftId::Wheel(1)));
    }

    #[test]
    fn differential_joint_splits_carrier_velocity() {
        let mut rig = Rig::new(2);
        rig.differentials[0]
            .shaft_mut()
            .set_angular_velocity(82.0);
        let mut joint = DifferentialJoint {
            shaft1: ShaftId::Differential(0),
            shaft2a: ShaftId::Wheel(0),
            shaft2b: ShaftId::Wheel(1),
            gear_ratio: 4.1,
            ..Default::default()
        };
        let mut shafts = rig.shafts();
        joint.init(&shafts);
        for _ in 0..50 {
            joint.solve(&mut shafts);
        }
        assert!(joint.velocity_delta(&shafts).abs() < 1e-2);
        // open split: both outputs picked up the same velocity
        let w0 = shafts.velocity(ShaftId::Wheel(0));
        let w1 = shafts.velocity(ShaftId::Wheel(1));
        assert!((w0 - w1).abs() < 1e-3);
        assert!(w0 > 0.0);
    }

    #[test]
    fn motor_joint_respects_impulse_limit() {
        let mut rig = Rig::new(1);
        let mut joint = MotorJoint {
            shaft: ShaftId::Wheel(0),
            target_velocity: 100.0,
            impulse_limit: 1.0,
            ..Default::default()
        };
        joint.init();
        let mut shafts = rig.shafts();
        for _ in 0..10 {
            joint.solve(&mut shafts);
        }
        assert!(joint.accumulated_impulse.abs() <= 1.0 + 1e-6);
        let inv_inertia = shafts.get(ShaftId::Wheel(0)).inv_inertia();
        let expected = 1.0 * inv_inertia;
        let reached = shafts.velocity(ShaftId::Wheel(0));
        assert!((reached - expected).abs() < 1e-3);
    }
}
