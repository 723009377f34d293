//! Per-wheel spring/damper and steering geometry.
//!
//! The suspension is re-derived every tick from a displacement value the
//! wheel measures with its ground ray: displacement picks bounce or rebound
//! damping, is clamped to `[0, travel]` (the excess is tracked as
//! overtravel for the contact generator's bump-stop term) and moves the hub
//! along the lower-arm swing arc. Steering rotates the neutral hub
//! orientation about the steering axis with an ackermann correction.

use nalgebra::Unit;
use rapier3d::math::{Point, Real, Rotation, Vector};
use serde::{Deserialize, Serialize};

/// One suspension arm hinged on the chassis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SuspensionArm {
    /// Hinge position relative to the chassis.
    pub anchor: Point<Real>,
    /// Hinge axis, normalized.
    pub axis: Vector<Real>,
    /// Arm direction `(hub - anchor).normalize()`.
    pub dir: Vector<Real>,
    /// Arm length `(hub - anchor).norm()`.
    pub length: Real,
}

impl Default for SuspensionArm {
    fn default() -> Self {
        Self {
            anchor: Point::new(-0.35, 0.0, 0.0),
            axis: Vector::z(),
            dir: Vector::x(),
            length: 0.35,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SuspensionInfo {
    /// Used by double wishbone and macpherson setups.
    pub upper_arm: SuspensionArm,
    /// Required by all supported types.
    pub lower_arm: SuspensionArm,
    /// Steering axis relative to the wheel hub (caster/camber/toe).
    pub steering_axis: Vector<Real>,
    /// Wheel rotation relative to the hub at neutral steering.
    pub orientation0: Rotation<Real>,
    /// Hub position at full extension (zero g), chassis-local.
    pub position0: Point<Real>,
    /// Spring constant, N/m.
    pub stiffness: Real,
    /// Compression damping, Ns/m.
    pub bounce: Real,
    /// Decompression damping, Ns/m.
    pub rebound: Real,
    /// Max travel from the fully extended position along the hinge arc, m.
    pub travel: Real,
    /// Maximum steering angle, rad.
    pub max_steering_angle: Real,
    /// Ackermann correction angle, rad.
    pub ackermann: Real,
}

impl Default for SuspensionInfo {
    fn default() -> Self {
        Self {
            upper_arm: SuspensionArm::default(),
            lower_arm: SuspensionArm::default(),
            steering_axis: Vector::y(),
            orientation0: Rotation::identity(),
            position0: Point::origin(),
            stiffness: 50000.0,
            bounce: 2500.0,
            rebound: 4000.0,
            travel: 0.2,
            max_steering_angle: 0.0,
            ackermann: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Suspension {
    info: SuspensionInfo,
    hub_orientation: Rotation<Real>,
    orientation: Rotation<Real>,
    position: Point<Real>,
    steering_angle: Real,
    displacement: Real,
    overtravel: Real,
    damping: Real,
}

impl Suspension {
    pub fn new(info: &SuspensionInfo) -> Self {
        Self {
            info: *info,
            hub_orientation: info.orientation0,
            orientation: info.orientation0,
            position: info.position0,
            steering_angle: 0.0,
            displacement: 0.0,
            overtravel: 0.0,
            damping: info.bounce,
        }
    }

    /// Steering command in [-1, 1]; -1 is full left lock, 1 full right.
    pub fn set_steering(&mut self, value: Real) {
        let alpha = -value * self.info.max_steering_angle;
        self.steering_angle = 0.0;
        if alpha != 0.0 {
            self.steering_angle =
                (1.0 / (1.0 / alpha.tan() - self.info.ackermann.tan())).atan();
        }
        let axis = Unit::new_normalize(self.info.steering_axis);
        let steer = Rotation::from_axis_angle(&axis, self.steering_angle);
        self.hub_orientation = steer * self.info.orientation0;
    }

    /// Feed the measured displacement, updating damping mode, hub pose and
    /// the overtravel beyond the clamp.
    pub fn set_displacement(&mut self, value: Real) {
        let delta = value - self.displacement;
        self.damping = if delta > 0.0 {
            self.info.bounce
        } else {
            self.info.rebound
        };
        self.overtravel = (value - self.info.travel).max(0.0);
        self.displacement = value.clamp(0.0, self.info.travel);

        // move the hub along the lower arm swing arc
        let arm = &self.info.lower_arm;
        let old_dir = arm.dir * arm.length;
        let hub_offset = (self.info.position0 - arm.anchor) - old_dir;
        let new_dir = (old_dir + Vector::y() * self.displacement).normalize() * arm.length;
        self.position = arm.anchor + new_dir + hub_offset;
        self.orientation = self.hub_orientation;
    }

    pub fn max_steering_angle(&self) -> Real {
        self.info.max_steering_angle
    }

    /// Wheel orientation relative to the chassis.
    pub fn orientation(&self) -> Rotation<Real> {
        self.orientation
    }

    /// Wheel hub position relative to the chassis.
    pub fn position(&self) -> Point<Real> {
        self.position
    }

    pub fn displacement(&self) -> Real {
        self.displacement
    }

    pub fn overtravel(&self) -> Real {
        self.overtravel
    }

    pub fn stiffness(&self) -> Real {
        self.info.stiffness
    }

    /// Current damping coefficient (bounce or rebound).
    pub fn damping(&self) -> Real {
        self.damping
    }

    pub fn steering_angle(&self) -> Real {
        self.steering_angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steered_info() -> SuspensionInfo {
        SuspensionInfo {
            max_steering_angle: 0.55,
            ackermann: 0.12,
            ..SuspensionInfo::default()
        }
    }

    #[test]
    fn displacement_is_clamped_with_overtravel() {
        let info = SuspensionInfo::default();
        let mut suspension = Suspension::new(&info);
        suspension.set_displacement(0.35);
        assert!((suspension.displacement() - info.travel).abs() < 1e-6);
        assert!((suspension.overtravel() - 0.15).abs() < 1e-6);

        suspension.set_displacement(-0.1);
        assert_eq!(suspension.displacement(), 0.0);
        assert_eq!(suspension.overtravel(), 0.0);
    }

    #[test]
    fn damping_switches_between_bounce_and_rebound() {
        let info = SuspensionInfo::default();
        let mut suspension = Suspension::new(&info);
        suspension.set_displacement(0.1);
        assert_eq!(suspension.damping(), info.bounce);
        suspension.set_displacement(0.05);
        assert_eq!(suspension.damping(), info.rebound);
    }

    #[test]
    fn compression_raises_the_hub() {
        let mut suspension = Suspension::new(&SuspensionInfo::default());
        let rest = suspension.position();
        suspension.set_displacement(0.1);
        assert!(suspension.position().y > rest.y);
        // swing arc keeps the hub on the arm sphere
        let arm = SuspensionArm::default();
        let radius = (suspension.position() - arm.anchor).norm();
        assert!((radius - arm.length).abs() < 1e-5);
    }

    #[test]
    fn steering_rotates_the_hub() {
        let mut suspension = Suspension::new(&steered_info());
        suspension.set_steering(1.0);
        suspension.set_displacement(0.05);
        let angle = suspension.steering_angle();
        assert!(angle < 0.0, "right lock should steer negative about +y");
        assert!(angle.abs() <= 0.6);
        let forward = suspension.orientation() * Vector::z();
        assert!((forward.x - angle.sin()).abs() < 0.05);
    }

    #[test]
    fn ackermann_correction_is_asymmetric() {
        let mut left = Suspension::new(&steered_info());
        let mut right = Suspension::new(&SuspensionInfo {
            ackermann: -0.12,
            ..steered_info()
        });
        left.set_steering(0.7);
        right.set_steering(0.7);
        assert!(
            left.steering_angle().abs() != right.steering_angle().abs(),
            "mirrored ackermann should split inner/outer angles"
        );
    }
}
