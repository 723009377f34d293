//! Wheel: suspension + shaft + brake + tire + ground ray. Each tick the
//! wheel casts its ray to measure suspension displacement and, when
//! grounded, builds a three-row contact (normal + two friction rows)
//! against the hit body. ABS and TCS corrections rewrite the brake factor
//! for the current tick.

use rapier3d::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use rapier3d::prelude::{ColliderSet, QueryPipeline, RigidBodyHandle, RigidBodySet};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

use super::brake::{Brake, BrakeInfo};
use super::contact::WheelContact;
use super::ray::GroundRay;
use super::shaft::Shaft;
use super::solver::{CHASSIS_BODY, ConstraintRow, SolverBodies};
use super::surface::TrackSurface;
use super::suspension::{Suspension, SuspensionInfo};
use super::tire::{Tire, TireInfo};

/// Stiffness of the bump stop engaged by suspension overtravel, N/m.
const BUMP_STIFFNESS: Real = 5e5;

/// Whether the wheel is still connected to the chassis. Updated by the
/// embedding application (e.g. after crash damage); the tick only reads it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WheelAttachment {
    #[default]
    Attached,
    Detached,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WheelInfo {
    pub suspension: SuspensionInfo,
    pub brake: BrakeInfo,
    pub tire: TireInfo,
    /// Spin inertia of wheel + tire + attached shaft parts, kg m^2.
    pub inertia: Real,
    pub radius: Real,
    pub width: Real,
    pub mass: Real,
}

impl Default for WheelInfo {
    fn default() -> Self {
        Self {
            suspension: SuspensionInfo::default(),
            brake: BrakeInfo::default(),
            tire: TireInfo::default(),
            inertia: 0.66,
            radius: 0.3,
            width: 0.2,
            mass: 15.0,
        }
    }
}

pub struct Wheel {
    pub suspension: Suspension,
    pub shaft: Shaft,
    pub brake: Brake,
    pub tire: Tire,
    pub ray: GroundRay,

    radius: Real,
    width: Real,
    mass: Real,
    antiroll: Real,
    /// World-space hub pose, refreshed by `update_displacement`.
    transform: Isometry<Real>,
    /// Chassis-local visual pose including wheel spin.
    local_pose: Isometry<Real>,
    attachment: WheelAttachment,
    has_contact: bool,
    /// Shaft velocity at the previous contact build (ABS/TCS prediction).
    last_angvel: Real,
    abs_enabled: bool,
    tcs_enabled: bool,
    abs_active: bool,
    tcs_active: bool,
}

impl Wheel {
    pub fn new(info: &WheelInfo) -> Self {
        Self {
            suspension: Suspension::new(&info.suspension),
            shaft: Shaft::new(info.inertia),
            brake: Brake::new(&info.brake),
            tire: Tire::new(&info.tire),
            ray: GroundRay::default(),
            radius: info.radius,
            width: info.width,
            mass: info.mass,
            antiroll: 0.0,
            transform: Isometry::identity(),
            local_pose: Isometry::identity(),
            attachment: WheelAttachment::Attached,
            has_contact: false,
            last_angvel: 0.0,
            abs_enabled: false,
            tcs_enabled: false,
            abs_active: false,
            tcs_active: false,
        }
    }

    /// Cast the ground ray from the current hub pose and feed the measured
    /// displacement (plus the procedural road bump) into the suspension.
    /// Returns whether the wheel has ground contact.
    pub fn update_displacement(
        &mut self,
        ray_length: Real,
        chassis_transform: &Isometry<Real>,
        chassis: RigidBodyHandle,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
        surfaces: &[TrackSurface],
    ) -> bool {
        let local = Isometry::from_parts(
            Translation::from(self.suspension.position().coords),
            self.suspension.orientation(),
        );
        self.transform = chassis_transform * local;

        let wheel_pos = Point::from(self.transform.translation.vector);
        let down = self.transform * -Vector::y();
        let ray_len = self.radius + ray_length;
        let ray_start = wheel_pos - down * self.radius;
        self.ray
            .cast(ray_start, down, ray_len, chassis, bodies, colliders, queries);

        // procedural bumpiness of the hit surface
        let mut bump = 0.0;
        let mut on_surface = false;
        if let Some(hit) = self.ray.hit() {
            if let Some(surface) = hit.surface.and_then(|i| surfaces.get(i)) {
                on_surface = true;
                if surface.bump_amplitude > 0.0 && surface.bump_wavelength > 1e-3 {
                    let phase = 2.0 * PI * (hit.point.x + hit.point.z) / surface.bump_wavelength;
                    let shift = 2.0 * (phase * FRAC_PI_2).sin();
                    let amplitude = 0.25 * surface.bump_amplitude;
                    bump = amplitude * ((phase + shift).sin() + (FRAC_PI_2 * phase).sin() - 2.0);
                }
            }
        }

        let rel_displacement = 2.0 * self.radius - self.ray.depth() + bump;
        let displacement = self.suspension.displacement() + rel_displacement;
        self.suspension.set_displacement(displacement);

        self.has_contact = on_surface && displacement >= 0.0;
        self.has_contact
    }

    /// Build the three contact rows from the ray hit of the preceding
    /// `update_displacement`. Also runs the ABS and TCS brake-factor
    /// corrections for this tick. Returns false if there is no contact.
    pub fn update_contact(
        &mut self,
        dt: Real,
        contact: &mut WheelContact,
        solver_bodies: &mut SolverBodies,
        bodies: &RigidBodySet,
        surfaces: &[TrackSurface],
    ) -> bool {
        if !self.has_contact {
            return false;
        }
        let Some(hit) = self.ray.hit().copied() else {
            return false;
        };
        let Some(surface) = hit.surface.and_then(|i| surfaces.get(i)) else {
            return false;
        };

        let tread = self.tire.tread();
        contact.friction_coeff =
            tread * surface.friction_tread + (1.0 - tread) * surface.friction_non_tread;

        let body_a = CHASSIS_BODY;
        let body_b = solver_bodies.resolve(hit.body, bodies);

        let wheel_forward = self.transform * Vector::z();
        let wheel_right = self.transform * Vector::x();
        let contact_normal = hit.normal;
        let contact_point = hit.point;

        // suspension response, stiffened by the bump stop on overtravel
        let mut stiffness = self.suspension.stiffness() + self.antiroll;
        let damping = self.suspension.damping();
        let mut displacement = self.suspension.displacement();
        if self.suspension.overtravel() > 0.0 {
            let overtravel = self.suspension.overtravel();
            displacement += overtravel;
            stiffness += BUMP_STIFFNESS * overtravel / displacement;
        }
        debug_assert!(stiffness >= 0.0);

        let r_a = contact_point - solver_bodies.get(body_a).com;
        let r_b = contact_point - solver_bodies.get(body_b).com;

        let tangent_lon =
            (wheel_forward - contact_normal * contact_normal.dot(&wheel_forward)).normalize();
        let tangent_lat =
            (wheel_right - contact_normal * contact_normal.dot(&wheel_right)).normalize();

        // inclination of the wheel plane against the surface normal
        contact.camber = wheel_right.dot(&contact_normal).clamp(-1.0, 1.0).asin();
        contact.v_r = self.shaft.angular_velocity() * self.radius;
        contact.body_a = body_a;
        contact.body_b = body_b;
        contact.r_a = r_a;
        contact.r_b = r_b;

        let v_a = solver_bodies.get(body_a).velocity_at(r_a);
        let v_b = solver_bodies.get(body_b).velocity_at(r_b);
        let v_ab = v_a - v_b;

        // suspension constraint: implicit spring-damper as CFM/ERP
        {
            let softness = 1.0 / (dt * (dt * stiffness + damping));
            let bias = stiffness / (dt * stiffness + damping);
            let velocity_error = -bias * displacement;

            let normal = contact_normal;
            let denom_a = solver_bodies.get(body_a).impulse_denominator(r_a, &normal);
            let denom_b = solver_bodies.get(body_b).impulse_denominator(r_b, &normal);
            let jac_diag_inv = 1.0 / (denom_a + denom_b + softness);

            contact.response = ConstraintRow {
                normal,
                angular_comp_a: solver_bodies.get(body_a).inv_inertia_mul(r_a.cross(&normal)),
                angular_comp_b: solver_bodies.get(body_b).inv_inertia_mul(r_b.cross(&normal)),
                rhs: -velocity_error * jac_diag_inv,
                cfm: -softness * jac_diag_inv,
                jac_diag_inv,
                lower_limit: 0.0,
                upper_limit: Real::INFINITY,
                accum_impulse: 0.0,
            };
        }

        // longitudinal friction constraint; limits start closed and are
        // widened by the solver loop
        {
            let normal = tangent_lon;
            let denom_a = solver_bodies.get(body_a).impulse_denominator(r_a, &normal);
            let denom_b = solver_bodies.get(body_b).impulse_denominator(r_b, &normal);
            let jac_diag_inv = 1.0 / (denom_a + denom_b);
            let velocity_error = v_ab.dot(&normal) - contact.v_r;

            contact.v1 = velocity_error + contact.v_r;
            contact.friction_lon = ConstraintRow {
                normal,
                angular_comp_a: solver_bodies.get(body_a).inv_inertia_mul(r_a.cross(&normal)),
                angular_comp_b: solver_bodies.get(body_b).inv_inertia_mul(r_b.cross(&normal)),
                rhs: -velocity_error * jac_diag_inv,
                cfm: 0.0,
                jac_diag_inv,
                lower_limit: 0.0,
                upper_limit: 0.0,
                accum_impulse: 0.0,
            };
        }

        // lateral friction constraint
        {
            let normal = tangent_lat;
            let denom_a = solver_bodies.get(body_a).impulse_denominator(r_a, &normal);
            let denom_b = solver_bodies.get(body_b).impulse_denominator(r_b, &normal);
            let jac_diag_inv = 1.0 / (denom_a + denom_b);
            let velocity_error = v_ab.dot(&normal);

            contact.v2 = velocity_error;
            contact.friction_lat = ConstraintRow {
                normal,
                angular_comp_a: solver_bodies.get(body_a).inv_inertia_mul(r_a.cross(&normal)),
                angular_comp_b: solver_bodies.get(body_b).inv_inertia_mul(r_b.cross(&normal)),
                rhs: -velocity_error * jac_diag_inv,
                cfm: 0.0,
                jac_diag_inv,
                lower_limit: 0.0,
                upper_limit: 0.0,
                accum_impulse: 0.0,
            };
        }

        // ABS: excessive braking slide pulls the brake factor down toward
        // 95% of the ideal slide
        self.abs_active = false;
        let brake_torque = self.brake.torque();
        let slide = self.tire.slide();
        let ideal_slide = self.tire.ideal_slide();
        if self.abs_enabled
            && brake_torque > 1e-3
            && contact.v1.abs() > 3.0
            && slide < -ideal_slide
        {
            let angvel_delta = self.shaft.angular_velocity() - self.last_angvel;
            let angvel_new = self.shaft.angular_velocity() + angvel_delta;
            let angvel_target = (0.95 * ideal_slide + 1.0) * contact.v1 / self.radius;
            let angvel_error = angvel_new - angvel_target;
            if angvel_error < 0.0 {
                let corrected = brake_torque + angvel_error / dt * self.shaft.inertia();
                let factor = (corrected / self.brake.max_torque()).clamp(0.0, 1.0);
                self.brake.set_brake_factor(factor);
                self.abs_active = true;
            }
        }

        // TCS: excessive drive slide adds brake torque toward the same
        // target
        self.tcs_active = false;
        if self.tcs_enabled && slide > ideal_slide && self.brake.max_torque() > 0.0 {
            let angvel_delta = self.shaft.angular_velocity() - self.last_angvel;
            let angvel_new = self.shaft.angular_velocity() + angvel_delta;
            let angvel_target = (0.95 * ideal_slide + 1.0) * contact.v1 / self.radius;
            let angvel_error = angvel_new - angvel_target;
            if angvel_error > 0.0 {
                let corrective_torque = angvel_error / dt * self.shaft.inertia();
                let factor = (corrective_torque / self.brake.max_torque())
                    .max(self.brake.brake_factor())
                    .min(1.0);
                self.brake.set_brake_factor(factor);
                self.tcs_active = true;
            }
        }

        self.last_angvel = self.shaft.angular_velocity();
        true
    }

    /// Drop any contact state, e.g. for a detached wheel.
    pub fn clear_contact(&mut self) {
        self.has_contact = false;
    }

    pub fn set_abs(&mut self, value: bool) {
        self.abs_enabled = value;
    }

    pub fn set_tcs(&mut self, value: bool) {
        self.tcs_enabled = value;
    }

    pub fn abs_active(&self) -> bool {
        self.abs_active
    }

    pub fn tcs_active(&self) -> bool {
        self.tcs_active
    }

    pub fn has_contact(&self) -> bool {
        self.has_contact
    }

    /// Anti-roll stiffness contribution for this tick.
    pub fn set_antiroll_stiffness(&mut self, value: Real) {
        self.antiroll = value;
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    pub fn width(&self) -> Real {
        self.width
    }

    pub fn mass(&self) -> Real {
        self.mass
    }

    /// World-space hub position of the last displacement update.
    pub fn position(&self) -> Point<Real> {
        Point::from(self.transform.translation.vector)
    }

    /// World-space hub pose of the last displacement update.
    pub fn transform(&self) -> Isometry<Real> {
        self.transform
    }

    pub fn attachment(&self) -> WheelAttachment {
        self.attachment
    }

    pub fn set_attachment(&mut self, value: WheelAttachment) {
        self.attachment = value;
    }

    /// Chassis-local visual pose including wheel spin.
    pub fn local_pose(&self) -> Isometry<Real> {
        self.local_pose
    }

    pub(crate) fn set_local_pose(&mut self, pose: Isometry<Real>) {
        self.local_pose = pose;
    }

    /// Surface of the current ray hit.
    pub fn surface_index(&self) -> Option<usize> {
        self.ray.hit().and_then(|h| h.surface)
    }

    /// Spin pose about the wheel's lateral axis from the shaft angle.
    pub(crate) fn spin_rotation(&self) -> Rotation<Real> {
        Rotation::from_axis_angle(&Vector::x_axis(), -self.shaft.angle())
    }
}
