//! The vehicle aggregate: wheels, differentials, the
//! engine-clutch-transmission chain, aerodynamic devices and the per-tick
//! dynamics solve.
//!
//! `update_action` runs once per physics step, before the rigid-body
//! pipeline integrates: aerodynamics, transmission and autoclutch logic,
//! the engine update, then the fixed-iteration sequential-impulse solve
//! that couples wheel contacts with the drivetrain joints.

use rapier3d::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use rapier3d::prelude::{ColliderSet, QueryPipeline, RigidBodyHandle, RigidBodySet};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt::Write as _;

use super::aero::{AeroDevice, AeroDeviceInfo};
use super::antiroll::AntiRollBar;
use super::brake::BrakeInfo;
use super::clutch::{Clutch, ClutchInfo};
use super::contact::WheelContact;
use super::differential::{Differential, DifferentialInfo};
use super::engine::{Engine, EngineInfo};
use super::joints::{ClutchJoint, DifferentialJoint, MotorJoint, Shafts};
use super::shaft::{Shaft, ShaftId};
use super::solver::{SolverBodies, solve_constraint_row};
use super::surface::TrackSurface;
use super::suspension::{SuspensionArm, SuspensionInfo};
use super::telemetry::{VehicleTelemetry, WheelTelemetry};
use super::transmission::{Transmission, TransmissionInfo};
use super::wheel::{Wheel, WheelAttachment, WheelInfo};

/// Fixed iteration count of the interleaved contact/drivetrain solve.
/// There is no convergence check; the ordering inside one iteration is
/// load-bearing.
pub const SOLVER_ITERATIONS: usize = 8;

const RPM_TO_RAD: Real = PI / 30.0;

/// Chassis body description handed to the rigid-body engine at spawn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ChassisInfo {
    /// Collision box half extents (x right, y up, z forward), m.
    pub half_extents: [Real; 3],
    /// Total chassis mass, kg.
    pub mass: Real,
    /// Center-of-mass offset from the collider center, chassis-local.
    pub com_offset: [Real; 3],
    pub linear_damping: Real,
    pub angular_damping: Real,
}

impl Default for ChassisInfo {
    fn default() -> Self {
        Self {
            half_extents: [0.9, 0.35, 2.1],
            mass: 1350.0,
            com_offset: [0.0, -0.15, 0.0],
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

/// Complete load-time description of a vehicle. The only supported way to
/// configure a non-default vehicle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub chassis: ChassisInfo,
    pub wheels: Vec<WheelInfo>,
    pub differentials: Vec<DifferentialInfo>,
    pub antiroll: Vec<AntiRollBar>,
    pub aero: Vec<AeroDeviceInfo>,
    pub transmission: TransmissionInfo,
    pub clutch: ClutchInfo,
    pub engine: EngineInfo,
    /// Shaft driven by the transmission output; wheel and differential
    /// links together have to form a tree.
    pub transmission_link: ShaftId,
}

impl VehicleInfo {
    /// A complete rear-wheel-drive sports car: four wheels, one rear
    /// differential, six forward gears.
    pub fn sports_car() -> Self {
        let front = |x: Real, ackermann: Real| WheelInfo {
            suspension: SuspensionInfo {
                position0: Point::new(x, -0.35, 1.25),
                lower_arm: SuspensionArm {
                    anchor: Point::new(x - x.signum() * 0.35, -0.35, 1.25),
                    axis: Vector::z(),
                    dir: Vector::x() * x.signum(),
                    length: 0.35,
                },
                upper_arm: SuspensionArm {
                    anchor: Point::new(x - x.signum() * 0.3, -0.15, 1.25),
                    axis: Vector::z(),
                    dir: Vector::x() * x.signum(),
                    length: 0.3,
                },
                max_steering_angle: 0.55,
                ackermann,
                ..SuspensionInfo::default()
            },
            brake: BrakeInfo {
                bias: 0.66,
                ..BrakeInfo::default()
            },
            ..WheelInfo::default()
        };
        let rear = |x: Real| WheelInfo {
            suspension: SuspensionInfo {
                position0: Point::new(x, -0.35, -1.25),
                lower_arm: SuspensionArm {
                    anchor: Point::new(x - x.signum() * 0.35, -0.35, -1.25),
                    axis: Vector::z(),
                    dir: Vector::x() * x.signum(),
                    length: 0.35,
                },
                upper_arm: SuspensionArm {
                    anchor: Point::new(x - x.signum() * 0.3, -0.15, -1.25),
                    axis: Vector::z(),
                    dir: Vector::x() * x.signum(),
                    length: 0.3,
                },
                ..SuspensionInfo::default()
            },
            brake: BrakeInfo {
                bias: 0.34,
                handbrake: 1.0,
                ..BrakeInfo::default()
            },
            ..WheelInfo::default()
        };

        Self {
            chassis: ChassisInfo::default(),
            wheels: vec![
                front(-0.75, 0.12),
                front(0.75, -0.12),
                rear(-0.75),
                rear(0.75),
            ],
            differentials: vec![DifferentialInfo {
                output_a: ShaftId::Wheel(2),
                output_b: ShaftId::Wheel(3),
                ..DifferentialInfo::default()
            }],
            antiroll: vec![
                AntiRollBar {
                    stiffness: 8000.0,
                    wheel0: 0,
                    wheel1: 1,
                },
                AntiRollBar {
                    stiffness: 6500.0,
                    wheel0: 2,
                    wheel1: 3,
                },
            ],
            aero: vec![AeroDeviceInfo {
                drag_frontal_area: 1.9,
                drag_coefficient: 0.32,
                lift_surface_area: 1.6,
                lift_coefficient: -0.2,
                lift_efficiency: 0.95,
                position: Point::new(0.0, 0.1, 0.0),
                ..AeroDeviceInfo::default()
            }],
            transmission: TransmissionInfo {
                gear_ratios: vec![-2.8, 0.0, 3.13, 2.05, 1.48, 1.16, 0.97, 0.81],
                shift_time: 0.2,
                forward_gears: 6,
                reverse_gears: 1,
            },
            clutch: ClutchInfo::default(),
            engine: EngineInfo::default(),
            transmission_link: ShaftId::Differential(0),
        }
    }
}

/// Section toggles of the human-readable debug dump.
#[derive(Clone, Copy, Debug, Default)]
pub struct DebugSections {
    pub body: bool,
    pub drivetrain: bool,
    pub wheels: bool,
    pub aero: bool,
}

impl DebugSections {
    pub fn all() -> Self {
        Self {
            body: true,
            drivetrain: true,
            wheels: true,
            aero: true,
        }
    }
}

pub struct Vehicle {
    chassis: RigidBodyHandle,
    transform: Isometry<Real>,

    wheels: Vec<Wheel>,
    differentials: Vec<Differential>,
    antiroll: Vec<AntiRollBar>,
    aero_devices: Vec<AeroDevice>,
    transmission: Transmission,
    clutch: Clutch,
    engine: Engine,
    fixed_shaft: Shaft,

    // solver scratch, sized once here and refilled every tick
    wheel_contacts: Vec<WheelContact>,
    diff_joints: Vec<DifferentialJoint>,
    clutch_joints: Vec<ClutchJoint>,
    motor_joints: Vec<MotorJoint>,
    solver_bodies: SolverBodies,

    // logic state
    brake_value: Real,
    last_clutch: Real,
    remaining_shift_time: Real,
    tacho_rpm: Real,
    shift_gear: i32,
    shifted: bool,
    autoclutch: bool,
    autoshift: bool,
    abs_enabled: bool,
    tcs_enabled: bool,
    abs_active: bool,
    tcs_active: bool,

    aero_force: Vector<Real>,
    aero_torque: Vector<Real>,

    // aggregate peak friction, feeds the AI estimators
    lon_friction_coeff: Real,
    lat_friction_coeff: Real,

    max_angle: Real,
    max_speed: Real,
    feedback: Real,
    last_dt: Real,
}

impl Vehicle {
    /// Assemble a vehicle around an already-spawned chassis body. The info
    /// is assumed pre-validated; link indices are checked by debug
    /// assertions only.
    pub fn new(info: &VehicleInfo, chassis: RigidBodyHandle) -> Self {
        let wheels: Vec<Wheel> = info.wheels.iter().map(Wheel::new).collect();
        let differentials: Vec<Differential> =
            info.differentials.iter().map(Differential::new).collect();

        for diff in &info.differentials {
            debug_assert!(Self::link_in_range(diff.output_a, &info.wheels, &info.differentials));
            debug_assert!(Self::link_in_range(diff.output_b, &info.wheels, &info.differentials));
        }
        debug_assert!(Self::link_in_range(
            info.transmission_link,
            &info.wheels,
            &info.differentials
        ));

        let max_angle = wheels
            .iter()
            .map(|w| w.suspension.max_steering_angle())
            .fold(0.0, Real::max);

        let mut vehicle = Self {
            chassis,
            transform: Isometry::identity(),
            wheel_contacts: vec![WheelContact::default(); wheels.len()],
            diff_joints: vec![DifferentialJoint::default(); differentials.len()],
            clutch_joints: vec![ClutchJoint::default(); differentials.len() + 1],
            motor_joints: vec![MotorJoint::default(); wheels.len() * 2 + 1],
            solver_bodies: SolverBodies::default(),
            wheels,
            differentials,
            antiroll: info.antiroll.clone(),
            aero_devices: info.aero.iter().map(AeroDevice::new).collect(),
            transmission: Transmission::new(&info.transmission, info.transmission_link),
            clutch: Clutch::new(&info.clutch),
            engine: Engine::new(&info.engine),
            fixed_shaft: Shaft::fixed(),
            brake_value: 0.0,
            last_clutch: 1.0,
            remaining_shift_time: 0.0,
            tacho_rpm: 0.0,
            shift_gear: 0,
            shifted: true,
            autoclutch: true,
            autoshift: false,
            abs_enabled: false,
            tcs_enabled: false,
            abs_active: false,
            tcs_active: false,
            aero_force: Vector::zeros(),
            aero_torque: Vector::zeros(),
            lon_friction_coeff: 0.0,
            lat_friction_coeff: 0.0,
            max_angle,
            max_speed: 0.0,
            feedback: 0.0,
            last_dt: 1.0 / 60.0,
        };
        let (lon, lat) = vehicle.calculate_friction_coefficients(info.chassis.mass);
        vehicle.lon_friction_coeff = lon;
        vehicle.lat_friction_coeff = lat;
        vehicle.max_speed = vehicle.calculate_max_speed();
        vehicle
    }

    fn link_in_range(
        id: ShaftId,
        wheels: &[WheelInfo],
        differentials: &[DifferentialInfo],
    ) -> bool {
        match id {
            ShaftId::Wheel(i) => i < wheels.len(),
            ShaftId::Differential(i) => i < differentials.len(),
            ShaftId::Engine | ShaftId::Fixed => false,
        }
    }

    // ------------------------------------------------------------------
    // driver inputs
    // ------------------------------------------------------------------

    /// Steering in [-1, 1]: left to right.
    pub fn set_steering(&mut self, value: Real) {
        for wheel in &mut self.wheels {
            wheel.suspension.set_steering(value);
        }
    }

    /// Request a gear in `[-reverse_gears, forward_gears]`; the shift
    /// commits halfway through the configured shift time.
    pub fn set_gear(&mut self, value: i32) {
        if self.shifted
            && value != self.transmission.gear()
            && value <= self.transmission.forward_gears()
            && value >= -self.transmission.reverse_gears()
        {
            self.remaining_shift_time = self.transmission.shift_time();
            self.shift_gear = value;
            self.shifted = false;
        }
    }

    /// Throttle in [0, 1].
    pub fn set_throttle(&mut self, value: Real) {
        self.engine.set_throttle(value);
    }

    /// Nitrous boost in [0, 1].
    pub fn set_nos(&mut self, value: Real) {
        self.engine.set_nos_boost(value);
    }

    /// Clutch engagement in [0, 1]; overridden while autoclutch is on.
    pub fn set_clutch(&mut self, value: Real) {
        self.clutch.set_position(value);
    }

    /// Brake pedal in [0, 1].
    pub fn set_brake(&mut self, value: Real) {
        self.brake_value = value;
        for wheel in &mut self.wheels {
            wheel.brake.set_brake_factor(value);
        }
    }

    /// Handbrake in [0, 1].
    pub fn set_handbrake(&mut self, value: Real) {
        for wheel in &mut self.wheels {
            wheel.brake.set_handbrake_factor(value);
        }
    }

    pub fn set_autoclutch(&mut self, value: bool) {
        self.autoclutch = value;
    }

    pub fn set_autoshift(&mut self, value: bool) {
        self.autoshift = value;
    }

    pub fn set_abs(&mut self, value: bool) {
        self.abs_enabled = value;
        for wheel in &mut self.wheels {
            wheel.set_abs(value);
        }
    }

    pub fn set_tcs(&mut self, value: bool) {
        self.tcs_enabled = value;
        for wheel in &mut self.wheels {
            wheel.set_tcs(value);
        }
    }

    pub fn start_engine(&mut self) {
        self.engine.start();
    }

    /// Mark a wheel as attached or torn off; detached wheels skip contact
    /// generation and pose updates.
    pub fn set_wheel_attachment(&mut self, wheel: usize, value: WheelAttachment) {
        self.wheels[wheel].set_attachment(value);
    }

    // ------------------------------------------------------------------
    // state access
    // ------------------------------------------------------------------

    pub fn chassis(&self) -> RigidBodyHandle {
        self.chassis
    }

    /// Predicted chassis transform of the last tick.
    pub fn transform(&self) -> Isometry<Real> {
        self.transform
    }

    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheel(&self, i: usize) -> &Wheel {
        &self.wheels[i]
    }

    pub fn wheel_mut(&mut self, i: usize) -> &mut Wheel {
        &mut self.wheels[i]
    }

    pub fn wheel_contact(&self, i: usize) -> &WheelContact {
        &self.wheel_contacts[i]
    }

    /// World-space pose of a wheel for rendering.
    pub fn wheel_world_pose(&self, i: usize) -> Isometry<Real> {
        self.transform * self.wheels[i].local_pose()
    }

    pub fn transmission(&self) -> &Transmission {
        &self.transmission
    }

    pub fn clutch(&self) -> &Clutch {
        &self.clutch
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Chassis speed, m/s.
    pub fn speed(&self, bodies: &RigidBodySet) -> Real {
        bodies
            .get(self.chassis)
            .map_or(0.0, |b| b.linvel().norm())
    }

    /// Speedometer reading off the first wheel, m/s.
    pub fn speedometer(&self) -> Real {
        self.wheels
            .first()
            .map_or(0.0, |w| w.radius() * w.shaft.angular_velocity())
    }

    /// Drivetrain-limited top speed, m/s.
    pub fn max_speed(&self) -> Real {
        self.max_speed
    }

    /// Exponentially smoothed tachometer rpm.
    pub fn tacho_rpm(&self) -> Real {
        self.tacho_rpm
    }

    /// Largest steering lock of any wheel, rad.
    pub fn max_steering_angle(&self) -> Real {
        self.max_angle
    }

    /// Steering feedback from the front tires' aligning torque.
    pub fn feedback(&self) -> Real {
        self.feedback
    }

    pub fn abs_enabled(&self) -> bool {
        self.abs_enabled
    }

    pub fn tcs_enabled(&self) -> bool {
        self.tcs_enabled
    }

    pub fn abs_active(&self) -> bool {
        self.abs_active
    }

    pub fn tcs_active(&self) -> bool {
        self.tcs_active
    }

    pub fn fuel(&self) -> Real {
        self.engine.fuel()
    }

    pub fn nos(&self) -> Real {
        self.engine.nos()
    }

    /// Total aerodynamic force of the last tick, world space.
    pub fn total_aero(&self) -> Vector<Real> {
        self.aero_force
    }

    pub fn lift_coefficient(&self) -> Real {
        self.aero_devices.iter().map(|d| d.lift_coefficient()).sum()
    }

    pub fn drag_coefficient(&self) -> Real {
        self.aero_devices.iter().map(|d| d.drag_coefficient()).sum()
    }

    /// Distance needed to slow down to `target_speed`, ignoring drag.
    pub fn braking_distance(&self, bodies: &RigidBodySet, target_speed: Real) -> Real {
        let gravity = 9.81;
        let lon_friction_factor = 0.7;
        let friction_coeff = self.lon_friction_coeff * lon_friction_factor;
        let current_speed_2 = bodies
            .get(self.chassis)
            .map_or(0.0, |b| b.linvel().norm_squared());
        let target_speed_2 = target_speed * target_speed;
        if target_speed_2 < current_speed_2 {
            (current_speed_2 - target_speed_2) / (2.0 * friction_coeff * gravity)
        } else {
            0.0
        }
    }

    /// Maximum cornering velocity for a curve of the given radius.
    pub fn max_velocity(&self, bodies: &RigidBodySet, radius: Real) -> Real {
        let gravity = 9.81;
        let lat_friction_factor = 0.7;
        let friction_coeff = self.lat_friction_coeff * lat_friction_factor;
        let inv_mass = bodies
            .get(self.chassis)
            .map_or(0.0, |b| 1.0 / b.mass().max(1e-6));
        let d = 1.0 - radius * friction_coeff * self.lift_coefficient() * inv_mass;
        if d < 1e-6 {
            return 1000.0;
        }
        (radius * friction_coeff * gravity / d).sqrt()
    }

    // ------------------------------------------------------------------
    // per-tick update
    // ------------------------------------------------------------------

    /// One full vehicle tick; invoked by the world right before the
    /// rigid-body pipeline steps.
    pub fn update_action(
        &mut self,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
        surfaces: &[TrackSurface],
        dt: Real,
    ) {
        self.last_dt = dt;
        self.update_aerodynamics(bodies, dt);
        self.update_transmission(dt);
        self.engine.update(dt);
        self.update_dynamics(bodies, colliders, queries, surfaces, dt);

        self.tacho_rpm = self.engine.rpm() * 0.3 + self.tacho_rpm * 0.7;

        if let Some(body) = bodies.get(self.chassis) {
            self.transform = body.predict_position_using_velocity_and_forces(dt);
        }
        self.update_wheel_poses(dt);
    }

    fn update_aerodynamics(&mut self, bodies: &mut RigidBodySet, dt: Real) {
        self.aero_force = Vector::zeros();
        self.aero_torque = Vector::zeros();
        let Some(body) = bodies.get_mut(self.chassis) else {
            return;
        };

        let position = *body.position();
        let rotation = position.rotation;
        let wind = -(rotation.inverse() * *body.linvel());
        let com = *body.center_of_mass();

        let mut force = Vector::zeros();
        let mut torque = Vector::zeros();
        for device in &mut self.aero_devices {
            let device_force = rotation * device.force(wind);
            let r = position * device.position() - com;
            force += device_force;
            torque += r.cross(&device_force);
        }
        self.aero_force = force;
        self.aero_torque = torque;

        body.apply_impulse(force * dt, true);
        body.apply_torque_impulse(torque * dt, true);
    }

    /// Gear selection, shift timing and the autoclutch.
    fn update_transmission(&mut self, dt: Real) {
        let clutch_rpm = self.clutch_rpm();

        if self.autoshift {
            let gear = self.next_gear(clutch_rpm);
            self.set_gear(gear);
        }

        self.remaining_shift_time = (self.remaining_shift_time - dt).max(0.0);

        if !self.shifted && self.remaining_shift_time <= self.transmission.shift_time() * 0.5 {
            self.transmission.shift(self.shift_gear);
            self.shifted = true;
        }

        if self.autoclutch {
            if !self.engine.combustion() {
                self.engine.start();
            }

            let throttle = self.engine.throttle();
            let throttle = self.auto_clutch_throttle(clutch_rpm, throttle, dt);
            self.engine.set_throttle(throttle);

            let new_clutch = self.auto_clutch(clutch_rpm, self.last_clutch, dt);
            self.clutch.set_position(new_clutch);
        }
        self.last_clutch = self.clutch.position();
    }

    /// Engine-side rpm implied by the transmission link shaft.
    fn clutch_rpm(&self) -> Real {
        let shaft_velocity = self.shaft(self.transmission.link()).angular_velocity();
        self.transmission.clutch_rpm(shaft_velocity)
    }

    fn shaft(&self, id: ShaftId) -> &Shaft {
        match id {
            ShaftId::Fixed => &self.fixed_shaft,
            ShaftId::Engine => self.engine.shaft(),
            ShaftId::Wheel(i) => &self.wheels[i].shaft,
            ShaftId::Differential(i) => self.differentials[i].shaft(),
        }
    }

    fn auto_clutch(&self, clutch_rpm: Real, last_clutch: Real, dt: Real) -> Real {
        let mut clutch_value: Real = 1.0;
        let clutch_engage_limit = 10.0 * dt;

        // keep the engine above stall
        let rpm_min = self.engine.start_rpm();
        if clutch_rpm < rpm_min {
            let rpm = self.engine.rpm();
            if rpm < rpm_min * 1.25 {
                let rpm_stall = self.engine.stall_rpm();
                let ramp = 0.8 * (rpm - rpm_stall) / (rpm_min - rpm_stall);
                let torque_limit = self.engine.torque() * ramp;
                clutch_value = (torque_limit / self.clutch.torque_max()).clamp(0.0, 1.0);
            }
        }

        // declutch while shifting
        let shift_time = self.transmission.shift_time();
        if self.remaining_shift_time > shift_time * 0.5 {
            clutch_value = 0.0;
        } else if self.remaining_shift_time > 0.0 {
            clutch_value *= 1.0 - self.remaining_shift_time / (shift_time * 0.5);
        }

        if self.brake_value > 1e-3 {
            // declutch while braking
            clutch_value = 0.0;
        } else if self.engine.throttle() < 1e-3 {
            // declutch when the driven wheels lose traction, eases the
            // lock-to-roll transition after hard braking
            for wheel in &self.wheels {
                let slide = wheel.tire.slide().abs();
                let slide_limit = 0.25 * wheel.tire.ideal_slide();
                if slide > slide_limit {
                    clutch_value = 0.0;
                    break;
                }
            }
        }

        // rate limit the engagement
        let clutch_delta =
            (clutch_value - last_clutch).clamp(-clutch_engage_limit, clutch_engage_limit);
        last_clutch + clutch_delta
    }

    fn auto_clutch_throttle(&mut self, clutch_rpm: Real, throttle: Real, dt: Real) -> Real {
        let mut throttle = throttle;
        if self.engine.rpm() < self.engine.start_rpm()
            && throttle < self.engine.idle_throttle()
        {
            // avoid stall
            throttle = self.engine.idle_throttle();
        }

        if self.remaining_shift_time > 0.0 {
            // rev-match the clutch side
            let current_rpm = self.engine.rpm();
            if current_rpm < clutch_rpm && current_rpm < self.engine.redline() {
                self.remaining_shift_time += dt;
                throttle = 1.0;
            } else {
                throttle *= 0.5;
            }
        }

        throttle
    }

    /// Gear the autoshifter wants: up past redline, down below the
    /// downshift point.
    fn next_gear(&self, clutch_rpm: Real) -> i32 {
        let gear = self.transmission.gear();

        // no decision while a shift is in flight or the clutch slips
        if self.shifted && self.clutch.position() >= 1.0 {
            if clutch_rpm > self.engine.redline() && gear > 0 {
                return gear + 1;
            }
            if clutch_rpm < self.downshift_rpm(gear) && gear > 1 {
                return gear - 1;
            }
        }
        gear
    }

    /// Downshift when the lower gear would put the engine at 70% redline.
    fn downshift_rpm(&self, gear: i32) -> Real {
        if gear > 1 {
            let current_ratio = self.transmission.gear_ratio(gear);
            let lower_ratio = self.transmission.gear_ratio(gear - 1);
            0.7 * self.engine.redline() / lower_ratio * current_ratio
        } else {
            0.0
        }
    }

    /// The combined drivetrain + contact solve of one tick.
    fn update_dynamics(
        &mut self,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
        surfaces: &[TrackSurface],
        dt: Real,
    ) {
        let Some(chassis_body) = bodies.get(self.chassis) else {
            return;
        };
        let chassis_transform = *chassis_body.position();

        let Vehicle {
            chassis,
            wheels,
            differentials,
            antiroll,
            transmission,
            clutch,
            engine,
            fixed_shaft,
            wheel_contacts,
            diff_joints,
            clutch_joints,
            motor_joints,
            solver_bodies,
            abs_active,
            tcs_active,
            feedback,
            ..
        } = self;
        let chassis = *chassis;

        let mut shafts = Shafts {
            wheels,
            differentials,
            engine,
            fixed: fixed_shaft,
        };

        // differential joints plus their one-way limited-slip clutches
        let dcount = shafts.differentials.len();
        for i in 0..dcount {
            let diff = &shafts.differentials[i];
            diff_joints[i] = DifferentialJoint {
                shaft1: ShaftId::Differential(i),
                shaft2a: diff.output_a(),
                shaft2b: diff.output_b(),
                gear_ratio: diff.final_drive(),
                ..Default::default()
            };
            diff_joints[i].init(&shafts);

            let anti_slip = shafts.differentials[i].anti_slip_torque();
            clutch_joints[i] = ClutchJoint {
                shaft1: shafts.differentials[i].output_a(),
                shaft2: shafts.differentials[i].output_b(),
                gear_ratio: 1.0,
                // couple the outputs only while torque flows forward
                impulse_limit: if diff_joints[i].velocity_delta(&shafts) > 0.0 {
                    anti_slip * dt
                } else {
                    0.0
                },
                ..Default::default()
            };
            clutch_joints[i].init(&shafts);
        }

        // transmission clutch between engine and gearbox link
        let mut ccount = dcount;
        {
            let gear_ratio = transmission.current_gear_ratio();
            clutch_joints[ccount] = ClutchJoint {
                shaft1: ShaftId::Engine,
                shaft2: transmission.link(),
                gear_ratio,
                impulse_limit: if gear_ratio != 0.0 {
                    clutch.torque() * dt
                } else {
                    0.0
                },
                ..Default::default()
            };
            clutch_joints[ccount].init(&shafts);
            ccount += 1;
        }

        // wheel displacement from fresh ray casts
        for wheel in shafts.wheels.iter_mut() {
            if wheel.attachment() == WheelAttachment::Detached {
                wheel.clear_contact();
                continue;
            }
            let ray_length = 2.0 * wheel.radius();
            wheel.update_displacement(
                ray_length,
                &chassis_transform,
                chassis,
                bodies,
                colliders,
                queries,
                surfaces,
            );
        }

        // anti-roll bars approximated by shifting suspension stiffness
        for bar in antiroll.iter() {
            let d0 = shafts.wheels[bar.wheel0].suspension.displacement();
            let d1 = shafts.wheels[bar.wheel1].suspension.displacement();
            let dr = d0 - d1;
            let mut k0 = if d0 > 0.0 { bar.stiffness * dr / d0 } else { 0.0 };
            let mut k1 = if d1 > 0.0 { -bar.stiffness * dr / d1 } else { 0.0 };

            // never let the bar push total stiffness negative
            if shafts.wheels[bar.wheel0].suspension.stiffness() + k0 < 0.0 {
                k0 = 0.0;
            }
            if shafts.wheels[bar.wheel1].suspension.stiffness() + k1 < 0.0 {
                k1 = 0.0;
            }
            shafts.wheels[bar.wheel0].set_antiroll_stiffness(k0);
            shafts.wheels[bar.wheel1].set_antiroll_stiffness(k1);
        }

        // wheel contacts and their tire-reaction motor joints
        solver_bodies.begin(chassis, bodies);
        let mut wcount = 0;
        let mut mcount = 0;
        *abs_active = false;
        *tcs_active = false;
        for i in 0..shafts.wheels.len() {
            if shafts.wheels[i].attachment() == WheelAttachment::Detached {
                continue;
            }
            if shafts.wheels[i].update_contact(
                dt,
                &mut wheel_contacts[wcount],
                solver_bodies,
                bodies,
                surfaces,
            ) {
                wheel_contacts[wcount].wheel = i;
                motor_joints[mcount] = MotorJoint {
                    shaft: ShaftId::Wheel(i),
                    target_velocity: wheel_contacts[wcount].v1 / shafts.wheels[i].radius(),
                    impulse_limit: 0.0,
                    accumulated_impulse: 0.0,
                };
                *abs_active |= shafts.wheels[i].abs_active();
                *tcs_active |= shafts.wheels[i].tcs_active();
                mcount += 1;
                wcount += 1;
            }
        }

        // engine motor joint: drive toward the rev limit under the current
        // engine torque budget
        motor_joints[mcount] = MotorJoint {
            shaft: ShaftId::Engine,
            target_velocity: if shafts.engine.torque() > 0.0 {
                shafts.engine.rpm_limit() * RPM_TO_RAD
            } else {
                0.0
            },
            impulse_limit: shafts.engine.torque().abs() * dt,
            accumulated_impulse: 0.0,
        };
        mcount += 1;

        // brake motor joints, plus rolling resistance on grounded wheels
        for i in 0..shafts.wheels.len() {
            let wheel = &shafts.wheels[i];
            let mut torque = wheel.brake.torque();
            if wheel.has_contact() {
                if let Some(surface) = wheel.surface_index().and_then(|s| surfaces.get(s)) {
                    let rolling_speed = wheel.shaft.angular_velocity().abs() * wheel.radius();
                    let coeff = wheel
                        .tire
                        .rolling_resistance(rolling_speed, surface.rolling_resistance);
                    let resistance = coeff * wheel.tire.contact_load()
                        + surface.rolling_drag * rolling_speed;
                    torque += resistance * wheel.radius();
                }
            }
            if torque > 0.0 {
                motor_joints[mcount] = MotorJoint {
                    shaft: ShaftId::Wheel(i),
                    target_velocity: 0.0,
                    impulse_limit: torque * dt,
                    accumulated_impulse: 0.0,
                };
                mcount += 1;
            }
        }

        // the interleaved fixed-point solve; the phase order within one
        // iteration is load-bearing
        for _ in 0..SOLVER_ITERATIONS {
            // normal rows, tire forces, friction bound widening
            for ci in 0..wcount {
                let contact = &mut wheel_contacts[ci];
                let wheel = &mut shafts.wheels[contact.wheel];

                solve_constraint_row(
                    &mut contact.response,
                    solver_bodies,
                    contact.body_a,
                    contact.body_b,
                    contact.r_a,
                    contact.r_b,
                    0.0,
                );

                let load = contact.response.accum_impulse / dt;
                let force = wheel.tire.get_force(
                    load,
                    contact.friction_coeff,
                    contact.camber,
                    contact.v_r,
                    contact.v1,
                    contact.v2,
                );

                // lateral bound from the tire's lateral force
                let lat_impulse = force.fy * dt;
                if lat_impulse > contact.friction_lat.upper_limit {
                    contact.friction_lat.upper_limit = lat_impulse;
                } else if lat_impulse < contact.friction_lat.lower_limit {
                    contact.friction_lat.lower_limit = lat_impulse;
                }

                // tire reaction torque budget for the wheel motor joint
                let impulse_limit = force.fx.abs() * wheel.radius() * dt;
                if impulse_limit > motor_joints[ci].impulse_limit {
                    motor_joints[ci].impulse_limit = impulse_limit;
                }
                motor_joints[ci].target_velocity = contact.v1 / wheel.radius();
            }

            // driveline
            for joint in motor_joints[..mcount].iter_mut() {
                joint.solve(&mut shafts);
            }
            for joint in diff_joints[..dcount].iter_mut() {
                joint.solve(&mut shafts);
            }
            for joint in clutch_joints[..ccount].iter_mut() {
                joint.solve(&mut shafts);
            }

            // friction rows, bounded by what the driveline delivered
            for ci in 0..wcount {
                let contact = &mut wheel_contacts[ci];
                let wheel = &shafts.wheels[contact.wheel];

                let impulse_limit = -motor_joints[ci].accumulated_impulse / wheel.radius();
                if impulse_limit > contact.friction_lon.upper_limit {
                    contact.friction_lon.upper_limit = impulse_limit;
                } else if impulse_limit < contact.friction_lon.lower_limit {
                    contact.friction_lon.lower_limit = impulse_limit;
                }

                let rim_velocity = wheel.shaft.angular_velocity() * wheel.radius();
                solve_constraint_row(
                    &mut contact.friction_lon,
                    solver_bodies,
                    contact.body_a,
                    contact.body_b,
                    contact.r_a,
                    contact.r_b,
                    -rim_velocity,
                );
                solve_constraint_row(
                    &mut contact.friction_lat,
                    solver_bodies,
                    contact.body_a,
                    contact.body_b,
                    contact.r_a,
                    contact.r_b,
                    0.0,
                );
            }
        }

        if shafts.wheels.len() >= 2 {
            *feedback = 0.5
                * (shafts.wheels[0].tire.aligning_torque()
                    + shafts.wheels[1].tire.aligning_torque());
        }

        solver_bodies.finish(bodies);
    }

    /// Integrate wheel spin and refresh the chassis-local visual poses.
    fn update_wheel_poses(&mut self, dt: Real) {
        for wheel in &mut self.wheels {
            if wheel.attachment() == WheelAttachment::Detached {
                continue;
            }
            wheel.shaft.integrate(dt);
            let rotation = wheel.suspension.orientation() * wheel.spin_rotation();
            let translation = Translation::from(wheel.suspension.position().coords);
            wheel.set_local_pose(Isometry::from_parts(translation, rotation));
        }
    }

    /// Aggregate peak friction per wheel at static load, for the AI
    /// estimators.
    fn calculate_friction_coefficients(&self, chassis_mass: Real) -> (Real, Real) {
        let gravity = 9.81;
        let wheel_count = self.wheels.len().max(1) as Real;
        let force = gravity * chassis_mass / wheel_count;

        let mut lon_friction = 0.0;
        let mut lat_friction = 0.0;
        for wheel in &self.wheels {
            lon_friction += wheel.tire.max_fx(force);
            lat_friction += wheel.tire.max_fy(force, 0.0);
        }
        (
            lon_friction / (force * wheel_count),
            lat_friction / (force * wheel_count),
        )
    }

    /// Top speed from the rev limit through the tallest gear and the first
    /// differential's final drive.
    fn calculate_max_speed(&self) -> Real {
        let top_ratio = self.transmission.gear_ratio(self.transmission.forward_gears());
        let final_drive = self
            .differentials
            .first()
            .map_or(1.0, |d| d.final_drive());
        let radius = self.wheels.first().map_or(0.3, |w| w.radius());
        let limit = self.engine.rpm_limit() * RPM_TO_RAD;
        if top_ratio.abs() < 1e-6 || final_drive.abs() < 1e-6 {
            return 0.0;
        }
        limit / (top_ratio * final_drive) * radius
    }

    // ------------------------------------------------------------------
    // spawn helpers
    // ------------------------------------------------------------------

    /// Drop the chassis until the closest wheel ray touches the ground,
    /// then zero its velocity.
    pub fn align_with_ground(
        &mut self,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
        surfaces: &[TrackSurface],
    ) {
        let ray_length = 8.0;
        let Some(body) = bodies.get(self.chassis) else {
            return;
        };
        let chassis_transform = *body.position();
        let down = chassis_transform * -Vector::y();

        let mut drop: Option<Real> = None;
        for wheel in &mut self.wheels {
            wheel.update_displacement(
                ray_length,
                &chassis_transform,
                self.chassis,
                bodies,
                colliders,
                queries,
                surfaces,
            );
            // distance the wheel could fall until it rests on the ground
            let height = wheel.ray.depth() - 2.0 * wheel.radius();
            drop = Some(drop.map_or(height, |d: Real| d.min(height)));
        }

        if let Some(drop) = drop {
            if let Some(body) = bodies.get_mut(self.chassis) {
                let position = *body.position();
                let translation = Translation::from(position.translation.vector + down * drop);
                body.set_position(Isometry::from_parts(translation, position.rotation), true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(Vector::zeros(), true);
            }
            let chassis_transform = bodies
                .get(self.chassis)
                .map(|b| *b.position())
                .unwrap_or(chassis_transform);
            for wheel in &mut self.wheels {
                wheel.update_displacement(
                    ray_length,
                    &chassis_transform,
                    self.chassis,
                    bodies,
                    colliders,
                    queries,
                    surfaces,
                );
            }
            self.transform = chassis_transform;
        }
    }

    /// Rotate the chassis back upright after a rollover, then re-align
    /// with the ground.
    pub fn rollover_recover(
        &mut self,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
        surfaces: &[TrackSurface],
    ) {
        let Some(body) = bodies.get(self.chassis) else {
            return;
        };
        let transform = *body.position();

        let up = Vector::y();
        let mut forward = transform.rotation * Vector::z();
        forward -= up * up.dot(&forward);
        if forward.norm_squared() < 1e-6 {
            return;
        }
        forward = forward.normalize();

        let car_up = transform.rotation * Vector::y();
        let angle = car_up.dot(&up).clamp(-1.0, 1.0).acos();
        if angle.abs() < PI / 4.0 {
            return;
        }

        let upright = Rotation::face_towards(&forward, &up);
        if let Some(body) = bodies.get_mut(self.chassis) {
            body.set_position(
                Isometry::from_parts(transform.translation, upright),
                true,
            );
        }
        self.align_with_ground(bodies, colliders, queries, surfaces);
    }

    // ------------------------------------------------------------------
    // telemetry & debugging
    // ------------------------------------------------------------------

    pub fn telemetry(&self, bodies: &RigidBodySet) -> VehicleTelemetry {
        VehicleTelemetry {
            speed: self.speed(bodies),
            wheel_speed: self.speedometer(),
            max_speed: self.max_speed,
            engine_rpm: self.engine.rpm(),
            tacho_rpm: self.tacho_rpm,
            gear: self.transmission.gear(),
            clutch_position: self.clutch.position(),
            fuel: self.engine.fuel(),
            nos: self.engine.nos(),
            abs_active: self.abs_active,
            tcs_active: self.tcs_active,
            aero_force: self.aero_force.into(),
            aero_torque: self.aero_torque.into(),
            feedback: self.feedback,
            wheels: self
                .wheels
                .iter()
                .map(|w| WheelTelemetry {
                    displacement: w.suspension.displacement(),
                    overtravel: w.suspension.overtravel(),
                    steering_angle: w.suspension.steering_angle(),
                    load: w.tire.contact_load(),
                    slide: w.tire.slide(),
                    slip_angle: w.tire.slip_angle(),
                    ideal_slide: w.tire.ideal_slide(),
                    ideal_slip_angle: w.tire.ideal_slip_angle(),
                    squeal: w.tire.squeal(),
                    lon_force: w.tire.lon_force(),
                    lat_force: w.tire.lat_force(),
                    aligning_torque: w.tire.aligning_torque(),
                    angular_velocity: w.shaft.angular_velocity(),
                    brake_factor: w.brake.brake_factor(),
                    has_contact: w.has_contact(),
                    attached: w.attachment() == WheelAttachment::Attached,
                    abs_active: w.abs_active(),
                    tcs_active: w.tcs_active(),
                })
                .collect(),
        }
    }

    /// Telemetry snapshot rendered as pretty JSON.
    pub fn telemetry_json(&self, bodies: &RigidBodySet) -> String {
        serde_json::to_string_pretty(&self.telemetry(bodies)).unwrap_or_default()
    }

    /// Human-readable multi-section state dump.
    pub fn write_debug(
        &self,
        bodies: &RigidBodySet,
        out: &mut String,
        sections: DebugSections,
    ) {
        let freq = 1.0 / self.last_dt.max(1e-6);

        if sections.body {
            let _ = writeln!(out, "---Body---");
            if let Some(body) = bodies.get(self.chassis) {
                let v = body.linvel();
                let p = body.position().translation.vector;
                let _ = writeln!(out, "Velocity: {:.3} {:.3} {:.3}", v.x, v.y, v.z);
                let _ = writeln!(out, "Position: {:.3} {:.3} {:.3}", p.x, p.y, p.z);
                let _ = writeln!(out, "Total mass: {:.1}", body.mass());
            }
            let _ = writeln!(out);
        }

        if sections.drivetrain {
            let _ = writeln!(out, "---Engine---");
            let _ = writeln!(out, "RPM: {:.0}", self.engine.rpm());
            let _ = writeln!(
                out,
                "Power: {:.1} kW",
                self.engine.torque() * self.engine.angular_velocity() * 1e-3
            );
            let _ = writeln!(out);

            let n = self.differentials.len();
            let tj = &self.clutch_joints[n];
            let _ = writeln!(out, "---Transmission---");
            let _ = writeln!(out, "Gear: {}", self.transmission.gear());
            let _ = writeln!(out, "Clutch: {:.2}", self.last_clutch);
            let _ = writeln!(out, "Gear Ratio: {:.2}", tj.gear_ratio);
            let _ = writeln!(
                out,
                "Engine Load: {:.1} kW",
                tj.accumulated_impulse * freq * self.engine.angular_velocity() * 1e-3
            );
            let _ = writeln!(out);

            for (i, dj) in self.diff_joints.iter().enumerate() {
                let _ = writeln!(out, "---Differential {i}---");
                let _ = writeln!(out, "Gear Ratio: {:.2}", dj.gear_ratio);
                let _ = writeln!(
                    out,
                    "Carrier RPM: {:.0}",
                    self.shaft(dj.shaft1).angular_velocity() / RPM_TO_RAD
                );
                let _ = writeln!(
                    out,
                    "Carrier Load: {:.1} kW",
                    dj.accumulated_impulse
                        * freq
                        * self.shaft(dj.shaft1).angular_velocity()
                        * 1e-3
                );
                let _ = writeln!(out);
            }
        }

        if sections.wheels {
            for (i, wheel) in self.wheels.iter().enumerate() {
                let _ = writeln!(out, "---Wheel {i}---");
                let _ = writeln!(out, "Travel: {:.3}", wheel.suspension.displacement());
                let _ = writeln!(out, "Load: {:.2} kN", wheel.tire.contact_load() * 1e-3);
                let _ = writeln!(out, "Slip: {:.3}", wheel.tire.slide());
                let _ = writeln!(out, "Ideal Slip: {:.3}", wheel.tire.ideal_slide());
                let _ = writeln!(out, "Slip Angle: {:.3}", wheel.tire.slip_angle());
                let _ = writeln!(
                    out,
                    "RPM: {:.0}",
                    wheel.shaft.angular_velocity() / RPM_TO_RAD
                );
                let _ = writeln!(out);
            }
        }

        if sections.aero {
            let _ = writeln!(out, "---Aerodynamics---");
            let f = self.aero_force;
            let t = self.aero_torque;
            let _ = writeln!(out, "Force: {:.1} {:.1} {:.1}", f.x, f.y, f.z);
            let _ = writeln!(out, "Torque: {:.1} {:.1} {:.1}", t.x, t.y, t.z);
            for (i, device) in self.aero_devices.iter().enumerate() {
                let _ = writeln!(out, "---Aerodynamic Device {i}---");
                let d = device.drag();
                let l = device.lift();
                let _ = writeln!(out, "Drag: {:.1} {:.1} {:.1}", d.x, d.y, d.z);
                let _ = writeln!(out, "Lift: {:.1} {:.1} {:.1}", l.x, l.y, l.z);
            }
            let _ = writeln!(out);
        }
    }
}
