//! Serde-friendly telemetry snapshots for HUDs, AI and logging.

use rapier3d::math::Real;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct WheelTelemetry {
    pub displacement: Real,
    pub overtravel: Real,
    pub steering_angle: Real,
    /// Tire load of the last solve, N.
    pub load: Real,
    pub slide: Real,
    pub slip_angle: Real,
    pub ideal_slide: Real,
    pub ideal_slip_angle: Real,
    pub squeal: Real,
    pub lon_force: Real,
    pub lat_force: Real,
    pub aligning_torque: Real,
    pub angular_velocity: Real,
    pub brake_factor: Real,
    pub has_contact: bool,
    pub attached: bool,
    pub abs_active: bool,
    pub tcs_active: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct VehicleTelemetry {
    /// Chassis speed, m/s.
    pub speed: Real,
    /// Speedometer reading off the first wheel, m/s.
    pub wheel_speed: Real,
    /// Drivetrain-limited top speed, m/s.
    pub max_speed: Real,
    pub engine_rpm: Real,
    /// Exponentially smoothed tachometer rpm.
    pub tacho_rpm: Real,
    pub gear: i32,
    pub clutch_position: Real,
    pub fuel: Real,
    pub nos: Real,
    pub abs_active: bool,
    pub tcs_active: bool,
    /// Aerodynamic force of the last tick, world space.
    pub aero_force: [Real; 3],
    /// Aerodynamic torque of the last tick, world space.
    pub aero_torque: [Real; 3],
    /// Steering feedback from the front tires' aligning torque.
    pub feedback: Real,
    pub wheels: Vec<WheelTelemetry>,
}
