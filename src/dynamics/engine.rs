//! Combustion engine: a throttle-indexed torque curve over the crankshaft
//! rpm range, friction torque, rev limiter and stall handling, fuel and
//! nitrous accounting.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use super::shaft::Shaft;

const RPM_TO_RAD: Real = PI / 30.0;
const RAD_TO_RPM: Real = 30.0 / PI;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Full-throttle torque samples, evenly spaced over
    /// `[rpm_stall, rpm_limit]`.
    pub torque_curve: Vec<Real>,
    /// Rpm ceiling shown to the driver; autoshift shifts up here.
    pub redline: Real,
    /// Hard rev limit; combustion cuts above it.
    pub rpm_limit: Real,
    /// Rpm right after starting.
    pub rpm_start: Real,
    /// Below this rpm the engine dies.
    pub rpm_stall: Real,
    /// Throttle fraction that holds idle rpm; recalculated at init.
    pub idle: Real,
    /// Fuel use in kg per joule of combustion energy.
    pub fuel_rate: Real,
    /// Engine friction coefficient; recalculated at init.
    pub friction: Real,
    /// Crankshaft inertia, kg m^2.
    pub inertia: Real,
    /// Fuel on board at init, kg.
    pub fuel_mass: Real,
    /// Fuel tank capacity, kg.
    pub fuel_capacity: Real,
    /// Nitrous on board at init, kg.
    pub nos_mass: Real,
    /// Peak nitrous power boost, W.
    pub nos_boost: Real,
    /// Nitrous consumed per kg of extra fuel burned.
    pub nos_fuel_ratio: Real,
}

impl Default for EngineInfo {
    /// An S2000-class inline four.
    fn default() -> Self {
        Self {
            torque_curve: vec![
                85.0, 140.0, 180.0, 205.0, 222.0, 230.0, 228.0, 218.0, 205.0, 188.0, 160.0,
            ],
            redline: 7800.0,
            rpm_limit: 9000.0,
            rpm_start: 1000.0,
            rpm_stall: 350.0,
            idle: 0.02,
            fuel_rate: 7.1e-8,
            friction: 0.000328,
            inertia: 0.3,
            fuel_mass: 40.0,
            fuel_capacity: 40.0,
            nos_mass: 0.0,
            nos_boost: 0.0,
            nos_fuel_ratio: 5.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Engine {
    info: EngineInfo,
    shaft: Shaft,
    combustion_torque: Real,
    friction_torque: Real,
    throttle_position: Real,
    nos_boost_factor: Real,
    fuel_mass: Real,
    nos_mass: Real,
    rev_limit_exceeded: bool,
    stalled: bool,
}

impl Engine {
    pub fn new(info: &EngineInfo) -> Self {
        let mut engine = Self {
            info: info.clone(),
            shaft: Shaft::new(info.inertia),
            combustion_torque: 0.0,
            friction_torque: 0.0,
            throttle_position: 0.0,
            nos_boost_factor: 0.0,
            fuel_mass: info.fuel_mass,
            nos_mass: info.nos_mass,
            rev_limit_exceeded: false,
            stalled: true,
        };
        engine.info.friction = engine.calc_engine_friction();
        engine.info.idle = engine.calc_idle_throttle();
        engine
    }

    /// Spin the crankshaft up to start rpm.
    pub fn start(&mut self) {
        let dw = self.info.rpm_start * RPM_TO_RAD - self.shaft.angular_velocity();
        if dw > 0.0 {
            let inertia = self.shaft.inertia();
            self.shaft.apply_impulse(inertia * dw);
        }
    }

    /// Update combustion and friction torques, consume fuel and nitrous.
    pub fn update(&mut self, dt: Real) {
        self.stalled = self.shaft.angular_velocity() <= self.info.rpm_stall * RPM_TO_RAD;
        self.rev_limit_exceeded =
            self.shaft.angular_velocity() >= self.info.rpm_limit * RPM_TO_RAD;

        if self.fuel_mass < 1e-3 || self.rev_limit_exceeded || self.stalled {
            self.combustion_torque = 0.0;
            self.friction_torque = self.friction_torque_at(0.0, self.shaft.angular_velocity());
            if self.stalled {
                // crude model of engine static friction
                self.friction_torque *= 100.0;
            }
            return;
        }

        self.combustion_torque =
            self.combustion_torque_at(self.throttle_position, self.shaft.angular_velocity());
        self.friction_torque =
            self.friction_torque_at(self.throttle_position, self.shaft.angular_velocity());

        let mut fuel_consumed = 0.0;
        if self.nos_mass > 0.0 && self.nos_boost_factor > 0.0 {
            // nitrous injection
            let boost = self.nos_boost_factor * self.info.nos_boost;
            self.combustion_torque += boost / self.shaft.angular_velocity();

            fuel_consumed = boost * self.info.fuel_rate * dt;
            let nos_consumed = self.info.nos_fuel_ratio * fuel_consumed;
            self.nos_mass = (self.nos_mass - nos_consumed).max(0.0);
        }
        let power = self.combustion_torque * self.shaft.angular_velocity();
        fuel_consumed += self.info.fuel_rate * power * dt;
        self.fuel_mass = (self.fuel_mass - fuel_consumed).max(0.0);
    }

    /// Throttle from 0 to 1.
    pub fn set_throttle(&mut self, value: Real) {
        self.throttle_position = value;
    }

    /// Nitrous injection factor from 0 to 1.
    pub fn set_nos_boost(&mut self, value: Real) {
        self.nos_boost_factor = value;
    }

    pub fn rpm_limit(&self) -> Real {
        self.info.rpm_limit
    }

    pub fn redline(&self) -> Real {
        self.info.redline
    }

    pub fn idle_throttle(&self) -> Real {
        self.info.idle
    }

    pub fn stall_rpm(&self) -> Real {
        self.info.rpm_stall
    }

    pub fn start_rpm(&self) -> Real {
        self.info.rpm_start
    }

    pub fn inertia(&self) -> Real {
        self.info.inertia
    }

    pub fn rpm(&self) -> Real {
        self.shaft.angular_velocity() * RAD_TO_RPM
    }

    pub fn throttle(&self) -> Real {
        self.throttle_position
    }

    pub fn angular_velocity(&self) -> Real {
        self.shaft.angular_velocity()
    }

    /// Net shaft torque: combustion plus (negative) friction, Nm.
    pub fn torque(&self) -> Real {
        self.combustion_torque + self.friction_torque
    }

    /// True while the engine is combusting fuel.
    pub fn combustion(&self) -> bool {
        !self.stalled
    }

    /// Remaining fuel fraction.
    pub fn fuel(&self) -> Real {
        self.fuel_mass / self.info.fuel_capacity
    }

    /// Remaining nitrous fraction; 0 when the engine carries none.
    pub fn nos(&self) -> Real {
        if self.info.nos_mass > 0.0 {
            self.nos_mass / self.info.nos_mass
        } else {
            0.0
        }
    }

    pub fn shaft(&self) -> &Shaft {
        &self.shaft
    }

    pub fn shaft_mut(&mut self) -> &mut Shaft {
        &mut self.shaft
    }

    /// Torque curve sample at the given throttle and crankshaft velocity.
    fn combustion_torque_at(&self, throttle: Real, angvel: Real) -> Real {
        let rpm = angvel * RAD_TO_RPM;
        if rpm < self.info.rpm_stall || rpm > self.info.rpm_limit - 1e-3 {
            return 0.0;
        }

        let scale =
            (self.info.torque_curve.len() - 1) as Real / (self.info.rpm_limit - self.info.rpm_stall);
        let f = (rpm - self.info.rpm_stall) * scale;
        let n = f as usize;
        let fraction = f - n as Real;
        debug_assert!(n + 1 < self.info.torque_curve.len());
        let torque = (1.0 - fraction) * self.info.torque_curve[n]
            + fraction * self.info.torque_curve[n + 1];
        throttle * torque
    }

    /// Pumping and mechanical losses, negative, fading with throttle.
    fn friction_torque_at(&self, throttle: Real, angvel: Real) -> Real {
        let angvel = angvel.clamp(
            self.info.rpm_stall * RPM_TO_RAD,
            self.info.rpm_limit * RPM_TO_RAD - 1.0,
        );
        self.combustion_torque_at(-0.25, angvel) * (1.0 - throttle)
    }

    /// Smallest throttle that holds the crankshaft at start rpm.
    fn calc_idle_throttle(&self) -> Real {
        let angvel_start = self.info.rpm_start * RPM_TO_RAD;
        let mut idle = 0.0;
        while idle < 1.0 {
            if self.combustion_torque_at(idle, angvel_start)
                > -self.friction_torque_at(idle, angvel_start)
            {
                return idle;
            }
            idle += 0.01;
        }
        0.0
    }

    /// Friction coefficient matching the curve's peak power.
    fn calc_engine_friction(&self) -> Real {
        let max_power_angvel = self.info.redline * RPM_TO_RAD;
        let max_power = self.combustion_torque_at(1.0, max_power_angvel) * max_power_angvel;
        max_power / (max_power_angvel * max_power_angvel * max_power_angvel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_start_rpm() {
        let mut engine = Engine::new(&EngineInfo::default());
        engine.start();
        assert!((engine.rpm() - engine.start_rpm()).abs() < 1.0);
    }

    #[test]
    fn stalled_engine_produces_no_combustion_torque() {
        let mut engine = Engine::new(&EngineInfo::default());
        engine.update(0.01);
        assert!(!engine.combustion());
        assert!(engine.torque() <= 0.0);
    }

    #[test]
    fn torque_curve_is_interpolated_and_throttled() {
        let mut engine = Engine::new(&EngineInfo::default());
        engine.start();
        engine.set_throttle(1.0);
        engine.update(0.01);
        let full = engine.torque();
        assert!(full > 0.0);

        engine.set_throttle(0.5);
        engine.update(0.01);
        assert!(engine.torque() < full);
    }

    #[test]
    fn rev_limiter_cuts_combustion() {
        let mut engine = Engine::new(&EngineInfo::default());
        engine
            .shaft_mut()
            .set_angular_velocity(9100.0 * RPM_TO_RAD);
        engine.set_throttle(1.0);
        engine.update(0.01);
        assert!(engine.torque() <= 0.0);
    }

    #[test]
    fn fuel_burn_tracks_power() {
        let mut engine = Engine::new(&EngineInfo::default());
        engine.start();
        engine.set_throttle(1.0);
        let before = engine.fuel();
        for _ in 0..100 {
            engine.update(0.01);
        }
        assert!(engine.fuel() < before);
        assert!(engine.fuel() > 0.99 * before);
    }

    #[test]
    fn idle_throttle_holds_against_friction() {
        let engine = Engine::new(&EngineInfo::default());
        let idle = engine.idle_throttle();
        assert!(idle > 0.0 && idle < 0.5);
        let w = engine.start_rpm() * RPM_TO_RAD;
        assert!(engine.combustion_torque_at(idle, w) > -engine.friction_torque_at(idle, w));
    }
}
