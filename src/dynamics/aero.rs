//! Aerodynamic device: drag plus lift (or downforce) with induced drag,
//! evaluated from the body-space wind vector.

use rapier3d::math::{Point, Real, Vector};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AeroDeviceInfo {
    /// Air density, kg/m^3.
    pub air_density: Real,
    /// Projected frontal area for drag, m^2.
    pub drag_frontal_area: Real,
    /// Drag coefficient, unitless.
    pub drag_coefficient: Real,
    /// Wing surface area, m^2.
    pub lift_surface_area: Real,
    /// Lift coefficient, unitless; negative for downforce.
    pub lift_coefficient: Real,
    /// Wing efficiency in [0, 1]; feeds the induced drag.
    pub lift_efficiency: Real,
    /// Where drag and lift act, chassis-local.
    pub position: Point<Real>,
}

impl Default for AeroDeviceInfo {
    fn default() -> Self {
        Self {
            air_density: 1.2,
            drag_frontal_area: 0.0,
            drag_coefficient: 0.0,
            lift_surface_area: 0.0,
            lift_coefficient: 0.0,
            lift_efficiency: 0.0,
            position: Point::origin(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AeroDevice {
    lift_coefficient: Real,
    drag_coefficient: Real,
    induced_drag_coefficient: Real,
    position: Point<Real>,
    lift_vector: Vector<Real>,
    drag_vector: Vector<Real>,
}

impl AeroDevice {
    pub fn new(info: &AeroDeviceInfo) -> Self {
        // elliptic load wing: 1 / (pi * AR * e) = 1 - lift_efficiency
        let lift_coefficient =
            0.5 * info.air_density * info.lift_coefficient * info.lift_surface_area;
        let induced_drag_coefficient =
            lift_coefficient * info.lift_coefficient * (1.0 - info.lift_efficiency);
        let drag_coefficient =
            0.5 * info.air_density * info.drag_coefficient * info.drag_frontal_area;
        Self {
            lift_coefficient,
            drag_coefficient,
            induced_drag_coefficient,
            position: info.position,
            lift_vector: Vector::zeros(),
            drag_vector: Vector::zeros(),
        }
    }

    pub fn position(&self) -> Point<Real> {
        self.position
    }

    /// Lift force of the last `force` call, body space.
    pub fn lift(&self) -> Vector<Real> {
        self.lift_vector
    }

    /// Drag force of the last `force` call, body space.
    pub fn drag(&self) -> Vector<Real> {
        self.drag_vector
    }

    pub fn lift_coefficient(&self) -> Real {
        self.lift_coefficient
    }

    pub fn drag_coefficient(&self) -> Real {
        self.drag_coefficient + self.induced_drag_coefficient
    }

    /// Total force from the body-space wind vector (chassis frame: +z
    /// forward, +y up).
    pub fn force(&mut self, bodyspace_wind: Vector<Real>) -> Vector<Real> {
        self.drag_vector = self.drag_coefficient * bodyspace_wind.norm() * bodyspace_wind;

        // positive wind speed when the wind is heading at us
        let mut wind_speed = -Vector::z().dot(&bodyspace_wind);

        // assume the surface generates little lift in reverse
        if wind_speed < 0.0 {
            wind_speed = -wind_speed * 0.2;
        }

        self.lift_vector = (Vector::y() * self.lift_coefficient
            - Vector::z() * self.induced_drag_coefficient)
            * wind_speed
            * wind_speed;

        self.drag_vector + self.lift_vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wing() -> AeroDevice {
        AeroDevice::new(&AeroDeviceInfo {
            drag_frontal_area: 1.9,
            drag_coefficient: 0.3,
            lift_surface_area: 1.0,
            lift_coefficient: -0.9,
            lift_efficiency: 0.95,
            ..AeroDeviceInfo::default()
        })
    }

    #[test]
    fn drag_opposes_motion() {
        let mut device = wing();
        // driving forward (+z) puts the wind at -z
        let force = device.force(Vector::new(0.0, 0.0, -30.0));
        assert!(force.z < 0.0);
    }

    #[test]
    fn negative_lift_coefficient_pushes_down() {
        let mut device = wing();
        let force = device.force(Vector::new(0.0, 0.0, -30.0));
        assert!(force.y < 0.0);
        // downforce grows with speed squared
        let slow = {
            let mut d = wing();
            d.force(Vector::new(0.0, 0.0, -15.0)).y
        };
        assert!(force.y < slow * 2.0);
    }
}
