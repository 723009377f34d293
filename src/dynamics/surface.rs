//! Track surface descriptors. Colliders reference an entry of the world's
//! surface table through their `user_data`; wheels read friction and bump
//! parameters from the entry their ground ray hit.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceKind {
    #[default]
    Asphalt,
    Concrete,
    Cobbles,
    Grass,
    Gravel,
    Sand,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrackSurface {
    pub kind: SurfaceKind,
    /// Wavelength of the procedural bump pattern, m.
    pub bump_wavelength: Real,
    /// Amplitude of the procedural bump pattern, m.
    pub bump_amplitude: Real,
    /// Friction coefficient seen by a treaded (off-road) tire.
    pub friction_tread: Real,
    /// Friction coefficient seen by a slick (road) tire.
    pub friction_non_tread: Real,
    /// Rolling resistance factor of the surface.
    pub rolling_resistance: Real,
    /// Velocity-proportional drag of soft surfaces.
    pub rolling_drag: Real,
}

impl Default for TrackSurface {
    fn default() -> Self {
        Self::asphalt()
    }
}

impl TrackSurface {
    pub fn asphalt() -> Self {
        Self {
            kind: SurfaceKind::Asphalt,
            bump_wavelength: 1.0,
            bump_amplitude: 0.0,
            friction_tread: 0.9,
            friction_non_tread: 1.0,
            rolling_resistance: 1.0,
            rolling_drag: 0.0,
        }
    }

    pub fn gravel() -> Self {
        Self {
            kind: SurfaceKind::Gravel,
            bump_wavelength: 2.5,
            bump_amplitude: 0.05,
            friction_tread: 0.8,
            friction_non_tread: 0.6,
            rolling_resistance: 4.0,
            rolling_drag: 20.0,
        }
    }

    pub fn grass() -> Self {
        Self {
            kind: SurfaceKind::Grass,
            bump_wavelength: 3.0,
            bump_amplitude: 0.1,
            friction_tread: 0.7,
            friction_non_tread: 0.4,
            rolling_resistance: 5.0,
            rolling_drag: 40.0,
        }
    }
}
