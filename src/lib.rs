//! Constraint-based vehicle dynamics on top of rapier3d.
//!
//! A [`World`](world::World) owns the rapier pipeline plus a set of
//! [`Vehicle`](dynamics::Vehicle)s. Once per physics tick each vehicle turns
//! driver inputs and per-wheel ground contact into chassis impulses, wheel
//! rotation and suspension travel: aerodynamics, transmission/autoclutch
//! logic, then a fixed-iteration sequential-impulse solve over the drivetrain
//! joints and the per-wheel contact rows.
//!
//! Vehicles are configured exclusively through the serde-friendly `*Info`
//! structs (`VehicleInfo`, `TireInfo`, `SuspensionInfo`, ...); see
//! [`dynamics::VehicleInfo::sports_car`] for a complete example setup.

pub mod dynamics;
pub mod world;

pub use dynamics::{Vehicle, VehicleInfo, VehicleTelemetry};
pub use world::{VehicleHandle, World};
