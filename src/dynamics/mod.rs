//! The vehicle dynamics subsystem: tire and suspension models, drivetrain
//! shafts and joints, per-wheel contact generation and the per-tick
//! sequential-impulse solve.

pub mod aero;
pub mod antiroll;
pub mod brake;
pub mod clutch;
pub mod contact;
pub mod differential;
pub mod engine;
pub mod joints;
pub mod ray;
pub mod shaft;
pub mod solver;
pub mod surface;
pub mod suspension;
pub mod telemetry;
pub mod tire;
pub mod transmission;
pub mod vehicle;
pub mod wheel;

pub use aero::{AeroDevice, AeroDeviceInfo};
pub use antiroll::AntiRollBar;
pub use brake::{Brake, BrakeInfo};
pub use clutch::{Clutch, ClutchInfo};
pub use contact::WheelContact;
pub use differential::{Differential, DifferentialInfo};
pub use engine::{Engine, EngineInfo};
pub use joints::{ClutchJoint, DifferentialJoint, MotorJoint, Shafts};
pub use ray::{GroundRay, RayHit};
pub use shaft::{Shaft, ShaftId};
pub use solver::{ConstraintRow, SolverBodies, SolverBody, solve_constraint_row};
pub use surface::{SurfaceKind, TrackSurface};
pub use suspension::{Suspension, SuspensionArm, SuspensionInfo};
pub use telemetry::{VehicleTelemetry, WheelTelemetry};
pub use tire::{Tire, TireCoefficients, TireForce, TireInfo};
pub use transmission::{Transmission, TransmissionInfo};
pub use vehicle::{ChassisInfo, DebugSections, SOLVER_ITERATIONS, Vehicle, VehicleInfo};
pub use wheel::{Wheel, WheelAttachment, WheelInfo};
