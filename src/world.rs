//! Rapier world wrapper: owns the pipeline, the body/collider sets, the
//! track surface table and the vehicles, and drives the per-tick update
//! order (vehicle ticks first, then the rigid-body step).

use rapier3d::prelude::*;

use crate::dynamics::{TrackSurface, Vehicle, VehicleInfo};

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

/// Handle of a vehicle registered in a [`World`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VehicleHandle(usize);

pub struct World {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
    surfaces: Vec<TrackSurface>,
    vehicles: Vec<Option<Vehicle>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            surfaces: Vec::new(),
            vehicles: Vec::new(),
        }
    }

    /// Register a track surface; colliders reference it by the returned
    /// index.
    pub fn add_surface(&mut self, surface: TrackSurface) -> usize {
        self.surfaces.push(surface);
        self.surfaces.len() - 1
    }

    pub fn surfaces(&self) -> &[TrackSurface] {
        &self.surfaces
    }

    /// A large static ground plane carrying the given surface. The top
    /// face sits at y = 0.
    pub fn add_ground(&mut self, surface: TrackSurface) -> ColliderHandle {
        let surface_index = self.add_surface(surface);
        let ground = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -1.0, 0.0])
            .build();
        let ground_handle = self.bodies.insert(ground);
        let collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.0)
            .restitution(0.0)
            .user_data(surface_index as u128 + 1)
            .build();
        self.colliders
            .insert_with_parent(collider, ground_handle, &mut self.bodies)
    }

    /// Tag an existing collider with a surface so wheel rays pick up its
    /// friction and bump parameters.
    pub fn set_collider_surface(&mut self, collider: ColliderHandle, surface_index: usize) {
        debug_assert!(surface_index < self.surfaces.len());
        if let Some(collider) = self.colliders.get_mut(collider) {
            collider.user_data = surface_index as u128 + 1;
        }
    }

    /// Spawn the chassis body for `info` and register the assembled
    /// vehicle. The chassis is owned by the vehicle until
    /// [`remove_vehicle`](Self::remove_vehicle) releases it.
    pub fn spawn_vehicle(&mut self, info: &VehicleInfo, position: Isometry<Real>) -> VehicleHandle {
        let chassis = &info.chassis;
        let body = RigidBodyBuilder::dynamic()
            .position(position)
            .linear_damping(chassis.linear_damping)
            .angular_damping(chassis.angular_damping)
            .can_sleep(false)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let [hx, hy, hz] = chassis.half_extents;
        let [cx, cy, cz] = chassis.com_offset;
        let volume = 8.0 * hx * hy * hz;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![cx, cy, cz])
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .density(chassis.mass / volume)
            // contact friction is handled by the tire model
            .friction(0.0)
            .restitution(0.0)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        let vehicle = Vehicle::new(info, handle);
        self.vehicles.push(Some(vehicle));
        VehicleHandle(self.vehicles.len() - 1)
    }

    /// Remove a vehicle and release its chassis body (and colliders) from
    /// the world.
    pub fn remove_vehicle(&mut self, handle: VehicleHandle) {
        if let Some(vehicle) = self.vehicles[handle.0].take() {
            self.bodies.remove(
                vehicle.chassis(),
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    pub fn vehicle(&self, handle: VehicleHandle) -> &Vehicle {
        self.vehicles[handle.0]
            .as_ref()
            .expect("vehicle was removed")
    }

    pub fn vehicle_mut(&mut self, handle: VehicleHandle) -> &mut Vehicle {
        self.vehicles[handle.0]
            .as_mut()
            .expect("vehicle was removed")
    }

    /// Settle a freshly spawned vehicle onto the ground below it.
    pub fn align_vehicle_with_ground(&mut self, handle: VehicleHandle) {
        self.query_pipeline.update(&self.colliders);
        if let Some(mut vehicle) = self.vehicles[handle.0].take() {
            vehicle.align_with_ground(
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                &self.surfaces,
            );
            self.vehicles[handle.0] = Some(vehicle);
        }
    }

    /// Re-right a rolled-over vehicle.
    pub fn rollover_recover(&mut self, handle: VehicleHandle) {
        self.query_pipeline.update(&self.colliders);
        if let Some(mut vehicle) = self.vehicles[handle.0].take() {
            vehicle.rollover_recover(
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                &self.surfaces,
            );
            self.vehicles[handle.0] = Some(vehicle);
        }
    }

    /// One physics tick: refresh queries, run every vehicle's action, then
    /// step the rigid-body pipeline.
    pub fn step(&mut self, dt: Real) {
        self.query_pipeline.update(&self.colliders);

        for slot in &mut self.vehicles {
            if let Some(vehicle) = slot {
                vehicle.update_action(
                    &mut self.bodies,
                    &self.colliders,
                    &self.query_pipeline,
                    &self.surfaces,
                    dt,
                );
            }
        }

        let hooks = ();
        let mut events = ();
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &mut events,
        );
    }
}
