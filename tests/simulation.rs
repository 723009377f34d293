//! Full-stack simulation scenarios: a rapier world with a surfaced ground
//! plane and a complete rear-wheel-drive car.

use rapier3d::prelude::*;
use vdyn::dynamics::{DebugSections, TrackSurface, VehicleInfo, WheelAttachment};
use vdyn::{VehicleHandle, World};

const DT: Real = 1.0 / 60.0;

fn world_with_ground() -> World {
    let mut world = World::new();
    world.add_ground(TrackSurface::asphalt());
    world
}

fn spawn_aligned(world: &mut World) -> VehicleHandle {
    let info = VehicleInfo::sports_car();
    let handle = world.spawn_vehicle(&info, Isometry::translation(0.0, 1.0, 0.0));
    world.align_vehicle_with_ground(handle);
    handle
}

/// Set the chassis and all wheel shafts to a consistent forward rolling
/// state.
fn set_rolling(world: &mut World, handle: VehicleHandle, speed: Real) {
    let chassis = world.vehicle(handle).chassis();
    if let Some(body) = world.bodies.get_mut(chassis) {
        body.set_linvel(vector![0.0, 0.0, speed], true);
    }
    let vehicle = world.vehicle_mut(handle);
    for i in 0..vehicle.wheel_count() {
        let radius = vehicle.wheel(i).radius();
        vehicle
            .wheel_mut(i)
            .shaft
            .set_angular_velocity(speed / radius);
    }
}

fn assert_finite(world: &World, handle: VehicleHandle) {
    let vehicle = world.vehicle(handle);
    for i in 0..vehicle.wheel_count() {
        let w = vehicle.wheel(i);
        assert!(w.shaft.angular_velocity().is_finite());
        assert!(w.suspension.displacement().is_finite());
        assert!(w.tire.lon_force().is_finite());
        assert!(w.tire.lat_force().is_finite());
    }
    let body = &world.bodies[vehicle.chassis()];
    assert!(body.linvel().norm().is_finite());
    assert!(body.angvel().norm().is_finite());
}

#[test]
fn car_settles_on_its_suspension() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);

    for _ in 0..180 {
        world.step(DT);
        assert_finite(&world, handle);
    }

    let telemetry = world.vehicle(handle).telemetry(&world.bodies);
    let weight = 1350.0 * 9.81;
    let total_load: Real = telemetry.wheels.iter().map(|w| w.load).sum();
    for (i, wheel) in telemetry.wheels.iter().enumerate() {
        assert!(wheel.has_contact, "wheel {i} lost contact");
        assert!(wheel.load > 0.0, "wheel {i} carries no load");
        assert!(wheel.displacement >= 0.0 && wheel.displacement <= 0.2);
    }
    assert!(
        total_load > 0.5 * weight && total_load < 1.5 * weight,
        "total load {total_load} vs weight {weight}"
    );
    // settled: no significant vertical motion left
    let body = &world.bodies[world.vehicle(handle).chassis()];
    assert!(body.linvel().y.abs() < 0.5);
}

#[test]
fn airborne_car_produces_no_friction_and_stays_finite() {
    // a world with no ground at all
    let mut world = World::new();
    let info = VehicleInfo::sports_car();
    let handle = world.spawn_vehicle(&info, Isometry::translation(0.0, 50.0, 0.0));

    let vehicle = world.vehicle_mut(handle);
    vehicle.set_throttle(0.5);
    vehicle.start_engine();
    for _ in 0..60 {
        world.step(DT);
        assert_finite(&world, handle);
    }

    let telemetry = world.vehicle(handle).telemetry(&world.bodies);
    for wheel in &telemetry.wheels {
        assert!(!wheel.has_contact);
        assert_eq!(wheel.lon_force, 0.0);
        assert_eq!(wheel.lat_force, 0.0);
        assert_eq!(wheel.load, 0.0);
    }
}

#[test]
fn manual_gear_request_shifts_exactly_once() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);

    {
        let vehicle = world.vehicle_mut(handle);
        vehicle.set_autoshift(false);
        vehicle.set_autoclutch(true);
        assert_eq!(vehicle.transmission().gear(), 0);
        vehicle.set_gear(1);
    }

    let mut shifts = 0;
    let mut last_gear = 0;
    // well past the configured 0.2 s shift time
    for _ in 0..60 {
        world.step(DT);
        let gear = world.vehicle(handle).transmission().gear();
        if gear != last_gear {
            shifts += 1;
            last_gear = gear;
        }
    }
    assert_eq!(last_gear, 1);
    assert_eq!(shifts, 1, "gear changed more than once");
}

#[test]
fn autoclutch_recovers_engine_from_stall() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);

    {
        let vehicle = world.vehicle_mut(handle);
        vehicle.set_autoclutch(true);
        vehicle.set_throttle(0.0);
        // fresh engine is stalled; autoclutch has to bring it to start rpm
        assert!(!vehicle.engine().combustion());
    }

    for _ in 0..120 {
        world.step(DT);
    }

    let vehicle = world.vehicle(handle);
    let rpm = vehicle.engine().rpm();
    assert!(
        vehicle.engine().combustion(),
        "engine still stalled at {rpm} rpm"
    );
    assert!(
        rpm > 0.5 * vehicle.engine().start_rpm(),
        "engine hanging at {rpm} rpm instead of recovering toward start rpm"
    );
}

#[test]
fn full_brake_with_abs_backs_the_brakes_off() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);
    // settle first
    for _ in 0..60 {
        world.step(DT);
    }

    set_rolling(&mut world, handle, 15.0);
    world.vehicle_mut(handle).set_abs(true);

    let mut abs_triggered = false;
    let mut min_front_brake_factor: Real = 1.0;
    for _ in 0..90 {
        world.vehicle_mut(handle).set_brake(1.0);
        world.step(DT);
        let vehicle = world.vehicle(handle);
        if vehicle.abs_active() {
            abs_triggered = true;
            min_front_brake_factor =
                min_front_brake_factor.min(vehicle.wheel(0).brake.brake_factor());
        }
    }

    assert!(abs_triggered, "ABS never activated under full braking");
    assert!(
        min_front_brake_factor < 1.0,
        "ABS did not reduce the brake factor"
    );
    // and the car actually slowed down
    let speed = world.vehicle(handle).speed(&world.bodies);
    assert!(speed < 14.0, "no deceleration, speed still {speed}");
}

#[test]
fn throttle_in_first_gear_drives_the_car_forward() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);
    for _ in 0..60 {
        world.step(DT);
    }

    {
        let vehicle = world.vehicle_mut(handle);
        vehicle.set_autoshift(false);
        vehicle.set_autoclutch(true);
        vehicle.set_gear(1);
    }
    for _ in 0..30 {
        world.step(DT);
    }
    world.vehicle_mut(handle).set_throttle(1.0);
    for _ in 0..240 {
        world.vehicle_mut(handle).set_throttle(1.0);
        world.step(DT);
        assert_finite(&world, handle);
    }

    let chassis = world.vehicle(handle).chassis();
    let forward_speed = world.bodies[chassis].linvel().z;
    assert!(
        forward_speed > 0.5,
        "car did not accelerate, forward speed {forward_speed}"
    );
    assert!(world.vehicle(handle).speedometer() > 0.0);
}

#[test]
fn detached_wheel_is_skipped() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);
    for _ in 0..30 {
        world.step(DT);
    }

    world
        .vehicle_mut(handle)
        .set_wheel_attachment(3, WheelAttachment::Detached);
    for _ in 0..30 {
        world.step(DT);
        assert_finite(&world, handle);
    }

    let telemetry = world.vehicle(handle).telemetry(&world.bodies);
    assert!(!telemetry.wheels[3].attached);
    assert!(!telemetry.wheels[3].has_contact);
    // the remaining three wheels still carry the car
    assert!(telemetry.wheels[0].has_contact);
    assert!(telemetry.wheels[1].has_contact);
}

#[test]
fn vehicle_info_round_trips_through_serde() {
    let info = VehicleInfo::sports_car();
    let json = serde_json::to_string(&info).expect("serialize");
    let back: VehicleInfo = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.wheels.len(), info.wheels.len());
    assert_eq!(back.transmission.gear_ratios, info.transmission.gear_ratios);
    assert_eq!(back.transmission_link, info.transmission_link);
}

#[test]
fn telemetry_and_debug_dump_render() {
    let mut world = world_with_ground();
    let handle = spawn_aligned(&mut world);
    for _ in 0..30 {
        world.step(DT);
    }

    let json = world.vehicle(handle).telemetry_json(&world.bodies);
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("telemetry json");
    assert!(parsed["wheels"].as_array().is_some_and(|w| w.len() == 4));

    let mut dump = String::new();
    world
        .vehicle(handle)
        .write_debug(&world.bodies, &mut dump, DebugSections::all());
    assert!(dump.contains("---Engine---"));
    assert!(dump.contains("---Wheel 0---"));
    assert!(dump.contains("---Aerodynamics---"));
}
