mod common;

use std::sync::Arc;

use blazerod_asset::{
    physics::RigidBodyShapeType,
    testing::{PmxBuilder, TestBone, TestRigidBody},
};
use blazerod_physics::PhysicsMode;
use blazerod_render::{debug, ModelInstance, RenderScene, TransformId};
use common::{assert_mat4_eq, load_scene, node, MockBackend};
use glam::{Mat4, Vec3};

const FRAME: f32 = 1.0 / 60.0;

fn body(name: &str, bone: i64, position: [f32; 3], mode: PhysicsMode) -> TestRigidBody {
    TestRigidBody {
        physics_mode: u32::from(mode) as u8,
        ..TestRigidBody::new(name, bone, position)
    }
}

/// Root bone and its child, each carrying one body in `mode` at the bone.
fn two_bones(mode: PhysicsMode) -> Arc<RenderScene> {
    load_scene(&PmxBuilder {
        bones: vec![
            TestBone::new("root", [0.0, 0.0, 0.0], -1),
            TestBone::new("child", [0.0, 10.0, 0.0], 0),
        ],
        rigid_bodies: vec![
            body("root body", 0, [0.0, 0.0, 0.0], mode),
            body("child body", 1, [0.0, 10.0, 0.0], mode),
        ],
        ..PmxBuilder::minimal()
    })
}

#[test]
fn test_first_tick_sets_baseline() {
    let (mut instance, state) =
        MockBackend::new(vec![None, None]).attach(two_bones(PhysicsMode::Physics));
    assert!(!instance.has_physics_world());

    instance.update_physics(2.0);
    assert!(instance.has_physics_world());
    assert!(state.lock().unwrap().steps.is_empty());

    instance.update_physics(2.5);
    assert_eq!(state.lock().unwrap().steps, vec![0.5]);
}

#[test]
fn test_follow_bone_bodies_track_node() {
    let scene = two_bones(PhysicsMode::FollowBone);
    let child = node(&scene, "child");
    let (mut instance, state) =
        MockBackend::new(vec![None, None]).attach(Arc::clone(&scene));

    for tick in 0..5 {
        let moved = Mat4::from_translation(Vec3::X * tick as f32 * 0.1);
        instance.set_transform(child, TransformId::Render, moved);
        instance.update_physics(tick as f32 * FRAME);
        let expected = instance.world_transform(child) * scene.rigid_body_offset(1);
        assert_mat4_eq(state.lock().unwrap().transforms[1], expected);
        // The node is never driven back.
        assert_eq!(instance.transform(child, TransformId::Physics), None);
    }
    assert_eq!(state.lock().unwrap().steps.len(), 4);
}

#[test]
fn test_physics_bodies_drive_nodes() {
    let scene = two_bones(PhysicsMode::Physics);
    let root = node(&scene, "root");
    let child = node(&scene, "child");
    let root_body =
        Mat4::from_translation(Vec3::new(0.1, 0.0, 0.0)) * Mat4::from_rotation_z(0.2);
    let child_body =
        Mat4::from_translation(Vec3::new(0.3, 1.0, 0.0)) * Mat4::from_rotation_x(0.1);
    let (mut instance, state) = MockBackend::new(vec![Some(root_body), Some(child_body)])
        .attach(Arc::clone(&scene));
    let child_rest = instance.world_transform(child);

    instance.update_physics(0.0);
    instance.update_physics(FRAME);
    assert_eq!(state.lock().unwrap().steps.len(), 1);
    // Free bodies are never written to.
    assert!(state.lock().unwrap().writes.is_empty());

    let root_offset = scene.rigid_body_offset(0);
    let child_offset = scene.rigid_body_offset(1);
    assert_mat4_eq(
        instance.world_transform(root),
        root_body * root_offset.inverse(),
    );
    assert_mat4_eq(
        instance.world_transform(child),
        child_body * child_offset.inverse(),
    );

    // The root bone starts at the origin, so its layer is the body motion
    // itself. The child's layer is measured from where the moved root put it.
    assert_mat4_eq(
        instance.transform(root, TransformId::Physics).unwrap(),
        root_body * root_offset.inverse(),
    );
    let carried = root_body * root_offset.inverse() * child_rest;
    assert_mat4_eq(
        instance.transform(child, TransformId::Physics).unwrap(),
        carried.inverse() * child_body * child_offset.inverse(),
    );
    assert_eq!(instance.transform(child, TransformId::Base), None);
}

#[test]
fn test_physics_plus_bone_keeps_bone_position() {
    let scene = two_bones(PhysicsMode::PhysicsPlusBone);
    let child = node(&scene, "child");
    let simulated =
        Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0)) * Mat4::from_rotation_z(0.3);
    let (mut instance, state) =
        MockBackend::new(vec![None, Some(simulated)]).attach(Arc::clone(&scene));
    let rest = instance.world_transform(child).w_axis.truncate();

    instance.update_physics(0.0);
    instance.update_physics(FRAME);

    let (_, rotation, translation) = instance
        .world_transform(child)
        .to_scale_rotation_translation();
    assert!(translation.abs_diff_eq(rest, 1e-5));
    assert!(rotation.abs_diff_eq(glam::Quat::from_rotation_z(0.3), 1e-5));
    // Only the position was pushed to the body before the step.
    let state = state.lock().unwrap();
    let (_, pushed) = state
        .writes
        .iter()
        .rev()
        .find(|(index, _)| *index == 1)
        .unwrap();
    assert!(pushed.w_axis.truncate().abs_diff_eq(rest, 1e-5));
}

#[test]
fn test_reset_physics_rebuilds_world() {
    let scene = two_bones(PhysicsMode::Physics);
    let root = node(&scene, "root");
    let body = Mat4::from_translation(Vec3::X);
    let (mut instance, state) =
        MockBackend::new(vec![Some(body), None]).attach(Arc::clone(&scene));

    instance.update_physics(0.0);
    instance.update_physics(FRAME);
    assert!(instance.transform(root, TransformId::Physics).is_some());

    instance.reset_physics();
    assert!(!instance.has_physics_world());
    assert_eq!(instance.transform(root, TransformId::Physics), None);
    instance.update_transforms();
    assert_eq!(instance.world_transform(root), scene.node(root).transform);

    instance.update_physics(10.0);
    let state = state.lock().unwrap();
    assert_eq!(state.worlds_created, 2);
    assert!(state.steps.is_empty());
}

#[test]
fn test_physics_without_backend() {
    let scene = two_bones(PhysicsMode::Physics);
    let mut backend = MockBackend::new(vec![Some(Mat4::from_translation(Vec3::X)), None]);
    backend.available = false;
    let (mut instance, state) = backend.attach(Arc::clone(&scene));
    instance.update_physics(0.0);
    instance.update_physics(FRAME);
    assert!(!instance.has_physics_world());
    assert_eq!(state.lock().unwrap().worlds_created, 0);

    let mut plain = ModelInstance::new(scene);
    plain.update_physics(0.0);
    plain.update_physics(FRAME);
    assert!(!plain.has_physics_world());
}

#[test]
fn test_debug_render_draws_bodies() {
    let scene = two_bones(PhysicsMode::Physics);
    let root = node(&scene, "root");
    let mut instance = ModelInstance::new(Arc::clone(&scene));
    let mut lines = Vec::new();
    instance.debug_render(&mut |start: Vec3, end: Vec3, color: [f32; 4]| {
        lines.push((start, end, color))
    });

    let segments = debug::shape_segment_count(RigidBodyShapeType::Sphere);
    assert_eq!(lines.len(), segments * 2);
    let color = debug::mode_color(blazerod_asset::physics::RigidBodyPhysicsMode::Physics);
    assert!(lines.iter().all(|(_, _, line_color)| *line_color == color));
    // Without a world, bodies are drawn where their nodes put them.
    let center = (instance.world_transform(root) * scene.rigid_body_offset(0))
        .w_axis
        .truncate();
    let radius = scene.rigid_body(0).1.rigid_body.shape_size.x;
    for (start, _, _) in &lines[..segments] {
        assert!((start.distance(center) - radius).abs() < 1e-4);
    }
}

#[test]
fn test_debug_render_uses_simulated_place() {
    let scene = two_bones(PhysicsMode::Physics);
    let simulated = Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0));
    let (mut instance, _state) =
        MockBackend::new(vec![Some(simulated), None]).attach(Arc::clone(&scene));
    instance.update_physics(0.0);
    instance.update_physics(FRAME);

    let mut starts = Vec::new();
    instance.debug_render(&mut |start: Vec3, _end: Vec3, _color: [f32; 4]| {
        starts.push(start)
    });
    let radius = scene.rigid_body(0).1.rigid_body.shape_size.x;
    let segments = debug::shape_segment_count(RigidBodyShapeType::Sphere);
    for start in &starts[..segments] {
        assert!((start.distance(simulated.w_axis.truncate()) - radius).abs() < 1e-4);
    }
}

#[cfg(feature = "rapier")]
#[test]
fn test_rapier_body_falls() {
    use blazerod_physics::{rapier::RapierBackend, PhysicsConfig};

    let scene = load_scene(&PmxBuilder {
        bones: vec![TestBone::new("root", [0.0, 20.0, 0.0], -1)],
        rigid_bodies: vec![body("body", 0, [0.0, 20.0, 0.0], PhysicsMode::Physics)],
        ..PmxBuilder::minimal()
    });
    let bone = node(&scene, "root");
    // At this step length gravity outpaces the settling of slow bodies.
    let config = PhysicsConfig {
        fixed_time_step: FRAME,
        ..PhysicsConfig::default()
    };
    let mut instance =
        ModelInstance::new(Arc::clone(&scene)).with_physics(Arc::new(RapierBackend), config);
    let start = instance.world_transform(bone).w_axis.y;
    for tick in 0..=30 {
        instance.update_physics(tick as f32 * FRAME);
    }
    assert!(instance.has_physics_world());
    let end = instance.world_transform(bone).w_axis.y;
    assert!(end < start - 0.1, "{} -> {}", start, end);
}
