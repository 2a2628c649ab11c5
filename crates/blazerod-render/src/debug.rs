use std::f32::consts::TAU;

use blazerod_asset::{
    node::RigidBodyComponent,
    physics::{RigidBodyPhysicsMode, RigidBodyShapeType},
};
use glam::{Mat4, Vec3};

use crate::instance::ModelInstance;

/// Receives debug geometry as world space line segments.
pub trait DebugLineConsumer {
    fn line(&mut self, start: Vec3, end: Vec3, color: [f32; 4]);
}

impl<F: FnMut(Vec3, Vec3, [f32; 4])> DebugLineConsumer for F {
    fn line(&mut self, start: Vec3, end: Vec3, color: [f32; 4]) {
        self(start, end, color)
    }
}

/// Segments per circle of sphere and capsule wireframes.
pub const DEBUG_SHAPE_SEGMENTS: usize = 16;

const FOLLOW_BONE_COLOR: [f32; 4] = [0.2, 0.8, 0.2, 1.0];
const PHYSICS_COLOR: [f32; 4] = [0.9, 0.3, 0.1, 1.0];
const PHYSICS_PLUS_BONE_COLOR: [f32; 4] = [0.9, 0.8, 0.1, 1.0];

pub fn mode_color(mode: RigidBodyPhysicsMode) -> [f32; 4] {
    match mode {
        RigidBodyPhysicsMode::FollowBone => FOLLOW_BONE_COLOR,
        RigidBodyPhysicsMode::Physics => PHYSICS_COLOR,
        RigidBodyPhysicsMode::PhysicsPlusBone => PHYSICS_PLUS_BONE_COLOR,
    }
}

struct Wireframe<'a> {
    transform: Mat4,
    color: [f32; 4],
    consumer: &'a mut dyn DebugLineConsumer,
}

impl Wireframe<'_> {
    fn line(&mut self, start: Vec3, end: Vec3) {
        self.consumer.line(
            self.transform.transform_point3(start),
            self.transform.transform_point3(end),
            self.color,
        );
    }

    /// Circle around `center` spanned by the unit axes `u` and `v`.
    fn circle(&mut self, center: Vec3, u: Vec3, v: Vec3, radius: f32) {
        self.arc(center, u, v, radius, 0.0, TAU, DEBUG_SHAPE_SEGMENTS);
    }

    #[allow(clippy::too_many_arguments)]
    fn arc(
        &mut self,
        center: Vec3,
        u: Vec3,
        v: Vec3,
        radius: f32,
        from: f32,
        to: f32,
        segments: usize,
    ) {
        let point = |angle: f32| center + (u * angle.cos() + v * angle.sin()) * radius;
        let step = (to - from) / segments as f32;
        for index in 0..segments {
            let start = from + step * index as f32;
            self.line(point(start), point(start + step));
        }
    }

    fn sphere(&mut self, radius: f32) {
        self.circle(Vec3::ZERO, Vec3::X, Vec3::Y, radius);
        self.circle(Vec3::ZERO, Vec3::Y, Vec3::Z, radius);
        self.circle(Vec3::ZERO, Vec3::Z, Vec3::X, radius);
    }

    fn cuboid(&mut self, half_extents: Vec3) {
        let corner = |x: f32, y: f32, z: f32| half_extents * Vec3::new(x, y, z);
        for (a, b) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            self.line(corner(-1.0, a, b), corner(1.0, a, b));
            self.line(corner(a, -1.0, b), corner(a, 1.0, b));
            self.line(corner(a, b, -1.0), corner(a, b, 1.0));
        }
    }

    /// Capsule along Y, `height` between the centers of its caps.
    fn capsule(&mut self, radius: f32, height: f32) {
        let half = height / 2.0;
        let top = Vec3::Y * half;
        let bottom = -top;
        self.circle(top, Vec3::X, Vec3::Z, radius);
        self.circle(bottom, Vec3::X, Vec3::Z, radius);
        for side in [Vec3::X, Vec3::Z, -Vec3::X, -Vec3::Z] {
            self.line(bottom + side * radius, top + side * radius);
        }
        let half_segments = DEBUG_SHAPE_SEGMENTS / 2;
        for side in [Vec3::X, Vec3::Z] {
            self.arc(top, side, Vec3::Y, radius, 0.0, TAU / 2.0, half_segments);
            self.arc(bottom, side, -Vec3::Y, radius, 0.0, TAU / 2.0, half_segments);
        }
    }
}

/// Number of segments [`ModelInstance::debug_render`] emits for one body.
pub fn shape_segment_count(shape: RigidBodyShapeType) -> usize {
    match shape {
        RigidBodyShapeType::Sphere => DEBUG_SHAPE_SEGMENTS * 3,
        RigidBodyShapeType::Box => 12,
        RigidBodyShapeType::Capsule => DEBUG_SHAPE_SEGMENTS * 4 + 4,
    }
}

impl ModelInstance {
    pub(crate) fn debug_rigid_body(
        &mut self,
        node: usize,
        component: &RigidBodyComponent,
        consumer: &mut dyn DebugLineConsumer,
    ) {
        let body = &component.rigid_body;
        let mut wireframe = Wireframe {
            transform: self.rigid_body_transform(node, component.rigid_body_index),
            color: mode_color(body.physics_mode),
            consumer,
        };
        match body.shape {
            RigidBodyShapeType::Sphere => wireframe.sphere(body.shape_size.x),
            RigidBodyShapeType::Box => wireframe.cuboid(body.shape_size),
            RigidBodyShapeType::Capsule => wireframe.capsule(body.shape_size.x, body.shape_size.y),
        }
    }
}
