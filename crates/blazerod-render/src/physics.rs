use std::sync::Arc;

use blazerod_asset::{
    node::RigidBodyComponent,
    physics::{RigidBodyPhysicsMode, RigidBodyShapeType},
};
use blazerod_physics::{PhysicsBackend, PhysicsConfig, PhysicsWorld};
use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::{instance::ModelInstance, transform::TransformId};

/// Physics data owned by one instance.
#[derive(Default)]
pub(crate) struct PhysicsState {
    backend: Option<Arc<dyn PhysicsBackend>>,
    config: PhysicsConfig,
    world: Option<Box<dyn PhysicsWorld>>,
    creation_failed: bool,
    last_time: Option<f32>,
}

impl PhysicsState {
    pub fn new(backend: Arc<dyn PhysicsBackend>, config: PhysicsConfig) -> Self {
        Self {
            backend: Some(backend),
            config,
            ..Default::default()
        }
    }

    pub fn world(&self) -> Option<&dyn PhysicsWorld> {
        self.world.as_deref()
    }

    /// Record `current_time` and return the time since the previous tick.
    /// The first tick only sets the baseline.
    pub fn advance_clock(&mut self, current_time: f32) -> Option<f32> {
        let last_time = self.last_time.replace(current_time)?;
        Some(current_time - last_time)
    }

    pub fn step(&mut self, delta_time: f32) {
        if let Some(world) = &mut self.world {
            world.step(
                delta_time,
                self.config.max_sub_steps,
                self.config.fixed_time_step,
            );
        }
    }

    pub fn reset(&mut self) {
        self.world = None;
        self.creation_failed = false;
        self.last_time = None;
    }
}

/// Spheres and capsules cannot be stretched, so their scale is made uniform.
fn uniform_scale(transform: Mat4, shape: RigidBodyShapeType) -> Mat4 {
    if shape == RigidBodyShapeType::Box {
        return transform;
    }
    let (scale, rotation, translation) = transform.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(Vec3::splat(scale.max_element()), rotation, translation)
}

fn with_translation(mut transform: Mat4, translation: Vec3) -> Mat4 {
    transform.w_axis = translation.extend(1.0);
    transform
}

impl ModelInstance {
    /// Build the physics world if the scene has bodies and a usable backend
    /// is attached. Returns whether a world exists.
    pub(crate) fn ensure_physics_world(&mut self) -> bool {
        if self.physics.world.is_some() {
            return true;
        }
        if self.physics.creation_failed {
            return false;
        }
        let Some(scene) = self.scene.physics().cloned() else {
            return false;
        };
        let Some(backend) = self
            .physics
            .backend
            .clone()
            .filter(|backend| backend.is_available())
        else {
            return false;
        };
        let initial_transforms: Vec<Mat4> = (0..self.scene.rigid_body_count())
            .map(|index| {
                let (node, _) = self.scene.rigid_body(index);
                self.world[node] * self.scene.rigid_body_offset(index)
            })
            .collect();
        match backend.create_world(&scene, &initial_transforms, &self.physics.config) {
            Ok(world) => {
                debug!("Created physics world with {} bodies", world.body_count());
                self.physics.world = Some(world);
                self.physics.last_time = None;
                true
            }
            Err(err) => {
                warn!("Failed to create physics world: {}", err);
                self.physics.creation_failed = true;
                false
            }
        }
    }

    /// Push node transforms into bodies the node drives.
    pub(crate) fn physics_pre_sync(&mut self, node: usize, component: &RigidBodyComponent) {
        let index = component.rigid_body_index;
        let offset = self.scene.rigid_body_offset(index);
        let Some(world) = &mut self.physics.world else {
            return;
        };
        let body = &component.rigid_body;
        let driven = self.world[node] * offset;
        match body.physics_mode {
            RigidBodyPhysicsMode::FollowBone => {
                world.set_body_transform(index, uniform_scale(driven, body.shape));
            }
            RigidBodyPhysicsMode::Physics => {}
            RigidBodyPhysicsMode::PhysicsPlusBone => {
                let current = world.body_transform(index);
                let translation = driven.w_axis.truncate();
                world.set_body_transform(index, with_translation(current, translation));
            }
        }
    }

    /// Move nodes driven by their body, through the physics layer.
    pub(crate) fn physics_post_sync(&mut self, node: usize, component: &RigidBodyComponent) {
        let index = component.rigid_body_index;
        let Some(world) = &self.physics.world else {
            return;
        };
        let simulated = world.body_transform(index) * self.scene.rigid_body_offset(index).inverse();
        let current = self.world[node];
        let desired = match component.rigid_body.physics_mode {
            RigidBodyPhysicsMode::FollowBone => return,
            RigidBodyPhysicsMode::Physics => simulated,
            RigidBodyPhysicsMode::PhysicsPlusBone => {
                with_translation(simulated, current.w_axis.truncate())
            }
        };

        // current = parent * before * physics * after
        // desired = parent * before * physics' * after
        let delta = current.inverse() * desired;
        let after = self.layers[node].compose_after(TransformId::Physics);
        let physics = self.layers[node]
            .get(TransformId::Physics)
            .unwrap_or(Mat4::IDENTITY);
        self.write_layer(
            node,
            TransformId::Physics,
            physics * after * delta * after.inverse(),
        );
        self.refresh_subtree(node);
    }

    /// Current transform of a rigid body: simulated if a world exists,
    /// derived from its node otherwise.
    pub(crate) fn rigid_body_transform(&self, node: usize, index: usize) -> Mat4 {
        match self.physics.world() {
            Some(world) => world.body_transform(index),
            None => self.world[node] * self.scene.rigid_body_offset(index),
        }
    }

    pub fn has_physics_world(&self) -> bool {
        self.physics.world.is_some()
    }
}
