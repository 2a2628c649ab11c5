//! Backend built on the rapier rigid body engine.

use glam::{Mat4, Quat, Vec3};
use log::{debug, warn};
use rapier3d::{
    na::{Quaternion, Translation3, UnitQuaternion},
    prelude::*,
};

use crate::{
    config::PhysicsConfig,
    error::PhysicsError,
    math,
    record::{JointRecord, JointType, PhysicsMode, RigidBodyRecord, ShapeType},
    scene::PhysicsScene,
    world::{check_transform_count, PhysicsBackend, PhysicsWorld},
};

/// Smallest mass given to a dynamic body, rapier needs a positive one.
const MIN_DYNAMIC_MASS: f32 = 1e-3;

/// Bits a rigid body's group and mask may use.
const BODY_GROUPS: u32 = 0xFFFF;
/// Membership of the ground, outside of [`BODY_GROUPS`].
const GROUND_GROUP: Group = Group::GROUP_17;

fn to_isometry(transform: Mat4) -> Isometry<Real> {
    let (rotation, translation) = math::rigid_part(transform);
    Isometry::from_parts(
        Translation3::new(translation.x, translation.y, translation.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

fn to_mat4(isometry: &Isometry<Real>) -> Mat4 {
    let translation = isometry.translation.vector;
    let rotation = isometry.rotation.quaternion().coords;
    Mat4::from_rotation_translation(
        Quat::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w),
        Vec3::new(translation.x, translation.y, translation.z),
    )
}

/// Bodies filter each other by group and mask, and always collide with the
/// ground.
fn interaction_groups(body: &RigidBodyRecord) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(body.group & BODY_GROUPS),
        Group::from_bits_truncate(body.mask & BODY_GROUPS) | GROUND_GROUP,
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RapierBackend;

impl PhysicsBackend for RapierBackend {
    fn create_world(
        &self,
        scene: &PhysicsScene,
        initial_transforms: &[Mat4],
        config: &PhysicsConfig,
    ) -> Result<Box<dyn PhysicsWorld>, PhysicsError> {
        check_transform_count(scene, initial_transforms)?;
        Ok(Box::new(RapierWorld::new(scene, initial_transforms, config)?))
    }
}

pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    bodies: Vec<RigidBodyHandle>,
    additional_damping: bool,
    accumulated_time: f32,
}

impl RapierWorld {
    pub fn new(
        scene: &PhysicsScene,
        initial_transforms: &[Mat4],
        config: &PhysicsConfig,
    ) -> Result<Self, PhysicsError> {
        check_transform_count(scene, initial_transforms)?;
        let mut world = Self {
            gravity: Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]),
            integration_parameters: IntegrationParameters {
                dt: config.fixed_time_step,
                ..IntegrationParameters::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            bodies: Vec::with_capacity(scene.rigid_bodies().len()),
            additional_damping: config.additional_damping,
            accumulated_time: 0.0,
        };
        world.add_ground();
        for (body, transform) in scene.rigid_bodies().iter().zip(initial_transforms) {
            world.add_body(body, *transform)?;
        }
        let mut joint_count = 0;
        for (index, joint) in scene.joints().iter().enumerate() {
            match joint.kind()? {
                JointType::Spring6Dof => {
                    world.add_spring_joint(joint, initial_transforms);
                    joint_count += 1;
                }
                other => warn!("Joint {} of type {:?} is not simulated", index, other),
            }
        }
        debug!(
            "Created rapier world with {} bodies and {} joints",
            world.bodies.len(),
            joint_count
        );
        Ok(world)
    }

    fn add_ground(&mut self) {
        let ground = self.rigid_body_set.insert(RigidBodyBuilder::fixed().build());
        let collider = ColliderBuilder::halfspace(Vector::y_axis())
            .collision_groups(InteractionGroups::new(GROUND_GROUP, Group::ALL))
            .build();
        self.collider_set
            .insert_with_parent(collider, ground, &mut self.rigid_body_set);
    }

    fn add_body(&mut self, body: &RigidBodyRecord, transform: Mat4) -> Result<(), PhysicsError> {
        let mode = body.mode()?;
        let body_type = if mode.is_dynamic() {
            RigidBodyType::Dynamic
        } else {
            RigidBodyType::KinematicPositionBased
        };
        let rigid_body = RigidBodyBuilder::new(body_type)
            .position(to_isometry(transform))
            .linear_damping(body.move_attenuation)
            .angular_damping(body.rotation_damping)
            .ccd_enabled(false)
            .can_sleep(false)
            .build();
        let handle = self.rigid_body_set.insert(rigid_body);

        let size = body.size();
        let shape = match body.shape_type()? {
            ShapeType::Sphere => SharedShape::ball(size.x),
            ShapeType::Box => SharedShape::cuboid(size.x, size.y, size.z),
            ShapeType::Capsule => SharedShape::capsule_y(size.y / 2.0, size.x),
        };
        let groups = interaction_groups(body);
        let builder = ColliderBuilder::new(shape)
            .restitution(body.repulsion)
            .friction(body.friction)
            .collision_groups(groups)
            .solver_groups(groups);
        let builder = match mode {
            PhysicsMode::FollowBone => builder.density(0.0),
            PhysicsMode::Physics | PhysicsMode::PhysicsPlusBone => {
                builder.mass(body.mass.max(MIN_DYNAMIC_MASS))
            }
        };
        self.collider_set
            .insert_with_parent(builder.build(), handle, &mut self.rigid_body_set);
        self.bodies.push(handle);
        Ok(())
    }

    fn add_spring_joint(&mut self, joint: &JointRecord, initial_transforms: &[Mat4]) {
        let a = joint.rigid_body_a as usize;
        let b = joint.rigid_body_b as usize;
        let (frame_a, frame_b) =
            math::joint_frames(initial_transforms[a], initial_transforms[b], joint);
        let mut generic = GenericJointBuilder::new(JointAxesMask::empty())
            .local_frame1(to_isometry(frame_a))
            .local_frame2(to_isometry(frame_b))
            .contacts_enabled(false)
            .build();

        let axes = [
            (JointAxis::LinX, 0, false),
            (JointAxis::LinY, 1, false),
            (JointAxis::LinZ, 2, false),
            (JointAxis::AngX, 0, true),
            (JointAxis::AngY, 1, true),
            (JointAxis::AngZ, 2, true),
        ];
        for (axis, component, angular) in axes {
            let (min, max, stiffness) = if angular {
                (
                    joint.rotation_min[component],
                    joint.rotation_max[component],
                    joint.rotation_spring[component],
                )
            } else {
                (
                    joint.position_min[component],
                    joint.position_max[component],
                    joint.position_spring[component],
                )
            };
            // A reversed range leaves the axis free.
            if min <= max {
                generic.set_limits(axis, [min, max]);
            }
            if stiffness != 0.0 {
                generic.set_motor_position(axis, 0.0, stiffness, stiffness.abs().sqrt());
            }
        }
        self.impulse_joint_set
            .insert(self.bodies[a], self.bodies[b], generic, true);
    }

    fn apply_additional_damping(&mut self) {
        for handle in &self.bodies {
            let body = &mut self.rigid_body_set[*handle];
            if !body.is_dynamic() {
                continue;
            }
            let linvel = body.linvel();
            let angvel = body.angvel();
            let (linear, angular) = math::additional_damping(
                Vec3::new(linvel.x, linvel.y, linvel.z),
                Vec3::new(angvel.x, angvel.y, angvel.z),
                body.linear_damping(),
                body.angular_damping(),
            );
            body.set_linvel(Vector::new(linear.x, linear.y, linear.z), false);
            body.set_angvel(Vector::new(angular.x, angular.y, angular.z), false);
        }
    }

    fn step_once(&mut self, dt: f32) {
        if self.additional_damping {
            self.apply_additional_damping();
        }
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    fn body(&self, index: usize) -> &RigidBody {
        &self.rigid_body_set[self.bodies[index]]
    }
}

impl PhysicsWorld for RapierWorld {
    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn step(&mut self, delta_time: f32, max_sub_steps: u32, fixed_time_step: f32) {
        if delta_time <= 0.0 || fixed_time_step <= 0.0 {
            return;
        }
        self.accumulated_time += delta_time;
        let steps = (self.accumulated_time / fixed_time_step) as u32;
        self.accumulated_time -= steps as f32 * fixed_time_step;
        let steps = steps.min(max_sub_steps);
        for _ in 0..steps {
            self.step_once(fixed_time_step);
        }
    }

    fn body_transform(&self, index: usize) -> Mat4 {
        to_mat4(self.body(index).position())
    }

    fn set_body_transform(&mut self, index: usize, transform: Mat4) {
        let isometry = to_isometry(transform);
        let body = &mut self.rigid_body_set[self.bodies[index]];
        if body.is_kinematic() {
            body.set_next_kinematic_position(isometry);
        } else {
            body.set_position(isometry, true);
        }
    }
}
