use glam::Mat4;

use crate::{config::PhysicsConfig, error::PhysicsError, scene::PhysicsScene};

/// A simulation engine able to build worlds from scene descriptions.
pub trait PhysicsBackend: Send + Sync {
    /// Whether the engine can be used on this system.
    fn is_available(&self) -> bool {
        true
    }

    /// Build a world for `scene`, with one initial world transform per rigid
    /// body.
    fn create_world(
        &self,
        scene: &PhysicsScene,
        initial_transforms: &[Mat4],
        config: &PhysicsConfig,
    ) -> Result<Box<dyn PhysicsWorld>, PhysicsError>;
}

/// A running simulation. Bodies are addressed by their index in the scene.
pub trait PhysicsWorld: Send {
    fn body_count(&self) -> usize;

    /// Advance the simulation by `delta_time` seconds, in sub-steps of
    /// `fixed_time_step`, taking no more than `max_sub_steps` of them.
    fn step(&mut self, delta_time: f32, max_sub_steps: u32, fixed_time_step: f32);

    /// World transform of a body. Panics if `index` is out of range.
    fn body_transform(&self, index: usize) -> Mat4;

    /// Move a body. Kinematic bodies move there on the next step, dynamic
    /// bodies are placed there immediately. Panics if `index` is out of range.
    fn set_body_transform(&mut self, index: usize, transform: Mat4);
}

/// Ensure a world gets exactly one initial transform per rigid body.
pub fn check_transform_count(
    scene: &PhysicsScene,
    initial_transforms: &[Mat4],
) -> Result<(), PhysicsError> {
    if scene.rigid_bodies().len() != initial_transforms.len() {
        return Err(PhysicsError::TransformCount {
            expected: scene.rigid_bodies().len(),
            actual: initial_transforms.len(),
        });
    }
    Ok(())
}
