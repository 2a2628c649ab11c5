#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use blazerod_asset::{
    loader::{pmx, PmxLoadParams},
    testing::PmxBuilder,
};
use blazerod_physics::{PhysicsBackend, PhysicsConfig, PhysicsError, PhysicsScene, PhysicsWorld};
use blazerod_render::{ModelInstance, RenderScene};
use glam::Mat4;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn load_scene(builder: &PmxBuilder) -> Arc<RenderScene> {
    init_logger();
    let params = PmxLoadParams {
        load_textures: false,
        ..Default::default()
    };
    let (model, _) = pmx::load(&builder.build(), ".", &params).unwrap();
    Arc::new(RenderScene::from_model(&model).unwrap())
}

pub fn node(scene: &RenderScene, name: &str) -> usize {
    scene
        .node_by_name(name)
        .unwrap_or_else(|| panic!("no node named {}", name))
}

pub fn assert_mat4_eq(actual: Mat4, expected: Mat4) {
    assert!(
        actual.abs_diff_eq(expected, 1e-4),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// What a [`MockBackend`] saw, shared with the test.
#[derive(Debug, Default)]
pub struct MockState {
    pub worlds_created: usize,
    pub steps: Vec<f32>,
    pub transforms: Vec<Mat4>,
    /// Transforms written through `set_body_transform`, in order.
    pub writes: Vec<(usize, Mat4)>,
}

/// Backend whose worlds put bodies at fixed places on every step.
pub struct MockBackend {
    pub state: Arc<Mutex<MockState>>,
    pub available: bool,
    /// Where each body ends up after a step. `None` leaves it in place.
    pub simulated: Vec<Option<Mat4>>,
}

impl MockBackend {
    pub fn new(simulated: Vec<Option<Mat4>>) -> Self {
        Self {
            state: Arc::default(),
            available: true,
            simulated,
        }
    }

    pub fn attach(self, scene: Arc<RenderScene>) -> (ModelInstance, Arc<Mutex<MockState>>) {
        let state = Arc::clone(&self.state);
        let instance =
            ModelInstance::new(scene).with_physics(Arc::new(self), PhysicsConfig::default());
        (instance, state)
    }
}

impl PhysicsBackend for MockBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    fn create_world(
        &self,
        scene: &PhysicsScene,
        initial_transforms: &[Mat4],
        _config: &PhysicsConfig,
    ) -> Result<Box<dyn PhysicsWorld>, PhysicsError> {
        blazerod_physics::world::check_transform_count(scene, initial_transforms)?;
        let mut state = self.state.lock().unwrap();
        state.worlds_created += 1;
        state.steps.clear();
        state.writes.clear();
        state.transforms = initial_transforms.to_vec();
        Ok(Box::new(MockWorld {
            state: Arc::clone(&self.state),
            simulated: self.simulated.clone(),
        }))
    }
}

struct MockWorld {
    state: Arc<Mutex<MockState>>,
    simulated: Vec<Option<Mat4>>,
}

impl PhysicsWorld for MockWorld {
    fn body_count(&self) -> usize {
        self.state.lock().unwrap().transforms.len()
    }

    fn step(&mut self, delta_time: f32, _max_sub_steps: u32, _fixed_time_step: f32) {
        let mut state = self.state.lock().unwrap();
        state.steps.push(delta_time);
        for (index, simulated) in self.simulated.iter().enumerate() {
            if let Some(transform) = simulated {
                state.transforms[index] = *transform;
            }
        }
    }

    fn body_transform(&self, index: usize) -> Mat4 {
        self.state.lock().unwrap().transforms[index]
    }

    fn set_body_transform(&mut self, index: usize, transform: Mat4) {
        let mut state = self.state.lock().unwrap();
        state.transforms[index] = transform;
        state.writes.push((index, transform));
    }
}
