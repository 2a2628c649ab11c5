use std::sync::Arc;

use blazerod_physics::{PhysicsBackend, PhysicsConfig};
use glam::{Mat4, Quat, Vec3};

use crate::{
    camera::CameraMatrices,
    debug::DebugLineConsumer,
    physics::PhysicsState,
    render_data::{RenderData, RenderTask},
    scene::RenderScene,
    transform::{TransformId, TransformLayers},
    update::{PhaseContext, UpdatePhase},
};

/// Rotation and translation a node received through influence this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InfluenceValue {
    pub rotation: Quat,
    pub translation: Vec3,
}

/// Mutable per-use state over a shared [`RenderScene`].
///
/// Nodes are addressed by their index in [`RenderScene::nodes`]. Passing an
/// index out of range is a programming error and panics.
pub struct ModelInstance {
    pub(crate) scene: Arc<RenderScene>,
    pub(crate) layers: Vec<TransformLayers>,
    pub(crate) world: Vec<Mat4>,
    dirty: Vec<bool>,
    clean_count: usize,
    pub(crate) ik_enabled: Vec<bool>,
    pub(crate) influence_values: Vec<Option<InfluenceValue>>,
    pub(crate) expression_weights: Vec<f32>,
    pub(crate) render_data: RenderData,
    pub(crate) cameras: Vec<CameraMatrices>,
    pub(crate) physics: PhysicsState,
}

impl ModelInstance {
    pub fn new(scene: Arc<RenderScene>) -> Self {
        let node_count = scene.node_count();
        let mut instance = Self {
            layers: vec![TransformLayers::default(); node_count],
            world: vec![Mat4::IDENTITY; node_count],
            dirty: vec![true; node_count],
            clean_count: 0,
            ik_enabled: vec![true; scene.ik_target_count()],
            influence_values: vec![None; node_count],
            expression_weights: vec![0.0; scene.expressions().len()],
            render_data: RenderData::new(&scene),
            cameras: vec![CameraMatrices::default(); scene.camera_count()],
            physics: PhysicsState::default(),
            scene,
        };
        instance.propagate();
        instance
    }

    /// Attach a physics engine. The world is built on the next physics tick.
    pub fn with_physics(
        mut self,
        backend: Arc<dyn PhysicsBackend>,
        config: PhysicsConfig,
    ) -> Self {
        self.physics = PhysicsState::new(backend, config);
        self
    }

    pub fn scene(&self) -> &Arc<RenderScene> {
        &self.scene
    }

    pub fn transform(&self, node: usize, id: TransformId) -> Option<Mat4> {
        self.layers[node].get(id)
    }

    pub fn set_transform(&mut self, node: usize, id: TransformId, transform: Mat4) {
        assert!(node < self.layers.len(), "node index {} out of range", node);
        if self.layers[node].set(id, transform) {
            self.mark_dirty(node);
        }
    }

    /// Reset layer `id` and all later layers of a node.
    pub fn clear_transform_from(&mut self, node: usize, id: TransformId) {
        assert!(node < self.layers.len(), "node index {} out of range", node);
        if self.layers[node].clear_from(id) {
            self.mark_dirty(node);
        }
    }

    pub fn local_transform(&self, node: usize) -> Mat4 {
        self.layers[node].compose(self.scene.node(node).transform)
    }

    /// World transform as of the last propagation.
    pub fn world_transform(&self, node: usize) -> Mat4 {
        self.world[node]
    }

    /// Number of nodes whose world transform is up to date.
    pub fn clean_node_count(&self) -> usize {
        self.clean_count
    }

    pub fn set_expression_weight(&mut self, index: usize, weight: f32) {
        assert!(
            index < self.expression_weights.len(),
            "expression index {} out of range",
            index
        );
        self.expression_weights[index] = weight;
    }

    pub fn expression_weight(&self, index: usize) -> f32 {
        self.expression_weights[index]
    }

    pub fn is_ik_enabled(&self, index: usize) -> bool {
        self.ik_enabled[index]
    }

    /// Toggle an IK target. Disabling it resets the IK layer and later ones
    /// on every node of its chain.
    pub fn set_ik_enabled(&mut self, index: usize, enabled: bool) {
        assert!(index < self.ik_enabled.len(), "IK index {} out of range", index);
        if self.ik_enabled[index] == enabled {
            return;
        }
        self.ik_enabled[index] = enabled;
        if !enabled {
            let scene = Arc::clone(&self.scene);
            let (_, ik) = scene.ik_target(index);
            for joint in &ik.joints {
                if let Some(node) = scene.node_index(joint.node) {
                    self.clear_transform_from(node, TransformId::Ik);
                }
            }
        }
    }

    pub(crate) fn mark_dirty(&mut self, node: usize) {
        if !self.dirty[node] {
            self.dirty[node] = true;
            self.clean_count -= 1;
        }
    }

    /// Store a layer computed by an update phase.
    pub(crate) fn write_layer(&mut self, node: usize, id: TransformId, transform: Mat4) {
        if self.layers[node].set(id, transform) {
            self.mark_dirty(node);
        }
    }

    /// Recompute world transforms of dirty nodes and their descendants.
    pub(crate) fn propagate(&mut self) {
        if self.clean_count == self.world.len() {
            return;
        }
        let scene = Arc::clone(&self.scene);
        for (index, node) in scene.nodes().iter().enumerate() {
            if !self.dirty[index] {
                continue;
            }
            let parent = node.parent.map_or(Mat4::IDENTITY, |parent| self.world[parent]);
            self.world[index] = parent * self.layers[index].compose(node.transform);
            self.dirty[index] = false;
            for child in &node.children {
                self.dirty[*child] = true;
            }
        }
        self.clean_count = self.world.len();
    }

    /// Recompute world transforms of a node and its descendants right away,
    /// for phases that read transforms they have just written.
    pub(crate) fn refresh_subtree(&mut self, node: usize) {
        let scene = Arc::clone(&self.scene);
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            let render_node = scene.node(index);
            let parent = render_node
                .parent
                .map_or(Mat4::IDENTITY, |parent| self.world[parent]);
            self.world[index] = parent * self.layers[index].compose(render_node.transform);
            stack.extend_from_slice(&render_node.children);
        }
    }

    /// Propagation, IK and influence, then propagation again.
    pub(crate) fn prepare(&mut self) {
        let mut context = PhaseContext::None;
        for phase in [
            UpdatePhase::GlobalTransformPropagation,
            UpdatePhase::IkUpdate,
            UpdatePhase::InfluenceTransformUpdate,
            UpdatePhase::GlobalTransformPropagation,
        ] {
            self.run_phase(phase, &mut context);
        }
    }

    /// Bring world transforms up to date without any terminal phase.
    pub fn update_transforms(&mut self) {
        self.prepare();
    }

    /// Update view and projection of every camera.
    pub fn update_camera(&mut self, default_aspect_ratio: f32) -> &[CameraMatrices] {
        self.prepare();
        let mut context = PhaseContext::Camera {
            aspect_ratio: default_aspect_ratio,
        };
        self.run_phase(UpdatePhase::CameraUpdate, &mut context);
        &self.cameras
    }

    /// Advance physics to `current_time`, in seconds.
    ///
    /// The first tick after the world is created only records the time.
    pub fn update_physics(&mut self, current_time: f32) {
        self.prepare();
        if !self.ensure_physics_world() {
            return;
        }
        let Some(delta_time) = self.physics.advance_clock(current_time) else {
            return;
        };
        let mut context = PhaseContext::None;
        self.run_phase(UpdatePhase::PhysicsUpdatePre, &mut context);
        self.physics.step(delta_time);
        self.run_phase(UpdatePhase::PhysicsUpdatePost, &mut context);
        self.run_phase(UpdatePhase::GlobalTransformPropagation, &mut context);
    }

    /// Drop the physics world. The next tick rebuilds it from the current
    /// pose.
    pub fn reset_physics(&mut self) {
        self.physics.reset();
        for node in 0..self.layers.len() {
            if self.layers[node].get(TransformId::Physics).is_some() {
                self.clear_transform_from(node, TransformId::Physics);
            }
        }
    }

    pub fn update_render_data(&mut self) {
        self.prepare();
        self.render_data.resolve_weights(&self.scene, &self.expression_weights);
        let mut context = PhaseContext::None;
        self.run_phase(UpdatePhase::RenderDataUpdate, &mut context);
    }

    /// Update render data and snapshot it. The snapshot is not affected by
    /// later updates of this instance.
    pub fn render_task(&mut self) -> RenderTask {
        self.update_render_data();
        self.render_data.snapshot()
    }

    /// Emit wireframes of every rigid body at its current simulated place.
    pub fn debug_render(&mut self, consumer: &mut dyn DebugLineConsumer) {
        self.prepare();
        let mut context = PhaseContext::Debug(consumer);
        self.run_phase(UpdatePhase::DebugRender, &mut context);
    }
}
