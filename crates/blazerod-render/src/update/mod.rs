//! Phases a [`ModelInstance`] runs over its nodes.
//!
//! Every phase runs to completion over the whole scene before the next one
//! starts. Components declare which phases they take part in through
//! [`subscribed_phases`]; the scene keeps, per phase, the list of subscribed
//! components in execution order.

mod ik;
mod influence;

use std::sync::Arc;

use blazerod_asset::node::NodeComponent;

use crate::{debug::DebugLineConsumer, instance::ModelInstance, scene::ComponentRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    GlobalTransformPropagation,
    IkUpdate,
    InfluenceTransformUpdate,
    PhysicsUpdatePre,
    PhysicsUpdatePost,
    CameraUpdate,
    RenderDataUpdate,
    DebugRender,
}

impl UpdatePhase {
    pub const COUNT: usize = 8;

    pub fn index(self) -> usize {
        self as usize
    }
}

pub fn subscribed_phases(component: &NodeComponent) -> &'static [UpdatePhase] {
    match component {
        NodeComponent::Primitive(_) | NodeComponent::Joint(_) => &[UpdatePhase::RenderDataUpdate],
        NodeComponent::InfluenceSource(_) => &[UpdatePhase::InfluenceTransformUpdate],
        NodeComponent::Camera(_) => &[UpdatePhase::CameraUpdate],
        NodeComponent::IkTarget(_) => &[UpdatePhase::IkUpdate],
        NodeComponent::RigidBody(_) => &[
            UpdatePhase::PhysicsUpdatePre,
            UpdatePhase::PhysicsUpdatePost,
            UpdatePhase::DebugRender,
        ],
    }
}

/// Inputs some phases need beyond the instance itself.
pub(crate) enum PhaseContext<'a> {
    None,
    Camera { aspect_ratio: f32 },
    Debug(&'a mut dyn DebugLineConsumer),
}

impl ModelInstance {
    pub(crate) fn run_phase(&mut self, phase: UpdatePhase, context: &mut PhaseContext) {
        if phase == UpdatePhase::GlobalTransformPropagation {
            self.propagate();
            return;
        }
        let scene = Arc::clone(&self.scene);
        for reference in scene.subscribers(phase) {
            self.update_component(phase, *reference, scene.component(*reference), context);
        }
    }

    fn update_component(
        &mut self,
        phase: UpdatePhase,
        reference: ComponentRef,
        component: &NodeComponent,
        context: &mut PhaseContext,
    ) {
        let node = reference.node;
        match (phase, component, context) {
            (UpdatePhase::IkUpdate, NodeComponent::IkTarget(ik), _) => self.update_ik(node, ik),
            (
                UpdatePhase::InfluenceTransformUpdate,
                NodeComponent::InfluenceSource(influence),
                _,
            ) => self.update_influence(node, influence),
            (UpdatePhase::PhysicsUpdatePre, NodeComponent::RigidBody(body), _) => {
                self.physics_pre_sync(node, body)
            }
            (UpdatePhase::PhysicsUpdatePost, NodeComponent::RigidBody(body), _) => {
                self.physics_post_sync(node, body)
            }
            (
                UpdatePhase::CameraUpdate,
                NodeComponent::Camera(camera),
                PhaseContext::Camera { aspect_ratio },
            ) => self.update_camera_component(node, camera, *aspect_ratio),
            (UpdatePhase::RenderDataUpdate, NodeComponent::Joint(joint), _) => {
                self.update_joint_matrix(node, joint)
            }
            (UpdatePhase::RenderDataUpdate, NodeComponent::Primitive(primitive), _) => {
                self.update_primitive_data(node, primitive)
            }
            (
                UpdatePhase::DebugRender,
                NodeComponent::RigidBody(body),
                PhaseContext::Debug(consumer),
            ) => self.debug_rigid_body(node, body, &mut **consumer),
            _ => {}
        }
    }
}
