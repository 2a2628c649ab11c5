use blazerod_asset::node::CameraComponent;
use glam::{Mat4, Vec3};

use crate::instance::ModelInstance;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

impl CameraMatrices {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl ModelInstance {
    pub(crate) fn update_camera_component(
        &mut self,
        node: usize,
        component: &CameraComponent,
        default_aspect_ratio: f32,
    ) {
        let world = self.world[node];
        self.cameras[component.camera_index] = CameraMatrices {
            view: world.inverse(),
            projection: component.camera.projection.matrix(default_aspect_ratio),
            position: world.w_axis.truncate(),
        };
    }

    /// Camera matrices as of the last camera update.
    pub fn cameras(&self) -> &[CameraMatrices] {
        &self.cameras
    }
}
