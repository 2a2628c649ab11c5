use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use crate::{
    expression::ExpressionAsset, node::NodeAsset, physics::PhysicalJointAsset, skin::SkinAsset,
};

#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub name: Option<String>,
    pub root: NodeAsset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSceneError;

impl Display for NoSceneError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "A model must contain at least one scene")
    }
}

impl Error for NoSceneError {}

/// A loaded model. Immutable once built.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    scenes: Vec<SceneAsset>,
    default_scene: Option<usize>,
    pub skins: Vec<SkinAsset>,
    pub physical_joints: Vec<PhysicalJointAsset>,
    pub expressions: Vec<ExpressionAsset>,
}

impl ModelAsset {
    pub fn new(
        scenes: Vec<SceneAsset>,
        default_scene: Option<usize>,
        skins: Vec<SkinAsset>,
        physical_joints: Vec<PhysicalJointAsset>,
        expressions: Vec<ExpressionAsset>,
    ) -> Result<Self, NoSceneError> {
        if scenes.is_empty() {
            return Err(NoSceneError);
        }
        let default_scene = default_scene.filter(|index| *index < scenes.len());
        Ok(Self {
            scenes,
            default_scene,
            skins,
            physical_joints,
            expressions,
        })
    }

    pub fn scenes(&self) -> &[SceneAsset] {
        &self.scenes
    }

    pub fn default_scene_index(&self) -> Option<usize> {
        self.default_scene
    }

    /// The default scene, or the first one if none is declared.
    pub fn default_scene(&self) -> &SceneAsset {
        &self.scenes[self.default_scene.unwrap_or(0)]
    }
}

/// Descriptive data of a loaded model that does not take part in rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMetadata {
    pub version: f32,
    pub name_local: String,
    pub name_universal: String,
    pub comment_local: String,
    pub comment_universal: String,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub texture_count: usize,
    pub material_count: usize,
    pub bone_count: usize,
    pub morph_count: usize,
    pub display_frame_count: usize,
    pub rigid_body_count: usize,
    pub joint_count: usize,
}

#[cfg(test)]
mod test {
    use crate::node::{NodeAsset, NodeId};

    use super::*;

    #[test]
    fn test_empty_model_rejected() {
        assert!(ModelAsset::new(vec![], None, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_default_scene_fallback() {
        let scene = SceneAsset {
            name: None,
            root: NodeAsset::new(NodeId(0)),
        };
        let model = ModelAsset::new(vec![scene], Some(4), vec![], vec![], vec![]).unwrap();
        assert_eq!(model.default_scene_index(), None);
        assert_eq!(model.default_scene().root.id, NodeId(0));
    }
}
