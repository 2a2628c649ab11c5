use std::sync::Arc;

use blazerod_asset::{
    expression::ExpressionAsset,
    node::{JointComponent, PrimitiveComponent},
};
use glam::Mat4;

use crate::{instance::ModelInstance, scene::RenderScene};

/// Copy-on-write snapshot of an instance's render data.
///
/// Buffers are shared with the instance until it next writes to them, so
/// taking a task is cheap and the task never observes later frames.
#[derive(Debug, Clone)]
pub struct RenderTask {
    /// Joint matrices per skin, world transform times inverse bind matrix.
    pub skin_matrices: Vec<Arc<Vec<Mat4>>>,
    /// Morph target weights per primitive.
    pub morph_weights: Vec<Arc<Vec<f32>>>,
    /// World transform per primitive.
    pub primitive_transforms: Arc<Vec<Mat4>>,
}

impl RenderTask {
    pub fn skin_bytes(&self, skin: usize) -> &[u8] {
        bytemuck::cast_slice(self.skin_matrices[skin].as_slice())
    }

    pub fn morph_weight_bytes(&self, primitive: usize) -> &[u8] {
        bytemuck::cast_slice(self.morph_weights[primitive].as_slice())
    }

    pub fn primitive_transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.primitive_transforms.as_slice())
    }
}

/// Resolve expression weights into per-primitive morph target weights.
///
/// Group expressions only reference earlier expressions, so walking
/// backwards settles every group before its members are read.
pub fn resolve_target_weights(
    expressions: &[ExpressionAsset],
    weights: &[f32],
    target_counts: &[usize],
) -> Vec<Vec<f32>> {
    let mut effective = weights.to_vec();
    for index in (0..expressions.len()).rev() {
        if let ExpressionAsset::Group { targets, .. } = &expressions[index] {
            let weight = effective[index];
            for target in targets {
                if let Some(member) = effective.get_mut(target.expression_index) {
                    *member += weight * target.influence;
                }
            }
        }
    }

    let mut target_weights: Vec<Vec<f32>> =
        target_counts.iter().map(|count| vec![0.0; *count]).collect();
    for (expression, weight) in expressions.iter().zip(effective) {
        let ExpressionAsset::Target { bindings, .. } = expression else {
            continue;
        };
        for binding in bindings {
            if let Some(slot) = target_weights
                .get_mut(binding.primitive_index)
                .and_then(|targets| targets.get_mut(binding.target_index))
            {
                *slot += weight;
            }
        }
    }
    target_weights
}

#[derive(Debug)]
pub(crate) struct RenderData {
    skin_matrices: Vec<Arc<Vec<Mat4>>>,
    morph_weights: Vec<Arc<Vec<f32>>>,
    primitive_transforms: Arc<Vec<Mat4>>,
    resolved_weights: Vec<Vec<f32>>,
}

impl RenderData {
    pub fn new(scene: &RenderScene) -> Self {
        let target_counts: Vec<usize> = (0..scene.primitive_count())
            .map(|index| scene.primitive(index).1.primitive.targets.len())
            .collect();
        Self {
            skin_matrices: scene
                .skins()
                .iter()
                .map(|skin| Arc::new(vec![Mat4::IDENTITY; skin.joints.len()]))
                .collect(),
            morph_weights: target_counts
                .iter()
                .map(|count| Arc::new(vec![0.0; *count]))
                .collect(),
            primitive_transforms: Arc::new(vec![Mat4::IDENTITY; scene.primitive_count()]),
            resolved_weights: target_counts.iter().map(|count| vec![0.0; *count]).collect(),
        }
    }

    pub fn resolve_weights(&mut self, scene: &RenderScene, weights: &[f32]) {
        let target_counts: Vec<usize> = self
            .morph_weights
            .iter()
            .map(|weights| weights.len())
            .collect();
        self.resolved_weights =
            resolve_target_weights(scene.expressions(), weights, &target_counts);
    }

    pub fn snapshot(&self) -> RenderTask {
        RenderTask {
            skin_matrices: self.skin_matrices.clone(),
            morph_weights: self.morph_weights.clone(),
            primitive_transforms: Arc::clone(&self.primitive_transforms),
        }
    }
}

impl ModelInstance {
    pub(crate) fn update_joint_matrix(&mut self, node: usize, joint: &JointComponent) {
        let Some(skin) = self.scene.skins().get(joint.skin_index) else {
            return;
        };
        let Some(inverse_bind) = skin.inverse_bind_matrices.get(joint.joint_index) else {
            return;
        };
        let matrix = self.world[node] * *inverse_bind;
        let matrices = Arc::make_mut(&mut self.render_data.skin_matrices[joint.skin_index]);
        matrices[joint.joint_index] = matrix;
    }

    pub(crate) fn update_primitive_data(&mut self, node: usize, primitive: &PrimitiveComponent) {
        let index = primitive.primitive_index;
        let world = self.world[node];
        let data = &mut self.render_data;
        if data.primitive_transforms[index] != world {
            Arc::make_mut(&mut data.primitive_transforms)[index] = world;
        }
        if *data.morph_weights[index] != data.resolved_weights[index] {
            Arc::make_mut(&mut data.morph_weights[index]).clone_from(&data.resolved_weights[index]);
        }
    }
}

#[cfg(test)]
mod test {
    use blazerod_asset::expression::{GroupTarget, MorphTargetBinding};

    use super::*;

    fn target(primitive_index: usize, target_index: usize) -> ExpressionAsset {
        ExpressionAsset::Target {
            name: None,
            tag: None,
            bindings: vec![MorphTargetBinding {
                primitive_index,
                target_index,
            }],
        }
    }

    #[test]
    fn test_group_weights() {
        let expressions = vec![
            target(0, 0),
            target(0, 1),
            ExpressionAsset::Group {
                name: None,
                tag: None,
                targets: vec![
                    GroupTarget {
                        expression_index: 0,
                        influence: 0.5,
                    },
                    GroupTarget {
                        expression_index: 1,
                        influence: 1.0,
                    },
                ],
            },
        ];
        let weights = resolve_target_weights(&expressions, &[0.25, 0.0, 1.0], &[2]);
        assert_eq!(weights, vec![vec![0.75, 1.0]]);
    }

    #[test]
    fn test_out_of_range_bindings_ignored() {
        let weights = resolve_target_weights(&[target(3, 0), target(0, 5)], &[1.0, 1.0], &[1]);
        assert_eq!(weights, vec![vec![0.0]]);
    }
}
