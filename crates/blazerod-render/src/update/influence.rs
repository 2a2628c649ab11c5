use blazerod_asset::node::InfluenceSourceComponent;
use glam::{Mat4, Quat, Vec3};

use crate::{
    instance::{InfluenceValue, ModelInstance},
    transform::TransformId,
};

impl ModelInstance {
    /// Rotation and translation of a node's base layer relative to its
    /// authored transform.
    fn base_motion(&self, node: usize) -> (Quat, Vec3) {
        let authored = self.scene.node(node).transform;
        let base = self.layers[node].get(TransformId::Base).unwrap_or(authored);
        let (_, authored_rotation, authored_translation) = authored.to_scale_rotation_translation();
        let (_, rotation, translation) = base.to_scale_rotation_translation();
        (
            authored_rotation.inverse() * rotation,
            translation - authored_translation,
        )
    }

    /// Pass a share of the source node's motion to the target's influence
    /// layer.
    pub(crate) fn update_influence(&mut self, source: usize, influence: &InfluenceSourceComponent) {
        let Some(target) = self.scene.node_index(influence.target) else {
            return;
        };
        let (rotation, translation) = match self.influence_values[source] {
            Some(value) if !influence.append_local => (value.rotation, value.translation),
            _ => self.base_motion(source),
        };
        let rotation = match self.layers[source].get(TransformId::Ik) {
            Some(ik) => rotation * ik.to_scale_rotation_translation().1,
            None => rotation,
        };

        let value = InfluenceValue {
            rotation: if influence.influence_rotation {
                Quat::IDENTITY.slerp(rotation, influence.influence)
            } else {
                Quat::IDENTITY
            },
            translation: if influence.influence_translation {
                translation * influence.influence
            } else {
                Vec3::ZERO
            },
        };
        self.influence_values[target] = Some(value);

        // The translation is added in the parent's space, the rotation after
        // every earlier layer.
        let rotation = Mat4::from_quat(value.rotation);
        let layer = if value.translation == Vec3::ZERO {
            rotation
        } else {
            let prefix = self.layers[target]
                .compose_before(TransformId::Influence, self.scene.node(target).transform);
            prefix.inverse() * Mat4::from_translation(value.translation) * prefix * rotation
        };
        self.write_layer(target, TransformId::Influence, layer);
    }
}
