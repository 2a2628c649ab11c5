use blazerod_asset::node::{IkJointLimit, IkTargetComponent};
use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::{instance::ModelInstance, transform::TransformId};

/// Rotations smaller than this are not applied.
const MIN_ANGLE: f32 = 1e-5;

fn clamp_rotation(rotation: Quat, limit: &IkJointLimit) -> Quat {
    let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
    Quat::from_euler(
        EulerRot::XYZ,
        x.clamp(limit.min.x, limit.max.x),
        y.clamp(limit.min.y, limit.max.y),
        z.clamp(limit.min.z, limit.max.z),
    )
}

struct Link {
    node: usize,
    limit: Option<IkJointLimit>,
    /// Rotation of the base layer, which limits apply on top of.
    base_rotation: Quat,
    rotation: Quat,
}

impl ModelInstance {
    fn apply_link(&mut self, link: &Link) {
        self.layers[link.node].set(TransformId::Ik, Mat4::from_quat(link.rotation));
        self.refresh_subtree(link.node);
    }

    /// Cyclic coordinate descent towards the target node's position.
    ///
    /// The chain restarts from its un-solved pose every time, so the result
    /// only depends on the current transforms.
    pub(crate) fn update_ik(&mut self, target: usize, ik: &IkTargetComponent) {
        if !self.ik_enabled[ik.ik_index] {
            return;
        }
        let Some(effector) = self.scene.node_index(ik.effector) else {
            return;
        };
        let mut links: Vec<Link> = ik
            .joints
            .iter()
            .filter_map(|joint| {
                let node = self.scene.node_index(joint.node)?;
                let base = self.layers[node]
                    .get(TransformId::Base)
                    .unwrap_or(self.scene.node(node).transform);
                let (_, base_rotation, _) = base.to_scale_rotation_translation();
                Some(Link {
                    node,
                    limit: joint.limit,
                    base_rotation,
                    rotation: Quat::IDENTITY,
                })
            })
            .collect();
        let previous: Vec<Option<Mat4>> = links
            .iter()
            .map(|link| self.layers[link.node].get(TransformId::Ik))
            .collect();

        for link in &links {
            self.apply_link(link);
        }

        let target_position = self.world[target].w_axis.truncate();
        // An iteration is only kept when it gets closer than the un-solved pose.
        let mut best_distance = self.world[effector]
            .w_axis
            .truncate()
            .distance(target_position);
        let mut best: Vec<Quat> = links.iter().map(|link| link.rotation).collect();
        for _ in 0..ik.loop_count {
            for index in 0..links.len() {
                let node = links[index].node;
                if node == effector {
                    continue;
                }
                let effector_position = self.world[effector].w_axis.truncate();
                let inverse = self.world[node].inverse();
                let local_target = inverse.transform_point3(target_position).normalize_or_zero();
                let local_effector =
                    inverse.transform_point3(effector_position).normalize_or_zero();
                if local_target == Vec3::ZERO || local_effector == Vec3::ZERO {
                    continue;
                }
                let angle = local_effector.dot(local_target).clamp(-1.0, 1.0).acos();
                if angle < MIN_ANGLE {
                    continue;
                }
                let axis = local_effector.cross(local_target).normalize_or_zero();
                if axis == Vec3::ZERO {
                    continue;
                }
                let angle = if ik.limit_radian > 0.0 {
                    angle.min(ik.limit_radian)
                } else {
                    angle
                };

                let link = &mut links[index];
                let mut rotation = link.rotation * Quat::from_axis_angle(axis, angle);
                if let Some(limit) = &link.limit {
                    let full = clamp_rotation(link.base_rotation * rotation, limit);
                    rotation = link.base_rotation.inverse() * full;
                }
                link.rotation = rotation.normalize();
                let link = &links[index];
                self.apply_link(link);
            }

            let effector_position = self.world[effector].w_axis.truncate();
            let distance = effector_position.distance(target_position);
            if distance < best_distance {
                best_distance = distance;
                for (saved, link) in best.iter_mut().zip(&links) {
                    *saved = link.rotation;
                }
            } else {
                break;
            }
        }

        for (link, rotation) in links.iter_mut().zip(best) {
            link.rotation = rotation;
        }
        for link in &links {
            self.apply_link(link);
        }
        for (link, previous) in links.iter().zip(previous) {
            if self.layers[link.node].get(TransformId::Ik) != previous {
                self.mark_dirty(link.node);
            }
        }
    }
}
