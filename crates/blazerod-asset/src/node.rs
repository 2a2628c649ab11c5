use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use glam::{Mat4, Quat, Vec3};

use crate::{
    camera::CameraAsset, humanoid::HumanoidTag, physics::RigidBodyAsset,
    primitive::PrimitiveAsset,
};

/// Model-scoped node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixNodeTransform(pub Mat4);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DecomposedTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeTransform {
    Matrix(MatrixNodeTransform),
    Decomposed(DecomposedTransform),
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::Decomposed(DecomposedTransform::default())
    }
}

impl NodeTransform {
    pub fn matrix(&self) -> Mat4 {
        match self {
            NodeTransform::Matrix(matrix) => matrix.0,
            NodeTransform::Decomposed(decomposed) => decomposed.matrix(),
        }
    }

    pub fn decomposed(&self) -> DecomposedTransform {
        (*self).into()
    }
}

impl From<MatrixNodeTransform> for Mat4 {
    fn from(value: MatrixNodeTransform) -> Self {
        value.0
    }
}

impl From<DecomposedTransform> for Mat4 {
    fn from(value: DecomposedTransform) -> Self {
        value.matrix()
    }
}

impl From<NodeTransform> for Mat4 {
    fn from(value: NodeTransform) -> Self {
        value.matrix()
    }
}

impl From<Mat4> for NodeTransform {
    fn from(value: Mat4) -> Self {
        NodeTransform::Matrix(MatrixNodeTransform(value))
    }
}

impl From<DecomposedTransform> for NodeTransform {
    fn from(value: DecomposedTransform) -> Self {
        NodeTransform::Decomposed(value)
    }
}

impl From<NodeTransform> for DecomposedTransform {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => {
                let (scale, rotation, translation) = matrix.0.to_scale_rotation_translation();
                DecomposedTransform {
                    translation,
                    rotation,
                    scale,
                }
            }
            NodeTransform::Decomposed(decomposed) => decomposed,
        }
    }
}

/// A primitive drawn at the owning node, optionally skinned.
#[derive(Debug, Clone)]
pub struct PrimitiveComponent {
    pub primitive_index: usize,
    pub primitive: Arc<PrimitiveAsset>,
    pub skin_index: Option<usize>,
}

/// Marks the owning node as joint `joint_index` of skin `skin_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointComponent {
    pub skin_index: usize,
    pub joint_index: usize,
}

/// The owning node passes part of its transform to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceSourceComponent {
    pub influence_index: usize,
    pub target: NodeId,
    pub influence: f32,
    pub influence_rotation: bool,
    pub influence_translation: bool,
    pub append_local: bool,
}

#[derive(Debug, Clone)]
pub struct CameraComponent {
    pub camera_index: usize,
    pub camera: CameraAsset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkJointLimit {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkJoint {
    pub node: NodeId,
    pub limit: Option<IkJointLimit>,
}

/// The owning node is the goal an IK chain reaches for.
#[derive(Debug, Clone, PartialEq)]
pub struct IkTargetComponent {
    pub ik_index: usize,
    pub effector: NodeId,
    pub joints: Vec<IkJoint>,
    pub loop_count: u32,
    pub limit_radian: f32,
}

#[derive(Debug, Clone)]
pub struct RigidBodyComponent {
    pub rigid_body_index: usize,
    pub rigid_body: RigidBodyAsset,
}

#[derive(Debug, Clone)]
pub enum NodeComponent {
    Primitive(PrimitiveComponent),
    Joint(JointComponent),
    InfluenceSource(InfluenceSourceComponent),
    Camera(CameraComponent),
    IkTarget(IkTargetComponent),
    RigidBody(RigidBodyComponent),
}

#[derive(Debug, Clone)]
pub struct NodeAsset {
    pub id: NodeId,
    pub name: Option<String>,
    pub humanoid_tag: Option<HumanoidTag>,
    pub transform: Option<NodeTransform>,
    pub components: Vec<NodeComponent>,
    pub children: Vec<NodeAsset>,
}

impl NodeAsset {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: None,
            humanoid_tag: None,
            transform: None,
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Visit this node and all descendants, parent first.
    pub fn walk<'a>(&'a self, visitor: &mut impl FnMut(&'a NodeAsset)) {
        visitor(self);
        for child in &self.children {
            child.walk(visitor);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decomposed_matrix_round_trip() {
        let transform = DecomposedTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::ONE,
        };
        let matrix = NodeTransform::from(transform.matrix());
        let back = matrix.decomposed();
        assert!(back.translation.abs_diff_eq(transform.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(transform.rotation, 1e-5));
    }

    #[test]
    fn test_walk_order() {
        let mut root = NodeAsset::new(NodeId(0));
        let mut a = NodeAsset::new(NodeId(1));
        a.children.push(NodeAsset::new(NodeId(2)));
        root.children.push(a);
        root.children.push(NodeAsset::new(NodeId(3)));
        let mut order = Vec::new();
        root.walk(&mut |node| order.push(node.id.0));
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
