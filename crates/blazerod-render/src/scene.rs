use std::{
    collections::{BTreeSet, HashMap, HashSet},
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use blazerod_asset::{
    expression::ExpressionAsset,
    humanoid::HumanoidTag,
    model::ModelAsset,
    node::{
        CameraComponent, IkTargetComponent, InfluenceSourceComponent, NodeAsset, NodeComponent,
        NodeId, PrimitiveComponent, RigidBodyComponent,
    },
    physics::{
        PhysicalJointAsset, PhysicalJointType, RigidBodyAsset, RigidBodyPhysicsMode,
        RigidBodyShapeType,
    },
    skin::SkinAsset,
};
use blazerod_physics::{
    math, JointRecord, JointType, PhysicsError, PhysicsMode, PhysicsScene, RigidBodyRecord,
    ShapeType,
};
use glam::Mat4;
use log::debug;

use crate::update::{subscribed_phases, UpdatePhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Primitive,
    Joint,
    InfluenceSource,
    Camera,
    IkTarget,
    RigidBody,
}

impl Display for ComponentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Primitive => "primitive",
            ComponentKind::Joint => "joint",
            ComponentKind::InfluenceSource => "influence source",
            ComponentKind::Camera => "camera",
            ComponentKind::IkTarget => "IK target",
            ComponentKind::RigidBody => "rigid body",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum SceneBuildError {
    DuplicateNodeId(NodeId),
    DuplicateComponentIndex { kind: ComponentKind, index: usize },
    MissingComponentIndex { kind: ComponentKind, index: usize },
    UnknownNode { referrer: NodeId, node: NodeId },
    InfluenceCycle(NodeId),
    UnknownSkinJoint { skin: usize, node: NodeId },
    InvalidSkinIndex { node: NodeId, skin: usize },
    Physics(PhysicsError),
}

impl Display for SceneBuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SceneBuildError::DuplicateNodeId(id) => write!(f, "{} appears more than once", id),
            SceneBuildError::DuplicateComponentIndex { kind, index } => {
                write!(f, "Duplicate {} component index {}", kind, index)
            }
            SceneBuildError::MissingComponentIndex { kind, index } => {
                write!(f, "Missing {} component index {}", kind, index)
            }
            SceneBuildError::UnknownNode { referrer, node } => {
                write!(f, "{} references unknown {}", referrer, node)
            }
            SceneBuildError::InfluenceCycle(id) => {
                write!(f, "Influence of {} depends on itself", id)
            }
            SceneBuildError::UnknownSkinJoint { skin, node } => {
                write!(f, "Skin {} uses unknown joint {}", skin, node)
            }
            SceneBuildError::InvalidSkinIndex { node, skin } => {
                write!(f, "{} references missing skin {}", node, skin)
            }
            SceneBuildError::Physics(err) => write!(f, "Bad physics data: {}", err),
        }
    }
}

impl Error for SceneBuildError {}

impl From<PhysicsError> for SceneBuildError {
    fn from(value: PhysicsError) -> Self {
        SceneBuildError::Physics(value)
    }
}

/// A node of the flattened tree.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub humanoid_tag: Option<HumanoidTag>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Authored local transform.
    pub transform: Mat4,
    pub components: Vec<NodeComponent>,
}

/// Position of a component: node index, then index in the node's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub node: usize,
    pub component: usize,
}

#[derive(Debug, Clone)]
pub struct RenderSkin {
    pub name: Option<String>,
    /// Joint node indices.
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

struct DenseIndex {
    kind: ComponentKind,
    slots: Vec<Option<ComponentRef>>,
}

impl DenseIndex {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
        }
    }

    fn insert(&mut self, index: usize, component: ComponentRef) -> Result<(), SceneBuildError> {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        if self.slots[index].is_some() {
            return Err(SceneBuildError::DuplicateComponentIndex {
                kind: self.kind,
                index,
            });
        }
        self.slots[index] = Some(component);
        Ok(())
    }

    fn finish(self) -> Result<Vec<ComponentRef>, SceneBuildError> {
        let kind = self.kind;
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(SceneBuildError::MissingComponentIndex { kind, index }))
            .collect()
    }
}

/// Immutable, flattened form of a scene, shared by all its instances.
#[derive(Debug)]
pub struct RenderScene {
    nodes: Vec<RenderNode>,
    ids: HashMap<NodeId, usize>,
    names: HashMap<String, usize>,
    humanoid_tags: HashMap<HumanoidTag, usize>,
    primitives: Vec<ComponentRef>,
    ik_targets: Vec<ComponentRef>,
    influences: Vec<ComponentRef>,
    cameras: Vec<ComponentRef>,
    rigid_bodies: Vec<ComponentRef>,
    subscribers: Vec<Vec<ComponentRef>>,
    skins: Vec<RenderSkin>,
    expressions: Vec<ExpressionAsset>,
    physics: Option<Arc<PhysicsScene>>,
    rigid_body_offsets: Vec<Mat4>,
}

fn flatten(node: &NodeAsset, parent: Option<usize>, nodes: &mut Vec<RenderNode>) -> usize {
    let index = nodes.len();
    nodes.push(RenderNode {
        id: node.id,
        name: node.name.clone(),
        humanoid_tag: node.humanoid_tag,
        parent,
        children: Vec::with_capacity(node.children.len()),
        transform: node.transform.map_or(Mat4::IDENTITY, |transform| transform.matrix()),
        components: node.components.clone(),
    });
    for child in &node.children {
        let child = flatten(child, Some(index), nodes);
        nodes[index].children.push(child);
    }
    index
}

fn rigid_body_record(body: &RigidBodyAsset) -> RigidBodyRecord {
    RigidBodyRecord {
        group: body.collision_group_mask(),
        mask: body.collision_filter_mask(),
        shape: match body.shape {
            RigidBodyShapeType::Sphere => ShapeType::Sphere,
            RigidBodyShapeType::Box => ShapeType::Box,
            RigidBodyShapeType::Capsule => ShapeType::Capsule,
        }
        .into(),
        physics_mode: match body.physics_mode {
            RigidBodyPhysicsMode::FollowBone => PhysicsMode::FollowBone,
            RigidBodyPhysicsMode::Physics => PhysicsMode::Physics,
            RigidBodyPhysicsMode::PhysicsPlusBone => PhysicsMode::PhysicsPlusBone,
        }
        .into(),
        size: body.shape_size.to_array(),
        position: body.shape_position.to_array(),
        rotation: body.shape_rotation.to_array(),
        mass: body.mass,
        move_attenuation: body.move_attenuation,
        rotation_damping: body.rotation_damping,
        repulsion: body.repulsion,
        friction: body.friction_force,
    }
}

fn joint_record(joint: &PhysicalJointAsset) -> JointRecord {
    JointRecord {
        joint_type: match joint.joint_type {
            PhysicalJointType::Spring6Dof => JointType::Spring6Dof,
            PhysicalJointType::SixDof => JointType::SixDof,
            PhysicalJointType::PointToPoint => JointType::PointToPoint,
            PhysicalJointType::ConeTwist => JointType::ConeTwist,
            PhysicalJointType::Slider => JointType::Slider,
            PhysicalJointType::Hinge => JointType::Hinge,
        }
        .into(),
        rigid_body_a: joint.rigid_body_a as u32,
        rigid_body_b: joint.rigid_body_b as u32,
        position: joint.position.to_array(),
        rotation: joint.rotation.to_array(),
        position_min: joint.position_min.to_array(),
        position_max: joint.position_max.to_array(),
        rotation_min: joint.rotation_min.to_array(),
        rotation_max: joint.rotation_max.to_array(),
        position_spring: joint.position_spring.to_array(),
        rotation_spring: joint.rotation_spring.to_array(),
    }
}

impl RenderScene {
    /// Flatten the tree under `root`, parent first, children in order.
    pub fn new(
        root: &NodeAsset,
        skins: &[SkinAsset],
        physical_joints: &[PhysicalJointAsset],
        expressions: Vec<ExpressionAsset>,
    ) -> Result<Self, SceneBuildError> {
        let mut nodes = Vec::new();
        flatten(root, None, &mut nodes);

        let mut ids = HashMap::with_capacity(nodes.len());
        let mut names = HashMap::new();
        let mut humanoid_tags = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if ids.insert(node.id, index).is_some() {
                return Err(SceneBuildError::DuplicateNodeId(node.id));
            }
            if let Some(name) = &node.name {
                names.insert(name.clone(), index);
            }
            if let Some(tag) = node.humanoid_tag {
                humanoid_tags.insert(tag, index);
            }
        }

        let resolve = |referrer: NodeId, node: NodeId| {
            ids.get(&node)
                .copied()
                .ok_or(SceneBuildError::UnknownNode { referrer, node })
        };

        let mut primitives = DenseIndex::new(ComponentKind::Primitive);
        let mut ik_targets = DenseIndex::new(ComponentKind::IkTarget);
        let mut influences = DenseIndex::new(ComponentKind::InfluenceSource);
        let mut cameras = DenseIndex::new(ComponentKind::Camera);
        let mut rigid_bodies = DenseIndex::new(ComponentKind::RigidBody);
        let mut skin_joints = HashSet::new();
        let mut subscribers = vec![Vec::new(); UpdatePhase::COUNT];
        for (node_index, node) in nodes.iter().enumerate() {
            for (component_index, component) in node.components.iter().enumerate() {
                let reference = ComponentRef {
                    node: node_index,
                    component: component_index,
                };
                match component {
                    NodeComponent::Primitive(primitive) => {
                        let invalid_skin = primitive.skin_index.filter(|skin| *skin >= skins.len());
                        if let Some(skin) = invalid_skin {
                            return Err(SceneBuildError::InvalidSkinIndex { node: node.id, skin });
                        }
                        primitives.insert(primitive.primitive_index, reference)?
                    }
                    NodeComponent::Joint(joint) => {
                        if joint.skin_index >= skins.len() {
                            return Err(SceneBuildError::InvalidSkinIndex {
                                node: node.id,
                                skin: joint.skin_index,
                            });
                        }
                        if !skin_joints.insert((joint.skin_index, joint.joint_index)) {
                            return Err(SceneBuildError::DuplicateComponentIndex {
                                kind: ComponentKind::Joint,
                                index: joint.joint_index,
                            });
                        }
                    }
                    NodeComponent::InfluenceSource(influence) => {
                        resolve(node.id, influence.target)?;
                        influences.insert(influence.influence_index, reference)?
                    }
                    NodeComponent::Camera(camera) => {
                        cameras.insert(camera.camera_index, reference)?
                    }
                    NodeComponent::IkTarget(ik) => {
                        resolve(node.id, ik.effector)?;
                        for joint in &ik.joints {
                            resolve(node.id, joint.node)?;
                        }
                        ik_targets.insert(ik.ik_index, reference)?
                    }
                    NodeComponent::RigidBody(body) => {
                        rigid_bodies.insert(body.rigid_body_index, reference)?
                    }
                }
                for phase in subscribed_phases(component) {
                    subscribers[phase.index()].push(reference);
                }
            }
        }

        let skins = skins
            .iter()
            .enumerate()
            .map(|(skin_index, skin)| {
                let joints = skin
                    .joints()
                    .iter()
                    .map(|joint| {
                        ids.get(joint).copied().ok_or(SceneBuildError::UnknownSkinJoint {
                            skin: skin_index,
                            node: *joint,
                        })
                    })
                    .collect::<Result<_, _>>()?;
                Ok(RenderSkin {
                    name: skin.name().map(str::to_string),
                    joints,
                    inverse_bind_matrices: skin.inverse_bind_matrices().to_vec(),
                })
            })
            .collect::<Result<Vec<_>, SceneBuildError>>()?;

        let mut scene = Self {
            nodes,
            primitives: primitives.finish()?,
            ik_targets: ik_targets.finish()?,
            influences: influences.finish()?,
            cameras: cameras.finish()?,
            rigid_bodies: rigid_bodies.finish()?,
            ids,
            names,
            humanoid_tags,
            subscribers,
            skins,
            expressions,
            physics: None,
            rigid_body_offsets: Vec::new(),
        };
        scene.subscribers[UpdatePhase::InfluenceTransformUpdate.index()] =
            scene.influence_order()?;
        scene.build_physics(physical_joints)?;

        debug!(
            "Built render scene: {} nodes, {} primitives, {} IK targets, {} influences, {} rigid bodies",
            scene.nodes.len(),
            scene.primitives.len(),
            scene.ik_targets.len(),
            scene.influences.len(),
            scene.rigid_bodies.len(),
        );
        Ok(scene)
    }

    /// Build from the model's default scene.
    pub fn from_model(model: &ModelAsset) -> Result<Self, SceneBuildError> {
        Self::new(
            &model.default_scene().root,
            &model.skins,
            &model.physical_joints,
            model.expressions.clone(),
        )
    }

    /// Influence components ordered so that a node's own influence is applied
    /// before it passes influence on.
    fn influence_order(&self) -> Result<Vec<ComponentRef>, SceneBuildError> {
        let count = self.influences.len();
        let targets: Vec<usize> = (0..count)
            .map(|index| self.ids[&self.influence(index).1.target])
            .collect();
        let mut dependents = vec![Vec::new(); count];
        let mut pending = vec![0usize; count];
        for (index, reference) in self.influences.iter().enumerate() {
            for (other, target) in targets.iter().enumerate() {
                if *target == reference.node {
                    dependents[other].push(index);
                    pending[index] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|index| pending[*index] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(index) = ready.pop_first() {
            order.push(self.influences[index]);
            for dependent in &dependents[index] {
                pending[*dependent] -= 1;
                if pending[*dependent] == 0 {
                    ready.insert(*dependent);
                }
            }
        }
        if let Some(index) = (0..count).find(|index| pending[*index] > 0) {
            let node = self.influences[index].node;
            return Err(SceneBuildError::InfluenceCycle(self.nodes[node].id));
        }
        Ok(order)
    }

    fn build_physics(
        &mut self,
        physical_joints: &[PhysicalJointAsset],
    ) -> Result<(), SceneBuildError> {
        if self.rigid_bodies.is_empty() {
            return Ok(());
        }
        let records: Vec<_> = (0..self.rigid_bodies.len())
            .map(|index| rigid_body_record(&self.rigid_body(index).1.rigid_body))
            .collect();
        self.rigid_body_offsets = records.iter().map(math::body_offset).collect();
        let joints = physical_joints.iter().map(joint_record).collect();
        self.physics = Some(Arc::new(PhysicsScene::new(records, joints)?));
        Ok(())
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &RenderNode {
        &self.nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.ids.get(&id).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn node_by_humanoid_tag(&self, tag: HumanoidTag) -> Option<usize> {
        self.humanoid_tags.get(&tag).copied()
    }

    pub fn component(&self, reference: ComponentRef) -> &NodeComponent {
        &self.nodes[reference.node].components[reference.component]
    }

    /// Components taking part in `phase`, in execution order.
    pub fn subscribers(&self, phase: UpdatePhase) -> &[ComponentRef] {
        &self.subscribers[phase.index()]
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Node index and component of a primitive. Panics on unknown indices.
    pub fn primitive(&self, index: usize) -> (usize, &PrimitiveComponent) {
        let reference = self.primitives[index];
        match self.component(reference) {
            NodeComponent::Primitive(primitive) => (reference.node, primitive),
            _ => unreachable!("primitive index points at another component"),
        }
    }

    pub fn ik_target_count(&self) -> usize {
        self.ik_targets.len()
    }

    pub fn ik_target(&self, index: usize) -> (usize, &IkTargetComponent) {
        let reference = self.ik_targets[index];
        match self.component(reference) {
            NodeComponent::IkTarget(ik) => (reference.node, ik),
            _ => unreachable!("IK index points at another component"),
        }
    }

    pub fn influence_count(&self) -> usize {
        self.influences.len()
    }

    pub fn influence(&self, index: usize) -> (usize, &InfluenceSourceComponent) {
        let reference = self.influences[index];
        match self.component(reference) {
            NodeComponent::InfluenceSource(influence) => (reference.node, influence),
            _ => unreachable!("influence index points at another component"),
        }
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn camera(&self, index: usize) -> (usize, &CameraComponent) {
        let reference = self.cameras[index];
        match self.component(reference) {
            NodeComponent::Camera(camera) => (reference.node, camera),
            _ => unreachable!("camera index points at another component"),
        }
    }

    pub fn rigid_body_count(&self) -> usize {
        self.rigid_bodies.len()
    }

    pub fn rigid_body(&self, index: usize) -> (usize, &RigidBodyComponent) {
        let reference = self.rigid_bodies[index];
        match self.component(reference) {
            NodeComponent::RigidBody(body) => (reference.node, body),
            _ => unreachable!("rigid body index points at another component"),
        }
    }

    /// Transform of a rigid body relative to its node.
    pub fn rigid_body_offset(&self, index: usize) -> Mat4 {
        self.rigid_body_offsets[index]
    }

    pub fn has_physics(&self) -> bool {
        !self.rigid_bodies.is_empty()
    }

    pub fn physics(&self) -> Option<&Arc<PhysicsScene>> {
        self.physics.as_ref()
    }

    pub fn skins(&self) -> &[RenderSkin] {
        &self.skins
    }

    pub fn expressions(&self) -> &[ExpressionAsset] {
        &self.expressions
    }
}

#[cfg(test)]
mod test {
    use blazerod_asset::{
        camera::CameraAsset,
        node::{CameraComponent, DecomposedTransform, IkTargetComponent},
    };
    use glam::Vec3;

    use super::*;

    fn node(id: usize, name: &str) -> NodeAsset {
        let mut node = NodeAsset::new(NodeId(id));
        node.name = Some(name.to_string());
        node.transform = Some(DecomposedTransform::from_translation(Vec3::Y).into());
        node
    }

    fn influence(index: usize, target: usize) -> NodeComponent {
        NodeComponent::InfluenceSource(InfluenceSourceComponent {
            influence_index: index,
            target: NodeId(target),
            influence: 1.0,
            influence_rotation: true,
            influence_translation: false,
            append_local: false,
        })
    }

    fn camera(index: usize) -> NodeComponent {
        NodeComponent::Camera(CameraComponent {
            camera_index: index,
            camera: CameraAsset::default(),
        })
    }

    fn tree() -> NodeAsset {
        let mut root = node(0, "root");
        let mut a = node(1, "a");
        a.children.push(node(2, "b"));
        root.children.push(a);
        root.children.push(node(3, "c"));
        root
    }

    #[test]
    fn test_flatten_order_and_indices() {
        let mut root = tree();
        root.children[1].name = Some(String::from("a"));
        let scene = RenderScene::new(&root, &[], &[], vec![]).unwrap();
        let ids: Vec<_> = scene.nodes().iter().map(|node| node.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(scene.node(2).parent, Some(1));
        assert_eq!(scene.node(0).children, vec![1, 3]);
        assert_eq!(scene.node_index(NodeId(3)), Some(3));
        // Last writer wins on duplicate names.
        assert_eq!(scene.node_by_name("a"), Some(3));
        assert!(!scene.has_physics());
        assert!(scene.physics().is_none());
    }

    #[test]
    fn test_duplicate_component_index() {
        let mut root = tree();
        root.components.push(camera(0));
        root.children[1].components.push(camera(0));
        let err = RenderScene::new(&root, &[], &[], vec![]).unwrap_err();
        assert!(matches!(
            err,
            SceneBuildError::DuplicateComponentIndex {
                kind: ComponentKind::Camera,
                index: 0
            }
        ));
    }

    #[test]
    fn test_missing_component_index() {
        let mut root = tree();
        root.components.push(camera(2));
        let err = RenderScene::new(&root, &[], &[], vec![]).unwrap_err();
        assert!(matches!(
            err,
            SceneBuildError::MissingComponentIndex {
                kind: ComponentKind::Camera,
                index: 0
            }
        ));
    }

    #[test]
    fn test_unknown_ik_effector() {
        let mut root = tree();
        root.components.push(NodeComponent::IkTarget(IkTargetComponent {
            ik_index: 0,
            effector: NodeId(42),
            joints: vec![],
            loop_count: 1,
            limit_radian: 1.0,
        }));
        let err = RenderScene::new(&root, &[], &[], vec![]).unwrap_err();
        assert!(matches!(
            err,
            SceneBuildError::UnknownNode {
                node: NodeId(42),
                ..
            }
        ));
    }

    #[test]
    fn test_influence_order() {
        let mut root = tree();
        // Node 1 passes influence to node 3, which was itself influenced by node 2.
        root.children[0].components.push(influence(0, 3));
        root.children[0].children[0].components.push(influence(1, 1));
        let scene = RenderScene::new(&root, &[], &[], vec![]).unwrap();
        let order: Vec<_> = scene
            .subscribers(UpdatePhase::InfluenceTransformUpdate)
            .iter()
            .map(|reference| reference.node)
            .collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_influence_cycle() {
        let mut root = tree();
        root.children[0].components.push(influence(0, 2));
        root.children[0].children[0].components.push(influence(1, 1));
        let err = RenderScene::new(&root, &[], &[], vec![]).unwrap_err();
        assert!(matches!(err, SceneBuildError::InfluenceCycle(_)));
    }
}
