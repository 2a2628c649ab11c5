use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::Path,
    sync::Arc,
};

use binrw::BinRead;
use format::{
    PmxBone, PmxBoneIkLinkLimit, PmxFile, PmxIndex, PmxJoint, PmxMaterial, PmxMorph,
    PmxMorphOffsets, PmxRigidbody,
};
use glam::{Mat4, Quat, Vec3};
use log::{debug, warn};

use crate::{
    camera::CameraAsset,
    expression::{ExpressionAsset, ExpressionTag, GroupTarget, MorphTargetBinding},
    humanoid::HumanoidTag,
    material::{EnvironmentBlendMode, MaterialAsset, MaterialFlags, ToonReference},
    model::{ModelAsset, ModelMetadata, NoSceneError, SceneAsset},
    node::{
        CameraComponent, DecomposedTransform, IkJoint, IkJointLimit, IkTargetComponent,
        InfluenceSourceComponent, JointComponent, NodeAsset, NodeComponent, NodeId,
        PrimitiveComponent, RigidBodyComponent,
    },
    physics::{
        PhysicalJointAsset, PhysicalJointType, RigidBodyAsset, RigidBodyPhysicsMode,
        RigidBodyShapeType,
    },
    primitive::{PrimitiveAsset, PrimitiveAssetAttributes, PrimitiveAssetMorphTarget},
    skin::{SkinAsset, SkinLengthMismatch},
    texture::{SamplerAsset, TextureAsset, TextureInfo},
};

use super::{
    convert_direction, convert_position, convert_position_range, convert_rotation,
    convert_rotation_range, texture::TextureLoader, PmxLoadParams, MAX_MAPPED_FILE_SIZE,
    MODEL_SCALE,
};

mod format;

pub use format::PmxFormatError;

#[derive(Debug)]
pub enum PmxLoadError {
    Format(binrw::Error),
    Io(io::Error),
    NoSurfaceLeft { expected: usize, actual: usize },
    BadSurfacesCount(usize),
    BadVertexIndex { index: Option<usize>, count: usize },
    BadBoneHierarchy { bone: usize },
    Skin(SkinLengthMismatch),
    NoScene(NoSceneError),
}

impl Display for PmxLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PmxLoadError::Format(format) => Display::fmt(format, f),
            PmxLoadError::Io(io) => Display::fmt(io, f),
            PmxLoadError::NoSurfaceLeft { expected, actual } => write!(
                f,
                "Want to read {} surfaces for material, but only {} left",
                expected, actual
            ),
            PmxLoadError::BadSurfacesCount(count) => {
                write!(f, "Bad surfaces count in material: {}", count)
            }
            PmxLoadError::BadVertexIndex { index, count } => {
                write!(f, "Bad vertex index {:?}, model has {} vertices", index, count)
            }
            PmxLoadError::BadBoneHierarchy { bone } => {
                write!(f, "Bone {} is part of a parent cycle", bone)
            }
            PmxLoadError::Skin(err) => Display::fmt(err, f),
            PmxLoadError::NoScene(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for PmxLoadError {}

impl From<binrw::Error> for PmxLoadError {
    fn from(value: binrw::Error) -> Self {
        Self::Format(value)
    }
}

impl From<io::Error> for PmxLoadError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SkinLengthMismatch> for PmxLoadError {
    fn from(value: SkinLengthMismatch) -> Self {
        Self::Skin(value)
    }
}

impl From<NoSceneError> for PmxLoadError {
    fn from(value: NoSceneError) -> Self {
        Self::NoScene(value)
    }
}

/// A primitive built from one material, with its vertex remap.
struct MaterialPrimitive {
    material_index: usize,
    primitive: PrimitiveAsset,
    /// Global vertex index to material-local index.
    remap: HashMap<usize, u32>,
}

struct PmxLoader<'a> {
    file: &'a PmxFile,
    params: &'a PmxLoadParams,
    texture_loader: TextureLoader,
    textures: HashMap<usize, Option<Arc<TextureAsset>>>,
    /// Bind pose position of every bone, in model space.
    bone_positions: Vec<Vec3>,
}

impl<'a> PmxLoader<'a> {
    fn new(file: &'a PmxFile, base_path: &Path, params: &'a PmxLoadParams) -> Self {
        let bone_positions = file
            .bones
            .iter()
            .map(|bone| convert_position(bone.position))
            .collect();
        Self {
            file,
            params,
            texture_loader: TextureLoader::new(base_path, params.texture_size_limit),
            textures: HashMap::new(),
            bone_positions,
        }
    }

    fn bone_count(&self) -> usize {
        self.file.bones.len()
    }

    fn root_id(&self) -> NodeId {
        NodeId(self.bone_count())
    }

    fn primitive_node_id(&self, primitive_index: usize) -> NodeId {
        NodeId(self.bone_count() + 1 + primitive_index)
    }

    fn valid_bone(&self, index: Option<usize>) -> Option<usize> {
        index.filter(|index| *index < self.bone_count())
    }

    fn load_texture(&mut self, index: PmxIndex) -> Option<TextureInfo> {
        if !self.params.load_textures {
            return None;
        }
        let index = index.0?;
        let Some(texture) = self.file.textures.get(index) else {
            debug!("Material references missing texture #{}", index);
            return None;
        };
        if let Some(cached) = self.textures.get(&index) {
            return cached.clone().map(TextureInfo::from_texture);
        }
        let loaded = match self.texture_loader.load(&texture.path, SamplerAsset::default()) {
            Ok(texture) => Some(texture),
            Err(err) => {
                warn!("Failed to load texture {}: {}", texture.path, err);
                None
            }
        };
        self.textures.insert(index, loaded.clone());
        loaded.map(TextureInfo::from_texture)
    }

    fn load_material(&mut self, material: &PmxMaterial) -> Arc<MaterialAsset> {
        let texture = self.load_texture(material.texture_index);
        let environment = self.load_texture(material.environment_index);
        let toon_reference = match material.toon_reference {
            format::PmxToonReference::Texture { index } => {
                ToonReference::Texture(self.load_texture(index))
            }
            format::PmxToonReference::Internal { index } => ToonReference::Internal { index },
        };
        let flags = material.drawing_flags;

        Arc::new(MaterialAsset {
            name: Some(material.material_name_local.clone()),
            flags: MaterialFlags {
                no_cull: flags.no_cull(),
                ground_shadow: flags.ground_shadow(),
                draw_shadow: flags.draw_shadow(),
                receive_shadow: flags.receive_shadow(),
                has_edge: flags.has_edge(),
                vertex_color: flags.vertex_color(),
                point_drawing: flags.point_drawing(),
                line_drawing: flags.line_drawing(),
            },
            ambient_color: material.ambient_color,
            diffuse_color: material.diffuse_color,
            specular_color: material.specular_color,
            specular_strength: material.specular_strength,
            edge_color: material.edge_color,
            edge_scale: material.edge_scale,
            texture,
            environment,
            environment_blend_mode: match material.environment_blend_mode {
                format::PmxEnvironmentBlendMode::Disabled => EnvironmentBlendMode::Disabled,
                format::PmxEnvironmentBlendMode::Multiply => EnvironmentBlendMode::Multiply,
                format::PmxEnvironmentBlendMode::Additive => EnvironmentBlendMode::Additive,
                format::PmxEnvironmentBlendMode::AdditionalVec4 => {
                    EnvironmentBlendMode::AdditionalVec4
                }
            },
            toon_reference,
        })
    }

    fn push_vertex(&self, attributes: &mut PrimitiveAssetAttributes, index: usize) {
        let vertex = &self.file.vertices[index];
        let (joints, mut weights) = vertex.weight_deform.joints_and_weights();
        let mut joint_indices = [0u32; 4];
        for (slot, joint) in joints.iter().enumerate() {
            match self.valid_bone(*joint) {
                Some(joint) => joint_indices[slot] = joint as u32,
                None => weights[slot] = 0.0,
            }
        }
        attributes.position.push(convert_position(vertex.position).to_array());
        attributes.normal.push(convert_direction(vertex.normal).to_array());
        attributes.tex_coord.push(vertex.uv);
        attributes.joints.push(joint_indices);
        attributes.weights.push(weights);
    }

    fn load_primitives(&mut self) -> Result<Vec<MaterialPrimitive>, PmxLoadError> {
        let file = self.file;
        let vertex_count = file.vertices.len();
        let mut surfaces_next = file.surfaces.as_slice();
        let mut primitives = Vec::new();
        for (material_index, material) in file.materials.iter().enumerate() {
            let surface_count = material.surface_count as usize;
            if surfaces_next.len() < surface_count {
                return Err(PmxLoadError::NoSurfaceLeft {
                    expected: surface_count,
                    actual: surfaces_next.len(),
                });
            } else if surface_count % 3 != 0 {
                return Err(PmxLoadError::BadSurfacesCount(surface_count));
            }
            let (surfaces, surfaces_left) = surfaces_next.split_at(surface_count);
            surfaces_next = surfaces_left;

            if surface_count == 0 {
                warn!(
                    "Material {:?} has no surface, skipping",
                    material.material_name_local
                );
                continue;
            }

            let mut remap = HashMap::new();
            let mut attributes = PrimitiveAssetAttributes::default();
            let mut indices = Vec::with_capacity(surface_count);
            for triangle in surfaces.chunks_exact(3) {
                // Clockwise to counter-clockwise
                for surface in [triangle[0], triangle[2], triangle[1]] {
                    let index = match surface.0 {
                        Some(index) if index < vertex_count => index,
                        index => {
                            return Err(PmxLoadError::BadVertexIndex {
                                index,
                                count: vertex_count,
                            })
                        }
                    };
                    let local = *remap.entry(index).or_insert_with(|| {
                        self.push_vertex(&mut attributes, index);
                        (attributes.len() - 1) as u32
                    });
                    indices.push(local);
                }
            }

            let material_asset = self.load_material(material);
            primitives.push(MaterialPrimitive {
                material_index,
                primitive: PrimitiveAsset {
                    attributes,
                    indices,
                    material: Some(material_asset),
                    targets: vec![],
                },
                remap,
            });
        }
        Ok(primitives)
    }

    /// Build expressions, adding morph targets to the primitives they touch.
    fn load_expressions(&self, primitives: &mut [MaterialPrimitive]) -> Vec<ExpressionAsset> {
        let mut vertex_users: HashMap<usize, Vec<(usize, u32)>> = HashMap::new();
        for (primitive_index, primitive) in primitives.iter().enumerate() {
            for (global, local) in &primitive.remap {
                vertex_users
                    .entry(*global)
                    .or_default()
                    .push((primitive_index, *local));
            }
        }

        let mut expressions = Vec::new();
        let mut morph_to_expression: Vec<Option<usize>> =
            Vec::with_capacity(self.file.morphs.len());
        for (morph_index, morph) in self.file.morphs.iter().enumerate() {
            let name = Some(morph.morph_name_local.clone());
            let tag =
                ExpressionTag::from_names(&morph.morph_name_local, &morph.morph_name_universal);
            let expression = match &morph.offsets {
                PmxMorphOffsets::Vertex(offsets) => {
                    let bindings = load_vertex_morph(morph, offsets, &vertex_users, primitives);
                    Some(ExpressionAsset::Target {
                        name,
                        tag,
                        bindings,
                    })
                }
                PmxMorphOffsets::Group(offsets) => {
                    let mut targets = Vec::with_capacity(offsets.len());
                    for offset in offsets {
                        let resolved = offset
                            .morph_index
                            .0
                            .filter(|index| *index < morph_index)
                            .and_then(|index| morph_to_expression[index]);
                        match resolved {
                            Some(expression_index) => targets.push(GroupTarget {
                                expression_index,
                                influence: offset.influence,
                            }),
                            None => warn!(
                                "Group morph {:?} references morph {:?} which is not defined before it, dropping",
                                morph.morph_name_local, offset.morph_index.0
                            ),
                        }
                    }
                    Some(ExpressionAsset::Group { name, tag, targets })
                }
                PmxMorphOffsets::Skipped { morph_type, count } => {
                    debug!(
                        "Skipping unsupported {:?} morph {:?} with {} offsets",
                        morph_type, morph.morph_name_local, count
                    );
                    None
                }
            };
            morph_to_expression.push(expression.map(|expression| {
                expressions.push(expression);
                expressions.len() - 1
            }));
        }
        expressions
    }

    fn load_rigid_body(&self, body: &PmxRigidbody) -> (Option<usize>, RigidBodyAsset) {
        let bone = match self.valid_bone(body.related_bone_index.0) {
            Some(bone) => Some(bone),
            None if self.bone_count() > 0 => {
                warn!(
                    "Rigid body {:?} references invalid bone {:?}, attaching to first bone",
                    body.rigidbody_name_local, body.related_bone_index.0
                );
                Some(0)
            }
            None => None,
        };
        let origin = bone.map_or(Vec3::ZERO, |bone| self.bone_positions[bone]);
        let asset = RigidBodyAsset {
            name: Some(body.rigidbody_name_local.clone()),
            collision_group: body.group_id,
            no_collision_groups: body.no_collision_group,
            shape: match body.shape {
                format::PmxShapeType::Sphere => RigidBodyShapeType::Sphere,
                format::PmxShapeType::Box => RigidBodyShapeType::Box,
                format::PmxShapeType::Capsule => RigidBodyShapeType::Capsule,
            },
            shape_size: Vec3::from_array(body.shape_size) * MODEL_SCALE,
            shape_position: convert_position(body.shape_position) - origin,
            shape_rotation: convert_rotation(body.shape_rotation),
            mass: body.mass,
            move_attenuation: body.move_attenuation,
            rotation_damping: body.rotation_damping,
            repulsion: body.repulsion,
            friction_force: body.friction_force,
            physics_mode: match body.physics_mode {
                format::PmxPhysicsMode::FollowBone => RigidBodyPhysicsMode::FollowBone,
                format::PmxPhysicsMode::Physics => RigidBodyPhysicsMode::Physics,
                format::PmxPhysicsMode::PhysicsAndBone => RigidBodyPhysicsMode::PhysicsPlusBone,
            },
        };
        (bone, asset)
    }

    fn load_joint(&self, joint: &PmxJoint) -> Option<PhysicalJointAsset> {
        let body_count = self.file.rigidbodies.len();
        let (Some(rigid_body_a), Some(rigid_body_b)) = (
            joint.rigidbody_index_a.0.filter(|index| *index < body_count),
            joint.rigidbody_index_b.0.filter(|index| *index < body_count),
        ) else {
            warn!(
                "Joint {:?} references invalid rigid bodies {:?} and {:?}, dropping",
                joint.joint_name_local, joint.rigidbody_index_a.0, joint.rigidbody_index_b.0
            );
            return None;
        };
        let (position_min, position_max) =
            convert_position_range(joint.position_minimum, joint.position_maximum);
        let (rotation_min, rotation_max) =
            convert_rotation_range(joint.rotation_minimum, joint.rotation_maximum);
        Some(PhysicalJointAsset {
            name: Some(joint.joint_name_local.clone()),
            joint_type: match joint.joint_type {
                format::PmxJointType::Spring6dof => PhysicalJointType::Spring6Dof,
                format::PmxJointType::SixDof => PhysicalJointType::SixDof,
                format::PmxJointType::P2p => PhysicalJointType::PointToPoint,
                format::PmxJointType::ConeTwist => PhysicalJointType::ConeTwist,
                format::PmxJointType::Slider => PhysicalJointType::Slider,
                format::PmxJointType::Hinge => PhysicalJointType::Hinge,
            },
            rigid_body_a,
            rigid_body_b,
            position: convert_position(joint.position),
            rotation: convert_rotation(joint.rotation),
            position_min,
            position_max,
            rotation_min,
            rotation_max,
            position_spring: Vec3::from_array(joint.position_spring),
            rotation_spring: Vec3::from_array(joint.rotation_spring),
        })
    }

    fn load_ik(
        &self,
        bone_index: usize,
        bone: &PmxBone,
        ik_index: usize,
    ) -> Option<IkTargetComponent> {
        let ik = bone.ik.as_ref()?;
        let Some(effector) = self.valid_bone(ik.target_index.0) else {
            warn!(
                "IK bone {:?} has invalid effector {:?}, dropping",
                bone.bone_name_local, ik.target_index.0
            );
            return None;
        };
        let joints = ik
            .links
            .iter()
            .filter_map(|link| {
                let Some(node) = self.valid_bone(link.bone_index.0) else {
                    warn!(
                        "IK bone {} has invalid link {:?}, skipping link",
                        bone_index, link.bone_index.0
                    );
                    return None;
                };
                let limit = match &link.limits {
                    PmxBoneIkLinkLimit::None => None,
                    PmxBoneIkLinkLimit::Some {
                        limit_min,
                        limit_max,
                    } => {
                        let (min, max) = convert_rotation_range(*limit_min, *limit_max);
                        Some(IkJointLimit { min, max })
                    }
                };
                Some(IkJoint {
                    node: NodeId(node),
                    limit,
                })
            })
            .collect();
        Some(IkTargetComponent {
            ik_index,
            effector: NodeId(effector),
            joints,
            loop_count: ik.loop_count as u32,
            limit_radian: ik.limit_radian,
        })
    }

    /// Components every bone carries, indexed by bone.
    fn load_bone_components(&self) -> Vec<Vec<NodeComponent>> {
        let bones = &self.file.bones;
        let mut components: Vec<Vec<NodeComponent>> = (0..bones.len())
            .map(|index| {
                vec![NodeComponent::Joint(JointComponent {
                    skin_index: 0,
                    joint_index: index,
                })]
            })
            .collect();

        let mut ik_count = 0;
        for (index, bone) in bones.iter().enumerate() {
            if let Some(ik) = self.load_ik(index, bone, ik_count) {
                components[index].push(NodeComponent::IkTarget(ik));
                ik_count += 1;
            }
        }

        let mut influence_count = 0;
        for (index, bone) in bones.iter().enumerate() {
            let Some(inherit) = &bone.inherit_parent else {
                continue;
            };
            match self.valid_bone(inherit.inherit_parent_index.0) {
                Some(source) if source != index => {
                    components[source].push(NodeComponent::InfluenceSource(
                        InfluenceSourceComponent {
                            influence_index: influence_count,
                            target: NodeId(index),
                            influence: inherit.inherit_parent_influence,
                            influence_rotation: bone.flags.inherit_rotation(),
                            influence_translation: bone.flags.inherit_translation(),
                            append_local: bone.flags.inherit_local(),
                        },
                    ));
                    influence_count += 1;
                }
                source => warn!(
                    "Bone {:?} inherits from invalid bone {:?}, ignoring",
                    bone.bone_name_local, source
                ),
            }
        }
        components
    }

    fn bone_node(
        &self,
        index: usize,
        parent: Option<usize>,
        children: &[Vec<usize>],
        components: &mut [Vec<NodeComponent>],
    ) -> NodeAsset {
        let bone = &self.file.bones[index];
        let parent_position = parent.map_or(Vec3::ZERO, |parent| self.bone_positions[parent]);
        NodeAsset {
            id: NodeId(index),
            name: Some(bone.bone_name_local.clone()),
            humanoid_tag: HumanoidTag::from_pmx_bone_name(&bone.bone_name_local),
            transform: Some(
                DecomposedTransform::from_translation(self.bone_positions[index] - parent_position)
                    .into(),
            ),
            components: std::mem::take(&mut components[index]),
            children: children[index]
                .iter()
                .map(|child| self.bone_node(*child, Some(index), children, components))
                .collect(),
        }
    }

    fn load_bone_nodes(
        &self,
        mut components: Vec<Vec<NodeComponent>>,
    ) -> Result<Vec<NodeAsset>, PmxLoadError> {
        let bones = &self.file.bones;
        let mut children = vec![Vec::new(); bones.len()];
        let mut roots = Vec::new();
        for (index, bone) in bones.iter().enumerate() {
            match bone.parent_bone_index.0 {
                Some(parent) if parent < bones.len() => children[parent].push(index),
                Some(parent) => {
                    warn!(
                        "Bone {:?} has invalid parent {}, treating as root",
                        bone.bone_name_local, parent
                    );
                    roots.push(index);
                }
                None => roots.push(index),
            }
        }

        // Bones on a parent cycle are unreachable from any root.
        let mut reachable = vec![false; bones.len()];
        let mut stack = roots.clone();
        while let Some(index) = stack.pop() {
            reachable[index] = true;
            stack.extend_from_slice(&children[index]);
        }
        if let Some(bone) = reachable.iter().position(|reachable| !reachable) {
            return Err(PmxLoadError::BadBoneHierarchy { bone });
        }

        Ok(roots
            .into_iter()
            .map(|root| self.bone_node(root, None, &children, &mut components))
            .collect())
    }

    fn load_skin(&self) -> Result<Option<SkinAsset>, PmxLoadError> {
        if self.file.bones.is_empty() {
            return Ok(None);
        }
        let joints = (0..self.bone_count()).map(NodeId).collect();
        let inverse_bind_matrices = self
            .bone_positions
            .iter()
            .map(|position| Mat4::from_translation(-*position))
            .collect();
        let humanoid_tags = self
            .file
            .bones
            .iter()
            .map(|bone| HumanoidTag::from_pmx_bone_name(&bone.bone_name_local))
            .collect();
        Ok(Some(SkinAsset::new(
            Some(self.file.header.model_name_local.clone()),
            joints,
            inverse_bind_matrices,
            humanoid_tags,
        )?))
    }

    fn camera_node(&self, id: NodeId) -> NodeAsset {
        let mut node = NodeAsset::new(id);
        node.name = Some(String::from("Camera"));
        // Looking at the model's front from the default MMD viewpoint.
        node.transform = Some(
            DecomposedTransform {
                translation: Vec3::new(0.0, 10.0, -45.0) * MODEL_SCALE,
                rotation: Quat::from_rotation_y(std::f32::consts::PI),
                scale: Vec3::ONE,
            }
            .into(),
        );
        node.components.push(NodeComponent::Camera(CameraComponent {
            camera_index: 0,
            camera: CameraAsset::default(),
        }));
        node
    }

    fn metadata(&self) -> ModelMetadata {
        let file = self.file;
        ModelMetadata {
            version: file.header.version,
            name_local: file.header.model_name_local.clone(),
            name_universal: file.header.model_name_universal.clone(),
            comment_local: file.header.comments_local.clone(),
            comment_universal: file.header.comments_universal.clone(),
            vertex_count: file.vertices.len(),
            triangle_count: file.surfaces.len() / 3,
            texture_count: file.textures.len(),
            material_count: file.materials.len(),
            bone_count: file.bones.len(),
            morph_count: file.morphs.len(),
            display_frame_count: file.display_frames.len(),
            rigid_body_count: file.rigidbodies.len(),
            joint_count: file.joints.len(),
        }
    }

    fn load(mut self) -> Result<(ModelAsset, ModelMetadata), PmxLoadError> {
        let file = self.file;
        let mut primitives = self.load_primitives()?;
        let expressions = self.load_expressions(&mut primitives);
        let skin = self.load_skin()?;
        let skin_index = skin.as_ref().map(|_| 0);

        let mut bone_components = self.load_bone_components();
        let mut root_components = Vec::new();
        for (index, body) in file.rigidbodies.iter().enumerate() {
            let (bone, rigid_body) = self.load_rigid_body(body);
            let component = NodeComponent::RigidBody(RigidBodyComponent {
                rigid_body_index: index,
                rigid_body,
            });
            match bone {
                Some(bone) => bone_components[bone].push(component),
                None => root_components.push(component),
            }
        }
        let physical_joints: Vec<_> = file
            .joints
            .iter()
            .filter_map(|joint| self.load_joint(joint))
            .collect();

        let mut root = NodeAsset::new(self.root_id());
        root.name = Some(file.header.model_name_local.clone());
        root.components = root_components;
        root.children = self.load_bone_nodes(bone_components)?;
        let primitive_count = primitives.len();
        for (primitive_index, primitive) in primitives.into_iter().enumerate() {
            let mut node = NodeAsset::new(self.primitive_node_id(primitive_index));
            node.name = Some(
                file.materials[primitive.material_index]
                    .material_name_local
                    .clone(),
            );
            node.components
                .push(NodeComponent::Primitive(PrimitiveComponent {
                    primitive_index,
                    primitive: Arc::new(primitive.primitive),
                    skin_index,
                }));
            root.children.push(node);
        }
        if self.params.default_camera {
            let id = self.primitive_node_id(primitive_count);
            root.children.push(self.camera_node(id));
        }

        let metadata = self.metadata();
        debug!(
            "Loaded PMX {:?}: {} vertices, {} materials ({} drawn), {} bones, {} morphs, {} rigid bodies, {} joints",
            metadata.name_local,
            metadata.vertex_count,
            metadata.material_count,
            primitive_count,
            metadata.bone_count,
            metadata.morph_count,
            metadata.rigid_body_count,
            physical_joints.len(),
        );

        let scene = SceneAsset {
            name: Some(file.header.model_name_local.clone()),
            root,
        };
        let model = ModelAsset::new(
            vec![scene],
            Some(0),
            skin.into_iter().collect(),
            physical_joints,
            expressions,
        )?;
        Ok((model, metadata))
    }
}

fn load_vertex_morph(
    morph: &PmxMorph,
    offsets: &[format::PmxVertexMorphData],
    vertex_users: &HashMap<usize, Vec<(usize, u32)>>,
    primitives: &mut [MaterialPrimitive],
) -> Vec<MorphTargetBinding> {
    let mut deltas: HashMap<usize, Vec<[f32; 3]>> = HashMap::new();
    for offset in offsets {
        let Some(users) = offset.vertex_index.0.and_then(|index| vertex_users.get(&index)) else {
            continue;
        };
        let delta = convert_position(offset.translation);
        for (primitive_index, local) in users {
            let target = deltas.entry(*primitive_index).or_insert_with(|| {
                vec![[0.0; 3]; primitives[*primitive_index].primitive.vertex_count()]
            });
            let slot = &mut target[*local as usize];
            *slot = (Vec3::from_array(*slot) + delta).to_array();
        }
    }

    let mut affected: Vec<_> = deltas.into_iter().collect();
    affected.sort_by_key(|(primitive_index, _)| *primitive_index);
    affected
        .into_iter()
        .map(|(primitive_index, position)| {
            let targets = &mut primitives[primitive_index].primitive.targets;
            targets.push(PrimitiveAssetMorphTarget {
                name: Some(morph.morph_name_local.clone()),
                position,
            });
            MorphTargetBinding {
                primitive_index,
                target_index: targets.len() - 1,
            }
        })
        .collect()
}

/// Decode a PMX file. Textures are resolved against `base_path`.
pub fn load(
    bytes: &[u8],
    base_path: impl AsRef<Path>,
    params: &PmxLoadParams,
) -> Result<(ModelAsset, ModelMetadata), PmxLoadError> {
    let file = PmxFile::read(&mut Cursor::new(bytes))?;
    PmxLoader::new(&file, base_path.as_ref(), params).load()
}

/// Read and decode a PMX file from disk, resolving textures next to it.
pub fn load_file(
    path: impl AsRef<Path>,
    params: &PmxLoadParams,
) -> Result<(ModelAsset, ModelMetadata), PmxLoadError> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len();
    let bytes = if size <= MAX_MAPPED_FILE_SIZE {
        std::fs::read(path)?
    } else {
        let mut buffer = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut buffer)?;
        buffer
    };
    let base_path = path.parent().unwrap_or_else(|| Path::new("."));
    load(&bytes, base_path, params)
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;
    use crate::{
        node::NodeTransform,
        testing::{PmxBuilder, TestBone, TestDeform, TestMaterial, TestMorph, TestMorphKind},
    };

    fn params() -> PmxLoadParams {
        PmxLoadParams {
            load_textures: false,
            ..Default::default()
        }
    }

    fn load_builder(builder: &PmxBuilder) -> Result<(ModelAsset, ModelMetadata), PmxLoadError> {
        let _ = env_logger::builder().is_test(true).try_init();
        load(&builder.build(), ".", &params())
    }

    fn primitives(model: &ModelAsset) -> Vec<Arc<PrimitiveAsset>> {
        let mut primitives = Vec::new();
        model.default_scene().root.walk(&mut |node| {
            for component in &node.components {
                if let NodeComponent::Primitive(primitive) = component {
                    primitives.push(primitive.primitive.clone());
                }
            }
        });
        primitives
    }

    fn find_node<'a>(root: &'a NodeAsset, id: NodeId) -> Option<&'a NodeAsset> {
        let mut found = None;
        root.walk(&mut |node| {
            if node.id == id {
                found = Some(node);
            }
        });
        found
    }

    #[test]
    fn test_minimal_round_trip() {
        let builder = PmxBuilder::minimal();
        let (model, metadata) = load_builder(&builder).unwrap();
        assert_eq!(model.scenes().len(), 1);
        assert_eq!(model.skins.len(), 1);
        assert_eq!(model.skins[0].len(), 1);
        assert_eq!(metadata.bone_count, 1);

        let primitives = primitives(&model);
        assert_eq!(primitives.len(), 1);
        let position = Vec3::from_array(primitives[0].attributes.position[0]);
        let input = builder.vertices[0].position;
        let expected = Vec3::new(-input[0], input[1], input[2]) * MODEL_SCALE;
        assert!(position.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_utf8_and_utf16_names() {
        for utf8 in [false, true] {
            let mut builder = PmxBuilder::minimal();
            builder.utf8 = utf8;
            builder.bones[0].name = String::from("頭");
            let (model, _) = load_builder(&builder).unwrap();
            let head = find_node(&model.default_scene().root, NodeId(0)).unwrap();
            assert_eq!(head.name.as_deref(), Some("頭"));
            assert_eq!(head.humanoid_tag, Some(HumanoidTag::Head));
        }
    }

    #[test]
    fn test_bad_signature_and_version() {
        let mut bytes = PmxBuilder::minimal().build();
        bytes[0] = b'X';
        assert!(matches!(
            load(&bytes, ".", &params()),
            Err(PmxLoadError::Format(_))
        ));

        let mut builder = PmxBuilder::minimal();
        builder.version = 1.0;
        assert!(matches!(load_builder(&builder), Err(PmxLoadError::Format(_))));
    }

    #[test]
    fn test_truncated_file() {
        let bytes = PmxBuilder::minimal().build();
        for length in [4, 20, bytes.len() - 1] {
            assert!(load(&bytes[..length], ".", &params()).is_err());
        }
    }

    #[test]
    fn test_no_parent_sentinel_for_all_widths() {
        for width in [1, 2, 4] {
            let mut builder = PmxBuilder::minimal();
            builder.bone_index_size = width;
            builder.bones.push(TestBone::new("child", [0.0, 1.0, 0.0], 0));
            builder.bones.push(TestBone::new("other root", [1.0, 0.0, 0.0], -1));
            let (model, _) = load_builder(&builder).unwrap();
            let root = &model.default_scene().root;
            let root_bones: Vec<_> = root
                .children
                .iter()
                .filter(|node| node.id.0 < 3)
                .map(|node| node.id)
                .collect();
            assert_eq!(root_bones, vec![NodeId(0), NodeId(2)], "width {}", width);
            assert_eq!(root.children[0].children[0].id, NodeId(1));
        }
    }

    #[test]
    fn test_wide_vertex_index_is_unsigned() {
        let mut builder = PmxBuilder::minimal();
        builder.vertex_index_size = 1;
        let vertex = builder.vertices[0].clone();
        builder.vertices = vec![vertex; 256];
        builder.triangles = vec![[255, 254, 0]];
        let (model, _) = load_builder(&builder).unwrap();
        assert_eq!(primitives(&model)[0].vertex_count(), 3);
    }

    #[test]
    fn test_deform_weight_sums() {
        let deforms = [
            (TestDeform::Bdef1(0), 1.0),
            (TestDeform::Bdef1(-1), 0.0),
            (TestDeform::Bdef2(0, 1, 0.3), 1.0),
            (TestDeform::Bdef4([0, 1, -1, 1], [0.1, 0.2, 0.3, 0.4]), 0.7),
            (TestDeform::Sdef(1, 0, 0.6), 1.0),
            (TestDeform::Qdef([-1, -1, 0, 1], [0.1, 0.2, 0.3, 0.4]), 0.7),
        ];
        for (deform, expected) in deforms {
            let mut builder = PmxBuilder::minimal();
            builder.bones.push(TestBone::new("child", [0.0, 1.0, 0.0], 0));
            builder.vertices[0].deform = deform.clone();
            let (model, _) = load_builder(&builder).unwrap();
            let weights = primitives(&model)[0].attributes.weights[0];
            let sum: f32 = weights.iter().sum();
            assert!((sum - expected).abs() < 1e-6, "{:?}: {}", deform, sum);
        }
    }

    #[test]
    fn test_material_surface_counts() {
        let mut builder = PmxBuilder::minimal();
        builder.materials[0].surface_count = 2;
        assert!(matches!(
            load_builder(&builder),
            Err(PmxLoadError::BadSurfacesCount(2))
        ));

        let mut builder = PmxBuilder::minimal();
        builder.materials[0].surface_count = 6;
        assert!(matches!(
            load_builder(&builder),
            Err(PmxLoadError::NoSurfaceLeft { .. })
        ));

        let mut builder = PmxBuilder::minimal();
        builder.materials.insert(0, TestMaterial::new("empty", 0));
        let (model, metadata) = load_builder(&builder).unwrap();
        assert_eq!(metadata.material_count, 2);
        let primitives = primitives(&model);
        assert_eq!(primitives.len(), 1);
        assert_eq!(
            primitives[0].material.as_ref().unwrap().name.as_deref(),
            Some("material")
        );
    }

    #[test]
    fn test_winding_and_remap() {
        let mut builder = PmxBuilder::minimal();
        let vertex = builder.vertices[0].clone();
        builder.vertices = vec![vertex; 6];
        builder.triangles = vec![[0, 1, 2], [5, 4, 3]];
        builder.materials = vec![TestMaterial::new("a", 3), TestMaterial::new("b", 3)];
        let (model, _) = load_builder(&builder).unwrap();
        let primitives = primitives(&model);
        assert_eq!(primitives[0].indices, vec![0, 1, 2]);
        // Source (5, 4, 3) is stored as (5, 3, 4), remapped by first use.
        assert_eq!(primitives[1].indices, vec![0, 1, 2]);
        assert_eq!(primitives[1].vertex_count(), 3);
    }

    #[test]
    fn test_bad_vertex_index() {
        let mut builder = PmxBuilder::minimal();
        builder.triangles = vec![[0, 0, 7]];
        assert!(matches!(
            load_builder(&builder),
            Err(PmxLoadError::BadVertexIndex { .. })
        ));
    }

    #[test]
    fn test_bone_cycle_rejected() {
        let mut builder = PmxBuilder::minimal();
        builder.bones.push(TestBone::new("a", [0.0; 3], 2));
        builder.bones.push(TestBone::new("b", [0.0; 3], 1));
        assert!(matches!(
            load_builder(&builder),
            Err(PmxLoadError::BadBoneHierarchy { .. })
        ));
    }

    #[test]
    fn test_bone_relative_translation_and_skin() {
        let mut builder = PmxBuilder::minimal();
        builder.bones[0].position = [0.0, 10.0, 0.0];
        builder.bones.push(TestBone::new("child", [2.0, 15.0, 0.0], 0));
        let (model, _) = load_builder(&builder).unwrap();
        let child = find_node(&model.default_scene().root, NodeId(1)).unwrap();
        let Some(NodeTransform::Decomposed(transform)) = child.transform else {
            panic!("child has no decomposed transform");
        };
        assert!(transform
            .translation
            .abs_diff_eq(Vec3::new(-2.0, 5.0, 0.0) * MODEL_SCALE, 1e-6));
        let inverse_bind = model.skins[0].inverse_bind_matrices()[1];
        assert!(inverse_bind
            .transform_point3(Vec3::new(-2.0, 15.0, 0.0) * MODEL_SCALE)
            .abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_morphs_and_groups() {
        let mut builder = PmxBuilder::minimal();
        builder.morphs = vec![
            TestMorph::new("まばたき", TestMorphKind::Vertex(vec![(0, [1.0, 0.0, 0.0])])),
            TestMorph::new("bone", TestMorphKind::Bone(2)),
            TestMorph::new("uv", TestMorphKind::Uv(3, 1)),
            TestMorph::new("material", TestMorphKind::Material(1)),
            TestMorph::new("flip", TestMorphKind::Flip(1)),
            TestMorph::new("impulse", TestMorphKind::Impulse(1)),
            TestMorph::new("group", TestMorphKind::Group(vec![(0, 0.5), (1, 1.0), (7, 1.0)])),
            TestMorph::new("あ", TestMorphKind::Vertex(vec![])),
        ];
        let (model, _) = load_builder(&builder).unwrap();
        assert_eq!(model.expressions.len(), 3);

        let ExpressionAsset::Target { tag, bindings, .. } = &model.expressions[0] else {
            panic!("first expression should be a target");
        };
        assert_eq!(*tag, Some(ExpressionTag::Blink));
        assert_eq!(
            bindings,
            &vec![MorphTargetBinding {
                primitive_index: 0,
                target_index: 0
            }]
        );
        let primitive = &primitives(&model)[0];
        assert!(Vec3::from_array(primitive.targets[0].position[0])
            .abs_diff_eq(Vec3::new(-MODEL_SCALE, 0.0, 0.0), 1e-6));

        let ExpressionAsset::Group { targets, .. } = &model.expressions[1] else {
            panic!("second expression should be a group");
        };
        assert_eq!(
            targets,
            &vec![GroupTarget {
                expression_index: 0,
                influence: 0.5
            }]
        );
        assert_eq!(model.expressions[2].tag(), Some(ExpressionTag::Aa));
    }

    #[test]
    fn test_ik_and_influence_components() {
        let mut builder = PmxBuilder::minimal();
        builder.bones.push(TestBone::new("knee", [0.0, 5.0, 0.0], 0));
        builder.bones.push(TestBone::new("ankle", [0.0, 1.0, 0.0], 1));
        let mut ik = TestBone::new("ik", [0.0, 1.0, 0.0], 0);
        ik.ik = Some(crate::testing::TestIk {
            target: 2,
            loop_count: 40,
            limit_radian: 2.0,
            links: vec![(1, Some(([-3.0, -0.1, -0.2], [-0.5, 0.3, 0.4]))), (0, None)],
        });
        builder.bones.push(ik);
        let mut follower = TestBone::new("follower", [0.0, 2.0, 0.0], 0);
        follower.inherit = Some(crate::testing::TestInherit {
            parent: 1,
            influence: 0.5,
            rotation: true,
            translation: false,
            local: true,
        });
        builder.bones.push(follower);

        let (model, _) = load_builder(&builder).unwrap();
        let root = &model.default_scene().root;
        let ik_node = find_node(root, NodeId(3)).unwrap();
        let ik = ik_node
            .components
            .iter()
            .find_map(|component| match component {
                NodeComponent::IkTarget(ik) => Some(ik),
                _ => None,
            })
            .unwrap();
        assert_eq!(ik.effector, NodeId(2));
        assert_eq!(ik.loop_count, 40);
        assert_eq!(ik.joints.len(), 2);
        let limit = ik.joints[0].limit.unwrap();
        assert_eq!(limit.min, Vec3::new(-3.0, -0.3, -0.4));
        assert_eq!(limit.max, Vec3::new(-0.5, 0.1, 0.2));

        let knee = find_node(root, NodeId(1)).unwrap();
        let influence = knee
            .components
            .iter()
            .find_map(|component| match component {
                NodeComponent::InfluenceSource(influence) => Some(influence),
                _ => None,
            })
            .unwrap();
        assert_eq!(influence.target, NodeId(4));
        assert_eq!(influence.influence, 0.5);
        assert!(influence.influence_rotation && !influence.influence_translation);
        assert!(influence.append_local);
    }

    #[test]
    fn test_rigid_bodies_and_joints() {
        let mut builder = PmxBuilder::minimal();
        builder.bones[0].position = [0.0, 10.0, 0.0];
        builder.rigid_bodies = vec![
            crate::testing::TestRigidBody::new("a", 0, [0.0, 12.0, 0.0]),
            crate::testing::TestRigidBody::new("invalid bone", 9, [0.0, 10.0, 0.0]),
        ];
        builder.joints = vec![
            crate::testing::TestJoint::new("ok", 0, 1),
            crate::testing::TestJoint::new("broken", 0, 5),
        ];
        let (model, _) = load_builder(&builder).unwrap();
        assert_eq!(model.physical_joints.len(), 1);
        assert_eq!(model.physical_joints[0].joint_type, PhysicalJointType::Spring6Dof);

        let bone = find_node(&model.default_scene().root, NodeId(0)).unwrap();
        let bodies: Vec<_> = bone
            .components
            .iter()
            .filter_map(|component| match component {
                NodeComponent::RigidBody(body) => Some(body),
                _ => None,
            })
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0]
            .rigid_body
            .shape_position
            .abs_diff_eq(Vec3::new(0.0, 2.0, 0.0) * MODEL_SCALE, 1e-6));
        assert_eq!(bodies[1].rigid_body_index, 1);
    }

    #[test]
    fn test_rigid_body_without_bones_on_root() {
        let mut builder = PmxBuilder::minimal();
        builder.bones.clear();
        builder.vertices[0].deform = TestDeform::Bdef1(-1);
        builder.rigid_bodies = vec![crate::testing::TestRigidBody::new("a", -1, [0.0; 3])];
        let (model, _) = load_builder(&builder).unwrap();
        assert!(model.skins.is_empty());
        let root = &model.default_scene().root;
        assert!(matches!(root.components[0], NodeComponent::RigidBody(_)));
    }

    #[test]
    fn test_missing_texture_degrades() {
        let mut builder = PmxBuilder::minimal();
        builder.textures = vec![String::from("tex\\missing.png")];
        builder.materials[0].texture = 0;
        let _ = env_logger::builder().is_test(true).try_init();
        let (model, _) = load(&builder.build(), ".", &PmxLoadParams::default()).unwrap();
        assert!(primitives(&model)[0].material.as_ref().unwrap().texture.is_none());
    }

    #[test]
    fn test_default_camera() {
        let (model, _) = load_builder(&PmxBuilder::minimal()).unwrap();
        let last = model.default_scene().root.children.last().unwrap();
        assert!(matches!(last.components[0], NodeComponent::Camera(_)));

        let mut params = params();
        params.default_camera = false;
        let (model, _) = load(&PmxBuilder::minimal().build(), ".", &params).unwrap();
        let last = model.default_scene().root.children.last().unwrap();
        assert!(matches!(last.components[0], NodeComponent::Primitive(_)));
    }
}
