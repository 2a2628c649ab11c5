use std::sync::Arc;

use crate::material::MaterialAsset;

pub type Position = Vec<[f32; 3]>;
pub type Normal = Vec<[f32; 3]>;
pub type TexCoord = Vec<[f32; 2]>;
pub type Joints = Vec<[u32; 4]>;
pub type Weights = Vec<[f32; 4]>;

/// Per-vertex attributes. Every list has one entry per vertex.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveAssetAttributes {
    pub position: Position,
    pub normal: Normal,
    pub tex_coord: TexCoord,
    pub joints: Joints,
    pub weights: Weights,
}

impl PrimitiveAssetAttributes {
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }
}

/// Position offsets of a vertex morph, one per vertex of the primitive.
#[derive(Debug, Clone)]
pub struct PrimitiveAssetMorphTarget {
    pub name: Option<String>,
    pub position: Position,
}

/// A triangle list drawn with a single material.
#[derive(Debug, Clone)]
pub struct PrimitiveAsset {
    pub attributes: PrimitiveAssetAttributes,
    pub indices: Vec<u32>,
    pub material: Option<Arc<MaterialAsset>>,
    pub targets: Vec<PrimitiveAssetMorphTarget>,
}

impl PrimitiveAsset {
    pub fn vertex_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|triangle| [triangle[0], triangle[1], triangle[2]])
    }
}
