use crate::texture::TextureInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentBlendMode {
    #[default]
    Disabled,
    Multiply,
    Additive,
    AdditionalVec4,
}

/// Toon ramp used by a material.
#[derive(Debug, Clone)]
pub enum ToonReference {
    /// A texture declared by the model. `None` if it could not be loaded.
    Texture(Option<TextureInfo>),
    /// One of the ten built-in toon ramps.
    Internal { index: u8 },
}

/// Drawing switches of a material, decoded from the packed flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialFlags {
    pub no_cull: bool,
    pub ground_shadow: bool,
    pub draw_shadow: bool,
    pub receive_shadow: bool,
    pub has_edge: bool,
    pub vertex_color: bool,
    pub point_drawing: bool,
    pub line_drawing: bool,
}

/// Lighting model in MikuMikuDance.
#[derive(Debug, Clone)]
pub struct MaterialAsset {
    pub name: Option<String>,
    pub flags: MaterialFlags,
    pub ambient_color: [f32; 3],
    pub diffuse_color: [f32; 4],
    pub specular_color: [f32; 3],
    pub specular_strength: f32,
    pub edge_color: [f32; 4],
    pub edge_scale: f32,
    pub texture: Option<TextureInfo>,
    pub environment: Option<TextureInfo>,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub toon_reference: ToonReference,
}
