use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAssetFormat {
    Rgbu8,
    Rgbau8,
    Rgbu16,
    Rgbau16,
}

impl TextureAssetFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureAssetFormat::Rgbu8 => 3,
            TextureAssetFormat::Rgbau8 => 4,
            TextureAssetFormat::Rgbu16 => 6,
            TextureAssetFormat::Rgbau16 => 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureAsset {
    /// Path of the texture relative to the model, as declared in the model.
    pub name: String,
    pub size: (u32, u32),
    pub format: TextureAssetFormat,
    pub data: Vec<u8>,
    pub sampler: SamplerAsset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMagFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMinFilter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureWrappingMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

#[derive(Debug, Clone, Default)]
pub struct SamplerAsset {
    pub mag_filter: TextureMagFilter,
    pub min_filter: TextureMinFilter,
    pub wrap_x: TextureWrappingMode,
    pub wrap_y: TextureWrappingMode,
}

#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub texture: Arc<TextureAsset>,
    pub tex_coord: usize,
}

impl TextureInfo {
    pub(crate) fn from_texture(texture: Arc<TextureAsset>) -> Self {
        Self {
            texture,
            tex_coord: 0,
        }
    }
}
