use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    fs, io,
    io::Cursor,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use log::debug;

use crate::texture::{SamplerAsset, TextureAsset, TextureAssetFormat};

#[derive(Debug)]
pub enum TextureLoadError {
    Io(io::Error),
    Image(ImageError),
    TooLarge { size: u64, limit: u64 },
    NotFound(String),
}

impl Display for TextureLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TextureLoadError::Io(err) => Display::fmt(&err, f),
            TextureLoadError::Image(err) => Display::fmt(&err, f),
            TextureLoadError::TooLarge { size, limit } => {
                write!(f, "Texture of {} bytes exceeds limit of {} bytes", size, limit)
            }
            TextureLoadError::NotFound(path) => write!(f, "Texture {} not found", path),
        }
    }
}

impl Error for TextureLoadError {}

impl From<ImageError> for TextureLoadError {
    fn from(value: ImageError) -> Self {
        TextureLoadError::Image(value)
    }
}

impl From<io::Error> for TextureLoadError {
    fn from(value: io::Error) -> Self {
        TextureLoadError::Io(value)
    }
}

/// Split a path declared inside a model file, accepting both separators.
fn split_declared_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Find `name` in `dir`, falling back to a case-insensitive match.
fn find_entry(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.exists() {
        return Some(exact);
    }
    let lower = name.to_lowercase();
    fs::read_dir(dir).ok()?.flatten().find_map(|entry| {
        let file_name = entry.file_name();
        if file_name.to_string_lossy().to_lowercase() == lower {
            Some(entry.path())
        } else {
            None
        }
    })
}

pub fn resolve_path(base: &Path, declared: &str) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for part in split_declared_path(declared) {
        if part == ".." {
            current.push(Component::ParentDir);
            continue;
        }
        current = find_entry(&current, part)?;
    }
    Some(current)
}

pub struct TextureLoader {
    base_path: PathBuf,
    size_limit: u64,
    texture_cache: HashMap<PathBuf, Arc<TextureAsset>>,
}

impl TextureLoader {
    pub fn new(base_path: impl Into<PathBuf>, size_limit: u64) -> Self {
        Self {
            base_path: base_path.into(),
            size_limit,
            texture_cache: HashMap::new(),
        }
    }

    pub fn load_image(name: String, image: DynamicImage, sampler: SamplerAsset) -> TextureAsset {
        let (dimensions, buffer, format) = match image {
            DynamicImage::ImageRgb8(image) => (
                image.dimensions(),
                image.into_vec(),
                TextureAssetFormat::Rgbu8,
            ),
            DynamicImage::ImageRgba8(image) => (
                image.dimensions(),
                image.into_vec(),
                TextureAssetFormat::Rgbau8,
            ),
            DynamicImage::ImageRgb16(image) => (
                image.dimensions(),
                image
                    .into_vec()
                    .into_iter()
                    .flat_map(|item| item.to_le_bytes())
                    .collect(),
                TextureAssetFormat::Rgbu16,
            ),
            DynamicImage::ImageRgba16(image) => (
                image.dimensions(),
                image
                    .into_vec()
                    .into_iter()
                    .flat_map(|item| item.to_le_bytes())
                    .collect(),
                TextureAssetFormat::Rgbau16,
            ),
            _ => (
                image.dimensions(),
                image.into_rgba8().into_vec(),
                TextureAssetFormat::Rgbau8,
            ),
        };

        TextureAsset {
            name,
            size: dimensions,
            format,
            data: buffer,
            sampler,
        }
    }

    pub fn load_from_buffer(
        &self,
        name: String,
        buffer: &[u8],
        sampler: SamplerAsset,
    ) -> Result<TextureAsset, TextureLoadError> {
        if buffer.len() as u64 > self.size_limit {
            return Err(TextureLoadError::TooLarge {
                size: buffer.len() as u64,
                limit: self.size_limit,
            });
        }
        let reader = ImageReader::new(Cursor::new(buffer));
        let image = reader.with_guessed_format()?.decode()?;
        Ok(Self::load_image(name, image, sampler))
    }

    /// Load a texture by the path declared in the model, relative to the base path.
    pub fn load(
        &mut self,
        declared: &str,
        sampler: SamplerAsset,
    ) -> Result<Arc<TextureAsset>, TextureLoadError> {
        let path = resolve_path(&self.base_path, declared)
            .ok_or_else(|| TextureLoadError::NotFound(declared.to_string()))?;
        if let Some(texture) = self.texture_cache.get(&path) {
            return Ok(texture.clone());
        }

        let size = fs::metadata(&path)?.len();
        if size > self.size_limit {
            return Err(TextureLoadError::TooLarge {
                size,
                limit: self.size_limit,
            });
        }
        let buffer = fs::read(&path)?;
        let texture = Arc::new(self.load_from_buffer(declared.to_string(), &buffer, sampler)?);
        debug!(
            "Loaded texture {} ({}x{})",
            path.display(),
            texture.size.0,
            texture.size.1
        );

        self.texture_cache.insert(path, texture.clone());
        Ok(texture)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "blazerod-texture-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_split_mixed_separators() {
        assert_eq!(split_declared_path("tex\\sub/a.png"), vec!["tex", "sub", "a.png"]);
    }

    #[test]
    fn test_case_insensitive_resolution() {
        let dir = temp_dir("case");
        fs::create_dir_all(dir.join("Tex")).unwrap();
        write_png(&dir.join("Tex").join("Body.png"));

        let mut loader = TextureLoader::new(&dir, u64::MAX);
        let texture = loader
            .load("tex\\body.PNG", SamplerAsset::default())
            .unwrap();
        assert_eq!(texture.size, (2, 2));
        assert_eq!(texture.format, TextureAssetFormat::Rgbau8);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_and_oversized() {
        let dir = temp_dir("limit");
        write_png(&dir.join("a.png"));

        let mut loader = TextureLoader::new(&dir, 8);
        assert!(matches!(
            loader.load("missing.png", SamplerAsset::default()),
            Err(TextureLoadError::NotFound(_))
        ));
        assert!(matches!(
            loader.load("a.png", SamplerAsset::default()),
            Err(TextureLoadError::TooLarge { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
