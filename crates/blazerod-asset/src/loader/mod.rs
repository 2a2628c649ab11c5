#[cfg(feature = "pmx")]
/// PMX 2.0 and 2.1 loader.
pub mod pmx;

pub mod texture;

/// Scale from MMD units to world units.
pub const MODEL_SCALE: f32 = 0.08;

/// Textures larger than this are skipped.
pub const MAX_TEXTURE_SIZE: u64 = 256 * 1024 * 1024;

/// Model files up to this size are read in a single call.
pub const MAX_MAPPED_FILE_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PmxLoadParams {
    /// Decode textures referenced by materials. Disable for headless use.
    pub load_textures: bool,
    pub texture_size_limit: u64,
    /// Append a camera node to the scene.
    pub default_camera: bool,
}

impl Default for PmxLoadParams {
    fn default() -> Self {
        Self {
            load_textures: true,
            texture_size_limit: MAX_TEXTURE_SIZE,
            default_camera: true,
        }
    }
}

#[inline]
fn convert_position([x, y, z]: [f32; 3]) -> glam::Vec3 {
    glam::Vec3::new(-x, y, z) * MODEL_SCALE
}

#[inline]
fn convert_direction([x, y, z]: [f32; 3]) -> glam::Vec3 {
    glam::Vec3::new(-x, y, z)
}

#[inline]
fn convert_rotation([x, y, z]: [f32; 3]) -> glam::Vec3 {
    glam::Vec3::new(x, -y, -z)
}

/// Convert a translation range. Negating X flips its bounds.
#[inline]
fn convert_position_range(min: [f32; 3], max: [f32; 3]) -> (glam::Vec3, glam::Vec3) {
    (
        glam::Vec3::new(-max[0], min[1], min[2]) * MODEL_SCALE,
        glam::Vec3::new(-min[0], max[1], max[2]) * MODEL_SCALE,
    )
}

/// Convert a rotation range. Negating Y and Z flips their bounds.
#[inline]
fn convert_rotation_range(min: [f32; 3], max: [f32; 3]) -> (glam::Vec3, glam::Vec3) {
    (
        glam::Vec3::new(min[0], -max[1], -max[2]),
        glam::Vec3::new(max[0], -min[1], -min[2]),
    )
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_ranges_stay_ordered() {
        let (min, max) = convert_position_range([-1.0, -2.0, -3.0], [4.0, 5.0, 6.0]);
        assert!(min.cmple(max).all());
        assert_eq!(min, Vec3::new(-4.0, -2.0, -3.0) * MODEL_SCALE);

        let (min, max) = convert_rotation_range([-0.1, -0.2, -0.3], [0.4, 0.5, 0.6]);
        assert!(min.cmple(max).all());
        assert_eq!(max, Vec3::new(0.4, 0.2, 0.3));
    }

    #[test]
    fn test_position_mirrors_x() {
        assert_eq!(
            convert_position([1.0, 2.0, 3.0]),
            Vec3::new(-1.0, 2.0, 3.0) * MODEL_SCALE
        );
    }
}
