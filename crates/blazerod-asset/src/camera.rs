use glam::Mat4;

#[derive(Debug, Clone)]
pub struct CameraAsset {
    pub projection: CameraProjectionAsset,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CameraProjectionAsset {
    Orthographic(OrthographicCameraAsset),
    Perspective(PerspectiveCameraAsset),
}

#[derive(Debug, Clone)]
pub struct OrthographicCameraAsset {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone)]
pub struct PerspectiveCameraAsset {
    pub aspect_ratio: Option<f32>,
    /// Vertical field of view, in radians.
    pub yfov: f32,
    pub zfar: Option<f32>,
    pub znear: f32,
}

impl CameraProjectionAsset {
    pub fn matrix(&self, default_aspect: f32) -> Mat4 {
        match self {
            CameraProjectionAsset::Perspective(perspective) => {
                let aspect = perspective.aspect_ratio.unwrap_or(default_aspect);
                if let Some(zfar) = perspective.zfar {
                    Mat4::perspective_rh(perspective.yfov, aspect, perspective.znear, zfar)
                } else {
                    Mat4::perspective_infinite_rh(perspective.yfov, aspect, perspective.znear)
                }
            }
            CameraProjectionAsset::Orthographic(orthographic) => Mat4::orthographic_rh(
                -orthographic.xmag / 2.0,
                orthographic.xmag / 2.0,
                -orthographic.ymag / 2.0,
                orthographic.ymag / 2.0,
                orthographic.znear,
                orthographic.zfar,
            ),
        }
    }
}

impl Default for CameraAsset {
    fn default() -> Self {
        Self {
            projection: CameraProjectionAsset::Perspective(PerspectiveCameraAsset {
                aspect_ratio: None,
                yfov: 45f32.to_radians(),
                zfar: None,
                znear: 0.01,
            }),
            label: None,
        }
    }
}
