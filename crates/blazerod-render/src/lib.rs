//! Per-frame evaluation of loaded models.
//!
//! A [`RenderScene`] is built once from a model and shared between any number
//! of [`ModelInstance`]s. Each instance carries its own transforms, morph
//! weights, skin matrices and physics world, and advances them through the
//! phases of [`update::UpdatePhase`].
//!
pub mod camera;
pub mod debug;
pub mod instance;
mod physics;
pub mod render_data;
pub mod scene;
pub mod transform;
pub mod update;

pub use instance::ModelInstance;
pub use scene::{RenderScene, SceneBuildError};
pub use transform::TransformId;
