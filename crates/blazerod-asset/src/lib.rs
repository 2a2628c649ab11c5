//! Provide the load-time description of MMD models.
//!
//! This library provides a node structure decoupled from any file format,
//! and a PMX loader that decodes model files into it. Everything in here is
//! immutable after loading and can be shared freely between threads.
//!
pub mod camera;
pub mod expression;
pub mod humanoid;
/// Model loaders
pub mod loader;
pub mod material;
pub mod model;
pub mod node;
pub mod physics;
pub mod primitive;
pub mod skin;
pub mod texture;

/// Builders for synthetic model files, used by tests.
#[cfg(all(feature = "pmx", any(test, feature = "test-util")))]
pub mod testing;
