//! The boundary between scene descriptions and rigid body simulation.
//!
//! A [`PhysicsScene`] is the validated, byte-exact description of a model's
//! rigid bodies and joints. Simulation itself is delegated to a
//! [`PhysicsBackend`], which builds a [`PhysicsWorld`] from a scene and a set
//! of initial body transforms.
//!
pub mod config;
pub mod error;
pub mod math;
#[cfg(feature = "rapier")]
pub mod rapier;
pub mod record;
pub mod scene;
pub mod world;

pub use config::PhysicsConfig;
pub use error::PhysicsError;
pub use record::{JointRecord, JointType, PhysicsMode, RigidBodyRecord, ShapeType};
pub use scene::PhysicsScene;
pub use world::{PhysicsBackend, PhysicsWorld};
