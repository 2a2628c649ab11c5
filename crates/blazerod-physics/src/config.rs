#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters shared by every world a backend creates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
    /// Length of one simulation sub-step, in seconds.
    pub fixed_time_step: f32,
    /// Upper bound of sub-steps taken by a single step call.
    pub max_sub_steps: u32,
    /// Extra damping that brings slow dynamic bodies to rest, see
    /// [`crate::math::additional_damping`].
    pub additional_damping: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            fixed_time_step: 1.0 / 120.0,
            max_sub_steps: 10,
            additional_damping: true,
        }
    }
}
