use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    NoRigidBodies,
    MisalignedRigidBodies { len: usize },
    MisalignedJoints { len: usize },
    InvalidEnum { field: &'static str, value: u32 },
    InvalidBodyIndex { joint: usize, index: u32 },
    TransformCount { expected: usize, actual: usize },
    Backend(String),
}

impl Display for PhysicsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::NoRigidBodies => write!(f, "Physics scene has no rigid bodies"),
            PhysicsError::MisalignedRigidBodies { len } => write!(
                f,
                "Rigid body data of {} bytes is not a multiple of {}",
                len,
                crate::record::RIGID_BODY_RECORD_SIZE
            ),
            PhysicsError::MisalignedJoints { len } => write!(
                f,
                "Joint data of {} bytes is not a multiple of {}",
                len,
                crate::record::JOINT_RECORD_SIZE
            ),
            PhysicsError::InvalidEnum { field, value } => {
                write!(f, "Invalid value {} for {}", value, field)
            }
            PhysicsError::InvalidBodyIndex { joint, index } => {
                write!(f, "Joint {} references missing rigid body {}", joint, index)
            }
            PhysicsError::TransformCount { expected, actual } => write!(
                f,
                "Expected {} initial body transforms, got {}",
                expected, actual
            ),
            PhysicsError::Backend(message) => write!(f, "Physics backend error: {}", message),
        }
    }
}

impl Error for PhysicsError {}
