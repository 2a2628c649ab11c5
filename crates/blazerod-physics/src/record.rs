use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::PhysicsError;

pub const RIGID_BODY_RECORD_SIZE: usize = 72;
pub const JOINT_RECORD_SIZE: usize = 108;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Sphere,
    Box,
    Capsule,
}

impl TryFrom<u32> for ShapeType {
    type Error = PhysicsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShapeType::Sphere),
            1 => Ok(ShapeType::Box),
            2 => Ok(ShapeType::Capsule),
            value => Err(PhysicsError::InvalidEnum {
                field: "shape",
                value,
            }),
        }
    }
}

impl From<ShapeType> for u32 {
    fn from(value: ShapeType) -> Self {
        match value {
            ShapeType::Sphere => 0,
            ShapeType::Box => 1,
            ShapeType::Capsule => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsMode {
    FollowBone,
    Physics,
    PhysicsPlusBone,
}

impl PhysicsMode {
    /// Whether the simulation, not the node, owns the body's motion.
    pub fn is_dynamic(self) -> bool {
        !matches!(self, PhysicsMode::FollowBone)
    }
}

impl TryFrom<u32> for PhysicsMode {
    type Error = PhysicsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PhysicsMode::FollowBone),
            1 => Ok(PhysicsMode::Physics),
            2 => Ok(PhysicsMode::PhysicsPlusBone),
            value => Err(PhysicsError::InvalidEnum {
                field: "physics mode",
                value,
            }),
        }
    }
}

impl From<PhysicsMode> for u32 {
    fn from(value: PhysicsMode) -> Self {
        match value {
            PhysicsMode::FollowBone => 0,
            PhysicsMode::Physics => 1,
            PhysicsMode::PhysicsPlusBone => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Spring6Dof,
    SixDof,
    PointToPoint,
    ConeTwist,
    Slider,
    Hinge,
}

impl TryFrom<u32> for JointType {
    type Error = PhysicsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(JointType::Spring6Dof),
            1 => Ok(JointType::SixDof),
            2 => Ok(JointType::PointToPoint),
            3 => Ok(JointType::ConeTwist),
            4 => Ok(JointType::Slider),
            5 => Ok(JointType::Hinge),
            value => Err(PhysicsError::InvalidEnum {
                field: "joint type",
                value,
            }),
        }
    }
}

impl From<JointType> for u32 {
    fn from(value: JointType) -> Self {
        match value {
            JointType::Spring6Dof => 0,
            JointType::SixDof => 1,
            JointType::PointToPoint => 2,
            JointType::ConeTwist => 3,
            JointType::Slider => 4,
            JointType::Hinge => 5,
        }
    }
}

/// Fixed layout description of one rigid body.
///
/// `group` and `mask` are collision bit sets: two bodies collide when each
/// one's group intersects the other's mask. `position` and `rotation` are the
/// body's offset from its node; `rotation` holds Euler angles applied in Y, X,
/// Z order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RigidBodyRecord {
    pub group: u32,
    pub mask: u32,
    pub shape: u32,
    pub physics_mode: u32,
    pub size: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub mass: f32,
    pub move_attenuation: f32,
    pub rotation_damping: f32,
    pub repulsion: f32,
    pub friction: f32,
}

impl RigidBodyRecord {
    pub fn shape_type(&self) -> Result<ShapeType, PhysicsError> {
        ShapeType::try_from(self.shape)
    }

    pub fn mode(&self) -> Result<PhysicsMode, PhysicsError> {
        PhysicsMode::try_from(self.physics_mode)
    }

    pub fn size(&self) -> Vec3 {
        Vec3::from_array(self.size)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn rotation(&self) -> Vec3 {
        Vec3::from_array(self.rotation)
    }
}

/// Fixed layout description of one joint between two rigid bodies.
///
/// `position` and `rotation` are in model space. Limits are given as
/// `[min, max]` per axis, and a spring is active on an axis iff its
/// stiffness is non-zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct JointRecord {
    pub joint_type: u32,
    pub rigid_body_a: u32,
    pub rigid_body_b: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub rotation_min: [f32; 3],
    pub rotation_max: [f32; 3],
    pub position_spring: [f32; 3],
    pub rotation_spring: [f32; 3],
}

impl JointRecord {
    pub fn kind(&self) -> Result<JointType, PhysicsError> {
        JointType::try_from(self.joint_type)
    }
}

#[cfg(test)]
mod test {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(size_of::<RigidBodyRecord>(), RIGID_BODY_RECORD_SIZE);
        assert_eq!(offset_of!(RigidBodyRecord, size), 16);
        assert_eq!(offset_of!(RigidBodyRecord, rotation), 40);
        assert_eq!(offset_of!(RigidBodyRecord, mass), 52);
        assert_eq!(offset_of!(RigidBodyRecord, friction), 68);

        assert_eq!(size_of::<JointRecord>(), JOINT_RECORD_SIZE);
        assert_eq!(offset_of!(JointRecord, position), 12);
        assert_eq!(offset_of!(JointRecord, rotation_min), 60);
        assert_eq!(offset_of!(JointRecord, rotation_spring), 96);
    }

    #[test]
    fn test_enum_values() {
        assert_eq!(ShapeType::try_from(2), Ok(ShapeType::Capsule));
        assert_eq!(
            PhysicsMode::try_from(3),
            Err(PhysicsError::InvalidEnum {
                field: "physics mode",
                value: 3
            })
        );
        for value in 0..6 {
            let joint = JointType::try_from(value).unwrap();
            assert_eq!(u32::from(joint), value);
        }
        assert!(JointType::try_from(6).is_err());
    }
}
