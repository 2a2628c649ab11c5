use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigidBodyShapeType {
    Sphere,
    Box,
    Capsule,
}

/// How a rigid body and its node drive each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigidBodyPhysicsMode {
    /// The body is moved by the node. Kinematic.
    FollowBone,
    /// The node is moved by the body.
    Physics,
    /// The body follows the node position, the node follows the body rotation.
    PhysicsPlusBone,
}

/// Collision volume attached to a node.
///
/// Position and rotation are relative to the world position of the owning
/// node in bind pose. Rotation is an Euler angle triple applied in Y, X, Z
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyAsset {
    pub name: Option<String>,
    /// Collision group number, 0 to 15.
    pub collision_group: u8,
    /// Bit set of groups this body does not collide with.
    pub no_collision_groups: u16,
    pub shape: RigidBodyShapeType,
    pub shape_size: Vec3,
    pub shape_position: Vec3,
    pub shape_rotation: Vec3,
    pub mass: f32,
    pub move_attenuation: f32,
    pub rotation_damping: f32,
    pub repulsion: f32,
    pub friction_force: f32,
    pub physics_mode: RigidBodyPhysicsMode,
}

impl RigidBodyAsset {
    pub fn collision_group_mask(&self) -> u32 {
        1u32 << (self.collision_group & 0xF)
    }

    pub fn collision_filter_mask(&self) -> u32 {
        !(self.no_collision_groups as u32) & 0xFFFF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalJointType {
    Spring6Dof,
    SixDof,
    PointToPoint,
    ConeTwist,
    Slider,
    Hinge,
}

/// Constraint between two rigid bodies, addressed by rigid body index.
///
/// Position and rotation are in model space.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalJointAsset {
    pub name: Option<String>,
    pub joint_type: PhysicalJointType,
    pub rigid_body_a: usize,
    pub rigid_body_b: usize,
    pub position: Vec3,
    pub rotation: Vec3,
    pub position_min: Vec3,
    pub position_max: Vec3,
    pub rotation_min: Vec3,
    pub rotation_max: Vec3,
    pub position_spring: Vec3,
    pub rotation_spring: Vec3,
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_collision_masks() {
        let body = RigidBodyAsset {
            name: None,
            collision_group: 3,
            no_collision_groups: 0b1001,
            shape: RigidBodyShapeType::Sphere,
            shape_size: Vec3::ONE,
            shape_position: Vec3::ZERO,
            shape_rotation: Vec3::ZERO,
            mass: 1.0,
            move_attenuation: 0.5,
            rotation_damping: 0.5,
            repulsion: 0.0,
            friction_force: 0.5,
            physics_mode: RigidBodyPhysicsMode::Physics,
        };
        assert_eq!(body.collision_group_mask(), 0b1000);
        assert_eq!(body.collision_filter_mask(), 0xFFF6);
    }
}
