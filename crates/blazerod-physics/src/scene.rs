use crate::{
    error::PhysicsError,
    record::{JointRecord, RigidBodyRecord, JOINT_RECORD_SIZE, RIGID_BODY_RECORD_SIZE},
};

/// A validated set of rigid bodies and the joints between them.
///
/// Every enum field holds a known value and every joint references existing
/// bodies, so backends can build worlds from it without further checks.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsScene {
    rigid_bodies: Vec<RigidBodyRecord>,
    joints: Vec<JointRecord>,
}

impl PhysicsScene {
    pub fn new(
        rigid_bodies: Vec<RigidBodyRecord>,
        joints: Vec<JointRecord>,
    ) -> Result<Self, PhysicsError> {
        if rigid_bodies.is_empty() {
            return Err(PhysicsError::NoRigidBodies);
        }
        for body in &rigid_bodies {
            body.shape_type()?;
            body.mode()?;
        }
        for (index, joint) in joints.iter().enumerate() {
            joint.kind()?;
            for body in [joint.rigid_body_a, joint.rigid_body_b] {
                if body as usize >= rigid_bodies.len() {
                    return Err(PhysicsError::InvalidBodyIndex {
                        joint: index,
                        index: body,
                    });
                }
            }
        }
        Ok(Self {
            rigid_bodies,
            joints,
        })
    }

    /// Decode packed native-endian records.
    pub fn from_bytes(rigid_bodies: &[u8], joints: &[u8]) -> Result<Self, PhysicsError> {
        if rigid_bodies.is_empty() {
            return Err(PhysicsError::NoRigidBodies);
        }
        if rigid_bodies.len() % RIGID_BODY_RECORD_SIZE != 0 {
            return Err(PhysicsError::MisalignedRigidBodies {
                len: rigid_bodies.len(),
            });
        }
        if joints.len() % JOINT_RECORD_SIZE != 0 {
            return Err(PhysicsError::MisalignedJoints { len: joints.len() });
        }
        let rigid_bodies = rigid_bodies
            .chunks_exact(RIGID_BODY_RECORD_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        let joints = joints
            .chunks_exact(JOINT_RECORD_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        Self::new(rigid_bodies, joints)
    }

    /// Encode into the packed layout read by [`PhysicsScene::from_bytes`].
    pub fn to_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        (
            bytemuck::cast_slice(&self.rigid_bodies).to_vec(),
            bytemuck::cast_slice(&self.joints).to_vec(),
        )
    }

    pub fn rigid_bodies(&self) -> &[RigidBodyRecord] {
        &self.rigid_bodies
    }

    pub fn joints(&self) -> &[JointRecord] {
        &self.joints
    }
}

#[cfg(test)]
mod test {
    use bytemuck::Zeroable;

    use super::*;
    use crate::record::{JointType, PhysicsMode, ShapeType};

    fn body(mode: PhysicsMode) -> RigidBodyRecord {
        RigidBodyRecord {
            group: 1,
            mask: 0xFFFF,
            shape: ShapeType::Box.into(),
            physics_mode: mode.into(),
            size: [0.1, 0.2, 0.3],
            mass: 1.0,
            ..RigidBodyRecord::zeroed()
        }
    }

    fn joint(a: u32, b: u32) -> JointRecord {
        JointRecord {
            joint_type: JointType::Spring6Dof.into(),
            rigid_body_a: a,
            rigid_body_b: b,
            rotation_spring: [0.0, 10.0, 0.0],
            ..JointRecord::zeroed()
        }
    }

    #[test]
    fn test_bytes_round_trip() {
        let scene = PhysicsScene::new(
            vec![body(PhysicsMode::FollowBone), body(PhysicsMode::Physics)],
            vec![joint(0, 1)],
        )
        .unwrap();
        let (bodies, joints) = scene.to_bytes();
        assert_eq!(bodies.len(), 2 * RIGID_BODY_RECORD_SIZE);
        assert_eq!(joints.len(), JOINT_RECORD_SIZE);

        // Decoding must not rely on the buffer's alignment.
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&bodies);
        let decoded = PhysicsScene::from_bytes(&shifted[1..], &joints).unwrap();
        assert_eq!(decoded, scene);
    }

    #[test]
    fn test_rejects_bad_buffers() {
        assert_eq!(
            PhysicsScene::from_bytes(&[], &[]),
            Err(PhysicsError::NoRigidBodies)
        );
        assert_eq!(
            PhysicsScene::from_bytes(&[0; 71], &[]),
            Err(PhysicsError::MisalignedRigidBodies { len: 71 })
        );
        assert_eq!(
            PhysicsScene::from_bytes(&[0; 72], &[0; 100]),
            Err(PhysicsError::MisalignedJoints { len: 100 })
        );
    }

    #[test]
    fn test_rejects_invalid_records() {
        let mut bad_shape = body(PhysicsMode::Physics);
        bad_shape.shape = 7;
        assert_eq!(
            PhysicsScene::new(vec![bad_shape], vec![]),
            Err(PhysicsError::InvalidEnum {
                field: "shape",
                value: 7
            })
        );
        assert_eq!(
            PhysicsScene::new(vec![body(PhysicsMode::Physics)], vec![joint(0, 1)]),
            Err(PhysicsError::InvalidBodyIndex { joint: 0, index: 1 })
        );
    }
}
