use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::record::{JointRecord, RigidBodyRecord};

/// Rotation of an Euler angle triple, applied in Y, X, Z order.
pub fn euler_rotation(angles: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, angles.y, angles.x, angles.z)
}

/// Offset of a rigid body from the node it is attached to.
pub fn body_offset(body: &RigidBodyRecord) -> Mat4 {
    Mat4::from_rotation_translation(euler_rotation(body.rotation()), body.position())
}

/// Model space frame of a joint.
pub fn joint_world_transform(joint: &JointRecord) -> Mat4 {
    Mat4::from_rotation_translation(
        euler_rotation(Vec3::from_array(joint.rotation)),
        Vec3::from_array(joint.position),
    )
}

/// Joint frame expressed in the local space of each connected body.
pub fn joint_frames(body_a: Mat4, body_b: Mat4, joint: &JointRecord) -> (Mat4, Mat4) {
    let joint = joint_world_transform(joint);
    (body_a.inverse() * joint, body_b.inverse() * joint)
}

/// Velocities below these squared speeds are scaled down by
/// [`ADDITIONAL_DAMPING_FACTOR`].
const ADDITIONAL_LINEAR_THRESHOLD_SQUARED: f32 = 0.01;
const ADDITIONAL_ANGULAR_THRESHOLD_SQUARED: f32 = 0.01;
const ADDITIONAL_DAMPING_FACTOR: f32 = 0.005;
/// Speed removed from a body moving slower than its damping coefficient.
const ADDITIONAL_DAMPING_SPEED: f32 = 0.005;

fn damp_speed(velocity: Vec3, damping: f32) -> Vec3 {
    let speed = velocity.length();
    if speed >= damping {
        velocity
    } else if speed > ADDITIONAL_DAMPING_SPEED {
        velocity - velocity / speed * ADDITIONAL_DAMPING_SPEED
    } else {
        Vec3::ZERO
    }
}

/// Damping applied to the velocities a dynamic body carries into a step,
/// on top of its linear and angular damping.
///
/// A body that is slow both linearly and angularly loses almost all of its
/// velocity, and each velocity below its damping coefficient is slowed by a
/// fixed amount.
pub fn additional_damping(
    linear: Vec3,
    angular: Vec3,
    linear_damping: f32,
    angular_damping: f32,
) -> (Vec3, Vec3) {
    let (linear, angular) = if linear.length_squared() < ADDITIONAL_LINEAR_THRESHOLD_SQUARED
        && angular.length_squared() < ADDITIONAL_ANGULAR_THRESHOLD_SQUARED
    {
        (
            linear * ADDITIONAL_DAMPING_FACTOR,
            angular * ADDITIONAL_DAMPING_FACTOR,
        )
    } else {
        (linear, angular)
    };
    (
        damp_speed(linear, linear_damping),
        damp_speed(angular, angular_damping),
    )
}

/// Drop the scale of a transform, keeping rotation and translation.
pub fn rigid_part(transform: Mat4) -> (Quat, Vec3) {
    let (_, rotation, translation) = transform.to_scale_rotation_translation();
    (rotation, translation)
}

#[cfg(test)]
mod test {
    use bytemuck::Zeroable;

    use super::*;

    #[test]
    fn test_euler_order() {
        let angles = Vec3::new(0.3, 0.5, 0.7);
        let expected = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(0.3)
            * Quat::from_rotation_z(0.7);
        assert!(euler_rotation(angles).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_joint_frames_meet_in_world() {
        let joint = JointRecord {
            position: [0.0, 1.0, 0.0],
            rotation: [0.0, 0.5, 0.0],
            ..JointRecord::zeroed()
        };
        let body_a = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let body_b = Mat4::from_rotation_translation(Quat::from_rotation_z(0.4), Vec3::X);
        let (frame_a, frame_b) = joint_frames(body_a, body_b, &joint);
        let world = joint_world_transform(&joint);
        assert!((body_a * frame_a).abs_diff_eq(world, 1e-5));
        assert!((body_b * frame_b).abs_diff_eq(world, 1e-5));
    }

    #[test]
    fn test_additional_damping() {
        // Slow on both counts: almost everything is removed.
        let (linear, angular) =
            additional_damping(Vec3::new(0.05, 0.0, 0.0), Vec3::new(0.0, 0.05, 0.0), 0.0, 0.0);
        assert!(linear.abs_diff_eq(Vec3::new(0.05 * 0.005, 0.0, 0.0), 1e-7));
        assert!(angular.abs_diff_eq(Vec3::new(0.0, 0.05 * 0.005, 0.0), 1e-7));

        // A fast spin keeps the slow linear velocity.
        let (linear, angular) =
            additional_damping(Vec3::new(0.05, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), 0.0, 0.0);
        assert_eq!(linear, Vec3::new(0.05, 0.0, 0.0));
        assert_eq!(angular, Vec3::new(0.0, 2.0, 0.0));

        // Below the damping coefficient a fixed speed is taken off.
        let (linear, angular) =
            additional_damping(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 0.0, 0.003), 0.9, 0.0);
        assert!(linear.abs_diff_eq(Vec3::new(0.0, 0.495, 0.0), 1e-6));
        assert_eq!(angular, Vec3::new(0.0, 0.0, 0.003));

        let (_, angular) =
            additional_damping(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 0.0, 0.2), 0.0, 0.5);
        assert!(angular.abs_diff_eq(Vec3::new(0.0, 0.0, 0.195), 1e-6));
    }
}
