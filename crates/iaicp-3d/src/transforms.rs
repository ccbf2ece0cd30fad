use std::f64::consts::{PI, TAU};

use glam::{DAffine3, DMat3, DMat4, DVec3, EulerRot};

/// A 6-component pose vector `[x, y, z, roll, pitch, yaw]`.
///
/// The rotation is `Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub type PoseVector = [f64; 6];

/// A rigid transformation in 3D made of a rotation and a translation.
///
/// Applied to a point as `p' = R * p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation matrix.
    pub rotation: DMat3,
    /// Translation vector.
    pub translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation: DVec3::ZERO,
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation,
        }
    }

    /// Applies the transform to a point.
    #[inline]
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Composes two transforms as `self ∘ other`: `other` is applied first.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation * other.rotation,
            translation: self.transform_point(other.translation),
        }
    }

    /// The inverse transform, `R^T` and `-R^T * t`.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = self.rotation.transpose();
        RigidTransform {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Homogeneous 4x4 matrix representation.
    pub fn to_matrix4(&self) -> DMat4 {
        DMat4::from(DAffine3::from_mat3_translation(
            self.rotation,
            self.translation,
        ))
    }

    /// Builds a transform from the upper 3x4 block of a homogeneous matrix.
    pub fn from_matrix4(m: &DMat4) -> Self {
        Self {
            rotation: DMat3::from_mat4(*m),
            translation: m.w_axis.truncate(),
        }
    }

    /// Norm of the translation part.
    pub fn translation_norm(&self) -> f64 {
        self.translation.length()
    }

    /// Rotation angle in radians of the rotation part, in `[0, π]`.
    pub fn rotation_angle(&self) -> f64 {
        let r = &self.rotation;
        let trace = r.x_axis.x + r.y_axis.y + r.z_axis.z;
        ((trace - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
    }

    /// Re-orthonormalizes the rotation by a round trip through the pose vector.
    pub fn normalized(&self) -> RigidTransform {
        pose_to_transform(&transform_to_pose(self))
    }
}

/// Wraps an angle into `(-π, π]`.
///
/// Non-finite angles are returned unchanged.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    // rem_euclid lands in [0, 2π)
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Wraps the three angle components of a pose vector into `(-π, π]`.
pub fn wrap_pose_angles(pose: &mut PoseVector) {
    for angle in pose.iter_mut().skip(3) {
        *angle = wrap_angle(*angle);
    }
}

/// Compute the rotation matrix `Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn euler_to_rotation_matrix(roll: f64, pitch: f64, yaw: f64) -> DMat3 {
    DMat3::from_euler(EulerRot::ZYX, yaw, pitch, roll)
}

/// Extract `(roll, pitch, yaw)` from a rotation matrix built as
/// `Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rotation_matrix_to_euler(r: &DMat3) -> (f64, f64, f64) {
    let (yaw, pitch, roll) = r.to_euler(EulerRot::ZYX);
    (roll, pitch, yaw)
}

/// Convert a pose vector `[x, y, z, roll, pitch, yaw]` into a rigid transform.
pub fn pose_to_transform(pose: &PoseVector) -> RigidTransform {
    RigidTransform {
        rotation: euler_to_rotation_matrix(pose[3], pose[4], pose[5]),
        translation: DVec3::new(pose[0], pose[1], pose[2]),
    }
}

/// Convert a rigid transform into a pose vector with angles wrapped into `(-π, π]`.
pub fn transform_to_pose(transform: &RigidTransform) -> PoseVector {
    let (roll, pitch, yaw) = rotation_matrix_to_euler(&transform.rotation);
    let t = transform.translation;
    let mut pose = [t.x, t.y, t.z, roll, pitch, yaw];
    wrap_pose_angles(&mut pose);
    pose
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation, normalized internally.
/// * `angle` - The angle of rotation.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```no_run
/// use glam::DVec3;
/// use iaicp_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(DVec3::X, angle).unwrap();
/// ```
pub fn axis_angle_to_rotation_matrix(axis: DVec3, angle: f64) -> Result<DMat3, &'static str> {
    let axis = axis
        .try_normalize()
        .ok_or("cannot compute rotation matrix from a zero vector")?;
    Ok(DMat3::from_axis_angle(axis, angle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: &DMat3, b: &DMat3, epsilon: f64) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_relative_eq!(x, y, epsilon = epsilon);
        }
    }

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), Box<dyn std::error::Error>> {
        let rotation = axis_angle_to_rotation_matrix(DVec3::X, PI / 2.0)?;
        let expected = DMat3::from_cols(DVec3::X, DVec3::Z, -DVec3::Y);
        assert_mat_eq(&rotation, &expected, 1e-12);
        assert!(axis_angle_to_rotation_matrix(DVec3::ZERO, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_euler_matches_axis_angle() -> Result<(), Box<dyn std::error::Error>> {
        let yaw = euler_to_rotation_matrix(0.0, 0.0, 0.3);
        assert_mat_eq(&yaw, &axis_angle_to_rotation_matrix(DVec3::Z, 0.3)?, 1e-12);
        let pitch = euler_to_rotation_matrix(0.0, -0.2, 0.0);
        assert_mat_eq(&pitch, &axis_angle_to_rotation_matrix(DVec3::Y, -0.2)?, 1e-12);
        let roll = euler_to_rotation_matrix(1.1, 0.0, 0.0);
        assert_mat_eq(&roll, &axis_angle_to_rotation_matrix(DVec3::X, 1.1)?, 1e-12);

        // yaw applied last
        let combined = euler_to_rotation_matrix(1.1, -0.2, 0.3);
        assert_mat_eq(&combined, &(yaw * pitch * roll), 1e-12);
        Ok(())
    }

    #[test]
    fn test_pose_vector_conversion() {
        let pose = [0.1, -0.2, 0.3, 0.4, -0.5, 2.9];
        let back = transform_to_pose(&pose_to_transform(&pose));
        for (a, b) in pose.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pose_angles_are_wrapped() {
        let pose = [0.0, 0.0, 0.0, 0.1 + 2.0 * PI, 0.2, -0.3 - 4.0 * PI];
        let back = transform_to_pose(&pose_to_transform(&pose));
        assert_relative_eq!(back[3], 0.1, epsilon = 1e-9);
        assert_relative_eq!(back[4], 0.2, epsilon = 1e-9);
        assert_relative_eq!(back[5], -0.3, epsilon = 1e-9);
        for angle in back.iter().skip(3) {
            assert!(*angle > -PI && *angle <= PI);
        }
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(2.5 * PI), 0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(-7.0), -7.0 + 2.0 * PI, epsilon = 1e-12);
        assert!(wrap_angle(f64::NAN).is_nan());
    }

    #[test]
    fn test_wrap_angle_terminates_for_huge_angles() {
        for angle in [1e17, -1e17, 1e300, -f64::MAX, f64::MAX] {
            let wrapped = wrap_angle(angle);
            assert!(wrapped > -PI && wrapped <= PI, "{} -> {}", angle, wrapped);
        }
    }

    #[test]
    fn test_compose_and_inverse() {
        let a = pose_to_transform(&[0.5, -0.1, 0.2, 0.1, 0.2, 0.3]);
        let b = pose_to_transform(&[-0.3, 0.4, 1.0, -0.2, 0.05, 0.7]);
        let p = DVec3::new(0.3, -1.2, 2.5);

        let ab = a.compose(&b);
        let expected = a.transform_point(b.transform_point(p));
        assert!(ab.transform_point(p).abs_diff_eq(expected, 1e-12));

        let identity = a.compose(&a.inverse());
        assert_mat_eq(&identity.rotation, &DMat3::IDENTITY, 1e-12);
        assert!(identity.translation_norm() < 1e-12);
        assert!(identity.rotation_angle() < 1e-6);
    }

    #[test]
    fn test_matrix4_conversion() {
        let a = pose_to_transform(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
        let m = a.to_matrix4();
        assert_eq!(m.row(3), glam::DVec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(m.col(3).x, 1.0);
        assert_eq!(RigidTransform::from_matrix4(&m), a);
    }

    #[test]
    fn test_rotation_angle() -> Result<(), Box<dyn std::error::Error>> {
        let rotation = axis_angle_to_rotation_matrix(DVec3::new(1.0, 2.0, 3.0), 0.25)?;
        let t = RigidTransform::new(rotation, DVec3::ZERO);
        assert_relative_eq!(t.rotation_angle(), 0.25, epsilon = 1e-9);
        Ok(())
    }
}
