//! Math types
//!
//! Single-precision aliases over nalgebra plus the few helpers the camera and scene
//! transforms share.

pub use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Mathematical constants
pub mod constants {
    /// 2 * Pi
    pub const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;
}

/// Utility functions
pub mod utils {
    /// Wrap an angle into `[0, 2π)`
    pub fn wrap_angle(radians: f32) -> f32 {
        radians.rem_euclid(super::constants::TWO_PI)
    }
}

/// Sines and cosines of Tait-Bryan angles, applied in Y, X, Z order
#[derive(Debug, Clone, Copy)]
pub(crate) struct YxzRotation {
    pub c1: f32,
    pub s1: f32,
    pub c2: f32,
    pub s2: f32,
    pub c3: f32,
    pub s3: f32,
}

impl YxzRotation {
    /// `rotation` holds the X, Y and Z angles in radians
    pub fn new(rotation: Vec3) -> Self {
        Self {
            c1: rotation.y.cos(),
            s1: rotation.y.sin(),
            c2: rotation.x.cos(),
            s2: rotation.x.sin(),
            c3: rotation.z.cos(),
            s3: rotation.z.sin(),
        }
    }

    /// Rotated X axis
    pub fn u(&self) -> Vec3 {
        Vec3::new(
            self.c1 * self.c3 + self.s1 * self.s2 * self.s3,
            self.c2 * self.s3,
            self.c1 * self.s2 * self.s3 - self.c3 * self.s1,
        )
    }

    /// Rotated Y axis
    pub fn v(&self) -> Vec3 {
        Vec3::new(
            self.c3 * self.s1 * self.s2 - self.c1 * self.s3,
            self.c2 * self.c3,
            self.c1 * self.c3 * self.s2 + self.s1 * self.s3,
        )
    }

    /// Rotated Z axis
    pub fn w(&self) -> Vec3 {
        Vec3::new(self.c2 * self.s1, -self.s2, self.c1 * self.c2)
    }

    /// Rotation matrix with the rotated axes as columns
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_columns(&[self.u(), self.v(), self.w()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_yxz_axes_are_orthonormal() {
        let rotation = YxzRotation::new(Vec3::new(0.3, -1.2, 2.0));
        let m = rotation.matrix();
        assert_relative_eq!(m.transpose() * m, Mat3::identity(), epsilon = 1e-5);
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_yaw_only_rotation() {
        let rotation = YxzRotation::new(Vec3::new(0.0, constants::HALF_PI, 0.0));
        // yaw of 90 degrees turns +Z into +X
        assert_relative_eq!(rotation.w(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(utils::wrap_angle(-0.5), constants::TWO_PI - 0.5, epsilon = 1e-6);
        assert_relative_eq!(utils::wrap_angle(constants::TWO_PI + 1.0), 1.0, epsilon = 1e-5);
    }
}
