//! Camera
//!
//! Projections target Vulkan clip space directly: X right, Y down, depth in `0..1`, with
//! the camera looking down +Z. The view matrix is built from an orthonormal basis
//! `(u, v, w)` where `w` is the viewing direction; its inverse is kept alongside so the
//! camera position is available to shaders without a matrix inversion.

use crate::foundation::math::{Mat4, Vec3, YxzRotation};

/// Projection and view transforms
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            inverse_view: Mat4::identity(),
        }
    }
}

impl Camera {
    /// Create a camera with identity transforms
    pub fn new() -> Self {
        Self::default()
    }

    /// Orthographic box mapped to clip space
    pub fn set_orthographic_projection(&mut self, left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) {
        let mut projection = Mat4::identity();
        projection[(0, 0)] = 2.0 / (right - left);
        projection[(1, 1)] = 2.0 / (bottom - top);
        projection[(2, 2)] = 1.0 / (far - near);
        projection[(0, 3)] = -(right + left) / (right - left);
        projection[(1, 3)] = -(bottom + top) / (bottom - top);
        projection[(2, 3)] = -near / (far - near);
        self.projection = projection;
    }

    /// Perspective frustum with vertical field of view `fov_y` in radians
    ///
    /// `aspect` must be non-zero; it is usually the swapchain's width over height.
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        debug_assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be non-zero");
        let tan_half_fov_y = (fov_y / 2.0).tan();
        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 1.0 / (aspect * tan_half_fov_y);
        projection[(1, 1)] = 1.0 / tan_half_fov_y;
        projection[(2, 2)] = far / (far - near);
        projection[(3, 2)] = 1.0;
        projection[(2, 3)] = -(far * near) / (far - near);
        self.projection = projection;
    }

    /// Look from `position` along `direction`
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(&up).normalize();
        let v = w.cross(&u);
        self.set_basis(position, u, v, w);
    }

    /// Look from `position` at `target`
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Orient with Tait-Bryan angles (yaw, then pitch, then roll)
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let rotation = YxzRotation::new(rotation);
        self.set_basis(position, rotation.u(), rotation.v(), rotation.w());
    }

    fn set_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        let mut view = Mat4::identity();
        let mut inverse_view = Mat4::identity();
        for (row, axis) in [u, v, w].iter().enumerate() {
            for col in 0..3 {
                view[(row, col)] = axis[col];
                inverse_view[(col, row)] = axis[col];
            }
            view[(row, 3)] = -axis.dot(&position);
            inverse_view[(row, 3)] = position[row];
        }
        self.view = view;
        self.inverse_view = inverse_view;
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// World-to-camera matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Camera-to-world matrix
    pub fn inverse_view(&self) -> &Mat4 {
        &self.inverse_view
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        self.inverse_view.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// `projection * view`
    pub fn projection_view(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_depth_range() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(50f32.to_radians(), 1.5, 0.1, 100.0);

        let near = camera.projection() * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = camera.projection() * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_space() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);

        let corner = camera.projection() * Vec4::new(2.0, 1.0, 10.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, 1.0, 1.0, 1.0), epsilon = 1e-6);
        let corner = camera.projection() * Vec4::new(-2.0, -1.0, 0.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(-1.0, -1.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_view_target_puts_target_on_forward_axis() {
        let mut camera = Camera::new();
        let position = Vec3::new(1.0, -2.0, -3.0);
        let target = Vec3::new(1.0, -2.0, 5.0);
        camera.set_view_target(position, target, Vec3::new(0.0, -1.0, 0.0));

        let in_view = camera.view() * target.push(1.0);
        assert_relative_eq!(in_view, Vec4::new(0.0, 0.0, 8.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(camera.position(), position, epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_view_inverts_view() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(0.5, -1.0, 2.5), Vec3::new(0.2, 1.1, -0.4));
        assert_relative_eq!(camera.view() * camera.inverse_view(), Mat4::identity(), epsilon = 1e-5);
    }
}
