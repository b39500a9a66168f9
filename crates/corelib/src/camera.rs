use crate::{Mat4, Vec3};

/// Perspective camera, left-handed with depth in [0, 1] (wgpu clip space).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    /// `eye` looking at `target` with +Y up, 0.1..100 depth range.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_deg: f32) -> Self {
        Self::new_perspective(eye, target, Vec3::Y, fov_y_deg.to_radians(), 0.1, 100.0, 1.0)
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.eye, self.target, self.up)
    }

    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_lh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    #[inline]
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Aspect from a framebuffer size; zero height is treated as one.
    #[inline]
    pub fn with_viewport(self, width: u32, height: u32) -> Self {
        self.with_aspect(width as f32 / height.max(1) as f32)
    }
}
