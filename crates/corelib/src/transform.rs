//! Model transform handed to `submit` with each mesh.

use crate::{EulerRot, Mat4, Quat, Vec3};

/// Placement of a mesh in world space: scale, then XYZ Euler rotation,
/// then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Radians about X, Y and Z, applied in that order.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_trs(translation: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Unscaled mesh at the origin turned `angle` radians about +Y.
    pub fn yaw(angle: f32) -> Self {
        Self {
            rotation: Vec3::new(0.0, angle, 0.0),
            ..Self::IDENTITY
        }
    }

    pub fn with_translation(self, translation: Vec3) -> Self {
        Self {
            translation,
            ..self
        }
    }

    /// Model matrix, `T * R * S`.
    pub fn matrix(&self) -> Mat4 {
        let r = self.rotation;
        let q = Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z);
        Mat4::from_scale_rotation_translation(self.scale, q, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
