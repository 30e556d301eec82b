use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Model matrix (scale, then rotate, then translate).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse-transpose of the upper 3x3 of the model matrix.
    ///
    /// Keeps normals perpendicular to surfaces under non-uniform scale.
    /// Degenerate (zero) scale falls back to identity.
    pub fn normal_matrix(&self) -> Mat3 {
        let m = Mat3::from_mat4(self.matrix());
        if m.determinant().abs() <= f32::EPSILON {
            return Mat3::IDENTITY;
        }
        m.inverse().transpose()
    }
}
