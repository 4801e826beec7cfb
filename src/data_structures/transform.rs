//! Node transformations.
//!
//! glTF nodes carry either a full matrix or a translation/rotation/scale
//! triple. Both end up as a local-to-parent matrix during traversal.

use cgmath::One;

/// Translation, rotation (as quaternion) and scale of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// `T * R * S`, the order glTF mandates.
    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// glTF stores rotations as `[x, y, z, w]`.
impl From<([f32; 3], [f32; 4], [f32; 3])> for Transform {
    fn from((translation, rotation, scale): ([f32; 3], [f32; 4], [f32; 3])) -> Self {
        Self {
            position: translation.into(),
            rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        }
    }
}

/// Local-to-parent transform of a node, in whichever form the file used.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocalTransform {
    Matrix(cgmath::Matrix4<f32>),
    Decomposed(Transform),
}

impl LocalTransform {
    pub fn matrix(&self) -> cgmath::Matrix4<f32> {
        match self {
            LocalTransform::Matrix(m) => *m,
            LocalTransform::Decomposed(t) => t.to_matrix(),
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        LocalTransform::Decomposed(Transform::new())
    }
}
