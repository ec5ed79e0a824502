//! Math utilities and types
//!
//! Provides fundamental math types for 3D rendering, aliased over `nalgebra`.

pub use nalgebra::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 2x2 matrix type
pub type Mat2 = Matrix2<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Extract the translation column of a homogeneous transform.
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}

/// Extract one of the rotation/scale basis columns of a homogeneous transform.
///
/// Column 0 is the local X axis, 1 the Y axis, 2 the Z axis.
pub fn basis_column(matrix: &Mat4, column: usize) -> Vec3 {
    Vec3::new(matrix[(0, column)], matrix[(1, column)], matrix[(2, column)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_reads_last_column() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(translation_of(&m), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn basis_columns_of_identity() {
        let m = Mat4::identity();
        assert_eq!(basis_column(&m, 0), Vec3::x());
        assert_eq!(basis_column(&m, 1), Vec3::y());
    }
}
