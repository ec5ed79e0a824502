//! Uniform value model and scratch buffer pooling
//!
//! [`UniformValue`] is the owned, structured form uniform data travels in
//! between material/light refresh code and the binding tree. Nested structs
//! and arrays-of-structs mirror the tree shape; the tree flattens everything
//! into reused scratch buffers on upload.

use std::collections::{BTreeMap, HashMap};

use crate::foundation::math::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::render::device::TextureId;

/// Values keyed by uniform name, as consumed by the binding tree
pub type UniformValueMap = BTreeMap<String, UniformValue>;

/// One value destined for a uniform
///
/// Scalar/vector/matrix variants feed leaf uniforms; the array variants feed
/// pure bottom-level arrays; `Struct` and `List` feed nested struct and
/// array-of-struct uniforms respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Float scalar
    Float(f32),
    /// Integer scalar
    Int(i32),
    /// Boolean, uploaded as an integer
    Bool(bool),
    /// 2-component float vector
    Vec2(Vec2),
    /// 3-component float vector
    Vec3(Vec3),
    /// 4-component float vector
    Vec4(Vec4),
    /// 2x2 matrix
    Mat2(Mat2),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Raw float components, already flattened
    FloatArray(Vec<f32>),
    /// Raw integer components
    IntArray(Vec<i32>),
    /// Array of 2-component vectors
    Vec2Array(Vec<Vec2>),
    /// Array of 3-component vectors
    Vec3Array(Vec<Vec3>),
    /// Array of 4x4 matrices
    Mat4Array(Vec<Mat4>),
    /// Texture to bind; `None` binds the fallback of the sampler's
    /// dimensionality
    Texture(Option<TextureId>),
    /// Array of textures for sampler arrays
    TextureArray(Vec<Option<TextureId>>),
    /// Member values of a struct uniform, keyed by member name
    Struct(UniformValueMap),
    /// Element values of an array-of-structs uniform
    List(Vec<UniformValue>),
}

impl UniformValue {
    /// Append this value's float components to `out`
    ///
    /// Returns `false` for values with no float representation (textures,
    /// structs, integer data).
    pub fn write_floats(&self, out: &mut Vec<f32>) -> bool {
        match self {
            Self::Float(v) => out.push(*v),
            Self::Vec2(v) => out.extend_from_slice(v.as_slice()),
            Self::Vec3(v) => out.extend_from_slice(v.as_slice()),
            Self::Vec4(v) => out.extend_from_slice(v.as_slice()),
            Self::Mat2(m) => out.extend_from_slice(m.as_slice()),
            Self::Mat3(m) => out.extend_from_slice(m.as_slice()),
            Self::Mat4(m) => out.extend_from_slice(m.as_slice()),
            Self::FloatArray(values) => out.extend_from_slice(values),
            Self::Vec2Array(values) => {
                for v in values {
                    out.extend_from_slice(v.as_slice());
                }
            }
            Self::Vec3Array(values) => {
                for v in values {
                    out.extend_from_slice(v.as_slice());
                }
            }
            Self::Mat4Array(values) => {
                for m in values {
                    out.extend_from_slice(m.as_slice());
                }
            }
            _ => return false,
        }
        true
    }

    /// Append this value's integer components to `out`
    ///
    /// Returns `false` for values with no integer representation.
    pub fn write_ints(&self, out: &mut Vec<i32>) -> bool {
        match self {
            Self::Int(v) => out.push(*v),
            Self::Bool(v) => out.push(i32::from(*v)),
            Self::IntArray(values) => out.extend_from_slice(values),
            _ => return false,
        }
        true
    }
}

/// Pool of flatten buffers keyed by requested capacity
///
/// Pure-array uploads flatten `count x block` floats every frame; pooling the
/// buffers keeps that allocation-free after warmup. Single-writer per frame,
/// like every other renderer-owned cache.
#[derive(Default)]
pub struct ScratchPool {
    buffers: HashMap<usize, Vec<f32>>,
}

impl ScratchPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared buffer with at least `capacity` reserved
    pub fn take(&mut self, capacity: usize) -> Vec<f32> {
        let mut buffer = self
            .buffers
            .remove(&capacity)
            .unwrap_or_else(|| Vec::with_capacity(capacity));
        buffer.clear();
        buffer
    }

    /// Return a buffer taken with [`ScratchPool::take`]
    pub fn give_back(&mut self, buffer: Vec<f32>) {
        self.buffers.insert(buffer.capacity(), buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_flattening_is_column_major() {
        let m = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let mut out = Vec::new();
        assert!(UniformValue::Mat3(m).write_floats(&mut out));
        // nalgebra stores column-major: first column is (1, 4, 7).
        assert_eq!(&out[0..3], &[1.0, 4.0, 7.0]);
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn textures_have_no_float_form() {
        let mut out = Vec::new();
        assert!(!UniformValue::Texture(None).write_floats(&mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn scratch_pool_reuses_buffers() {
        let mut pool = ScratchPool::new();
        let mut buffer = pool.take(48);
        let capacity = buffer.capacity();
        assert!(capacity >= 48);
        buffer.extend(std::iter::repeat(1.0).take(48));
        pool.give_back(buffer);

        let again = pool.take(capacity);
        assert!(again.is_empty());
        assert_eq!(again.capacity(), capacity);
    }
}
