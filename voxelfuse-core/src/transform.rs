//! Camera projection and rigid transform utilities

use crate::point::Vector3f;
use nalgebra::{Matrix3, Matrix4, Vector3};

/// Pinhole projection combined with a world-to-camera rigid transform.
///
/// Holds the focal lengths and principal point from a 3x3 intrinsics matrix,
/// the 3x4 rigid part of a 4x4 extrinsics matrix, and an optional voxel size
/// used to scale voxel-unit inputs to metric before the rigid transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    rotation: Matrix3<f32>,
    translation: Vector3<f32>,
    voxel_size: f32,
}

impl CameraTransform {
    /// Build a transform whose rigid stage scales voxel-unit coordinates by
    /// `voxel_size` before applying the extrinsics.
    pub fn new(intrinsics: &Matrix3<f32>, extrinsics: &Matrix4<f32>, voxel_size: f32) -> Self {
        Self {
            fx: intrinsics[(0, 0)],
            fy: intrinsics[(1, 1)],
            cx: intrinsics[(0, 2)],
            cy: intrinsics[(1, 2)],
            rotation: extrinsics.fixed_view::<3, 3>(0, 0).into(),
            translation: extrinsics.fixed_view::<3, 1>(0, 3).into(),
            voxel_size,
        }
    }

    /// Build a transform for metric-unit inputs (no voxel scaling).
    pub fn metric(intrinsics: &Matrix3<f32>, extrinsics: &Matrix4<f32>) -> Self {
        Self::new(intrinsics, extrinsics, 1.0)
    }

    /// Focal lengths and principal point `(fx, fy, cx, cy)`.
    pub fn intrinsics(&self) -> (f32, f32, f32, f32) {
        (self.fx, self.fy, self.cx, self.cy)
    }

    /// Apply the world-to-camera rigid transform, scaling by the voxel size
    /// first when the input is in voxel units.
    pub fn rigid_transform(&self, x: f32, y: f32, z: f32) -> Vector3f {
        let p = Vector3::new(x, y, z) * self.voxel_size;
        self.rotation * p + self.translation
    }

    /// Pinhole projection of a camera-frame point to pixel coordinates.
    ///
    /// The result is undefined for `p.z <= 0`; callers check the depth first.
    pub fn project(&self, p: &Vector3f) -> (f32, f32) {
        (
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        )
    }

    /// Inverse pinhole projection of a pixel at depth `d` into the camera
    /// frame.
    pub fn unproject(&self, u: f32, v: f32, d: f32) -> Vector3f {
        Vector3::new(
            (u - self.cx) * d / self.fx,
            (v - self.cy) * d / self.fy,
            d,
        )
    }
}
