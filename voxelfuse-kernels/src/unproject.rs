//! Depth image unprojection

use crate::launch::execute_parallel;
use nalgebra::{Matrix3, Matrix4};
use rayon::prelude::*;
use voxelfuse_core::{CameraTransform, DepthImage, Error, Result, VertexMap};

/// Unproject a depth image into a per-pixel vertex map.
///
/// Depth values are divided by `depth_scale`; anything at or beyond
/// `depth_max` is treated as missing, so the corresponding vertex is the
/// zero vector.
pub fn unproject(
    depth: &DepthImage,
    intrinsics: &Matrix3<f32>,
    depth_scale: f32,
    depth_max: f32,
) -> Result<VertexMap> {
    const OP: &str = "unproject";

    if depth.is_empty() {
        return Err(Error::invalid_input(OP, "empty depth image"));
    }
    if depth_scale <= 0.0 {
        return Err(Error::invalid_input(OP, "depth scale must be positive"));
    }

    let width = depth.width();
    let transform = CameraTransform::metric(intrinsics, &Matrix4::identity());
    let mut map = VertexMap::zeros(width, depth.height());

    let pixels = depth.data();
    execute_parallel(|| {
        map.data_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, vertex) in row.iter_mut().enumerate() {
                    let mut d = pixels[y * width + x] / depth_scale;
                    if d >= depth_max {
                        d = 0.0;
                    }
                    *vertex = transform.unproject(x as f32, y as f32, d);
                }
            });
    });

    Ok(map)
}
