//! TSDF depth frame integration

use crate::launch::execute_parallel;
use nalgebra::{Matrix3, Matrix4};
use rayon::prelude::*;
use voxelfuse_core::{CameraTransform, DepthImage, Error, Result, VoxelBlockGrid};

/// Fuse a depth frame into the selected blocks of a voxel grid.
///
/// Every voxel of every selected block is projected into the depth image;
/// voxels in front of the observed surface (within the truncation band) get
/// the running-average TSDF update `tsdf' = (w*tsdf + sdf) / (w + 1)`,
/// `w' = w + 1`. Voxels that project outside the image, behind the
/// truncation band, or onto missing depth are left untouched.
///
/// `indices` must contain each selected pool address at most once; each
/// voxel cell then has exactly one writer and the update needs no atomics.
pub fn integrate(
    grid: &mut VoxelBlockGrid,
    indices: &[i32],
    depth: &DepthImage,
    intrinsics: &Matrix3<f32>,
    extrinsics: &Matrix4<f32>,
    sdf_trunc: f32,
    depth_scale: f32,
) -> Result<()> {
    const OP: &str = "integrate";

    if depth.is_empty() {
        return Err(Error::invalid_input(OP, "empty depth image"));
    }
    if depth_scale <= 0.0 {
        return Err(Error::invalid_input(OP, "depth scale must be positive"));
    }
    if sdf_trunc <= 0.0 {
        return Err(Error::invalid_input(OP, "truncation distance must be positive"));
    }

    let mut selected = vec![false; grid.len()];
    for &block_idx in indices {
        if block_idx < 0 || block_idx as usize >= grid.len() {
            return Err(Error::invalid_input(
                OP,
                format!("block index {} out of range for pool of {}", block_idx, grid.len()),
            ));
        }
        if std::mem::replace(&mut selected[block_idx as usize], true) {
            return Err(Error::invalid_input(
                OP,
                format!("duplicate block index {}", block_idx),
            ));
        }
    }

    let r = grid.resolution();
    let r3 = grid.voxels_per_block();
    let transform = CameraTransform::new(intrinsics, extrinsics, grid.voxel_size());
    let voxel_indexer = grid.voxel_indexer();
    let image_indexer = depth.indexer();
    let width = depth.width();
    let pixels = depth.data();
    let keys = grid.keys().to_vec();
    let voxels = grid.voxels_mut();

    execute_parallel(|| {
        voxels
            .par_chunks_mut(r3)
            .enumerate()
            .filter(|(block_idx, _)| selected[*block_idx])
            .for_each(|(block_idx, block)| {
                let key = keys[block_idx];
                for (voxel_idx, voxel) in block.iter_mut().enumerate() {
                    let [xv, yv, zv, _] = voxel_indexer.coord(voxel_idx);
                    debug_assert_eq!(voxel_indexer.workload(&[xv, yv, zv]), voxel_idx);

                    let x = (key[0] * r as i64 + xv as i64) as f32;
                    let y = (key[1] * r as i64 + yv as i64) as f32;
                    let z = (key[2] * r as i64 + zv as i64) as f32;

                    let pc = transform.rigid_transform(x, y, z);
                    if pc.z <= 0.0 {
                        continue;
                    }

                    let (u, v) = transform.project(&pc);
                    if !image_indexer.in_boundary(u, v) {
                        continue;
                    }

                    let depth_sample = pixels[v as usize * width + u as usize] / depth_scale;
                    let sdf = depth_sample - pc.z;
                    if depth_sample <= 0.0 || sdf < -sdf_trunc {
                        continue;
                    }
                    let sdf = sdf.min(sdf_trunc) / sdf_trunc;

                    let w = voxel.weight;
                    voxel.tsdf = (voxel.tsdf * w + sdf) / (w + 1.0);
                    voxel.weight = w + 1.0;
                    debug_assert!(voxel.tsdf >= -1.0 - 1e-5 && voxel.tsdf <= 1.0 + 1e-5);
                }
            });
    });

    Ok(())
}
