//! Iso-surface point extraction by zero-crossing detection

use crate::buffer::OutputBuffer;
use crate::launch::launch;
use voxelfuse_core::{
    neighbor_slot, BlockSelection, Error, Point3f, PointCloud, Result, VoxelBlockGrid,
};

/// Extract points where the TSDF changes sign along the +x, +y or +z edge of
/// a voxel.
///
/// Each crossing between an observed voxel and an observed +1 neighbor (the
/// neighbor may live across a block seam) emits one point at
/// `voxel_size * (world_coord + ratio * unit_axis)` with
/// `ratio = tsdf_i / (tsdf_i - tsdf_o)`. Output order is nondeterministic;
/// emission stops silently once `max_points` rows have been realized.
pub fn extract_surface_points(
    grid: &VoxelBlockGrid,
    selection: &BlockSelection,
    max_points: usize,
) -> Result<PointCloud<Point3f>> {
    const OP: &str = "surface extraction";

    if selection.pool_len() != grid.len() {
        return Err(Error::invalid_input(
            OP,
            format!(
                "selection was built for a pool of {}, grid has {}",
                selection.pool_len(),
                grid.len()
            ),
        ));
    }

    let k_total = selection.len();
    if k_total == 0 {
        return Ok(PointCloud::new());
    }

    let r = grid.resolution();
    let r3 = grid.voxels_per_block();
    let voxel_size = grid.voxel_size();
    let voxels = grid.voxels();
    let keys = grid.keys();
    let indexer = grid.voxel_indexer();

    let capacity = (k_total * r3 * 3).min(max_points);
    let buffer = OutputBuffer::new(capacity, Point3f::origin());

    launch(k_total, |k| {
        let block_idx = selection.indices()[k] as usize;
        let key = keys[block_idx];
        let block = &voxels[block_idx * r3..(block_idx + 1) * r3];

        for voxel_idx in 0..r3 {
            let origin = block[voxel_idx];
            if !origin.is_observed() {
                continue;
            }
            let [xv, yv, zv, _] = indexer.coord(voxel_idx);

            for axis in 0..3 {
                let mut c = [xv as i64, yv as i64, zv as i64];
                c[axis] += 1;

                let shift = [
                    c[0].div_euclid(r as i64),
                    c[1].div_euclid(r as i64),
                    c[2].div_euclid(r as i64),
                ];
                let nb = neighbor_slot(shift[0], shift[1], shift[2]);
                let Some(nb_block) = selection.neighbor(nb, k) else {
                    continue;
                };

                let local = [
                    (c[0] - shift[0] * r as i64) as usize,
                    (c[1] - shift[1] * r as i64) as usize,
                    (c[2] - shift[2] * r as i64) as usize,
                ];
                let neighbor =
                    voxels[nb_block as usize * r3 + indexer.workload(&local)];

                if neighbor.is_observed() && origin.tsdf * neighbor.tsdf < 0.0 {
                    let ratio = neighbor.tsdf / (neighbor.tsdf - origin.tsdf);
                    let mut p = [
                        (key[0] * r as i64 + xv as i64) as f32,
                        (key[1] * r as i64 + yv as i64) as f32,
                        (key[2] * r as i64 + zv as i64) as f32,
                    ];
                    p[axis] += ratio;
                    // a None here means the buffer saturated; the point is dropped
                    let _ = buffer.push(Point3f::new(
                        voxel_size * p[0],
                        voxel_size * p[1],
                        voxel_size * p[2],
                    ));
                }
            }
        }
    });

    Ok(PointCloud::from_points(buffer.into_vec()))
}
