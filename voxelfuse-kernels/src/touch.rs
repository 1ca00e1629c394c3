//! Block allocation candidates from a point set

use crate::launch::execute_parallel;
use rayon::prelude::*;
use voxelfuse_core::{neighbor_offset, BlockIndex, BlockKey, Error, Point3f, Result, NB_COUNT};

/// Convert a point set into the block keys that need allocation, dilated by
/// the full 27-neighborhood.
///
/// Each point lands in the block containing it; the dilation guarantees that
/// integration and mesh extraction can reach the +/-1 neighborhood of every
/// observed voxel without a border miss. The output is neighbor-major:
/// 27 runs of the deduplicated key set, each shifted by one offset in
/// `{-1, 0, 1}^3`.
pub fn touch(points: &[Point3f], voxel_size: f32, resolution: usize) -> Result<Vec<BlockKey>> {
    const OP: &str = "touch";

    if voxel_size <= 0.0 {
        return Err(Error::invalid_input(OP, "voxel size must be positive"));
    }
    if resolution == 0 {
        return Err(Error::invalid_input(OP, "resolution must be positive"));
    }
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let block_size = voxel_size * resolution as f32;
    let keys: Vec<BlockKey> = execute_parallel(|| {
        points
            .par_iter()
            .map(|p| {
                [
                    (p.x / block_size).floor() as i64,
                    (p.y / block_size).floor() as i64,
                    (p.z / block_size).floor() as i64,
                ]
            })
            .collect()
    });

    // Deduplicate through a transient hash index; the first occurrence of
    // each key gets a true mask.
    let mut index = BlockIndex::new();
    let (_, masks) = index.activate(&keys);
    let unique: Vec<BlockKey> = keys
        .iter()
        .zip(&masks)
        .filter(|(_, &fresh)| fresh)
        .map(|(key, _)| *key)
        .collect();

    let mut dilated = Vec::with_capacity(NB_COUNT * unique.len());
    for nb in 0..NB_COUNT {
        let [dx, dy, dz] = neighbor_offset(nb);
        for key in &unique {
            dilated.push([key[0] + dx, key[1] + dy, key[2] + dz]);
        }
    }

    Ok(dilated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_single_point_dilation() {
        let points = vec![Point3f::new(0.0, 0.0, 0.0)];
        let keys = touch(&points, 0.01, 8).unwrap();
        assert_eq!(keys.len(), 27);

        let unique: HashSet<BlockKey> = keys.into_iter().collect();
        assert_eq!(unique.len(), 27);
        for dx in -1..=1i64 {
            for dy in -1..=1i64 {
                for dz in -1..=1i64 {
                    assert!(unique.contains(&[dx, dy, dz]));
                }
            }
        }
    }

    #[test]
    fn test_points_in_same_block_dedupe() {
        let points = vec![
            Point3f::new(0.01, 0.01, 0.01),
            Point3f::new(0.02, 0.03, 0.04),
            Point3f::new(0.05, 0.05, 0.05),
        ];
        // block size 0.08: all three land in block (0, 0, 0)
        let keys = touch(&points, 0.01, 8).unwrap();
        assert_eq!(keys.len(), 27);
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let points = vec![Point3f::new(-0.001, 0.0, 0.0)];
        let keys = touch(&points, 0.01, 8).unwrap();

        let unique: HashSet<BlockKey> = keys.into_iter().collect();
        // the point lives in block (-1, 0, 0); dilation spans x in [-2, 0]
        assert!(unique.contains(&[-1, 0, 0]));
        assert!(unique.contains(&[-2, -1, -1]));
        assert!(unique.contains(&[0, 1, 1]));
    }

    #[test]
    fn test_dilation_is_union_of_neighborhoods() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.5, 0.0, 0.0), // block (6, 0, 0) at block size 0.08
        ];
        let keys = touch(&points, 0.01, 8).unwrap();
        assert_eq!(keys.len(), 2 * 27);

        let got: HashSet<BlockKey> = keys.into_iter().collect();
        let mut expected = HashSet::new();
        for base in [[0i64, 0, 0], [6, 0, 0]] {
            for nb in 0..NB_COUNT {
                let [dx, dy, dz] = neighbor_offset(nb);
                expected.insert([base[0] + dx, base[1] + dy, base[2] + dz]);
            }
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_empty_points() {
        let keys = touch(&[], 0.01, 8).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let points = vec![Point3f::new(0.0, 0.0, 0.0)];
        assert!(touch(&points, 0.0, 8).is_err());
        assert!(touch(&points, 0.01, 0).is_err());
    }
}
