//! Sparse voxel block grid and its spatial hash index

use crate::error::{Error, Result};
use crate::indexer::NdIndexer;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Block coordinates `(xb, yb, zb)` in block units.
///
/// Block `b` covers world voxels `[xb*R, (xb+1)*R) x [yb*R, (yb+1)*R) x
/// [zb*R, (zb+1)*R)` where `R` is the block resolution.
pub type BlockKey = [i64; 3];

/// A single TSDF voxel: truncated signed distance and observation weight.
///
/// `weight == 0` means the voxel is unobserved; after integration
/// `tsdf` lies in `[-1, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Voxel {
    pub tsdf: f32,
    pub weight: f32,
}

impl Voxel {
    pub fn is_observed(&self) -> bool {
        self.weight > 0.0
    }
}

/// Spatial hash index from block keys to block pool addresses.
///
/// This is the activation primitive the fusion kernels are built around: a
/// batch of candidate keys comes in, addresses and newly-inserted masks come
/// out. The touch kernel uses a transient index for deduplication; the grid
/// embeds one to back its pool.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    map: HashMap<BlockKey, i32>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert-or-find a batch of keys.
    ///
    /// Returns one address per key and a mask that is true iff the key was
    /// newly inserted by this call. Within a batch only the first occurrence
    /// of a duplicate key gets a true mask.
    pub fn activate(&mut self, keys: &[BlockKey]) -> (Vec<i32>, Vec<bool>) {
        let mut addrs = Vec::with_capacity(keys.len());
        let mut masks = Vec::with_capacity(keys.len());

        for key in keys {
            let next = self.map.len() as i32;
            match self.map.entry(*key) {
                std::collections::hash_map::Entry::Occupied(e) => {
                    addrs.push(*e.get());
                    masks.push(false);
                }
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(next);
                    addrs.push(next);
                    masks.push(true);
                }
            }
        }

        (addrs, masks)
    }

    /// Address of an already-activated key.
    pub fn get(&self, key: &BlockKey) -> Option<i32> {
        self.map.get(key).copied()
    }
}

/// A sparse grid of `R x R x R` voxel blocks addressed through a spatial
/// hash index.
///
/// The pool is laid out block-major: `voxels[b * R^3 ..]` holds block `b`
/// with the x axis innermost. Blocks are created by [`Self::activate`]; the
/// kernels only read and write voxels in place.
#[derive(Debug, Clone)]
pub struct VoxelBlockGrid {
    resolution: usize,
    voxel_size: f32,
    keys: Vec<BlockKey>,
    voxels: Vec<Voxel>,
    index: BlockIndex,
}

impl VoxelBlockGrid {
    /// Create an empty grid with the given block resolution and metric voxel
    /// size.
    pub fn new(resolution: usize, voxel_size: f32) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidData("block resolution must be positive".into()));
        }
        if voxel_size <= 0.0 {
            return Err(Error::InvalidData("voxel size must be positive".into()));
        }
        Ok(Self {
            resolution,
            voxel_size,
            keys: Vec::new(),
            voxels: Vec::new(),
            index: BlockIndex::new(),
        })
    }

    /// Voxels per block edge.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Metric edge length of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Metric edge length of one block: `voxel_size * resolution`.
    pub fn block_size(&self) -> f32 {
        self.voxel_size * self.resolution as f32
    }

    /// Voxels per block: `R^3`.
    pub fn voxels_per_block(&self) -> usize {
        self.resolution * self.resolution * self.resolution
    }

    /// Number of allocated blocks.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Activate a batch of block keys, growing the pool for fresh keys.
    ///
    /// Returns `(addresses, masks)` with the semantics of
    /// [`BlockIndex::activate`].
    pub fn activate(&mut self, keys: &[BlockKey]) -> (Vec<i32>, Vec<bool>) {
        let (addrs, masks) = self.index.activate(keys);
        let r3 = self.voxels_per_block();
        for (key, fresh) in keys.iter().zip(&masks) {
            if *fresh {
                self.keys.push(*key);
                self.voxels.extend(std::iter::repeat(Voxel::default()).take(r3));
            }
        }
        debug_assert_eq!(self.voxels.len(), self.keys.len() * r3);
        (addrs, masks)
    }

    /// Pool address of an allocated block.
    pub fn block_index(&self, key: &BlockKey) -> Option<i32> {
        self.index.get(key)
    }

    /// Keys of all allocated blocks, by pool address.
    pub fn keys(&self) -> &[BlockKey] {
        &self.keys
    }

    /// Key of one block.
    pub fn key(&self, block_idx: usize) -> BlockKey {
        self.keys[block_idx]
    }

    /// The whole voxel pool, block-major.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Mutable access to the whole voxel pool.
    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    /// The voxels of one block.
    pub fn block(&self, block_idx: usize) -> &[Voxel] {
        let r3 = self.voxels_per_block();
        &self.voxels[block_idx * r3..(block_idx + 1) * r3]
    }

    /// Voxel at block-local coordinates.
    pub fn voxel(&self, block_idx: usize, x: usize, y: usize, z: usize) -> Voxel {
        let r = self.resolution;
        self.block(block_idx)[x + r * (y + r * z)]
    }

    /// Indexer over block-local voxel coordinates `(x, y, z)`, x innermost.
    pub fn voxel_indexer(&self) -> NdIndexer {
        NdIndexer::new(&[self.resolution, self.resolution, self.resolution])
    }

    /// Indexer over the whole pool as `(x, y, z, block)`.
    pub fn pool_indexer(&self) -> NdIndexer {
        NdIndexer::new(&[
            self.resolution,
            self.resolution,
            self.resolution,
            self.keys.len().max(1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_index_activate_dedup() {
        let mut index = BlockIndex::new();
        assert!(index.is_empty());

        let keys = [[0, 0, 0], [1, 0, 0], [0, 0, 0], [2, 0, 0]];
        let (addrs, masks) = index.activate(&keys);

        assert_eq!(addrs, vec![0, 1, 0, 2]);
        assert_eq!(masks, vec![true, true, false, true]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_block_index_activate_existing() {
        let mut index = BlockIndex::new();
        index.activate(&[[5, 5, 5]]);

        let (addrs, masks) = index.activate(&[[5, 5, 5], [6, 5, 5]]);
        assert_eq!(addrs, vec![0, 1]);
        assert_eq!(masks, vec![false, true]);
    }

    #[test]
    fn test_grid_activation_grows_pool() {
        let mut grid = VoxelBlockGrid::new(8, 0.01).unwrap();
        assert!(grid.is_empty());

        let (addrs, _) = grid.activate(&[[0, 0, 0], [1, 2, 3]]);
        assert_eq!(addrs, vec![0, 1]);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.voxels().len(), 2 * 512);
        assert_eq!(grid.key(1), [1, 2, 3]);
        assert_eq!(grid.block_index(&[1, 2, 3]), Some(1));
        assert_eq!(grid.block_index(&[9, 9, 9]), None);
    }

    #[test]
    fn test_fresh_voxels_are_unobserved() {
        let mut grid = VoxelBlockGrid::new(4, 0.05).unwrap();
        grid.activate(&[[0, 0, 0]]);

        assert!(grid.block(0).iter().all(|v| !v.is_observed()));
    }

    #[test]
    fn test_grid_parameter_validation() {
        assert!(VoxelBlockGrid::new(0, 0.01).is_err());
        assert!(VoxelBlockGrid::new(8, 0.0).is_err());
        assert!(VoxelBlockGrid::new(8, -1.0).is_err());
    }

    #[test]
    fn test_block_size() {
        let grid = VoxelBlockGrid::new(16, 0.01).unwrap();
        assert!((grid.block_size() - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_pool_indexer_decomposes_block_and_voxel() {
        let mut grid = VoxelBlockGrid::new(8, 0.01).unwrap();
        grid.activate(&[[0, 0, 0], [1, 0, 0], [2, 0, 0]]);

        let pool = grid.pool_indexer();
        assert_eq!(pool.num_workloads(), 3 * 512);

        let [x, y, z, b] = pool.coord(512 * 2 + 65);
        assert_eq!(b, 2);
        assert_eq!([x, y, z], [1, 0, 1]);
        assert_eq!(pool.workload(&[x, y, z, b]), 512 * 2 + 65);
    }
}
