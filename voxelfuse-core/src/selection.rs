//! Block selections and 27-neighbor tables
//!
//! The integrate, surface extraction and marching cubes kernels operate on a
//! subset of the allocated blocks. A [`BlockSelection`] carries that subset
//! together with the lookup tables the kernels need to step across block
//! seams: for every selected block, the pool address of each of its 27
//! neighbors (offsets in `{-1, 0, 1}^3`), and the inverse permutation from
//! pool address back to selection slot.

use crate::error::{Error, Result};
use crate::voxel::VoxelBlockGrid;

/// Number of neighbor slots per block, including the block itself.
pub const NB_COUNT: usize = 27;

/// Neighbor slot of the block itself (offset `(0, 0, 0)`).
pub const NB_CENTER: usize = 13;

/// Flatten a neighbor offset in `{-1, 0, 1}^3` into a slot in `[0, 27)`.
pub fn neighbor_slot(dx: i64, dy: i64, dz: i64) -> usize {
    debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz));
    ((dx + 1) + 3 * (dy + 1) + 9 * (dz + 1)) as usize
}

/// Invert [`neighbor_slot`]: the offset a slot stands for.
pub fn neighbor_offset(nb: usize) -> [i64; 3] {
    debug_assert!(nb < NB_COUNT);
    [
        (nb % 3) as i64 - 1,
        ((nb / 3) % 3) as i64 - 1,
        (nb / 9) as i64 - 1,
    ]
}

/// A subset of allocated blocks plus the seam-crossing lookup tables.
#[derive(Debug, Clone)]
pub struct BlockSelection {
    indices: Vec<i32>,
    inv_indices: Vec<i32>,
    nb_indices: Vec<i32>,
    nb_masks: Vec<bool>,
}

impl BlockSelection {
    /// Build a selection over the given pool addresses.
    ///
    /// Fails if any index is out of range or appears twice.
    pub fn new(grid: &VoxelBlockGrid, indices: Vec<i32>) -> Result<Self> {
        let b = grid.len();
        let k = indices.len();

        let mut inv_indices = vec![-1i32; b];
        for (slot, &block_idx) in indices.iter().enumerate() {
            if block_idx < 0 || block_idx as usize >= b {
                return Err(Error::invalid_input(
                    "block selection",
                    format!("block index {} out of range for pool of {}", block_idx, b),
                ));
            }
            if inv_indices[block_idx as usize] != -1 {
                return Err(Error::invalid_input(
                    "block selection",
                    format!("duplicate block index {}", block_idx),
                ));
            }
            inv_indices[block_idx as usize] = slot as i32;
        }

        let mut nb_indices = vec![0i32; NB_COUNT * k];
        let mut nb_masks = vec![false; NB_COUNT * k];
        for (slot, &block_idx) in indices.iter().enumerate() {
            let key = grid.key(block_idx as usize);
            for nb in 0..NB_COUNT {
                let [dx, dy, dz] = neighbor_offset(nb);
                let nb_key = [key[0] + dx, key[1] + dy, key[2] + dz];
                if let Some(nb_idx) = grid.block_index(&nb_key) {
                    nb_indices[nb * k + slot] = nb_idx;
                    nb_masks[nb * k + slot] = true;
                }
            }
            debug_assert_eq!(nb_indices[NB_CENTER * k + slot], block_idx);
            debug_assert!(nb_masks[NB_CENTER * k + slot]);
        }

        Ok(Self {
            indices,
            inv_indices,
            nb_indices,
            nb_masks,
        })
    }

    /// Select every allocated block.
    pub fn of_all_blocks(grid: &VoxelBlockGrid) -> Result<Self> {
        Self::new(grid, (0..grid.len() as i32).collect())
    }

    /// Number of selected blocks (K).
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Size of the pool the selection was built against (B).
    pub fn pool_len(&self) -> usize {
        self.inv_indices.len()
    }

    /// Selected pool addresses, by slot.
    pub fn indices(&self) -> &[i32] {
        &self.indices
    }

    /// Selection slot of a pool address, or -1 if unselected.
    pub fn inv_index(&self, block_idx: i32) -> i32 {
        self.inv_indices[block_idx as usize]
    }

    /// Pool address of neighbor `nb` of the block in slot `k`, if allocated.
    pub fn neighbor(&self, nb: usize, k: usize) -> Option<i32> {
        let at = nb * self.indices.len() + k;
        if self.nb_masks[at] {
            Some(self.nb_indices[at])
        } else {
            None
        }
    }
}
