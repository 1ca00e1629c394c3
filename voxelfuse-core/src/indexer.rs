//! Linear workload to multi-dimensional coordinate mapping
//!
//! The fusion kernels address every buffer through a single linearization:
//! row-major with the innermost axis fastest. For the voxel block pool the
//! 4-D indexer packs `(x, y, z, block)` with `block` as the outermost axis,
//! so a workload index decomposes into a voxel-in-block coordinate plus a
//! block index.

/// Maps between linear workload indices and up to 4-D coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdIndexer {
    shape: [usize; 4],
    ndims: usize,
}

impl NdIndexer {
    /// Create an indexer for the given shape, innermost axis first.
    ///
    /// Panics if the shape is empty, has more than 4 dimensions, or contains
    /// a zero extent.
    pub fn new(shape: &[usize]) -> Self {
        assert!(!shape.is_empty() && shape.len() <= 4, "shape must have 1-4 dims");
        assert!(shape.iter().all(|&d| d > 0), "shape extents must be positive");

        let mut padded = [1usize; 4];
        padded[..shape.len()].copy_from_slice(shape);
        Self {
            shape: padded,
            ndims: shape.len(),
        }
    }

    /// Number of dimensions the indexer was built with.
    pub fn ndims(&self) -> usize {
        self.ndims
    }

    /// Extent of dimension `dim` (innermost is 0).
    pub fn extent(&self, dim: usize) -> usize {
        self.shape[dim]
    }

    /// Total number of workloads, the product of all extents.
    pub fn num_workloads(&self) -> usize {
        self.shape.iter().product()
    }

    /// Decompose a linear workload index into coordinates, innermost axis
    /// fastest. Unused trailing coordinates are zero.
    ///
    /// The result is unspecified for `workload >= num_workloads()`.
    pub fn coord(&self, workload: usize) -> [usize; 4] {
        let mut w = workload;
        let mut c = [0usize; 4];
        for (i, &extent) in self.shape.iter().enumerate() {
            c[i] = w % extent;
            w /= extent;
        }
        c
    }

    /// Recompose coordinates into a linear workload index. Inverse of
    /// [`coord`](Self::coord) on valid ranges.
    pub fn workload(&self, coord: &[usize]) -> usize {
        debug_assert!(coord.len() >= self.ndims);
        let mut w = 0usize;
        for i in (0..self.ndims).rev() {
            debug_assert!(coord[i] < self.shape[i]);
            w = w * self.shape[i] + coord[i];
        }
        w
    }

    /// Check whether an image coordinate lies within the first two extents
    /// after truncation to integer.
    pub fn in_boundary(&self, u: f32, v: f32) -> bool {
        let ui = u as i64;
        let vi = v as i64;
        ui >= 0 && ui < self.shape[0] as i64 && vi >= 0 && vi < self.shape[1] as i64
    }
}
