//! # VoxelFuse
//!
//! Sparse voxel TSDF fusion and surface extraction for depth camera streams.
//!
//! This is the umbrella crate that provides convenient access to all VoxelFuse
//! functionality. You can use this crate to get everything in one place, or use
//! the individual crates for more granular control over dependencies.
//!
//! ## Crates
//!
//! - **Core**: Data model (voxel block grid, block selections, depth images,
//!   camera transforms)
//! - **Kernels**: The parallel fusion kernels (unproject, touch, integrate,
//!   surface extraction, marching cubes) and their dispatch entry point
//!
//! ## Quick Start
//!
//! ```rust
//! use voxelfuse::prelude::*;
//!
//! // A fresh sparse grid: 8^3 voxel blocks, 1cm voxels
//! let mut grid = VoxelBlockGrid::new(8, 0.01).unwrap();
//!
//! // Allocate the blocks touched by a point set (with 27-neighborhood dilation)
//! let points = vec![Point3f::new(0.0, 0.0, 1.0)];
//! let keys = touch(&points, grid.voxel_size(), grid.resolution()).unwrap();
//! let (addrs, masks) = grid.activate(&keys);
//! assert_eq!(addrs.len(), masks.len());
//! ```

// Re-export core functionality
pub use voxelfuse_core::*;

// Re-export the kernel crate
pub use voxelfuse_kernels as kernels;

pub use voxelfuse_kernels::{
    execute, extract_surface_points, integrate, marching_cubes, touch, unproject, Kernel,
    KernelOutput, MarchingCubesConfig, OpCode, SurfaceMesh,
};

/// Convenient imports for common use cases
pub mod prelude {
    pub use voxelfuse_core::*;
    pub use voxelfuse_kernels::*;
}
