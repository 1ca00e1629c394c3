//! # VoxelFuse Kernels
//!
//! Parallel TSDF fusion and mesh extraction kernels for sparse voxel grids.
//!
//! The five kernels cover the depth-to-mesh pipeline: unprojection of depth
//! images, block allocation candidates from point sets, TSDF integration,
//! zero-crossing surface point extraction, and two-pass Marching Cubes.
//! Each kernel is a stateless closure dispatched over a flat workload range
//! by the launcher; a typed [`execute`] entry point routes invocations by
//! opcode.
//!
//! ## Example Usage
//!
//! ```rust
//! use voxelfuse_core::{BlockSelection, DepthImage, Matrix3, Matrix4, VoxelBlockGrid};
//! use voxelfuse_kernels as kernels;
//!
//! fn fuse(grid: &mut VoxelBlockGrid, depth: &DepthImage) -> voxelfuse_core::Result<()> {
//!     let intrinsics = Matrix3::new(100.0, 0.0, 50.0, 0.0, 100.0, 50.0, 0.0, 0.0, 1.0);
//!
//!     let map = kernels::unproject(depth, &intrinsics, 1.0, 3.0)?;
//!     let keys = kernels::touch(&map.valid_points(), grid.voxel_size(), grid.resolution())?;
//!     grid.activate(&keys);
//!
//!     let indices: Vec<i32> = (0..grid.len() as i32).collect();
//!     kernels::integrate(
//!         grid,
//!         &indices,
//!         depth,
//!         &intrinsics,
//!         &Matrix4::identity(),
//!         0.04,
//!         1.0,
//!     )?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod dispatch;
pub mod integrate;
pub mod launch;
pub mod marching_cubes;
pub mod surface;
pub mod tables;
pub mod touch;
pub mod unproject;

// Re-export commonly used items
pub use buffer::{OutputBuffer, DEFAULT_MAX_OUTPUT_VERTICES};
pub use dispatch::{execute, Kernel, KernelOutput, OpCode};
pub use integrate::integrate;
pub use launch::{init_launcher, launch, LaunchConfig, SlotCounter};
pub use marching_cubes::{marching_cubes, MarchingCubesConfig, MeshStructure, SurfaceMesh};
pub use surface::extract_surface_points;
pub use touch::touch;
pub use unproject::unproject;
