//! Core data structures for sparse voxel TSDF fusion
//!
//! This crate provides the data model shared by the fusion kernels: the sparse
//! voxel block grid and its spatial hash index, block selections with their
//! 27-neighbor tables, depth image and vertex map containers, the n-dimensional
//! workload indexer, and camera projection transforms.

pub mod error;
pub mod image;
pub mod indexer;
pub mod point;
pub mod selection;
pub mod transform;
pub mod voxel;

pub use error::*;
pub use image::*;
pub use indexer::*;
pub use point::*;
pub use selection::*;
pub use transform::*;
pub use voxel::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Common result type for voxelfuse operations
pub type Result<T> = std::result::Result<T, Error>;
