//! Typed kernel dispatch
//!
//! A single entry point executes any of the fusion kernels from a tagged
//! argument variant. The opcode enum mirrors the variants for callers that
//! route or log by kernel identity without holding arguments.

use crate::integrate::integrate;
use crate::launch::launch;
use crate::marching_cubes::{marching_cubes, MarchingCubesConfig, SurfaceMesh};
use crate::surface::extract_surface_points;
use crate::touch::touch;
use crate::unproject::unproject;
use nalgebra::{Matrix3, Matrix4};
use voxelfuse_core::{
    BlockKey, BlockSelection, DepthImage, Point3f, PointCloud, Result, VertexMap, VoxelBlockGrid,
};

/// Identity of a fusion kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Unproject,
    TsdfTouch,
    TsdfIntegrate,
    TsdfSurfaceExtraction,
    MarchingCubes,
    /// Reserved; dispatches to a no-op.
    RayCasting,
    /// Launches a handful of empty workloads, for exercising the launcher.
    Debug,
}

/// A fusion kernel invocation with its typed arguments.
pub enum Kernel<'a> {
    Unproject {
        depth: &'a DepthImage,
        intrinsics: &'a Matrix3<f32>,
        depth_scale: f32,
        depth_max: f32,
    },
    TsdfTouch {
        points: &'a [Point3f],
        voxel_size: f32,
        resolution: usize,
    },
    TsdfIntegrate {
        grid: &'a mut VoxelBlockGrid,
        indices: &'a [i32],
        depth: &'a DepthImage,
        intrinsics: &'a Matrix3<f32>,
        extrinsics: &'a Matrix4<f32>,
        sdf_trunc: f32,
        depth_scale: f32,
    },
    TsdfSurfaceExtraction {
        grid: &'a VoxelBlockGrid,
        selection: &'a BlockSelection,
        max_points: usize,
    },
    MarchingCubes {
        grid: &'a VoxelBlockGrid,
        selection: &'a BlockSelection,
        config: MarchingCubesConfig,
    },
    RayCasting,
    Debug,
}

impl Kernel<'_> {
    /// The opcode this invocation dispatches to.
    pub fn code(&self) -> OpCode {
        match self {
            Kernel::Unproject { .. } => OpCode::Unproject,
            Kernel::TsdfTouch { .. } => OpCode::TsdfTouch,
            Kernel::TsdfIntegrate { .. } => OpCode::TsdfIntegrate,
            Kernel::TsdfSurfaceExtraction { .. } => OpCode::TsdfSurfaceExtraction,
            Kernel::MarchingCubes { .. } => OpCode::MarchingCubes,
            Kernel::RayCasting => OpCode::RayCasting,
            Kernel::Debug => OpCode::Debug,
        }
    }
}

/// What a kernel produced.
#[derive(Debug)]
pub enum KernelOutput {
    /// The kernel mutated its inputs in place or did nothing.
    None,
    VertexMap(VertexMap),
    BlockCoords(Vec<BlockKey>),
    Points(PointCloud<Point3f>),
    Mesh(SurfaceMesh),
}

/// Execute one kernel invocation.
///
/// Contract violations surface as errors with no partial side effects;
/// numerical no-ops inside a kernel simply skip their workload.
pub fn execute(op: Kernel<'_>) -> Result<KernelOutput> {
    match op {
        Kernel::Unproject {
            depth,
            intrinsics,
            depth_scale,
            depth_max,
        } => Ok(KernelOutput::VertexMap(unproject(
            depth,
            intrinsics,
            depth_scale,
            depth_max,
        )?)),
        Kernel::TsdfTouch {
            points,
            voxel_size,
            resolution,
        } => Ok(KernelOutput::BlockCoords(touch(
            points,
            voxel_size,
            resolution,
        )?)),
        Kernel::TsdfIntegrate {
            grid,
            indices,
            depth,
            intrinsics,
            extrinsics,
            sdf_trunc,
            depth_scale,
        } => {
            integrate(
                grid,
                indices,
                depth,
                intrinsics,
                extrinsics,
                sdf_trunc,
                depth_scale,
            )?;
            Ok(KernelOutput::None)
        }
        Kernel::TsdfSurfaceExtraction {
            grid,
            selection,
            max_points,
        } => Ok(KernelOutput::Points(extract_surface_points(
            grid, selection, max_points,
        )?)),
        Kernel::MarchingCubes {
            grid,
            selection,
            config,
        } => Ok(KernelOutput::Mesh(marching_cubes(grid, selection, &config)?)),
        Kernel::RayCasting => Ok(KernelOutput::None),
        Kernel::Debug => {
            launch(10, |_| {});
            Ok(KernelOutput::None)
        }
    }
}
