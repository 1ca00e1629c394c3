//! Depth image and vertex map containers

use crate::error::{Error, Result};
use crate::indexer::NdIndexer;
use crate::point::Vector3f;

/// A single-channel depth image, row-major.
///
/// Raw depth sources of any numeric type are cast to `f32` at construction;
/// the `depth_scale` divisor is applied by the kernels, not here.
#[derive(Debug, Clone)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthImage {
    /// Wrap existing f32 depth data.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidData(format!(
                "depth buffer holds {} values, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Cast raw u16 depth data (the common sensor format) to f32.
    pub fn from_u16(width: usize, height: usize, data: &[u16]) -> Result<Self> {
        Self::new(width, height, data.iter().map(|&d| d as f32).collect())
    }

    /// An image filled with a constant depth value.
    pub fn constant(width: usize, height: usize, depth: f32) -> Self {
        Self {
            width,
            height,
            data: vec![depth; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Depth value at a pixel, with bounds checking.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Raw row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw row-major data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Indexer over `(x, y)` pixel coordinates, x innermost.
    pub fn indexer(&self) -> NdIndexer {
        NdIndexer::new(&[self.width, self.height])
    }
}

/// A per-pixel 3D vertex map, the output of unprojection.
///
/// Pixels with no valid depth hold the zero vector.
#[derive(Debug, Clone)]
pub struct VertexMap {
    width: usize,
    height: usize,
    data: Vec<Vector3f>,
}

impl VertexMap {
    /// A map of the given size with every vertex at the origin.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Vector3f::zeros(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Vertex at a pixel, with bounds checking.
    pub fn get(&self, x: usize, y: usize) -> Option<Vector3f> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Raw row-major data.
    pub fn data(&self) -> &[Vector3f] {
        &self.data
    }

    /// Mutable raw row-major data.
    pub fn data_mut(&mut self) -> &mut [Vector3f] {
        &mut self.data
    }

    /// Collect the vertices with nonzero depth as a point set.
    pub fn valid_points(&self) -> Vec<crate::point::Point3f> {
        self.data
            .iter()
            .filter(|v| v.z != 0.0)
            .map(|v| crate::point::Point3f::from(*v))
            .collect()
    }
}
