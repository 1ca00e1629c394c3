//! Point types and point cloud container

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A generic point cloud container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.points.iter()
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}
