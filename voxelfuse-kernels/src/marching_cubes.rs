//! Two-pass Marching Cubes over the sparse block grid
//!
//! Pass 0 classifies every voxel cube and marks the edges that need a vertex
//! in a shared mesh structure; the marks establish a one-to-one edge-to-owner
//! correspondence across block seams. Pass 1 allocates one vertex id per
//! marked edge, interpolates its position, and blends central-difference
//! normals from both edge endpoints.

use crate::buffer::{OutputBuffer, DEFAULT_MAX_OUTPUT_VERTICES};
use crate::launch::launch;
use crate::tables::{EDGE_SHIFTS, EDGE_TABLE, VTX_SHIFTS};
use std::sync::atomic::{AtomicI32, Ordering};
use voxelfuse_core::{
    neighbor_slot, BlockSelection, Error, Point3f, Result, Vector3f, VoxelBlockGrid,
};

/// Channel holding the cube case; channels 0-2 hold the +x/+y/+z edge slots.
const CASE_CHANNEL: usize = 3;

/// Configuration for the marching cubes kernel.
#[derive(Debug, Clone, Copy)]
pub struct MarchingCubesConfig {
    /// Cap on emitted vertices; emission past the cap is dropped.
    pub max_vertices: usize,
    /// Reproduce the gradient indexing quirk of earlier releases, where the
    /// +y and +z central-difference samples reused the block shift of the
    /// x step. Misrouted samples contribute a zero derivative term.
    pub gradient_compat: bool,
}

impl Default for MarchingCubesConfig {
    fn default() -> Self {
        Self {
            max_vertices: DEFAULT_MAX_OUTPUT_VERTICES,
            gradient_compat: false,
        }
    }
}

/// Per-voxel edge slots and cube cases, `[K][R][R][R][4]` with x innermost.
///
/// Channels 0-2 map the voxel's +x/+y/+z edges to vertex ids; -1 marks an
/// edge that required a vertex but never received one (only under output
/// saturation). Channel 3 is the 8-bit cube case.
#[derive(Debug, Clone)]
pub struct MeshStructure {
    block_count: usize,
    resolution: usize,
    data: Vec<i32>,
}

impl MeshStructure {
    fn cell(&self, k: usize, x: usize, y: usize, z: usize) -> usize {
        let r = self.resolution;
        (((k * r + z) * r + y) * r + x) * 4
    }

    /// Number of selected blocks the structure spans (K).
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Value of a local edge slot (0 = +x, 1 = +y, 2 = +z): the vertex id of
    /// a crossed edge, 0 for an edge that was never crossed (vertex id 0
    /// exists too), or -1 for a marked edge that never received a vertex
    /// (output saturation).
    pub fn edge_slot(&self, k: usize, x: usize, y: usize, z: usize, edge: usize) -> i32 {
        debug_assert!(edge < 3);
        self.data[self.cell(k, x, y, z) + edge]
    }

    /// Marching cubes case of a voxel cube, in `[0, 255]`.
    pub fn cube_case(&self, k: usize, x: usize, y: usize, z: usize) -> i32 {
        self.data[self.cell(k, x, y, z) + CASE_CHANNEL]
    }
}

/// Vertices and normals extracted by [`marching_cubes`], plus the mesh
/// structure tying voxel edges to vertex ids.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    pub vertices: Vec<Point3f>,
    pub normals: Vec<Vector3f>,
    pub structure: MeshStructure,
}

impl SurfaceMesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Shared state borrowed by both passes.
struct McContext<'a> {
    grid: &'a VoxelBlockGrid,
    selection: &'a BlockSelection,
    cells: Vec<AtomicI32>,
    r: i64,
    r3: usize,
    gradient_compat: bool,
}

impl<'a> McContext<'a> {
    fn new(
        grid: &'a VoxelBlockGrid,
        selection: &'a BlockSelection,
        config: &MarchingCubesConfig,
    ) -> Self {
        let r3 = grid.voxels_per_block();
        let cells = (0..selection.len() * r3 * 4)
            .map(|_| AtomicI32::new(0))
            .collect();
        Self {
            grid,
            selection,
            cells,
            r: grid.resolution() as i64,
            r3,
            gradient_compat: config.gradient_compat,
        }
    }

    fn cell(&self, k: usize, c: [i64; 3]) -> usize {
        let r = self.r;
        ((((k as i64 * r + c[2]) * r + c[1]) * r + c[0]) * 4) as usize
    }

    fn store(&self, k: usize, c: [i64; 3], ch: usize, value: i32) {
        // concurrent writers only ever store the same constant; relaxed
        // stores, never read-modify-write
        self.cells[self.cell(k, c) + ch].store(value, Ordering::Relaxed);
    }

    fn load(&self, k: usize, c: [i64; 3], ch: usize) -> i32 {
        self.cells[self.cell(k, c) + ch].load(Ordering::Relaxed)
    }

    /// Resolve a possibly out-of-block coordinate relative to the block in
    /// slot `k` into (pool address, selection slot, local coordinate).
    ///
    /// Returns `None` when the neighbor block is unallocated or outside the
    /// selection.
    fn resolve(&self, k: usize, c: [i64; 3]) -> Option<(usize, usize, [i64; 3])> {
        let r = self.r;
        let shift = [c[0].div_euclid(r), c[1].div_euclid(r), c[2].div_euclid(r)];
        let nb = neighbor_slot(shift[0], shift[1], shift[2]);
        let block_idx = self.selection.neighbor(nb, k)?;

        let slot = self.selection.inv_index(block_idx);
        if slot < 0 {
            return None;
        }
        debug_assert_eq!(self.selection.indices()[slot as usize], block_idx);

        let local = [c[0] - shift[0] * r, c[1] - shift[1] * r, c[2] - shift[2] * r];
        Some((block_idx as usize, slot as usize, local))
    }

    fn voxel_at(&self, block_idx: usize, local: [i64; 3]) -> voxelfuse_core::Voxel {
        let idx = (local[0] + self.r * (local[1] + self.r * local[2])) as usize;
        self.grid.voxels()[block_idx * self.r3 + idx]
    }

    /// TSDF sample one step along `axis` from `c`, or 0 when unavailable.
    fn tsdf_step(&self, k: usize, c: [i64; 3], axis: usize, step: i64) -> f32 {
        let r = self.r;
        let mut cs = c;
        cs[axis] += step;

        let mut shift = [
            cs[0].div_euclid(r),
            cs[1].div_euclid(r),
            cs[2].div_euclid(r),
        ];
        if self.gradient_compat && step > 0 && axis > 0 {
            // historical indexing: the + sample of the y and z axes derived
            // its block shift from the x-shifted coordinate
            shift[axis] = (c[0] + 1).div_euclid(r);
        }

        let nb = neighbor_slot(shift[0], shift[1], shift[2]);
        let Some(block_idx) = self.selection.neighbor(nb, k) else {
            return 0.0;
        };

        let local = [
            cs[0] - shift[0] * r,
            cs[1] - shift[1] * r,
            cs[2] - shift[2] * r,
        ];
        if local.iter().any(|&l| l < 0 || l >= r) {
            return 0.0;
        }
        self.voxel_at(block_idx as usize, local).tsdf
    }

    /// Surface normal estimate at a voxel by central differences of the TSDF.
    fn gradient(&self, k: usize, c: [i64; 3]) -> Vector3f {
        Vector3f::new(
            self.tsdf_step(k, c, 0, 1) - self.tsdf_step(k, c, 0, -1),
            self.tsdf_step(k, c, 1, 1) - self.tsdf_step(k, c, 1, -1),
            self.tsdf_step(k, c, 2, 1) - self.tsdf_step(k, c, 2, -1),
        )
    }

    /// Pass 0: classify each cube and mark the edges that need vertices.
    fn classify(&self, k: usize, c: [i64; 3]) {
        let mut case = 0usize;
        for (bit, shift) in VTX_SHIFTS.iter().enumerate() {
            let corner = [c[0] + shift[0], c[1] + shift[1], c[2] + shift[2]];
            let Some((block_idx, _, local)) = self.resolve(k, corner) else {
                return;
            };
            let voxel = self.voxel_at(block_idx, local);
            if !voxel.is_observed() {
                return;
            }
            if voxel.tsdf < 0.0 {
                case |= 1 << bit;
            }
        }

        self.store(k, c, CASE_CHANNEL, case as i32);
        if case == 0 || case == 255 {
            return;
        }

        let edges = EDGE_TABLE[case];
        for (edge, shift) in EDGE_SHIFTS.iter().enumerate() {
            if edges & (1 << edge) == 0 {
                continue;
            }
            let owner = [c[0] + shift[0], c[1] + shift[1], c[2] + shift[2]];
            if let Some((_, slot, local)) = self.resolve(k, owner) {
                self.store(slot, local, shift[3] as usize, -1);
            }
        }
    }

    /// Pass 1: allocate vertices for marked edges and emit positions and
    /// blended normals.
    fn extract(
        &self,
        k: usize,
        c: [i64; 3],
        buffer: &OutputBuffer<(Point3f, Vector3f)>,
    ) {
        let slots = [
            self.load(k, c, 0),
            self.load(k, c, 1),
            self.load(k, c, 2),
        ];
        if slots.iter().all(|&s| s != -1) {
            return;
        }

        let block_idx = self.selection.indices()[k] as usize;
        let origin = self.voxel_at(block_idx, c);
        let normal_o = self.gradient(k, c);

        let key = self.grid.key(block_idx);
        let voxel_size = self.grid.voxel_size();
        let world = [
            (key[0] * self.r + c[0]) as f32,
            (key[1] * self.r + c[1]) as f32,
            (key[2] * self.r + c[2]) as f32,
        ];

        for axis in 0..3 {
            if slots[axis] != -1 {
                continue;
            }
            let mut ce = c;
            ce[axis] += 1;
            // the cube that marked this edge saw all 8 corners, so the +1
            // neighbor must resolve
            let Some((nb_block, nb_slot, local)) = self.resolve(k, ce) else {
                continue;
            };
            let tsdf_e = self.voxel_at(nb_block, local).tsdf;
            let ratio = tsdf_e / (tsdf_e - origin.tsdf);

            let mut position = world;
            position[axis] += 1.0 - ratio;

            let normal_e = self.gradient(nb_slot, local);
            let blended = ratio * normal_o + (1.0 - ratio) * normal_e;
            let normal = if blended.magnitude() > 1e-6 {
                blended.normalize()
            } else {
                Vector3f::new(0.0, 0.0, 1.0)
            };

            let vertex = Point3f::new(
                voxel_size * position[0],
                voxel_size * position[1],
                voxel_size * position[2],
            );
            if let Some(id) = buffer.push((vertex, normal)) {
                self.store(k, c, axis, id as i32);
            }
        }
    }

    fn into_structure(self) -> MeshStructure {
        MeshStructure {
            block_count: self.selection.len(),
            resolution: self.r as usize,
            data: self.cells.into_iter().map(AtomicI32::into_inner).collect(),
        }
    }
}

/// Run two-pass Marching Cubes over the selected blocks.
///
/// Pass 0 writes the cube case of every valid voxel cube into the mesh
/// structure and marks each crossed edge in the structure row of its owning
/// voxel (resolved across block seams, so a shared edge is marked exactly
/// once per owner). Pass 1 turns each mark into one vertex with an
/// interpolated position and a normal blended from central differences at
/// both edge endpoints. Vertex ids are dense in `[0, count)`.
pub fn marching_cubes(
    grid: &VoxelBlockGrid,
    selection: &BlockSelection,
    config: &MarchingCubesConfig,
) -> Result<SurfaceMesh> {
    const OP: &str = "marching cubes";

    if selection.pool_len() != grid.len() {
        return Err(Error::invalid_input(
            OP,
            format!(
                "selection was built for a pool of {}, grid has {}",
                selection.pool_len(),
                grid.len()
            ),
        ));
    }

    let k_total = selection.len();
    let r3 = grid.voxels_per_block();
    let ctx = McContext::new(grid, selection, config);

    if k_total == 0 {
        return Ok(SurfaceMesh {
            vertices: Vec::new(),
            normals: Vec::new(),
            structure: ctx.into_structure(),
        });
    }

    let indexer = grid.voxel_indexer();

    launch(k_total, |k| {
        for voxel_idx in 0..r3 {
            let [x, y, z, _] = indexer.coord(voxel_idx);
            ctx.classify(k, [x as i64, y as i64, z as i64]);
        }
    });

    let capacity = (k_total * r3 * 3).min(config.max_vertices);
    let buffer = OutputBuffer::new(capacity, (Point3f::origin(), Vector3f::zeros()));

    launch(k_total, |k| {
        for voxel_idx in 0..r3 {
            let [x, y, z, _] = indexer.coord(voxel_idx);
            ctx.extract(k, [x as i64, y as i64, z as i64], &buffer);
        }
    });

    let (vertices, normals) = buffer.into_vec().into_iter().unzip();

    Ok(SurfaceMesh {
        vertices,
        normals,
        structure: ctx.into_structure(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use voxelfuse_core::Voxel;

    const VOXEL_SIZE: f32 = 0.01;

    /// Two blocks side by side along x, filled with the signed distance to
    /// the plane x = plane_x (in voxel units), clamped to [-1, 1].
    fn seam_grid(plane_x: f32) -> (VoxelBlockGrid, BlockSelection) {
        let mut grid = VoxelBlockGrid::new(4, VOXEL_SIZE).unwrap();
        grid.activate(&[[0, 0, 0], [1, 0, 0]]);

        let r = grid.resolution();
        let r3 = grid.voxels_per_block();
        let indexer = grid.voxel_indexer();
        for b in 0..grid.len() {
            let key = grid.key(b);
            for voxel_idx in 0..r3 {
                let [x, _, _, _] = indexer.coord(voxel_idx);
                let wx = (key[0] * r as i64 + x as i64) as f32;
                let tsdf = (plane_x - wx).clamp(-1.0, 1.0);
                grid.voxels_mut()[b * r3 + voxel_idx] = Voxel { tsdf, weight: 1.0 };
            }
        }

        let selection = BlockSelection::of_all_blocks(&grid).unwrap();
        (grid, selection)
    }

    /// All edge slot values across the structure.
    fn collect_slots(structure: &MeshStructure) -> Vec<i32> {
        let r = structure.resolution();
        let mut slots = Vec::new();
        for k in 0..structure.block_count() {
            for z in 0..r {
                for y in 0..r {
                    for x in 0..r {
                        for edge in 0..3 {
                            slots.push(structure.edge_slot(k, x, y, z, edge));
                        }
                    }
                }
            }
        }
        slots
    }

    #[test]
    fn test_plane_mesh() {
        let (grid, selection) = seam_grid(2.5);
        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();

        // one +x edge crossing per owner column
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.normals.len(), 16);

        for (vertex, normal) in mesh.vertices.iter().zip(&mesh.normals) {
            assert!((vertex.x / VOXEL_SIZE - 2.5).abs() < 1e-4);
            assert_relative_eq!(normal.magnitude(), 1.0, epsilon = 1e-5);
            // the surface gradient points down the x axis
            assert!(normal.x < -0.85, "normal {:?} should face -x", normal);
        }
    }

    #[test]
    fn test_plane_mesh_across_seam() {
        let (grid, selection) = seam_grid(3.5);
        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();

        assert_eq!(mesh.vertex_count(), 16);
        for vertex in &mesh.vertices {
            assert!((vertex.x / VOXEL_SIZE - 3.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cube_cases_recorded() {
        let (grid, selection) = seam_grid(2.5);
        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();

        // corners at x = 3 are inside (bits 1, 2, 5, 6)
        assert_eq!(mesh.structure.cube_case(0, 2, 1, 1), 0x66);
        // fully outside cube
        assert_eq!(mesh.structure.cube_case(0, 0, 1, 1), 0);
    }

    #[test]
    fn test_vertex_ids_dense_and_unique() {
        let (grid, selection) = seam_grid(2.5);
        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();
        let count = mesh.vertex_count() as i32;

        let mut positive: Vec<i32> = collect_slots(&mesh.structure)
            .into_iter()
            .filter(|&s| s > 0)
            .collect();
        positive.sort_unstable();
        // ids are dense in [0, count); id 0 is indistinguishable from an
        // untouched slot here, the rest must appear exactly once
        assert_eq!(positive, (1..count).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_coincident_vertices_on_seam() {
        let (grid, selection) = seam_grid(3.5);
        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();

        let mut positions: Vec<[i64; 3]> = mesh
            .vertices
            .iter()
            .map(|v| {
                [
                    (v.x / VOXEL_SIZE * 1000.0).round() as i64,
                    (v.y / VOXEL_SIZE * 1000.0).round() as i64,
                    (v.z / VOXEL_SIZE * 1000.0).round() as i64,
                ]
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), mesh.vertex_count());
    }

    #[test]
    fn test_saturation_leaves_marks() {
        let (grid, selection) = seam_grid(2.5);
        let config = MarchingCubesConfig {
            max_vertices: 5,
            ..Default::default()
        };
        let mesh = marching_cubes(&grid, &selection, &config).unwrap();

        assert_eq!(mesh.vertex_count(), 5);
        let dropped = collect_slots(&mesh.structure)
            .into_iter()
            .filter(|&s| s == -1)
            .count();
        assert_eq!(dropped, 16 - 5);
    }

    #[test]
    fn test_unobserved_grid_yields_empty_mesh() {
        let mut grid = VoxelBlockGrid::new(4, VOXEL_SIZE).unwrap();
        grid.activate(&[[0, 0, 0]]);
        let selection = BlockSelection::of_all_blocks(&grid).unwrap();

        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();
        assert!(mesh.is_empty());
        assert!(collect_slots(&mesh.structure).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_empty_selection() {
        let mut grid = VoxelBlockGrid::new(4, VOXEL_SIZE).unwrap();
        grid.activate(&[[0, 0, 0]]);
        let selection = BlockSelection::new(&grid, vec![]).unwrap();

        let mesh = marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_gradient_compat_changes_boundary_normals() {
        let (grid, selection) = seam_grid(2.5);
        let corrected =
            marching_cubes(&grid, &selection, &MarchingCubesConfig::default()).unwrap();
        let compat = marching_cubes(
            &grid,
            &selection,
            &MarchingCubesConfig {
                gradient_compat: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(corrected.vertex_count(), compat.vertex_count());
        for normal in &compat.normals {
            assert_relative_eq!(normal.magnitude(), 1.0, epsilon = 1e-5);
        }

        // pair vertices by position (positions are unique on this surface)
        let find = |mesh: &SurfaceMesh, p: &Point3f| -> Vector3f {
            let at = mesh
                .vertices
                .iter()
                .position(|v| (v - p).norm() < 1e-6)
                .expect("matching vertex");
            mesh.normals[at]
        };
        let mut diverged = 0;
        for (v, n) in corrected.vertices.iter().zip(&corrected.normals) {
            if (find(&compat, v) - *n).norm() > 1e-3 {
                diverged += 1;
            }
        }
        assert!(diverged > 0, "compat indexing should perturb some normals");
    }
}
