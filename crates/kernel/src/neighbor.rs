//! Spatial-hash neighbor search.
//!
//! Positions are quantised into cells of edge `h` and each cell is hashed into
//! one of [`BUCKET_COUNT`] buckets. Unrelated cells may share a bucket; that
//! only adds candidates, because every candidate goes through an exact
//! distance test before it is reported.
//!
//! The table uses the sorted-index + offset layout: one flat array of particle
//! indices grouped by bucket, plus a start offset and count per bucket. Only
//! the buckets touched by the previous build are reset, so a rebuild costs
//! O(n) regardless of the table size.

use glam::{IVec3, Vec3};

use crate::parallel::{self, Execution};

/// Number of hash buckets.
pub const BUCKET_COUNT: usize = 1_000_000;

const PRIME_X: u32 = 73_856_093;
const PRIME_Y: u32 = 19_349_663;
const PRIME_Z: u32 = 83_492_791;

/// Bucket index for an integer cell.
#[inline]
pub fn hash_cell(cell: IVec3) -> usize {
    let h = (cell.x as u32).wrapping_mul(PRIME_X)
        ^ (cell.y as u32).wrapping_mul(PRIME_Y)
        ^ (cell.z as u32).wrapping_mul(PRIME_Z);
    h as usize % BUCKET_COUNT
}

/// Integer cell containing `position`, truncating `position / h` toward zero.
#[inline]
pub fn cell_of(position: Vec3, h: f32) -> IVec3 {
    (position / h).as_ivec3()
}

/// "`i1` is within the support radius of `i0`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborPair {
    /// Querying particle.
    pub i0: u32,
    /// Neighbor.
    pub i1: u32,
}

// ---------------------------------------------------------------------------
// SpatialHashIndex
// ---------------------------------------------------------------------------

/// Fixed-size spatial hash table over particle indices.
pub struct SpatialHashIndex {
    cell_size: f32,
    /// Bucket of each particle (parallel to the position slice).
    particle_buckets: Vec<u32>,
    /// Particle indices grouped by bucket, ascending within a bucket.
    sorted_indices: Vec<u32>,
    /// Start offset in `sorted_indices` for each bucket.
    bucket_offsets: Vec<u32>,
    /// Number of particles in each bucket.
    bucket_counts: Vec<u32>,
    /// Buckets with a non-zero count, in first-touch order.
    occupied: Vec<u32>,
}

impl Default for SpatialHashIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialHashIndex {
    /// Allocate an empty table.
    pub fn new() -> Self {
        Self {
            cell_size: 1.0,
            particle_buckets: Vec::new(),
            sorted_indices: Vec::new(),
            bucket_offsets: vec![0; BUCKET_COUNT],
            bucket_counts: vec![0; BUCKET_COUNT],
            occupied: Vec::new(),
        }
    }

    /// Cell edge used by the last build.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of distinct buckets holding at least one particle.
    pub fn occupied_buckets(&self) -> usize {
        self.occupied.len()
    }

    /// Rebuild the table from `positions` with cell edge `h`.
    ///
    /// Single-threaded: many particles append to the same bucket.
    pub fn build(&mut self, positions: &[Vec3], h: f32) {
        let n = positions.len();
        self.cell_size = h;

        // --- 1. Reset buckets touched by the previous build ---
        // Offsets too: a bucket left empty now must not point past the
        // end of a shorter `sorted_indices`.
        for &b in &self.occupied {
            self.bucket_counts[b as usize] = 0;
            self.bucket_offsets[b as usize] = 0;
        }
        self.occupied.clear();

        // --- 2. Hash and count ---
        self.particle_buckets.resize(n, 0);
        for (i, p) in positions.iter().enumerate() {
            let b = hash_cell(cell_of(*p, h));
            self.particle_buckets[i] = b as u32;
            if self.bucket_counts[b] == 0 {
                self.occupied.push(b as u32);
            }
            self.bucket_counts[b] += 1;
        }

        // --- 3. Offsets over occupied buckets ---
        let mut running = 0u32;
        for &b in &self.occupied {
            self.bucket_offsets[b as usize] = running;
            running += self.bucket_counts[b as usize];
        }

        // --- 4. Scatter, using the offsets as write heads ---
        self.sorted_indices.resize(n, 0);
        for i in 0..n {
            let b = self.particle_buckets[i] as usize;
            let slot = self.bucket_offsets[b] as usize;
            self.sorted_indices[slot] = i as u32;
            self.bucket_offsets[b] += 1;
        }
        for &b in &self.occupied {
            let b = b as usize;
            self.bucket_offsets[b] -= self.bucket_counts[b];
        }
    }

    /// Distinct buckets covering the 3x3x3 block of cells around `point`,
    /// written to `out` in ascending order. Returns how many were written.
    fn neighborhood_buckets(&self, point: Vec3, out: &mut [u32; 27]) -> usize {
        let center = cell_of(point, self.cell_size);
        let mut k = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    // Saturated cells of far-away positions wrap like the hash does.
                    out[k] = hash_cell(center.wrapping_add(IVec3::new(dx, dy, dz))) as u32;
                    k += 1;
                }
            }
        }
        out.sort_unstable();
        let mut unique = 1;
        for k in 1..out.len() {
            if out[k] != out[unique - 1] {
                out[unique] = out[k];
                unique += 1;
            }
        }
        unique
    }

    /// Append to `out` every particle `j != exclude` with
    /// `|point - positions[j]|^2 <= radius^2`.
    ///
    /// `positions` must be the slice the table was built from, and `radius`
    /// must not exceed the cell size.
    pub fn query_point(
        &self,
        point: Vec3,
        exclude: Option<usize>,
        positions: &[Vec3],
        radius: f32,
        out: &mut Vec<u32>,
    ) {
        let radius_sq = radius * radius;
        let mut buckets = [0u32; 27];
        let unique = self.neighborhood_buckets(point, &mut buckets);

        for &b in &buckets[..unique] {
            let b = b as usize;
            let start = self.bucket_offsets[b] as usize;
            let count = self.bucket_counts[b] as usize;
            for &j in &self.sorted_indices[start..start + count] {
                if exclude == Some(j as usize) {
                    continue;
                }
                if (point - positions[j as usize]).length_squared() <= radius_sq {
                    out.push(j);
                }
            }
        }
    }

    /// Append the neighbors of particle `i` within the cell size to `out`.
    pub fn query(&self, i: usize, positions: &[Vec3], out: &mut Vec<u32>) {
        self.query_point(positions[i], Some(i), positions, self.cell_size, out);
    }
}

// ---------------------------------------------------------------------------
// Neighbor lists
// ---------------------------------------------------------------------------

/// One neighbor list per particle, reused across ticks.
#[derive(Debug, Clone, Default)]
pub struct NeighborLists {
    lists: Vec<Vec<u32>>,
}

impl NeighborLists {
    /// Empty lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for `n` particles, keeping existing inner allocations.
    pub fn resize(&mut self, n: usize) {
        self.lists.resize_with(n, Vec::new);
    }

    /// Number of particles covered.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// True if no particle is covered.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Neighbors of particle `i`.
    #[inline]
    pub fn get(&self, i: usize) -> &[u32] {
        &self.lists[i]
    }

    /// Mutable access to every list, for filling in a parallel region.
    pub fn as_mut_slice(&mut self) -> &mut [Vec<u32>] {
        &mut self.lists
    }

    /// Total number of directed pairs.
    pub fn pair_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// All directed pairs, grouped by `i0`.
    pub fn pairs(&self) -> impl Iterator<Item = NeighborPair> + '_ {
        self.lists.iter().enumerate().flat_map(|(i0, list)| {
            list.iter().map(move |&i1| NeighborPair { i0: i0 as u32, i1 })
        })
    }
}

// ---------------------------------------------------------------------------
// NeighborSearch strategies
// ---------------------------------------------------------------------------

/// Produces, for every particle, the indices of all other particles within `h`.
pub trait NeighborSearch {
    /// Fill `lists` (resized to `positions.len()`) with the neighbors of
    /// every particle. Lists are symmetric, ascending and exclude the
    /// particle itself.
    fn compute_neighbors(
        &mut self,
        positions: &[Vec3],
        h: f32,
        execution: Execution,
        lists: &mut NeighborLists,
    );
}

/// Spatial-hash search. The build is sequential; the per-particle queries run
/// under `execution` against the then read-only table.
#[derive(Default)]
pub struct SpatialHashSearch {
    index: SpatialHashIndex,
}

impl SpatialHashSearch {
    /// New search with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table from the last call to `compute_neighbors`.
    pub fn index(&self) -> &SpatialHashIndex {
        &self.index
    }
}

impl NeighborSearch for SpatialHashSearch {
    fn compute_neighbors(
        &mut self,
        positions: &[Vec3],
        h: f32,
        execution: Execution,
        lists: &mut NeighborLists,
    ) {
        self.index.build(positions, h);
        lists.resize(positions.len());
        let index = &self.index;
        parallel::for_each_mut(execution, lists.as_mut_slice(), |i, list| {
            list.clear();
            index.query(i, positions, list);
            // Ascending, same as the brute-force order.
            list.sort_unstable();
        });
    }
}

/// O(n^2) all-pairs search. Reference for checking the hashed search.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSearch;

impl NeighborSearch for BruteForceSearch {
    fn compute_neighbors(
        &mut self,
        positions: &[Vec3],
        h: f32,
        execution: Execution,
        lists: &mut NeighborLists,
    ) {
        let h2 = h * h;
        lists.resize(positions.len());
        parallel::for_each_mut(execution, lists.as_mut_slice(), |i, list| {
            list.clear();
            let p = positions[i];
            for (j, q) in positions.iter().enumerate() {
                if j != i && (p - *q).length_squared() <= h2 {
                    list.push(j as u32);
                }
            }
        });
    }
}
