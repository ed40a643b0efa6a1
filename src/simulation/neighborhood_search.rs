use std::collections::HashMap;

use enum_dispatch::enum_dispatch;
use rstar::{primitives::GeomWithData, Point, RTree};

use crate::{floating_type_mod::FT, simulation_parameters::NeighborhoodSearchAlgorithm, V3, V3I};

/**
 * Answers "which particles are within `radius` of a position?".
 *
 * Implementations report candidate indices in ascending order. The SPH sums iterate in
 * that order, so every implementation yields the same floating point result as the
 * all-pairs scan as long as the reported set contains all particles inside the kernel
 * support. Candidates may lie outside of `radius`; the kernels weight them with zero.
 */
#[enum_dispatch]
pub trait NeighborhoodSearchTrait: Sync {
    /// Has to be called whenever the positions changed. Queries are cheapest for radii
    /// up to `max_radius`.
    fn rebuild(&mut self, positions: &[V3], max_radius: FT);

    fn neighbors_within(&self, positions: &[V3], position: V3, radius: FT, f: impl FnMut(usize));

    /// Same as `neighbors_within` around particle `i`, but never reports `i` itself.
    fn other_neighbors_within(&self, positions: &[V3], i: usize, radius: FT, f: impl FnMut(usize)) {
        let mut f = f;
        self.neighbors_within(positions, positions[i], radius, |j| {
            if j != i {
                f(j);
            }
        });
    }
}

#[enum_dispatch(NeighborhoodSearchTrait)]
pub enum NeighborhoodSearch {
    AllPairsSearch,
    GridSearch,
    RStarSearch,
}

impl NeighborhoodSearch {
    pub fn new(algorithm: NeighborhoodSearchAlgorithm) -> NeighborhoodSearch {
        match algorithm {
            NeighborhoodSearchAlgorithm::AllPairs => AllPairsSearch {}.into(),
            NeighborhoodSearchAlgorithm::Grid => GridSearch::new().into(),
            NeighborhoodSearchAlgorithm::RStar => RStarSearch::new().into(),
        }
    }
}

/// Every particle is a candidate of every position.
pub struct AllPairsSearch {}

impl NeighborhoodSearchTrait for AllPairsSearch {
    fn rebuild(&mut self, _positions: &[V3], _max_radius: FT) {}

    fn neighbors_within(&self, positions: &[V3], _position: V3, _radius: FT, mut f: impl FnMut(usize)) {
        for j in 0..positions.len() {
            f(j);
        }
    }
}

struct Cell {
    particle_ids: Vec<usize>,
}

impl Cell {
    fn new() -> Cell {
        Cell {
            particle_ids: Vec::new(),
        }
    }
}

// cell coordinates beyond this (and non-finite ones) are not hashed
const MAX_CELL_COORD: FT = 1.0e6;

// queries spanning more cells than this scan all particles
const MAX_CELL_RING: FT = 16.;

fn push_within(
    positions: &[V3],
    particle_ids: impl Iterator<Item = usize>,
    position: V3,
    radius_sq: FT,
    candidates: &mut Vec<usize>,
) {
    for j in particle_ids {
        if (positions[j] - position).norm_squared() < radius_sq {
            candidates.push(j);
        }
    }
}

/**
 * Uniform grid with a cell size of the largest query radius. Only occupied cells are stored.
 *
 * Particles far outside of the grid range are kept in an overflow list that every query
 * scans, so the reported set stays complete for any position.
 */
pub struct GridSearch {
    cell_size: FT,
    cells: HashMap<[i32; 3], Cell>,
    overflow: Cell,
}

impl GridSearch {
    pub fn new() -> GridSearch {
        GridSearch {
            cell_size: 1.,
            cells: HashMap::new(),
            overflow: Cell::new(),
        }
    }

    fn particle_to_cell_pos(&self, particle_pos: V3) -> Option<[i32; 3]> {
        let cell_pos = particle_pos / self.cell_size;
        if cell_pos.iter().all(|x| x.abs() <= MAX_CELL_COORD) {
            let cell_pos: V3I = cell_pos.map(|x| x.floor() as i32);
            Some([cell_pos.x, cell_pos.y, cell_pos.z])
        } else {
            None
        }
    }
}

impl NeighborhoodSearchTrait for GridSearch {
    fn rebuild(&mut self, positions: &[V3], max_radius: FT) {
        self.cell_size = max_radius;
        self.cells.clear();
        self.overflow.particle_ids.clear();

        for (particle_id, position) in positions.iter().enumerate() {
            match self.particle_to_cell_pos(*position) {
                Some(cell_pos) => self
                    .cells
                    .entry(cell_pos)
                    .or_insert_with(Cell::new)
                    .particle_ids
                    .push(particle_id),
                None => self.overflow.particle_ids.push(particle_id),
            }
        }
    }

    fn neighbors_within(&self, positions: &[V3], position: V3, radius: FT, mut f: impl FnMut(usize)) {
        let radius_sq = radius * radius;
        let ring = radius / self.cell_size;

        let mut candidates: Vec<usize> = Vec::new();
        match self.particle_to_cell_pos(position) {
            Some(center_cell) if ring <= MAX_CELL_RING => {
                let dist = i32::max(ring.ceil() as i32, 1);
                for z in -dist..=dist {
                    for y in -dist..=dist {
                        for x in -dist..=dist {
                            let cell_pos = [center_cell[0] + x, center_cell[1] + y, center_cell[2] + z];
                            if let Some(cell) = self.cells.get(&cell_pos) {
                                push_within(
                                    positions,
                                    cell.particle_ids.iter().cloned(),
                                    position,
                                    radius_sq,
                                    &mut candidates,
                                );
                            }
                        }
                    }
                }
                push_within(
                    positions,
                    self.overflow.particle_ids.iter().cloned(),
                    position,
                    radius_sq,
                    &mut candidates,
                );
            }
            _ => push_within(positions, 0..positions.len(), position, radius_sq, &mut candidates),
        }

        candidates.sort_unstable();
        for j in candidates {
            f(j);
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
struct CustomRTreePoint {
    p: V3,
}

impl Point for CustomRTreePoint {
    type Scalar = FT;

    const DIMENSIONS: usize = 3;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        CustomRTreePoint {
            p: V3::from_iterator((0..3).map(|d| generator(d))),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.p[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.p[index]
    }
}

impl From<V3> for CustomRTreePoint {
    fn from(p: V3) -> Self {
        CustomRTreePoint { p }
    }
}

type CustomRTreeElem = GeomWithData<CustomRTreePoint, usize>;

pub struct RStarSearch {
    rtree: RTree<CustomRTreeElem>,
}

impl RStarSearch {
    pub fn new() -> RStarSearch {
        RStarSearch { rtree: RTree::new() }
    }
}

impl NeighborhoodSearchTrait for RStarSearch {
    fn rebuild(&mut self, positions: &[V3], _max_radius: FT) {
        let rtree_elems: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(idx, pos)| CustomRTreeElem::new(CustomRTreePoint::from(*pos), idx))
            .collect();

        self.rtree = RTree::bulk_load(rtree_elems);
    }

    fn neighbors_within(&self, _positions: &[V3], position: V3, radius: FT, mut f: impl FnMut(usize)) {
        let mut candidates: Vec<usize> = self
            .rtree
            .locate_within_distance(CustomRTreePoint::from(position), radius * radius)
            .map(|elem| elem.data)
            .collect();

        candidates.sort_unstable();
        for j in candidates {
            f(j);
        }
    }
}
