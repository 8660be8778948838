//! Periodic 2-D process mesh.
//!
//! Ranks are laid out row-major over the mesh with the y coordinate varying
//! fastest: `rank = x * dimy + y`. Both axes wrap around, so every rank has
//! exactly four neighbours. On an axis of length 1 a rank is its own
//! neighbour in both directions of that axis; on an axis of length 2 the
//! two neighbours along it coincide.

use crate::heat_error::HeatSimError;
use std::fmt;

/// One of the four mesh directions. North is towards smaller `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Unit step `(dx, dy)` on the mesh.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    /// Stable index in `0..4`, matching [`Direction::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(s)
    }
}

/// Position of one rank inside a periodic `dimx x dimy` mesh.
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTopology {
    dims: [usize; 2],
    periodic: [bool; 2],
    rank: usize,
    coords: [usize; 2],
    neighbors: [usize; 4],
}

impl CartTopology {
    /// Place `rank` on a `dimx x dimy` torus of `procs` processes.
    pub fn new(procs: usize, dimx: usize, dimy: usize, rank: usize) -> Result<Self, HeatSimError> {
        if dimx == 0 || dimy == 0 {
            return Err(HeatSimError::ZeroMeshDim { dimx, dimy });
        }
        if dimx.checked_mul(dimy) != Some(procs) {
            return Err(HeatSimError::MeshSizeMismatch { dimx, dimy, procs });
        }
        if rank >= procs {
            return Err(HeatSimError::RankOutOfRange { rank, procs });
        }
        let dims = [dimx, dimy];
        let coords = coords_in(dims, rank);
        let mut neighbors = [0; 4];
        for dir in Direction::ALL {
            neighbors[dir.index()] = shift(dims, coords, dir);
        }
        Ok(Self {
            dims,
            periodic: [true, true],
            rank,
            coords,
            neighbors,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of ranks in the mesh.
    #[inline]
    pub fn size(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// `[dimx, dimy]`.
    #[inline]
    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    /// This rank's `[x, y]`.
    #[inline]
    pub fn coords(&self) -> [usize; 2] {
        self.coords
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic.get(axis).copied().unwrap_or(false)
    }

    /// Rank of the neighbour in direction `dir`.
    #[inline]
    pub fn neighbor(&self, dir: Direction) -> usize {
        self.neighbors[dir.index()]
    }

    /// Mesh coordinates of any rank in this mesh.
    pub fn coords_of(&self, rank: usize) -> Result<[usize; 2], HeatSimError> {
        if rank >= self.size() {
            return Err(HeatSimError::RankOutOfRange {
                rank,
                procs: self.size(),
            });
        }
        Ok(coords_in(self.dims, rank))
    }

    /// Rank at mesh coordinates `(x, y)`, wrapped onto the torus.
    pub fn rank_of(&self, x: usize, y: usize) -> usize {
        rank_in(self.dims, [x % self.dims[0], y % self.dims[1]])
    }
}

impl fmt::Display for CartTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank={} coords=({}, {}) north={} south={} west={} east={}",
            self.rank,
            self.coords[0],
            self.coords[1],
            self.neighbor(Direction::North),
            self.neighbor(Direction::South),
            self.neighbor(Direction::West),
            self.neighbor(Direction::East),
        )
    }
}

fn coords_in(dims: [usize; 2], rank: usize) -> [usize; 2] {
    [rank / dims[1], rank % dims[1]]
}

fn rank_in(dims: [usize; 2], coords: [usize; 2]) -> usize {
    coords[0] * dims[1] + coords[1]
}

fn shift(dims: [usize; 2], coords: [usize; 2], dir: Direction) -> usize {
    let (dx, dy) = dir.offset();
    let x = (coords[0] as isize + dx).rem_euclid(dims[0] as isize) as usize;
    let y = (coords[1] as isize + dy).rem_euclid(dims[1] as isize) as usize;
    rank_in(dims, [x, y])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_are_row_major_with_y_fastest() {
        let t = CartTopology::new(6, 3, 2, 3).unwrap();
        assert_eq!(t.coords(), [1, 1]);
        assert_eq!(t.rank_of(1, 1), 3);
        assert_eq!(t.coords_of(4).unwrap(), [2, 0]);
    }

    #[test]
    fn interior_neighbors() {
        // 3x3 mesh, centre rank is (1,1) = 4
        let t = CartTopology::new(9, 3, 3, 4).unwrap();
        assert_eq!(t.neighbor(Direction::North), 3);
        assert_eq!(t.neighbor(Direction::South), 5);
        assert_eq!(t.neighbor(Direction::West), 1);
        assert_eq!(t.neighbor(Direction::East), 7);
    }

    #[test]
    fn opposite_is_involution() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
            let (a, b) = d.offset();
            let (c, e) = d.opposite().offset();
            assert_eq!((a + c, b + e), (0, 0));
        }
    }
}
