//! Block decomposition of a global field over the process mesh.
//!
//! Each axis of length `n` split into `d` parts gives every part
//! `n / d` cells, and the first `n % d` parts one more. Blocks are stored in
//! rank order (`bx * dimy + by`), the same order the process mesh uses, so a
//! rank's block is found directly from its coordinates.

use crate::debug_invariants::DebugInvariants;
use crate::heat_error::HeatSimError;

/// Offset and size of one block inside the global field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockExtent {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl BlockExtent {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the global cell `(x, y)` lies in this block.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Offsets `(start, len)` of `parts` near-equal pieces of `0..n`.
pub fn split_axis(n: usize, parts: usize) -> Vec<(usize, usize)> {
    let base = n / parts;
    let extra = n % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        out.push((start, len));
        start += len;
    }
    out
}

/// Table of block extents, one per mesh coordinate. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMap {
    width: usize,
    height: usize,
    dims: [usize; 2],
    blocks: Vec<BlockExtent>,
}

impl PartitionMap {
    /// Split a `width x height` field over a `dimx x dimy` mesh.
    pub fn new(width: usize, height: usize, dimx: usize, dimy: usize) -> Result<Self, HeatSimError> {
        if dimx == 0 || dimy == 0 {
            return Err(HeatSimError::ZeroMeshDim { dimx, dimy });
        }
        if width == 0 || height == 0 {
            return Err(HeatSimError::EmptyField);
        }
        if width < dimx {
            return Err(HeatSimError::Undersized {
                axis: "x",
                len: width,
                parts: dimx,
            });
        }
        if height < dimy {
            return Err(HeatSimError::Undersized {
                axis: "y",
                len: height,
                parts: dimy,
            });
        }
        let cols = split_axis(width, dimx);
        let rows = split_axis(height, dimy);
        let mut blocks = Vec::with_capacity(dimx * dimy);
        for &(x, w) in &cols {
            for &(y, h) in &rows {
                blocks.push(BlockExtent {
                    x,
                    y,
                    width: w,
                    height: h,
                });
            }
        }
        let map = Self {
            width,
            height,
            dims: [dimx, dimy],
            blocks,
        };
        map.debug_assert_invariants();
        Ok(map)
    }

    /// Global `(width, height)`.
    pub fn global_shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    /// Number of blocks (`dimx * dimy`).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Extent of the block at mesh coordinates `(bx, by)`.
    pub fn block(&self, bx: usize, by: usize) -> Option<&BlockExtent> {
        if bx >= self.dims[0] || by >= self.dims[1] {
            return None;
        }
        self.blocks.get(bx * self.dims[1] + by)
    }

    /// Like [`block`](Self::block) but fails with a configuration error.
    pub fn try_block(&self, coords: [usize; 2]) -> Result<&BlockExtent, HeatSimError> {
        self.block(coords[0], coords[1])
            .ok_or(HeatSimError::RankOutOfRange {
                rank: coords[0] * self.dims[1] + coords[1],
                procs: self.len(),
            })
    }

    /// Blocks with their mesh coordinates, in rank order.
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], &BlockExtent)> + '_ {
        let dimy = self.dims[1];
        self.blocks
            .iter()
            .enumerate()
            .map(move |(i, b)| ([i / dimy, i % dimy], b))
    }
}

impl DebugInvariants for PartitionMap {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PartitionMap");
    }

    /// Blocks tile the field: sizes sum to the global extent on both axes
    /// and neighbouring blocks share their edge exactly.
    fn validate_invariants(&self) -> Result<(), HeatSimError> {
        let [dimx, dimy] = self.dims;
        if self.blocks.len() != dimx * dimy {
            return Err(HeatSimError::InvalidConfig(format!(
                "partition has {} blocks for a {dimx}x{dimy} mesh",
                self.blocks.len()
            )));
        }
        for bx in 0..dimx {
            let mut y = 0;
            for by in 0..dimy {
                let b = &self.blocks[bx * dimy + by];
                if b.y != y || b.is_empty() {
                    return Err(HeatSimError::InvalidConfig(format!(
                        "block ({bx}, {by}) breaks the row tiling at y={y}"
                    )));
                }
                y += b.height;
            }
            if y != self.height {
                return Err(HeatSimError::InvalidConfig(format!(
                    "column {bx} covers {y} of {} rows",
                    self.height
                )));
            }
        }
        for by in 0..dimy {
            let mut x = 0;
            for bx in 0..dimx {
                let b = &self.blocks[bx * dimy + by];
                if b.x != x {
                    return Err(HeatSimError::InvalidConfig(format!(
                        "block ({bx}, {by}) breaks the column tiling at x={x}"
                    )));
                }
                x += b.width;
            }
            if x != self.width {
                return Err(HeatSimError::InvalidConfig(format!(
                    "row {by} covers {x} of {} columns",
                    self.width
                )));
            }
        }
        Ok(())
    }
}
