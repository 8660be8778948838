//! Ghost-cell exchange with the four mesh neighbours.
//!
//! Every exchange issues four receives and four sends without waiting, then
//! joins on all eight before touching the halo ring. The grid is borrowed
//! mutably for the whole call, so nothing can read a half-written halo, and
//! the result is a [`HaloReady`] view that the stencil requires as input.
//!
//! Message direction naming: a border travelling *towards* `dir` is tagged
//! with `dir`. The row I send north lands in my north neighbour's south halo,
//! so I receive my own north halo from the north neighbour on the
//! south-bound tag.

use crate::algs::communicator::{ChannelKey, Communicator, Wait};
use crate::algs::wire::{decode_samples, encode_samples};
use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
use crate::topology::cart::{CartTopology, Direction};

/// A grid whose halo ring holds the neighbours' borders for `iteration`.
#[derive(Debug, Clone, Copy)]
pub struct HaloReady<'a> {
    grid: &'a GridBuffer,
    iteration: usize,
}

impl<'a> HaloReady<'a> {
    pub fn grid(&self) -> &'a GridBuffer {
        self.grid
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Wrap a grid whose halo was filled by other means (boundary
    /// conditions in tests, for instance).
    pub fn assume_valid(grid: &'a GridBuffer, iteration: usize) -> Self {
        Self { grid, iteration }
    }
}

/// Border samples of `grid` on side `dir`, in row or column order.
pub fn border(grid: &GridBuffer, dir: Direction) -> Vec<f64> {
    let (w, h) = grid.shape();
    match dir {
        Direction::North => grid.row(0).to_vec(),
        Direction::South => grid.row(h - 1).to_vec(),
        Direction::East => grid.column(w - 1),
        Direction::West => grid.column(0),
    }
}

/// Halo row/column on side `dir` of `grid`, in row or column order.
pub fn halo(grid: &GridBuffer, dir: Direction) -> Vec<f64> {
    let (w, h) = (grid.width() as isize, grid.height() as isize);
    match dir {
        Direction::North => (0..w).map(|x| grid.get_padded(x, -1)).collect(),
        Direction::South => (0..w).map(|x| grid.get_padded(x, h)).collect(),
        Direction::East => (0..h).map(|y| grid.get_padded(w, y)).collect(),
        Direction::West => (0..h).map(|y| grid.get_padded(-1, y)).collect(),
    }
}

fn write_halo(grid: &mut GridBuffer, dir: Direction, values: &[f64]) -> Result<(), HeatSimError> {
    let (w, h) = (grid.width() as isize, grid.height() as isize);
    match dir {
        Direction::North => grid.write_row(-1, values),
        Direction::South => grid.write_row(h, values),
        Direction::East => grid.write_column(w, values),
        Direction::West => grid.write_column(-1, values),
    }
}

fn side_len(grid: &GridBuffer, dir: Direction) -> usize {
    match dir {
        Direction::North | Direction::South => grid.width(),
        Direction::East | Direction::West => grid.height(),
    }
}

/// Exchanges depth-1 halos for one rank.
pub struct HaloExchanger<'a, C> {
    comm: &'a C,
    topo: &'a CartTopology,
}

impl<'a, C: Communicator> HaloExchanger<'a, C> {
    pub fn new(comm: &'a C, topo: &'a CartTopology) -> Self {
        Self { comm, topo }
    }

    /// Fill the depth-1 halo ring of `grid` from the four neighbours.
    ///
    /// Every rank of the mesh must call this for the same `iteration`.
    pub fn exchange<'g>(
        &self,
        grid: &'g mut GridBuffer,
        iteration: usize,
    ) -> Result<HaloReady<'g>, HeatSimError> {
        if grid.padding() == 0 {
            return Err(HeatSimError::InvalidPadding {
                got: 0,
                reason: "halo exchange needs at least one ghost layer",
            });
        }
        let comm = self.comm;

        // 1) post all receives: my `dir` halo comes from the `dir` neighbour,
        //    travelling the opposite way
        let recvs: Vec<_> = Direction::ALL
            .into_iter()
            .map(|dir| {
                let peer = self.topo.neighbor(dir);
                let n = side_len(grid, dir);
                let tag = ChannelKey::halo(dir.opposite(), iteration).tag();
                (dir, peer, n, comm.irecv(peer, tag, n * 8))
            })
            .collect();

        // 2) post all sends; buffers outlive their handles
        let outgoing: Vec<(usize, Direction, Vec<u8>)> = Direction::ALL
            .into_iter()
            .map(|dir| (self.topo.neighbor(dir), dir, encode_samples(&border(grid, dir))))
            .collect();
        let sends: Vec<_> = outgoing
            .iter()
            .map(|(peer, dir, bytes)| comm.isend(*peer, ChannelKey::halo(*dir, iteration).tag(), bytes))
            .collect();

        // 3) join: wait on all eight before reading anything
        let mut incoming = Vec::with_capacity(4);
        let mut maybe_err = None;
        for (dir, peer, n, h) in recvs {
            match h.wait() {
                Some(raw) => match decode_samples(&raw, n, peer) {
                    Ok(values) => incoming.push((dir, values)),
                    Err(e) => {
                        maybe_err.get_or_insert(e);
                    }
                },
                None => {
                    maybe_err.get_or_insert(HeatSimError::comm(
                        peer,
                        format!("{dir} halo for iteration {iteration} never arrived"),
                    ));
                }
            }
        }
        for send in sends {
            let _ = send.wait();
        }
        if let Some(err) = maybe_err {
            return Err(err);
        }

        // 4) only now write the halo ring
        for (dir, values) in incoming {
            write_halo(grid, dir, &values)?;
        }
        log::trace!(
            "[rank {}] halo exchange {iteration} complete",
            self.topo.rank()
        );
        Ok(HaloReady {
            grid,
            iteration,
        })
    }
}

/// Convenience wrapper around [`HaloExchanger::exchange`].
pub fn exchange_halo<'g, C: Communicator>(
    comm: &C,
    topo: &CartTopology,
    grid: &'g mut GridBuffer,
    iteration: usize,
) -> Result<HaloReady<'g>, HeatSimError> {
    HaloExchanger::new(comm, topo).exchange(grid, iteration)
}
