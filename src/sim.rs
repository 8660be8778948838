//! Per-rank simulation driver.
//!
//! [`run_rank`] is what every process of a run executes: build the mesh
//! topology, receive its block from the coordinator, iterate
//! clamp / exchange / diffuse / swap, and send the result back for saving.
//! Any error on any rank aborts the whole run through the communicator.

use crate::algs::communicator::Communicator;
use crate::algs::diffuse::{DiffusionKernel, FieldPair, clamp_to_source, diffuse};
use crate::algs::distribute::{Coordinator, Role, gather_field, scatter_field};
use crate::algs::halo::exchange_halo;
use crate::config::RunConfig;
use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
use crate::io::{FieldLoader, FieldSaver, MAX_TEMP};
use crate::topology::cart::CartTopology;

/// Rank that loads, scatters, gathers and saves the global field.
pub const COORDINATOR: usize = 0;

/// Exit code handed to [`Communicator::abort`] when a rank fails.
pub const ABORT_CODE: i32 = 1;

/// What one rank did during a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rank: usize,
    pub coords: [usize; 2],
    /// Logical `(width, height)` of this rank's block.
    pub block: (usize, usize),
    pub iterations: usize,
    /// The gathered global field; only set on the coordinator.
    pub field: Option<GridBuffer>,
}

/// Run one rank of a simulation to completion.
///
/// Every rank of `comm` must call this with the same `cfg`. The coordinator
/// reads `cfg.input` through `loader` and writes `cfg.output` through
/// `saver`; other ranks never touch either.
pub fn run_rank<C, L, S>(
    comm: &C,
    cfg: &RunConfig,
    loader: &L,
    saver: &S,
) -> Result<RunSummary, HeatSimError>
where
    C: Communicator,
    L: FieldLoader + ?Sized,
    S: FieldSaver + ?Sized,
{
    match drive(comm, cfg, loader, saver) {
        Ok(summary) => Ok(summary),
        Err(err) => {
            log::error!("[rank {}] {err}", comm.rank());
            comm.abort(ABORT_CODE);
            Err(err)
        }
    }
}

fn drive<C, L, S>(comm: &C, cfg: &RunConfig, loader: &L, saver: &S) -> Result<RunSummary, HeatSimError>
where
    C: Communicator,
    L: FieldLoader + ?Sized,
    S: FieldSaver + ?Sized,
{
    cfg.validate(comm.size())?;
    let topo = CartTopology::new(comm.size(), cfg.dimx, cfg.dimy, comm.rank())?;
    let kernel = cfg.kernel()?;
    log::debug!("{topo}");

    let mut coord = if topo.rank() == COORDINATOR {
        if cfg.verbose {
            if let Ok(dump) = serde_json::to_string_pretty(cfg) {
                log::debug!("configuration:\n{dump}");
            }
        }
        Some(load_global(cfg, loader, topo.rank())?)
    } else {
        None
    };

    let block = scatter_field(comm, &topo, role(coord.as_mut()))?;
    comm.barrier()?;

    let source = block.with_padding(1)?;
    if cfg.verbose {
        log::debug!("[rank {}] heat source\n{source}", topo.rank());
    }
    let mut pair = FieldPair::new(source.clone());
    for iteration in 0..cfg.iterations {
        step(comm, &topo, &kernel, &source, &mut pair, iteration, cfg.verbose)?;
    }
    comm.barrier()?;

    gather_field(comm, &topo, role(coord.as_mut()), pair.current())?;
    if let Some(coord) = &coord {
        saver.save(coord.global(), &cfg.output)?;
    }
    comm.barrier()?;

    Ok(RunSummary {
        rank: topo.rank(),
        coords: topo.coords(),
        block: block.shape(),
        iterations: cfg.iterations,
        field: coord.map(Coordinator::into_global),
    })
}

fn load_global<L>(cfg: &RunConfig, loader: &L, rank: usize) -> Result<Coordinator, HeatSimError>
where
    L: FieldLoader + ?Sized,
{
    let input = cfg
        .input
        .as_deref()
        .ok_or_else(|| HeatSimError::InvalidConfig("no input image given".into()))?;
    let mut global = loader.load(input)?;
    global.scale(MAX_TEMP);
    Coordinator::new(rank, global, cfg.dims())
}

fn role(coord: Option<&mut Coordinator>) -> Role<'_> {
    match coord {
        Some(c) => Role::Coordinator(c),
        None => Role::Participant {
            coordinator: COORDINATOR,
        },
    }
}

/// One diffusion step on this rank's block.
///
/// Raises the current field to the heat source, refreshes its halo, writes
/// the stencil result into the other buffer and makes that buffer current.
pub fn step<C: Communicator>(
    comm: &C,
    topo: &CartTopology,
    kernel: &DiffusionKernel,
    source: &GridBuffer,
    pair: &mut FieldPair,
    iteration: usize,
    verbose: bool,
) -> Result<(), HeatSimError> {
    let (cur, next) = pair.split_mut();
    dump(verbose, topo, iteration, "start", cur);
    clamp_to_source(cur, source)?;
    dump(verbose, topo, iteration, "after clamp", cur);
    let ready = exchange_halo(comm, topo, cur, iteration)?;
    dump(verbose, topo, iteration, "after exchange", ready.grid());
    diffuse(kernel, ready, next)?;
    dump(verbose, topo, iteration, "after diffuse", next);
    pair.swap();
    Ok(())
}

fn dump(verbose: bool, topo: &CartTopology, iteration: usize, stage: &str, grid: &GridBuffer) {
    if verbose && log::log_enabled!(log::Level::Debug) {
        log::debug!("[rank {}] iteration {iteration} {stage}\n{grid}", topo.rank());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;

    #[test]
    fn step_on_single_rank_spreads_the_source() {
        let comm = LocalComm::universe(1).remove(0);
        let topo = CartTopology::new(1, 1, 1, 0).unwrap();
        let mut src = GridBuffer::new(3, 3, 1).unwrap();
        src.set(1, 1, 50.0);
        let mut pair = FieldPair::new(GridBuffer::new(3, 3, 1).unwrap());
        step(&comm, &topo, &DiffusionKernel::default(), &src, &mut pair, 0, false).unwrap();
        let g = pair.current();
        assert!((g.get(1, 1) - 10.0).abs() < 1e-12);
        assert!((g.get(1, 0) - 10.0).abs() < 1e-12);
        assert_eq!(g.get(0, 0), 0.0);
    }
}
