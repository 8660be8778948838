//! heatsim - distributed 2-D heat diffusion from a PNG heat source.
//!
//! # Examples
//!
//! ```bash
//! # 2x2 mesh of threads, 500 iterations
//! heatsim --input source.png --dimx 2 --dimy 2 --iter 500
//!
//! # one process per rank under MPI, one log file per rank
//! mpirun -n 4 heatsim --backend mpi --dimx 2 --dimy 2 -i source.png --log-dir logs
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use halo_heat::algs::communicator::LocalComm;
use halo_heat::config::RunConfig;
use halo_heat::io::{Palette, PngField};
use halo_heat::sim::{RunSummary, run_rank};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One thread per rank inside this process
    Local,
    /// One MPI process per rank
    Mpi,
}

/// Distributed heat diffusion over a periodic process mesh
#[derive(Debug, Parser)]
#[command(name = "heatsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with run parameters; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mesh columns
    #[arg(long)]
    dimx: Option<usize>,

    /// Mesh rows
    #[arg(long)]
    dimy: Option<usize>,

    /// Number of diffusion steps
    #[arg(short = 'n', long = "iter")]
    iterations: Option<usize>,

    /// PNG whose red channel is the heat source
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the final field
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log topology, configuration and per-iteration grids
    #[arg(short, long)]
    verbose: bool,

    /// Write one log file per rank (`out-<rank>`) into this directory (MPI only)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Stencil weight of the centre cell, in [0, 1]
    #[arg(long)]
    center_weight: Option<f64>,

    /// Output colouring: heat or gray
    #[arg(long)]
    palette: Option<Palette>,

    #[arg(long, value_enum, default_value_t = Backend::Local)]
    backend: Backend,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(RunConfig, Backend)> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.dimx {
            cfg.dimx = v;
        }
        if let Some(v) = self.dimy {
            cfg.dimy = v;
        }
        if let Some(v) = self.iterations {
            cfg.iterations = v;
        }
        if self.input.is_some() {
            cfg.input = self.input;
        }
        if let Some(v) = self.output {
            cfg.output = v;
        }
        cfg.verbose |= self.verbose;
        if self.log_dir.is_some() {
            cfg.log_dir = self.log_dir;
        }
        if let Some(v) = self.center_weight {
            cfg.center_weight = v;
        }
        if let Some(v) = self.palette {
            cfg.palette = v;
        }
        Ok((cfg, self.backend))
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(false)
        .init();
}

#[cfg_attr(not(feature = "mpi-support"), allow(dead_code))]
fn init_rank_logging(verbose: bool, dir: &Path, rank: usize) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let path = dir.join(format!("out-{rank}"));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

fn report(summary: &RunSummary) {
    log::info!(
        "[rank {}] coords=({}, {}) block={}x{} iterations={}",
        summary.rank,
        summary.coords[0],
        summary.coords[1],
        summary.block.0,
        summary.block.1,
        summary.iterations
    );
}

fn run_local(cfg: &RunConfig) -> anyhow::Result<()> {
    init_logging(cfg.verbose);
    let procs = cfg
        .dimx
        .checked_mul(cfg.dimy)
        .filter(|&p| p > 0)
        .with_context(|| format!("invalid mesh {}x{}", cfg.dimx, cfg.dimy))?;
    let png = PngField {
        palette: cfg.palette,
        ..PngField::default()
    };
    let png = &png;
    let comms = LocalComm::universe(procs);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| s.spawn(move || run_rank(comm, cfg, png, png)))
            .collect();
        handles.into_iter().map(|h| h.join()).collect()
    });

    let mut first_err = None;
    for (rank, joined) in results.into_iter().enumerate() {
        match joined {
            Ok(Ok(summary)) => report(&summary),
            Ok(Err(e)) => {
                first_err.get_or_insert(anyhow::Error::new(e).context(format!("rank {rank} failed")));
            }
            Err(_) => {
                first_err.get_or_insert(anyhow::anyhow!("rank {rank} panicked"));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(feature = "mpi-support")]
fn run_mpi(cfg: &RunConfig) -> anyhow::Result<()> {
    use halo_heat::algs::communicator::{Communicator, MpiComm};

    let comm = MpiComm::new()?;
    match &cfg.log_dir {
        Some(dir) => init_rank_logging(cfg.verbose, dir, comm.rank())?,
        None => init_logging(cfg.verbose),
    }
    let png = PngField {
        palette: cfg.palette,
        ..PngField::default()
    };
    let summary = run_rank(&comm, cfg, &png, &png)
        .with_context(|| format!("rank {} failed", comm.rank()))?;
    report(&summary);
    Ok(())
}

#[cfg(not(feature = "mpi-support"))]
fn run_mpi(_cfg: &RunConfig) -> anyhow::Result<()> {
    anyhow::bail!("heatsim was built without the `mpi-support` feature")
}

/// Reject settings the chosen backend cannot honour.
fn check_backend(cfg: &RunConfig, backend: Backend) -> anyhow::Result<()> {
    if backend == Backend::Local {
        if let Some(dir) = &cfg.log_dir {
            anyhow::bail!(
                "per-rank log files (--log-dir {}) need --backend mpi; local ranks share one log",
                dir.display()
            );
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let (cfg, backend) = Cli::parse().into_config()?;
    check_backend(&cfg, backend)?;
    match backend {
        Backend::Local => run_local(&cfg),
        Backend::Mpi => run_mpi(&cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (RunConfig, Backend) {
        let argv = std::iter::once("heatsim").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().into_config().unwrap()
    }

    #[test]
    fn log_dir_needs_mpi_backend() {
        let (cfg, backend) = parse(&["-i", "in.png", "--log-dir", "logs"]);
        assert_eq!(backend, Backend::Local);
        let err = check_backend(&cfg, backend).unwrap_err();
        assert!(err.to_string().contains("--backend mpi"), "{err}");

        let (cfg, backend) = parse(&["-i", "in.png", "--log-dir", "logs", "--backend", "mpi"]);
        assert!(check_backend(&cfg, backend).is_ok());
        let (cfg, backend) = parse(&["-i", "in.png"]);
        assert!(check_backend(&cfg, backend).is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let (cfg, _) = parse(&["--dimx", "3", "-n", "7", "--palette", "gray", "-v"]);
        assert_eq!(cfg.dims(), [3, 1]);
        assert_eq!(cfg.iterations, 7);
        assert_eq!(cfg.palette, Palette::Gray);
        assert!(cfg.verbose);
    }
}
