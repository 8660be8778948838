#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-heat
//!
//! halo-heat simulates 2-D heat diffusion over a rectangular field split
//! across a periodic mesh of cooperating processes. Each process owns one
//! rectangular block, talks to its four neighbours only through messages,
//! and keeps a one-cell ghost ring ("halo") refreshed before every stencil
//! step.
//!
//! ## Features
//! - Padded grid buffers with halo-aware row and column access
//! - Periodic Cartesian process mesh with north/south/east/west neighbours
//! - Even block decomposition, scatter from and gather to a coordinator rank
//! - Non-blocking halo exchange that hands the stencil a proof of validity
//! - Pluggable communication backends (in-process threads, MPI)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! halo-heat = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! A run is driven per rank by [`sim::run_rank`]; the `heatsim` binary wires
//! it to the command line, logging and PNG I/O.
//!
//! ## Determinism
//!
//! Every rank performs the same floating-point operations in the same order
//! regardless of how many ranks share the field, so a multi-rank result is
//! identical to the single-rank one.

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod heat_error;
pub mod io;
pub mod sim;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, Wait};
    pub use crate::algs::diffuse::{DiffusionKernel, FieldPair};
    pub use crate::algs::distribute::{Coordinator, Role, gather_field, scatter_field};
    pub use crate::algs::halo::{HaloReady, exchange_halo};
    pub use crate::algs::partition::{BlockExtent, PartitionMap};
    pub use crate::config::RunConfig;
    pub use crate::data::grid::GridBuffer;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::heat_error::{ErrorKind, HeatSimError};
    pub use crate::io::{FieldLoader, FieldSaver, MAX_TEMP, Palette, PngField};
    pub use crate::sim::{RunSummary, run_rank};
    pub use crate::topology::cart::{CartTopology, Direction};
}
