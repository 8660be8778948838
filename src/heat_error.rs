//! HeatSimError: Unified error type for halo-heat public APIs
//!
//! Every fallible operation in the crate returns this error. Variants are
//! grouped into four coarse kinds (see [`ErrorKind`]); all of them are fatal
//! to a run, the kind only tells the caller which phase failed.

use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`HeatSimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad mesh dimensions, shapes or parameters; reported before computing.
    Configuration,
    /// A grid or message buffer could not be allocated.
    Resource,
    /// Input unreadable or output unwritable.
    Io,
    /// A scatter/halo/gather transfer did not complete.
    Communication,
}

/// Unified error type for halo-heat operations.
#[derive(Debug, Error)]
pub enum HeatSimError {
    /// `dimx * dimy` does not match the number of processes.
    #[error("mesh {dimx}x{dimy} needs {} processes, but {procs} are running", .dimx * .dimy)]
    MeshSizeMismatch {
        dimx: usize,
        dimy: usize,
        procs: usize,
    },
    /// One of the mesh dimensions is zero.
    #[error("mesh dimensions must be greater than 0 (got {dimx}x{dimy})")]
    ZeroMeshDim { dimx: usize, dimy: usize },
    /// A rank outside `0..procs` was used.
    #[error("rank {rank} is out of range for {procs} processes")]
    RankOutOfRange { rank: usize, procs: usize },
    /// The operation needs a different padding depth.
    #[error("padding {got} is invalid here: {reason}")]
    InvalidPadding { got: usize, reason: &'static str },
    /// Stencil weights are not a valid averaging kernel.
    #[error("invalid diffusion kernel: {0}")]
    InvalidKernel(String),
    /// Two grids (or a grid and a sample slice) disagree on shape.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// The field has zero width or height.
    #[error("field has no samples")]
    EmptyField,
    /// A block is too small for the mesh (fewer cells than blocks on an axis).
    #[error("cannot split {len} cells into {parts} blocks along the {axis} axis")]
    Undersized {
        axis: &'static str,
        len: usize,
        parts: usize,
    },
    /// Any other invalid run parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Allocation of a grid or message buffer failed.
    #[error("failed to allocate {samples} samples")]
    Allocation { samples: usize },
    /// Input or output failure.
    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A transfer with `neighbor` failed or the run was aborted.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl HeatSimError {
    /// Which phase of a run this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MeshSizeMismatch { .. }
            | Self::ZeroMeshDim { .. }
            | Self::RankOutOfRange { .. }
            | Self::InvalidPadding { .. }
            | Self::InvalidKernel(_)
            | Self::ShapeMismatch { .. }
            | Self::EmptyField
            | Self::Undersized { .. }
            | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::Allocation { .. } => ErrorKind::Resource,
            Self::Io { .. } => ErrorKind::Io,
            Self::CommError { .. } => ErrorKind::Communication,
        }
    }

    /// Shorthand for a communication failure with a plain message.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        HeatSimError::CommError {
            neighbor,
            source: Box::new(CommError(msg.into())),
        }
    }

    /// Shorthand for an I/O failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: impl StdError + Send + Sync + 'static) -> Self {
        HeatSimError::Io {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Plain-text source for [`HeatSimError::CommError`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CommError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_grouped() {
        let e = HeatSimError::MeshSizeMismatch {
            dimx: 2,
            dimy: 2,
            procs: 3,
        };
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert_eq!(e.to_string(), "mesh 2x2 needs 4 processes, but 3 are running");
        assert_eq!(HeatSimError::comm(3, "gone").kind(), ErrorKind::Communication);
        assert_eq!(HeatSimError::Allocation { samples: 1 }.kind(), ErrorKind::Resource);
    }
}
