//! Run parameters.
//!
//! A [`RunConfig`] can be deserialized from JSON and then overridden field by
//! field by the command line. Nothing is checked on construction; call
//! [`RunConfig::validate`] once the process count is known.

use crate::algs::diffuse::DiffusionKernel;
use crate::heat_error::HeatSimError;
use crate::io::Palette;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a rank needs to run a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Mesh columns.
    pub dimx: usize,
    /// Mesh rows.
    pub dimy: usize,
    pub iterations: usize,
    /// PNG whose red channel is the heat source.
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    /// Log topology, configuration and per-iteration grid dumps.
    pub verbose: bool,
    /// Directory for per-rank log files.
    pub log_dir: Option<PathBuf>,
    /// Stencil weight of the centre cell.
    pub center_weight: f64,
    pub palette: Palette,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dimx: 1,
            dimy: 1,
            iterations: 100,
            input: None,
            output: PathBuf::from("heatsim.png"),
            verbose: false,
            log_dir: None,
            center_weight: 0.2,
            palette: Palette::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config; missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, HeatSimError> {
        let text = std::fs::read_to_string(path).map_err(|e| HeatSimError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| HeatSimError::io(path, e))
    }

    /// Mesh shape as `[dimx, dimy]`.
    pub fn dims(&self) -> [usize; 2] {
        [self.dimx, self.dimy]
    }

    /// Stencil built from `center_weight`.
    pub fn kernel(&self) -> Result<DiffusionKernel, HeatSimError> {
        DiffusionKernel::with_center_weight(self.center_weight)
    }

    /// Check the config against the number of running processes.
    pub fn validate(&self, procs: usize) -> Result<(), HeatSimError> {
        if self.dimx == 0 || self.dimy == 0 {
            return Err(HeatSimError::ZeroMeshDim {
                dimx: self.dimx,
                dimy: self.dimy,
            });
        }
        if self.dimx.checked_mul(self.dimy) != Some(procs) {
            return Err(HeatSimError::MeshSizeMismatch {
                dimx: self.dimx,
                dimy: self.dimy,
                procs,
            });
        }
        if self.input.is_none() {
            return Err(HeatSimError::InvalidConfig("no input image given".into()));
        }
        self.kernel()?;
        Ok(())
    }
}
