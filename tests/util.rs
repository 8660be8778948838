#![allow(dead_code)]
use halo_heat::algs::communicator::LocalComm;
use halo_heat::data::grid::GridBuffer;
use halo_heat::heat_error::HeatSimError;
use halo_heat::io::{FieldLoader, FieldSaver};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Run `f` once per rank of a fresh `procs`-rank universe, one thread each.
/// Results come back in rank order.
pub fn run_ranks<T, F>(procs: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&LocalComm) -> T + Sync,
{
    let comms = LocalComm::universe(procs);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// `w x h` grid whose samples are their own row-major index.
pub fn ramp(w: usize, h: usize) -> GridBuffer {
    let samples = (0..w * h).map(|i| i as f64).collect();
    GridBuffer::from_samples(w, h, samples).unwrap()
}

/// Deterministic values in `[0, 1)`.
pub fn noise(w: usize, h: usize, seed: u64) -> GridBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = (0..w * h).map(|_| rng.r#gen::<f64>()).collect();
    GridBuffer::from_samples(w, h, samples).unwrap()
}

/// In-memory loader/saver: hands out `source` and keeps whatever is saved.
#[derive(Default)]
pub struct MemoryField {
    pub source: Option<GridBuffer>,
    pub saved: Mutex<Option<GridBuffer>>,
}

impl MemoryField {
    pub fn new(source: GridBuffer) -> Self {
        Self {
            source: Some(source),
            saved: Mutex::new(None),
        }
    }

    pub fn saved(&self) -> Option<GridBuffer> {
        self.saved.lock().clone()
    }
}

impl FieldLoader for MemoryField {
    fn load(&self, path: &Path) -> Result<GridBuffer, HeatSimError> {
        self.source.clone().ok_or_else(|| {
            HeatSimError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such image"),
            )
        })
    }
}

impl FieldSaver for MemoryField {
    fn save(&self, field: &GridBuffer, _path: &Path) -> Result<(), HeatSimError> {
        *self.saved.lock() = Some(field.clone());
        Ok(())
    }
}
