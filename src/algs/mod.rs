//! Re-export public algorithms.

pub mod communicator;
pub mod diffuse;
pub mod distribute;
pub mod halo;
pub mod partition;
pub mod wire;

pub use diffuse::{clamp_to_source, diffuse};
pub use distribute::{gather_field, scatter_field};
pub use halo::exchange_halo;
