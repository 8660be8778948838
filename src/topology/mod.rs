//! Process mesh topology.
//!
//! Ranks are laid out on a periodic `dimx x dimy` Cartesian mesh; see
//! [`cart::CartTopology`] for the numbering and neighbour rules.

pub mod cart;

pub use cart::{CartTopology, Direction};
