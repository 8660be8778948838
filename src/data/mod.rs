//! Data module: padded sample grids

pub mod grid;

pub use grid::GridBuffer;
