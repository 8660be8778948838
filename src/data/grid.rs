//! Padded, row-major sample buffer.
//!
//! A [`GridBuffer`] stores a `width x height` logical region surrounded by a
//! ring of `padding` ghost cells on every side, so the physical extent is
//! `(width + 2*padding) x (height + 2*padding)`. Logical coordinates are
//! `0..width` / `0..height`; halo cells are addressed with signed coordinates
//! in `-padding..0` and `width..width+padding`.
//!
//! Buffers are never shared: every transfer across a process boundary copies
//! into a fresh buffer on the receiving side.

use crate::debug_invariants::DebugInvariants;
use crate::heat_error::HeatSimError;
use std::fmt;

/// Owning padded grid of `f64` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct GridBuffer {
    width: usize,
    height: usize,
    padding: usize,
    pw: usize,
    ph: usize,
    samples: Vec<f64>,
}

fn allocate(len: usize, value: f64) -> Result<Vec<f64>, HeatSimError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| HeatSimError::Allocation { samples: len })?;
    v.resize(len, value);
    Ok(v)
}

impl GridBuffer {
    /// Allocate a zero-filled grid.
    pub fn new(width: usize, height: usize, padding: usize) -> Result<Self, HeatSimError> {
        Self::filled(width, height, padding, 0.0)
    }

    /// Allocate a grid with every cell (halo included) set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        padding: usize,
        value: f64,
    ) -> Result<Self, HeatSimError> {
        if width == 0 || height == 0 {
            return Err(HeatSimError::EmptyField);
        }
        let pw = width
            .checked_add(2 * padding)
            .ok_or(HeatSimError::Allocation { samples: usize::MAX })?;
        let ph = height
            .checked_add(2 * padding)
            .ok_or(HeatSimError::Allocation { samples: usize::MAX })?;
        let len = pw
            .checked_mul(ph)
            .ok_or(HeatSimError::Allocation { samples: usize::MAX })?;
        Ok(Self {
            width,
            height,
            padding,
            pw,
            ph,
            samples: allocate(len, value)?,
        })
    }

    /// Wrap row-major logical samples into a padding-0 grid.
    pub fn from_samples(
        width: usize,
        height: usize,
        samples: Vec<f64>,
    ) -> Result<Self, HeatSimError> {
        if width == 0 || height == 0 {
            return Err(HeatSimError::EmptyField);
        }
        if width.checked_mul(height) != Some(samples.len()) {
            return Err(HeatSimError::ShapeMismatch {
                expected: (width, height),
                found: (samples.len(), 1),
            });
        }
        Ok(Self {
            width,
            height,
            padding: 0,
            pw: width,
            ph: height,
            samples,
        })
    }

    /// Wrap a full physical buffer (halo included) received from a peer.
    pub fn from_physical(
        width: usize,
        height: usize,
        padding: usize,
        samples: Vec<f64>,
    ) -> Result<Self, HeatSimError> {
        if padding == 0 {
            return Self::from_samples(width, height, samples);
        }
        let mut grid = Self::new(width, height, padding)?;
        if samples.len() != grid.samples.len() {
            return Err(HeatSimError::ShapeMismatch {
                expected: (grid.pw, grid.ph),
                found: (samples.len(), 1),
            });
        }
        grid.samples = samples;
        grid.into_checked()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }
    #[inline]
    pub fn padding(&self) -> usize {
        self.padding
    }
    /// Row stride of the physical buffer.
    #[inline]
    pub fn stride(&self) -> usize {
        self.pw
    }
    #[inline]
    pub fn physical_height(&self) -> usize {
        self.ph
    }
    /// Logical `(width, height)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of logical samples.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole physical buffer, halo included.
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Physical index of signed logical coordinates.
    #[inline]
    fn index(&self, x: isize, y: isize) -> usize {
        let p = self.padding as isize;
        debug_assert!(x >= -p && x < (self.width as isize) + p, "x={x} outside physical extent");
        debug_assert!(y >= -p && y < (self.height as isize) + p, "y={y} outside physical extent");
        (y + p) as usize * self.pw + (x + p) as usize
    }

    /// Sample at logical `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.samples[self.index(x as isize, y as isize)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        let i = self.index(x as isize, y as isize);
        self.samples[i] = value;
    }

    /// Sample at signed coordinates; reaches into the padding ring.
    #[inline]
    pub fn get_padded(&self, x: isize, y: isize) -> f64 {
        self.samples[self.index(x, y)]
    }

    /// Logical part of row `y`.
    pub fn row(&self, y: usize) -> &[f64] {
        let start = self.index(0, y as isize);
        &self.samples[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f64] {
        let start = self.index(0, y as isize);
        let w = self.width;
        &mut self.samples[start..start + w]
    }

    /// Iterate over logical rows, north to south.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }

    /// Logical part of column `x`, copied out (columns are strided).
    pub fn column(&self, x: usize) -> Vec<f64> {
        (0..self.height)
            .map(|y| self.get_padded(x as isize, y as isize))
            .collect()
    }

    /// Overwrite the logical span of the (possibly halo) row `y`.
    pub fn write_row(&mut self, y: isize, values: &[f64]) -> Result<(), HeatSimError> {
        if values.len() != self.width {
            return Err(HeatSimError::ShapeMismatch {
                expected: (self.width, 1),
                found: (values.len(), 1),
            });
        }
        let start = self.index(0, y);
        self.samples[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Overwrite the logical span of the (possibly halo) column `x`.
    pub fn write_column(&mut self, x: isize, values: &[f64]) -> Result<(), HeatSimError> {
        if values.len() != self.height {
            return Err(HeatSimError::ShapeMismatch {
                expected: (1, self.height),
                found: (1, values.len()),
            });
        }
        for (y, &v) in values.iter().enumerate() {
            let i = self.index(x, y as isize);
            self.samples[i] = v;
        }
        Ok(())
    }

    /// Row-major copy of the logical region.
    pub fn to_logical_vec(&self) -> Vec<f64> {
        if self.padding == 0 {
            return self.samples.clone();
        }
        let mut out = Vec::with_capacity(self.len());
        for row in self.rows() {
            out.extend_from_slice(row);
        }
        out
    }

    /// Copy of the logical region with a different padding depth.
    ///
    /// The new halo ring is zeroed.
    pub fn with_padding(&self, padding: usize) -> Result<Self, HeatSimError> {
        let mut out = Self::new(self.width, self.height, padding)?;
        for y in 0..self.height {
            out.row_mut(y).copy_from_slice(self.row(y));
        }
        Ok(out)
    }

    /// Copy the `width x height` rectangle at `(x0, y0)` into a padding-0 grid.
    pub fn extract(
        &self,
        x0: usize,
        y0: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, HeatSimError> {
        if x0 + width > self.width || y0 + height > self.height {
            return Err(HeatSimError::ShapeMismatch {
                expected: (self.width, self.height),
                found: (x0 + width, y0 + height),
            });
        }
        let mut out = Self::new(width, height, 0)?;
        for y in 0..height {
            out.row_mut(y)
                .copy_from_slice(&self.row(y0 + y)[x0..x0 + width]);
        }
        Ok(out)
    }

    /// Copy the logical region of `block` into this grid at `(x0, y0)`.
    pub fn paste(&mut self, block: &GridBuffer, x0: usize, y0: usize) -> Result<(), HeatSimError> {
        if x0 + block.width > self.width || y0 + block.height > self.height {
            return Err(HeatSimError::ShapeMismatch {
                expected: (self.width, self.height),
                found: (x0 + block.width, y0 + block.height),
            });
        }
        for y in 0..block.height {
            self.row_mut(y0 + y)[x0..x0 + block.width].copy_from_slice(block.row(y));
        }
        Ok(())
    }

    /// Multiply every logical sample by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for y in 0..self.height {
            self.row_mut(y).iter_mut().for_each(|v| *v *= factor);
        }
    }

    /// Set every cell, halo included.
    pub fn fill(&mut self, value: f64) {
        self.samples.fill(value);
    }

    /// `true` if `other` has the same logical shape.
    pub fn same_shape(&self, other: &GridBuffer) -> bool {
        self.shape() == other.shape()
    }

    /// Error unless `other` has the same logical shape.
    pub fn check_same_shape(&self, other: &GridBuffer) -> Result<(), HeatSimError> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(HeatSimError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            })
        }
    }
}

impl DebugInvariants for GridBuffer {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GridBuffer");
    }

    fn validate_invariants(&self) -> Result<(), HeatSimError> {
        if self.pw != self.width + 2 * self.padding || self.ph != self.height + 2 * self.padding {
            return Err(HeatSimError::InvalidPadding {
                got: self.padding,
                reason: "physical extent does not match logical size plus padding",
            });
        }
        if self.samples.len() != self.pw * self.ph {
            return Err(HeatSimError::ShapeMismatch {
                expected: (self.pw, self.ph),
                found: (self.samples.len(), 1),
            });
        }
        Ok(())
    }
}

/// Fixed-width dump of the logical region, one row per line.
impl fmt::Display for GridBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "grid {}x{} padding={}",
            self.width, self.height, self.padding
        )?;
        for row in self.rows() {
            for v in row {
                write!(f, "{v:9.3} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
