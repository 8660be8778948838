//! Finite-difference heat diffusion on one block.
//!
//! The update is the 5-point Laplacian step
//! `next = c + k * ((n - c) + (s - c) + (e - c) + (w - c))` with a single
//! neighbour weight `k`. The weights (`1 - 4k` for the centre, `k` for each
//! neighbour) always sum to one, and a uniform field is an exact fixed point
//! in floating point since every difference is exactly zero.

use crate::algs::halo::HaloReady;
use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Symmetric 5-point averaging kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionKernel {
    neighbor: f64,
}

impl Default for DiffusionKernel {
    fn default() -> Self {
        Self::five_point_average()
    }
}

impl DiffusionKernel {
    /// Centre and four neighbours weighted equally (1/5 each).
    pub const fn five_point_average() -> Self {
        Self { neighbor: 0.2 }
    }

    /// Kernel whose centre weight is `center`; the rest is shared equally
    /// by the four neighbours.
    pub fn with_center_weight(center: f64) -> Result<Self, HeatSimError> {
        if !center.is_finite() || !(0.0..=1.0).contains(&center) {
            return Err(HeatSimError::InvalidKernel(format!(
                "centre weight must lie in [0, 1], got {center}"
            )));
        }
        Ok(Self {
            neighbor: (1.0 - center) / 4.0,
        })
    }

    pub fn center_weight(&self) -> f64 {
        1.0 - 4.0 * self.neighbor
    }

    pub fn neighbor_weight(&self) -> f64 {
        self.neighbor
    }

    /// New value of a cell from itself and its four neighbours.
    #[inline(always)]
    pub fn apply(&self, c: f64, n: f64, s: f64, e: f64, w: f64) -> f64 {
        c + self.neighbor * ((n - c) + (s - c) + (e - c) + (w - c))
    }
}

/// Raise every logical cell of `current` to at least the matching cell of
/// `source`. Idempotent.
pub fn clamp_to_source(current: &mut GridBuffer, source: &GridBuffer) -> Result<(), HeatSimError> {
    current.check_same_shape(source)?;
    for y in 0..current.height() {
        for (c, &s) in current.row_mut(y).iter_mut().zip(source.row(y)) {
            *c = c.max(s);
        }
    }
    Ok(())
}

/// One stencil step: read `ready` (logical region plus its valid halo),
/// write only the logical region of `next`.
pub fn diffuse(
    kernel: &DiffusionKernel,
    ready: HaloReady<'_>,
    next: &mut GridBuffer,
) -> Result<(), HeatSimError> {
    let cur = ready.grid();
    cur.check_same_shape(next)?;
    if cur.padding() == 0 {
        return Err(HeatSimError::InvalidPadding {
            got: 0,
            reason: "the stencil reads one ghost layer",
        });
    }
    let (w, h) = cur.shape();
    let (cs, cp) = (cur.stride(), cur.padding());
    let src = cur.as_slice();
    let (ns, np) = (next.stride(), next.padding());
    let logical_rows = &mut next.as_mut_slice()[np * ns..(np + h) * ns];

    let update_row = |(y, row): (usize, &mut [f64])| {
        let base = (y + cp) * cs + cp;
        for x in 0..w {
            let i = base + x;
            row[np + x] = kernel.apply(src[i], src[i - cs], src[i + cs], src[i + 1], src[i - 1]);
        }
    };

    #[cfg(feature = "rayon")]
    logical_rows.par_chunks_mut(ns).enumerate().for_each(update_row);
    #[cfg(not(feature = "rayon"))]
    logical_rows.chunks_mut(ns).enumerate().for_each(update_row);

    Ok(())
}

/// Two same-shaped buffers whose roles swap after every step.
///
/// The buffers never move; only the index naming the current one flips.
#[derive(Debug, Clone)]
pub struct FieldPair {
    slots: [GridBuffer; 2],
    current: usize,
}

impl FieldPair {
    /// Both slots start as copies of `init`.
    pub fn new(init: GridBuffer) -> Self {
        Self {
            slots: [init.clone(), init],
            current: 0,
        }
    }

    pub fn current(&self) -> &GridBuffer {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut GridBuffer {
        &mut self.slots[self.current]
    }

    /// `(current, next)` borrowed at once.
    pub fn split_mut(&mut self) -> (&mut GridBuffer, &mut GridBuffer) {
        let (a, b) = self.slots.split_at_mut(1);
        if self.current == 0 {
            (&mut a[0], &mut b[0])
        } else {
            (&mut b[0], &mut a[0])
        }
    }

    /// Make the freshly written buffer current.
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    pub fn into_current(self) -> GridBuffer {
        let [a, b] = self.slots;
        if self.current == 0 { a } else { b }
    }
}
