//! Fixed, little-endian wire types for scatter, halo and gather traffic.

use crate::heat_error::HeatSimError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// View wire records as raw bytes for sending.
pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Received byte count check; the message goes into a [`HeatSimError::CommError`].
pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

// Fields hold little-endian bit patterns; accessors convert on the way out.

/// Block dimensions sent ahead of a scatter payload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGridHeader {
    pub width_le: u32,
    pub height_le: u32,
    pub padding_le: u32,
}

impl WireGridHeader {
    pub const SIZE: usize = 12;

    pub fn new(width: usize, height: usize, padding: usize) -> Result<Self, HeatSimError> {
        let narrow = |v: usize| {
            u32::try_from(v).map_err(|_| {
                HeatSimError::InvalidConfig(format!("dimension {v} does not fit the wire header"))
            })
        };
        Ok(Self {
            width_le: narrow(width)?.to_le(),
            height_le: narrow(height)?.to_le(),
            padding_le: narrow(padding)?.to_le(),
        })
    }

    pub fn width(&self) -> usize {
        u32::from_le(self.width_le) as usize
    }
    pub fn height(&self) -> usize {
        u32::from_le(self.height_le) as usize
    }
    pub fn padding(&self) -> usize {
        u32::from_le(self.padding_le) as usize
    }

    /// Number of samples the payload that follows must carry.
    ///
    /// Fails with a communication error if a header from `peer` describes a
    /// payload too large to address.
    pub fn payload_samples(&self, peer: usize) -> Result<usize, HeatSimError> {
        let ring = self.padding().checked_mul(2);
        let pw = ring.and_then(|r| self.width().checked_add(r));
        let ph = ring.and_then(|r| self.height().checked_add(r));
        pw.zip(ph)
            .and_then(|(pw, ph)| pw.checked_mul(ph))
            .filter(|n| n.checked_mul(WireSample::SIZE).is_some())
            .ok_or_else(|| {
                HeatSimError::comm(
                    peer,
                    format!(
                        "header {}x{} padding {} overflows the payload size",
                        self.width(),
                        self.height(),
                        self.padding()
                    ),
                )
            })
    }

    pub fn decode(bytes: &[u8], peer: usize) -> Result<Self, HeatSimError> {
        expect_exact_len(bytes.len(), Self::SIZE).map_err(|e| HeatSimError::comm(peer, e))?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

/// One `f64` sample, carried as its little-endian bit pattern.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireSample {
    pub bits_le: u64,
}

impl WireSample {
    pub const SIZE: usize = 8;

    pub fn of(v: f64) -> Self {
        Self {
            bits_le: v.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

/// Encode samples for transmission.
pub fn encode_samples(samples: &[f64]) -> Vec<u8> {
    let wire: Vec<WireSample> = samples.iter().copied().map(WireSample::of).collect();
    cast_slice(&wire).to_vec()
}

/// Decode exactly `expected` samples received from `peer`.
pub fn decode_samples(bytes: &[u8], expected: usize, peer: usize) -> Result<Vec<f64>, HeatSimError> {
    expect_exact_len(bytes.len(), expected * WireSample::SIZE)
        .map_err(|e| HeatSimError::comm(peer, e))?;
    Ok(bytes
        .chunks_exact(WireSample::SIZE)
        .map(|c| bytemuck::pod_read_unaligned::<WireSample>(c).get())
        .collect())
}

const_assert_eq!(size_of::<WireGridHeader>(), WireGridHeader::SIZE);
const_assert_eq!(size_of::<WireSample>(), WireSample::SIZE);
