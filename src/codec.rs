//! LSB embed/extract over a position sequence.
//!
//! The codec touches exactly one bit per position: the least significant
//! bit of the addressed channel byte. Everything else in the raster is
//! left byte-identical. There is no error correction; a flipped carrier
//! bit flips exactly one payload bit.

use image::RgbImage;

use crate::chaos::Position;
use crate::error::{Result, StegoError};

/// Write `bits[i]` into the LSB at `positions[i]`, in order.
///
/// Unconditional read-modify-write per slot, no skips.
///
/// # Errors
///
/// `LengthMismatch` if the position and bit counts disagree.
pub fn embed_bits(image: &mut RgbImage, positions: &[Position], bits: &[u8]) -> Result<()> {
    if positions.len() != bits.len() {
        return Err(StegoError::LengthMismatch {
            positions: positions.len(),
            bits: bits.len(),
        });
    }

    for (pos, &bit) in positions.iter().zip(bits) {
        let pixel = image.get_pixel_mut(pos.x as u32, pos.y as u32);
        let b = pixel[pos.channel as usize];
        pixel[pos.channel as usize] = (b & 0xFE) | (bit & 0x01);
    }

    Ok(())
}

/// Read the LSB at each position. Never mutates.
pub fn extract_bits(image: &RgbImage, positions: &[Position]) -> Vec<u8> {
    positions
        .iter()
        .map(|pos| image.get_pixel(pos.x as u32, pos.y as u32)[pos.channel as usize] & 0x01)
        .collect()
}

/// Expand bytes into bits, most significant bit first.
pub fn bytes_to_bits(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

/// Reassemble bytes from bits under the same MSB-first convention.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        out[i / 8] |= (bit & 1) << (7 - (i % 8));
    }
    out
}
