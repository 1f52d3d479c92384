//! The embed/extract engine.
//!
//! A thin pipeline over the leaf components: anchor selection, key
//! derivation, position generation, LSB mutation and the envelope chunk.
//! Each call runs to completion on the calling thread, owns its raster
//! for the duration, and leaves the caller's input untouched on any
//! error path.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use crate::chaos::{Position, PositionGenerator};
use crate::codec::{bits_to_bytes, bytes_to_bits, embed_bits, extract_bits};
use crate::envelope::{read_envelope, write_envelope, EnvelopeDescriptor, RESERVED_BYTES};
use crate::error::{Result, StegoError};
use crate::keys::derive_params;
use crate::texture::extract_anchor;

/// Payload capacity in bits for a `width x height` carrier.
pub(crate) fn capacity_for(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 3 - (RESERVED_BYTES as u64 * 8)
}

/// An 8-bit truecolour raster with its alpha plane split off.
///
/// Alpha bits are never used as carrier slots; the plane is re-attached
/// verbatim on encode.
struct Carrier {
    rgb: RgbImage,
    alpha: Option<Vec<u8>>,
}

fn decode_carrier(png: &[u8]) -> Result<Carrier> {
    let (width, height, bit_depth, colour_type) = crate::envelope::ihdr_info(png)?;
    if bit_depth != 8 || !matches!(colour_type, 2 | 6) {
        return Err(StegoError::UnsupportedFormat);
    }
    if !(32..=u16::MAX as u32).contains(&width) || !(32..=u16::MAX as u32).contains(&height) {
        return Err(StegoError::UnsupportedFormat);
    }

    match image::load_from_memory_with_format(png, ImageFormat::Png)? {
        DynamicImage::ImageRgb8(rgb) => Ok(Carrier { rgb, alpha: None }),
        DynamicImage::ImageRgba8(rgba) => {
            let rgb = RgbImage::from_fn(width, height, |x, y| {
                let p = rgba.get_pixel(x, y);
                Rgb([p[0], p[1], p[2]])
            });
            let alpha = rgba.pixels().map(|p| p[3]).collect();
            Ok(Carrier {
                rgb,
                alpha: Some(alpha),
            })
        }
        _ => Err(StegoError::UnsupportedFormat),
    }
}

fn encode_carrier(rgb: &RgbImage, alpha: Option<&[u8]>) -> Result<Vec<u8>> {
    let (width, height) = rgb.dimensions();
    let mut out = Cursor::new(Vec::new());
    match alpha {
        Some(alpha) => {
            let rgba = RgbaImage::from_fn(width, height, |x, y| {
                let p = rgb.get_pixel(x, y);
                Rgba([p[0], p[1], p[2], alpha[(y * width + x) as usize]])
            });
            DynamicImage::ImageRgba8(rgba).write_to(&mut out, ImageFormat::Png)?;
        }
        None => {
            DynamicImage::ImageRgb8(rgb.clone()).write_to(&mut out, ImageFormat::Png)?;
        }
    }
    Ok(out.into_inner())
}

/// SHA-256 over the raster with every selected LSB forced to zero.
///
/// Binds the envelope to each non-selected bit of the carrier while
/// staying independent of the payload bits themselves. The row-major
/// R,G,B byte order of the raster buffer is the hashed representation;
/// alpha never participates.
fn normalized_carrier_sha(rgb: &RgbImage, positions: &[Position]) -> [u8; 32] {
    let width = rgb.width() as usize;
    let mut buf = rgb.as_raw().clone();
    for p in positions {
        buf[(p.y as usize * width + p.x as usize) * 3 + p.channel as usize] &= 0xFE;
    }
    Sha256::digest(&buf).into()
}

/// Keyed steganography engine.
///
/// Holds only the key; every call derives its chaos parameters fresh, so
/// instances are cheap and safe to share across threads for disjoint
/// images.
pub struct ZkStego {
    key: Vec<u8>,
}

impl ZkStego {
    /// Create an engine for `key`.
    ///
    /// # Errors
    ///
    /// `KeyTooShort` if `key` is empty.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(StegoError::KeyTooShort);
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Hide `payload` in `png`, anchoring at the carrier's highest-texture
    /// window.
    ///
    /// Returns the stego PNG and the envelope descriptor it carries.
    pub fn embed(&self, png: &[u8], payload: &[u8]) -> Result<(Vec<u8>, EnvelopeDescriptor)> {
        self.embed_with(png, payload, None, None)
    }

    /// Hide `payload` in `png` with an explicit anchor and/or an opaque
    /// public-metadata blob for the envelope.
    ///
    /// Every pre-flight check runs before the first pixel is written, so a
    /// failed embed has no observable effect.
    pub fn embed_with(
        &self,
        png: &[u8],
        payload: &[u8],
        anchor: Option<(u16, u16)>,
        meta: Option<&[u8]>,
    ) -> Result<(Vec<u8>, EnvelopeDescriptor)> {
        let carrier = decode_carrier(png)?;
        let (width, height) = carrier.rgb.dimensions();

        let payload_bits = payload.len() as u64 * 8;
        // Cap at what the envelope's u32 length field can describe.
        let available = capacity_for(width, height).min(u32::MAX as u64);
        if payload_bits > available {
            return Err(StegoError::CapacityExceeded {
                needed: payload_bits,
                available,
            });
        }

        let anchor = anchor.unwrap_or_else(|| extract_anchor(&carrier.rgb));
        let params = derive_params(&self.key, anchor)?;
        let positions = PositionGenerator::new(&params, anchor, width, height)
            .generate(payload_bits as usize)?;

        let mut rgb = carrier.rgb;
        embed_bits(&mut rgb, &positions, &bytes_to_bits(payload))?;

        let descriptor = EnvelopeDescriptor {
            anchor,
            payload_bits: payload_bits as u32,
            carrier_sha: normalized_carrier_sha(&rgb, &positions),
            meta: meta.unwrap_or_default().to_vec(),
        };

        let encoded = encode_carrier(&rgb, carrier.alpha.as_deref())?;
        let stego = write_envelope(&encoded, &descriptor)?;
        Ok((stego, descriptor))
    }

    /// Recover the payload from a stego PNG.
    ///
    /// The descriptor is returned only after full validation; on any
    /// failure no payload bytes are produced.
    pub fn extract(&self, png: &[u8]) -> Result<(Vec<u8>, EnvelopeDescriptor)> {
        let (carrier, positions, descriptor) = self.validate(png)?;
        let bits = extract_bits(&carrier.rgb, &positions);
        Ok((bits_to_bytes(&bits), descriptor))
    }

    /// Validate a stego PNG without reconstructing the payload.
    ///
    /// Checks the envelope chunk, re-derives the position sequence and
    /// verifies the normalized carrier hash.
    pub fn verify(&self, png: &[u8]) -> Result<EnvelopeDescriptor> {
        let (_, _, descriptor) = self.validate(png)?;
        Ok(descriptor)
    }

    fn validate(&self, png: &[u8]) -> Result<(Carrier, Vec<Position>, EnvelopeDescriptor)> {
        let descriptor = read_envelope(png)?;
        let carrier = decode_carrier(png)?;
        let (width, height) = carrier.rgb.dimensions();

        if descriptor.payload_bits as u64 > capacity_for(width, height) {
            return Err(StegoError::EnvelopeInconsistent);
        }

        let params = derive_params(&self.key, descriptor.anchor)?;
        let positions = PositionGenerator::new(&params, descriptor.anchor, width, height)
            .generate(descriptor.payload_bits as usize)?;

        if normalized_carrier_sha(&carrier.rgb, &positions) != descriptor.carrier_sha {
            return Err(StegoError::CarrierMismatch);
        }

        Ok((carrier, positions, descriptor))
    }
}
