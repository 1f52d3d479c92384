//! The on-image artifact envelope.
//!
//! Embedding leaves the payload in the raster's LSBs and everything a
//! recipient needs to reverse the process in one custom PNG chunk. The
//! chunk type `zkPF` is ancillary (lowercase first letter) so ordinary
//! decoders skip it, and public-registered-style (uppercase second
//! letter) so editors treat it as safe to copy.
//!
//! Chunk data layout, all integers big-endian:
//!
//! ```text
//! tag          : 4 bytes  "ZKSG"
//! version      : u8       currently 1
//! anchor_x     : u16
//! anchor_y     : u16
//! payload_bits : u32
//! carrier_sha  : 32 bytes
//! meta_len     : u32
//! meta         : meta_len bytes, opaque to the codec
//! ```

use crate::error::{Result, StegoError};

/// PNG file signature (first 8 bytes of any valid PNG).
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Chunk type carrying the envelope.
pub const CHUNK_TYPE: [u8; 4] = *b"zkPF";

/// Algorithm tag inside the chunk data.
pub const ENVELOPE_TAG: [u8; 4] = *b"ZKSG";

/// Envelope format version this codec reads and writes.
pub const ENVELOPE_VERSION: u8 = 1;

/// Carrier bytes held back from the payload budget for the envelope.
pub const RESERVED_BYTES: usize = 64;

/// Fixed-size prefix of the chunk data, before the metadata blob.
const FIXED_LEN: usize = 4 + 1 + 2 + 2 + 4 + 32 + 4;

/// Everything a recipient needs to invert an embedding, minus the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDescriptor {
    /// Starting coordinate of the position generator, `(x, y)`.
    pub anchor: (u16, u16),
    /// Number of LSB bits carried in the raster.
    pub payload_bits: u32,
    /// SHA-256 over the stego raster with every selected LSB cleared.
    pub carrier_sha: [u8; 32],
    /// Opaque public metadata, copied verbatim in both directions.
    pub meta: Vec<u8>,
}

/// A chunk's location inside the PNG byte stream.
struct RawChunk {
    ty: [u8; 4],
    /// Offset of the length field.
    start: usize,
    /// Offset one past the CRC field.
    end: usize,
    data_start: usize,
    data_end: usize,
}

/// Walk the chunk list. Stops after `IEND`; fails on structural damage.
fn parse_chunks(png: &[u8]) -> Result<Vec<RawChunk>> {
    if png.len() < 8 || png[..8] != PNG_SIGNATURE {
        return Err(StegoError::MalformedPng("not a PNG byte stream"));
    }

    let mut chunks = Vec::new();
    let mut offset = 8usize;
    while offset + 12 <= png.len() {
        let length = u32::from_be_bytes(png[offset..offset + 4].try_into().unwrap()) as usize;
        let mut ty = [0u8; 4];
        ty.copy_from_slice(&png[offset + 4..offset + 8]);

        let data_start = offset + 8;
        let data_end = data_start
            .checked_add(length)
            .ok_or(StegoError::MalformedPng("chunk length overflow"))?;
        let end = data_end + 4;
        if end > png.len() {
            return Err(StegoError::MalformedPng("truncated chunk"));
        }

        chunks.push(RawChunk {
            ty,
            start: offset,
            end,
            data_start,
            data_end,
        });

        offset = end;
        if &ty == b"IEND" {
            return Ok(chunks);
        }
    }

    Err(StegoError::MalformedPng("missing IEND chunk"))
}

/// CRC-32 with the PNG polynomial, over `type || data`.
fn crc32(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in chunk_type.iter().chain(data) {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

fn encode_chunk(desc: &EnvelopeDescriptor) -> Vec<u8> {
    let mut data = Vec::with_capacity(FIXED_LEN + desc.meta.len());
    data.extend_from_slice(&ENVELOPE_TAG);
    data.push(ENVELOPE_VERSION);
    data.extend_from_slice(&desc.anchor.0.to_be_bytes());
    data.extend_from_slice(&desc.anchor.1.to_be_bytes());
    data.extend_from_slice(&desc.payload_bits.to_be_bytes());
    data.extend_from_slice(&desc.carrier_sha);
    data.extend_from_slice(&(desc.meta.len() as u32).to_be_bytes());
    data.extend_from_slice(&desc.meta);

    let mut chunk = Vec::with_capacity(12 + data.len());
    chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
    chunk.extend_from_slice(&CHUNK_TYPE);
    chunk.extend_from_slice(&data);
    chunk.extend_from_slice(&crc32(&CHUNK_TYPE, &data).to_be_bytes());
    chunk
}

fn decode_chunk(data: &[u8]) -> Result<EnvelopeDescriptor> {
    if data.len() < FIXED_LEN {
        return Err(StegoError::EnvelopeCorrupt);
    }
    if data[0..4] != ENVELOPE_TAG || data[4] != ENVELOPE_VERSION {
        return Err(StegoError::UnknownEnvelope);
    }

    let anchor_x = u16::from_be_bytes(data[5..7].try_into().unwrap());
    let anchor_y = u16::from_be_bytes(data[7..9].try_into().unwrap());
    let payload_bits = u32::from_be_bytes(data[9..13].try_into().unwrap());
    let mut carrier_sha = [0u8; 32];
    carrier_sha.copy_from_slice(&data[13..45]);
    let meta_len = u32::from_be_bytes(data[45..49].try_into().unwrap()) as usize;

    if data.len() != FIXED_LEN + meta_len {
        return Err(StegoError::EnvelopeCorrupt);
    }

    Ok(EnvelopeDescriptor {
        anchor: (anchor_x, anchor_y),
        payload_bits,
        carrier_sha,
        meta: data[FIXED_LEN..].to_vec(),
    })
}

/// Insert the envelope as the last chunk before `IEND`.
///
/// Any pre-existing `zkPF` chunks are dropped, so a rewritten carrier
/// always holds exactly one envelope.
///
/// # Errors
///
/// `MalformedPng` if the input is not a structurally sound PNG ending in
/// `IEND`.
pub fn write_envelope(png: &[u8], desc: &EnvelopeDescriptor) -> Result<Vec<u8>> {
    let chunks = parse_chunks(png)?;

    let mut out = Vec::with_capacity(png.len() + FIXED_LEN + desc.meta.len() + 12);
    out.extend_from_slice(&PNG_SIGNATURE);
    for chunk in &chunks {
        if chunk.ty == CHUNK_TYPE {
            continue;
        }
        if &chunk.ty == b"IEND" {
            out.extend_from_slice(&encode_chunk(desc));
        }
        out.extend_from_slice(&png[chunk.start..chunk.end]);
    }
    Ok(out)
}

/// Read the envelope back out of a PNG.
///
/// Consumes the last `zkPF` chunk in the file. Validation order: chunk
/// CRC (`EnvelopeCorrupt`), then tag and version (`UnknownEnvelope`).
/// Geometry checks against the decoded raster happen in the extraction
/// pipeline, which has the image at hand.
///
/// # Errors
///
/// `NoEnvelope` if the PNG carries no `zkPF` chunk.
pub fn read_envelope(png: &[u8]) -> Result<EnvelopeDescriptor> {
    let chunks = parse_chunks(png)?;
    let chunk = chunks
        .iter()
        .rev()
        .find(|c| c.ty == CHUNK_TYPE)
        .ok_or(StegoError::NoEnvelope)?;

    let data = &png[chunk.data_start..chunk.data_end];
    let stored_crc = u32::from_be_bytes(png[chunk.data_end..chunk.data_end + 4].try_into().unwrap());
    if crc32(&CHUNK_TYPE, data) != stored_crc {
        return Err(StegoError::EnvelopeCorrupt);
    }

    decode_chunk(data)
}

/// Read `(width, height, bit_depth, colour_type)` out of the IHDR chunk.
pub(crate) fn ihdr_info(png: &[u8]) -> Result<(u32, u32, u8, u8)> {
    let chunks = parse_chunks(png)?;
    let ihdr = chunks
        .iter()
        .find(|c| &c.ty == b"IHDR")
        .ok_or(StegoError::MalformedPng("missing IHDR chunk"))?;
    let data = &png[ihdr.data_start..ihdr.data_end];
    if data.len() < 13 {
        return Err(StegoError::MalformedPng("short IHDR chunk"));
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
    Ok((width, height, data[8], data[9]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn minimal_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn sample_descriptor() -> EnvelopeDescriptor {
        EnvelopeDescriptor {
            anchor: (10, 20),
            payload_bits: 128,
            carrier_sha: [0xAB; 32],
            meta: b"public-inputs".to_vec(),
        }
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let png = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        let desc = read_envelope(&png).unwrap();
        assert_eq!(desc, sample_descriptor());
    }

    #[test]
    fn test_empty_meta_roundtrip() {
        let desc = EnvelopeDescriptor {
            meta: Vec::new(),
            ..sample_descriptor()
        };
        let png = write_envelope(&minimal_png(), &desc).unwrap();
        assert_eq!(read_envelope(&png).unwrap().meta, Vec::<u8>::new());
    }

    #[test]
    fn test_missing_envelope() {
        assert!(matches!(
            read_envelope(&minimal_png()),
            Err(StegoError::NoEnvelope)
        ));
    }

    #[test]
    fn test_rewrite_replaces_existing_chunk() {
        let first = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        let second_desc = EnvelopeDescriptor {
            payload_bits: 999,
            ..sample_descriptor()
        };
        let second = write_envelope(&first, &second_desc).unwrap();

        let count = second.windows(4).filter(|w| *w == b"zkPF").count();
        assert_eq!(count, 1, "stale envelope chunk left behind");
        assert_eq!(read_envelope(&second).unwrap().payload_bits, 999);
    }

    #[test]
    fn test_chunk_sits_before_iend() {
        let png = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        let zk = png.windows(4).position(|w| w == b"zkPF").unwrap();
        let iend = png.windows(4).position(|w| w == b"IEND").unwrap();
        assert!(zk < iend);
        // Nothing but the CRC separates the envelope data from IEND's length field.
        let chunk_data_len = u32::from_be_bytes(png[zk - 4..zk].try_into().unwrap()) as usize;
        assert_eq!(zk + 4 + chunk_data_len + 4, iend - 4);
    }

    #[test]
    fn test_crc_tamper_detected() {
        let mut png = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        let zk = png.windows(4).position(|w| w == b"zkPF").unwrap();
        png[zk + 8] ^= 0x01; // flip a bit inside the chunk data
        assert!(matches!(read_envelope(&png), Err(StegoError::EnvelopeCorrupt)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut png = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        let zk = png.windows(4).position(|w| w == b"zkPF").unwrap();
        let data_start = zk + 4;
        let data_len = u32::from_be_bytes(png[zk - 4..zk].try_into().unwrap()) as usize;
        png[data_start + 4] = 42; // version byte
        // Re-seal the CRC so only the version check can fire.
        let crc = crc32(&CHUNK_TYPE, &png[data_start..data_start + data_len]);
        let crc_at = data_start + data_len;
        png[crc_at..crc_at + 4].copy_from_slice(&crc.to_be_bytes());
        assert!(matches!(read_envelope(&png), Err(StegoError::UnknownEnvelope)));
    }

    #[test]
    fn test_not_a_png() {
        assert!(matches!(
            read_envelope(b"GIF89a..."),
            Err(StegoError::MalformedPng(_))
        ));
    }

    #[test]
    fn test_truncated_png() {
        let png = write_envelope(&minimal_png(), &sample_descriptor()).unwrap();
        assert!(matches!(
            read_envelope(&png[..png.len() - 6]),
            Err(StegoError::MalformedPng(_))
        ));
    }

    #[test]
    fn test_ihdr_info() {
        let (w, h, depth, colour) = ihdr_info(&minimal_png()).unwrap();
        assert_eq!((w, h), (32, 32));
        assert_eq!(depth, 8);
        assert_eq!(colour, 2);
    }
}
