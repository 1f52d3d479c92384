//! Error types for the steganographic codec.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StegoError>;

#[derive(Error, Debug)]
pub enum StegoError {
    /// The embedding key is empty.
    #[error("key must not be empty")]
    KeyTooShort,

    /// The carrier PNG is not 8-bit truecolour (with or without alpha),
    /// or its dimensions fall outside the supported range.
    #[error("carrier must be an 8-bit truecolour PNG between 32x32 and 65535x65535")]
    UnsupportedFormat,

    /// The payload does not fit the carrier.
    #[error("payload needs {needed} bits but the carrier holds {available}")]
    CapacityExceeded { needed: u64, available: u64 },

    /// The position generator failed to find a fresh slot within the
    /// retry bound. Only reachable for near-saturated carriers.
    #[error("position generator stalled after {0} consecutive collisions")]
    CapacityExhausted(usize),

    /// The byte stream is not a parseable PNG.
    #[error("malformed PNG: {0}")]
    MalformedPng(&'static str),

    /// The envelope chunk failed its CRC or is structurally truncated.
    #[error("envelope chunk is corrupt")]
    EnvelopeCorrupt,

    /// The envelope tag or version is not one this codec produces.
    #[error("unrecognised envelope tag or version")]
    UnknownEnvelope,

    /// Envelope fields are out of range relative to the carrier geometry.
    #[error("envelope is inconsistent with the carrier image")]
    EnvelopeInconsistent,

    /// The normalized carrier hash does not match the envelope. The image
    /// was modified after embedding, or the key is wrong.
    #[error("carrier hash does not match the envelope")]
    CarrierMismatch,

    /// No `zkPF` chunk is present in the PNG.
    #[error("no envelope chunk present")]
    NoEnvelope,

    /// Position and bit counts disagree. Bug guard, not a user error.
    #[error("position count {positions} does not match bit count {bits}")]
    LengthMismatch { positions: usize, bits: usize },

    /// Pixel decoding failed below the chunk layer.
    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),
}
