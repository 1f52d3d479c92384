//! # zkstego
//!
//! A deterministic, keyed, chaos-driven LSB steganography codec for
//! hiding opaque payloads (typically zero-knowledge proof artifacts)
//! inside PNG images, and recovering them bit-exactly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use zkstego::ZkStego;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cover = std::fs::read("cover.png")?;
//!
//! let stego = ZkStego::new(b"correct horse battery staple")?;
//!
//! // Hide the proof; the descriptor mirrors the on-image envelope chunk
//! let (stego_png, descriptor) = stego.embed(&cover, b"proof artifact bytes")?;
//! std::fs::write("stego.png", &stego_png)?;
//! println!("anchored at {:?}", descriptor.anchor);
//!
//! // Recover it (self-contained: only the image and the key are needed)
//! let (payload, _) = stego.extract(&stego_png)?;
//! assert_eq!(payload, b"proof artifact bytes");
//! # Ok(())
//! # }
//! ```
//!
//! ## How it works
//!
//! - **Position generation**: an Arnold cat map mixes coordinates on the
//!   image torus while a logistic map perturbs them, giving a keyed,
//!   collision-free sequence of `(x, y, channel)` slots.
//! - **Key derivation**: SHA-256 over the key and the anchor coordinate
//!   seeds both maps and the channel counter.
//! - **Anchoring**: when no anchor is supplied, the highest-gradient
//!   window of the carrier picks one deterministically.
//! - **Envelope**: a `zkPF` ancillary chunk before `IEND` carries the
//!   anchor, the payload length and a hash binding it to the carrier.
//!
//! ## Modules
//!
//! - `keys`: key-to-parameter derivation
//! - `chaos`: chaotic maps and the position generator
//! - `texture`: gradient-based anchor selection
//! - `codec`: LSB bit mutation and bit/byte packing
//! - `envelope`: the `zkPF` PNG chunk
//! - `stego`: the embed/extract engine
//! - `metrics`: embedding-quality measurement

pub mod chaos;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod stego;
pub mod texture;

pub use chaos::{LogisticMap, Position, PositionGenerator};
pub use envelope::{read_envelope, write_envelope, EnvelopeDescriptor};
pub use error::{Result, StegoError};
pub use keys::{derive_params, ChaosParams};
pub use stego::ZkStego;
pub use texture::extract_anchor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum payload size for an image, in bits.
///
/// Three LSB slots per pixel, minus a 64-byte reservation for the
/// envelope chunk. Saturates at `u32::MAX` for carriers larger than the
/// envelope's length field can describe.
pub fn capacity_bits(image: &image::RgbImage) -> u32 {
    stego::capacity_for(image.width(), image.height()).min(u32::MAX as u64) as u32
}
