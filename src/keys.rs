//! Key-to-parameter derivation.
//!
//! The key string and the anchor coordinate are collapsed into a single
//! SHA-256 digest, and the chaos-map parameters are read out of fixed
//! digest fields. The maps therefore inherit the uniformity of the hash
//! output, and no branch in the derivation depends on key material.

use sha2::{Digest, Sha256};

use crate::error::{Result, StegoError};

/// Parameter bundle driving the position generator.
///
/// All fields are functions of the key and anchor only; the payload never
/// feeds back into the derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaosParams {
    /// Logistic parameter, inside the chaotic regime `(3.57, 4.0]`.
    pub logistic_r: f64,
    /// Logistic initial condition, strictly inside `(0, 1)` and away from
    /// the fixed points `0`, `1` and `1 - 1/r`.
    pub logistic_x0: f64,
    /// Cat-map applications between emissions, in `[1, 10]`.
    pub arnold_iterations: u8,
    /// Seed for the channel counter stream.
    pub channel_seed: u128,
}

/// Derive the chaos parameters for a `(key, anchor)` pair.
///
/// Computes `SHA-256(key || x_be || y_be)` and partitions the digest:
/// bytes 0..4 select `logistic_r`, bytes 4..12 select `logistic_x0`,
/// byte 12 selects `arnold_iterations`, bytes 16..32 seed the channel
/// counter. All multibyte reads are big-endian.
///
/// # Errors
///
/// `KeyTooShort` if `key` is empty.
pub fn derive_params(key: &[u8], anchor: (u16, u16)) -> Result<ChaosParams> {
    if key.is_empty() {
        return Err(StegoError::KeyTooShort);
    }

    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(anchor.0.to_be_bytes());
    hasher.update(anchor.1.to_be_bytes());
    let hash = hasher.finalize();

    let r_word = u32::from_be_bytes(hash[0..4].try_into().expect("4-byte digest field"));
    let logistic_r = 3.57 + (r_word as f64 / 4_294_967_296.0) * 0.43;

    // Numerator is in [1, 2^53] and the denominator exceeds it, so the
    // ratio can never reach 0 or 1.
    let x0_word = u64::from_be_bytes(hash[4..12].try_into().expect("8-byte digest field"));
    const TWO_53: u64 = 1 << 53;
    let logistic_x0 = ((x0_word % TWO_53) + 1) as f64 / (TWO_53 + 2) as f64;

    let arnold_iterations = (hash[12] % 10) + 1;

    let channel_seed = u128::from_be_bytes(hash[16..32].try_into().expect("16-byte digest field"));

    Ok(ChaosParams {
        logistic_r,
        logistic_x0,
        arnold_iterations,
        channel_seed,
    })
}
