//! Embedding-quality metrics.

use image::RgbImage;

/// Peak signal-to-noise ratio between a cover raster and its stego
/// counterpart, in decibels.
///
/// LSB-only embedding bounds the per-channel error at 1, so values stay
/// high; a full-capacity embed on a 64x64 carrier still lands above
/// 50 dB. Returns `f64::INFINITY` for identical rasters.
pub fn psnr(original: &RgbImage, modified: &RgbImage) -> f64 {
    let mut mse = 0.0;
    let mut count = 0u64;

    for (p1, p2) in original.pixels().zip(modified.pixels()) {
        for c in 0..3 {
            let diff = p1[c] as f64 - p2[c] as f64;
            mse += diff * diff;
            count += 1;
        }
    }

    mse /= count as f64;
    if mse == 0.0 {
        return f64::INFINITY;
    }

    20.0 * (255.0 / mse.sqrt()).log10()
}
