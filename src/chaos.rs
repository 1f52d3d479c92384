//! Chaos-driven position generation.
//!
//! Two coupled maps drive the embedding sequence: an Arnold cat map mixes
//! the integer coordinate on the image torus, and a logistic map perturbs
//! the mixed coordinate so that short cat-map orbits cannot cycle. A
//! 128-bit counter derived from the key selects the colour channel. The
//! whole construction is deterministic for a fixed parameter bundle and
//! emits each `(x, y, channel)` slot at most once.

use std::collections::HashSet;

use crate::envelope::RESERVED_BYTES;
use crate::error::{Result, StegoError};
use crate::keys::ChaosParams;

/// A single bit slot in the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    /// Colour channel index: 0 = R, 1 = G, 2 = B.
    pub channel: u8,
}

/// Logistic Map iterator
/// x(n+1) = r * x(n) * (1 - x(n))
/// where r in (3.57, 4.0] keeps the orbit in the chaotic regime.
#[derive(Debug, Clone)]
pub struct LogisticMap {
    state: f64,
    r: f64,
}

impl LogisticMap {
    pub fn new(x0: f64, r: f64) -> Self {
        Self { state: x0, r }
    }

    /// Advance one step and return the new state, in `(0, 1)`.
    ///
    /// Plain f64 multiplication; Rust guarantees IEEE-754 semantics with
    /// no fused-multiply-add contraction, so the orbit is bit-identical
    /// across platforms.
    pub fn next(&mut self) -> f64 {
        self.state = self.r * self.state * (1.0 - self.state);
        self.state
    }
}

/// One Arnold cat map application on the `width x height` torus:
/// `(x, y) -> ((2x + y) mod width, (x + y) mod height)`.
///
/// The transformation matrix `[2 1; 1 1]` has determinant 1, so the map
/// is a bijection of the discrete torus.
fn arnold_step(x: u64, y: u64, width: u64, height: u64) -> (u64, u64) {
    ((2 * x + y) % width, (x + y) % height)
}

/// Emits an ordered, collision-free sequence of positions.
pub struct PositionGenerator {
    width: u64,
    height: u64,
    cx: u64,
    cy: u64,
    logistic: LogisticMap,
    arnold_iterations: u8,
    ctr: u128,
}

impl PositionGenerator {
    pub fn new(params: &ChaosParams, anchor: (u16, u16), width: u32, height: u32) -> Self {
        Self {
            width: width as u64,
            height: height as u64,
            cx: anchor.0 as u64 % width as u64,
            cy: anchor.1 as u64 % height as u64,
            logistic: LogisticMap::new(params.logistic_x0, params.logistic_r),
            arnold_iterations: params.arnold_iterations,
            ctr: params.channel_seed,
        }
    }

    /// Generate `n` unique positions.
    ///
    /// Each attempt advances the cat map `arnold_iterations` times, draws
    /// two logistic steps for the `(dx, dy)` perturbation and one channel
    /// from the counter. The counter advances on every attempt, collision
    /// or not, so the channel stream never desynchronizes between the
    /// embed and extract directions.
    ///
    /// The perturbed point becomes the new running coordinate, so the walk
    /// is not confined to a single cat-map orbit; and every consecutive
    /// retry applies one extra cat-map step, so a periodic joint orbit
    /// (logistic parameters can land in a periodic window of the map)
    /// cannot pin the walk. Both rules replay identically on extract.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if `n` exceeds the number of slots the carrier
    /// can dedicate to payload bits; `CapacityExhausted` if one emission
    /// fails `max(16, n)` consecutive times.
    pub fn generate(mut self, n: usize) -> Result<Vec<Position>> {
        let available = self.width * self.height * 3 - (RESERVED_BYTES as u64 * 8);
        if n as u64 > available {
            return Err(StegoError::CapacityExceeded {
                needed: n as u64,
                available,
            });
        }

        let retry_bound = n.max(16);
        let mut positions = Vec::with_capacity(n);
        let mut seen: HashSet<Position> = HashSet::with_capacity(n);

        while positions.len() < n {
            let mut retries = 0usize;
            loop {
                let pos = self.next_candidate(retries);
                if seen.insert(pos) {
                    positions.push(pos);
                    break;
                }
                retries += 1;
                if retries > retry_bound {
                    return Err(StegoError::CapacityExhausted(retries));
                }
            }
        }

        Ok(positions)
    }

    fn next_candidate(&mut self, extra_mixing: usize) -> Position {
        for _ in 0..self.arnold_iterations as usize + extra_mixing {
            let (nx, ny) = arnold_step(self.cx, self.cy, self.width, self.height);
            self.cx = nx;
            self.cy = ny;
        }

        // Two logistic advances per attempt; each maps (0,1) to [-5, 5].
        let dx = (10.0 * self.logistic.next()).floor() as i64 - 5;
        let dy = (10.0 * self.logistic.next()).floor() as i64 - 5;

        self.cx = (self.cx as i64 + dx).rem_euclid(self.width as i64) as u64;
        self.cy = (self.cy as i64 + dy).rem_euclid(self.height as i64) as u64;

        let channel = (self.ctr % 3) as u8;
        self.ctr = self.ctr.wrapping_add(1);

        Position {
            x: self.cx as u16,
            y: self.cy as u16,
            channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_params;

    fn params(key: &[u8]) -> ChaosParams {
        derive_params(key, (10, 10)).unwrap()
    }

    #[test]
    fn test_arnold_step_known_values() {
        // [2 1; 1 1] * [3; 5] mod (64, 64) = (11, 8)
        assert_eq!(arnold_step(3, 5, 64, 64), (11, 8));
        assert_eq!(
            arnold_step(63, 63, 64, 64),
            ((2 * 63 + 63) % 64, (63 + 63) % 64)
        );
    }

    #[test]
    fn test_logistic_map_stays_in_unit_interval() {
        let mut map = LogisticMap::new(0.3141, 3.99);
        for _ in 0..10_000 {
            let v = map.next();
            assert!(v > 0.0 && v < 1.0, "escaped unit interval: {}", v);
        }
    }

    #[test]
    fn test_positions_are_unique() {
        let gen = PositionGenerator::new(&params(b"k"), (10, 10), 64, 64);
        let positions = gen.generate(2048).unwrap();
        assert_eq!(positions.len(), 2048);

        let mut dedup = positions.clone();
        dedup.sort_by_key(|p| (p.y, p.x, p.channel));
        dedup.dedup();
        assert_eq!(dedup.len(), positions.len());
    }

    #[test]
    fn test_positions_in_bounds() {
        let gen = PositionGenerator::new(&params(b"k"), (10, 10), 48, 32);
        for p in gen.generate(512).unwrap() {
            assert!(p.x < 48);
            assert!(p.y < 32);
            assert!(p.channel < 3);
        }
    }

    #[test]
    fn test_determinism() {
        let a = PositionGenerator::new(&params(b"k"), (10, 10), 64, 64)
            .generate(256)
            .unwrap();
        let b = PositionGenerator::new(&params(b"k"), (10, 10), 64, 64)
            .generate(256)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_sensitivity() {
        let a = PositionGenerator::new(&params(b"k0"), (10, 10), 64, 64)
            .generate(16)
            .unwrap();
        let b = PositionGenerator::new(&params(b"k1"), (10, 10), 64, 64)
            .generate(16)
            .unwrap();
        let shared = a.iter().filter(|p| b.contains(p)).count();
        assert!(shared <= 2, "keys too correlated: {} shared positions", shared);
    }

    #[test]
    fn test_request_above_capacity_rejected() {
        let gen = PositionGenerator::new(&params(b"k"), (0, 0), 32, 32);
        // 32 * 32 * 3 - 512 = 2560 usable slots
        assert!(matches!(
            gen.generate(2561),
            Err(StegoError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_full_capacity_request_succeeds() {
        let gen = PositionGenerator::new(&params(b"k"), (0, 0), 64, 64);
        let positions = gen.generate(64 * 64 * 3 - 512).unwrap();
        assert_eq!(positions.len(), 64 * 64 * 3 - 512);
    }

    #[test]
    fn test_anchor_on_degenerate_orbit_still_terminates() {
        // (0, 0) is a fixed point of the cat map; the logistic perturbation
        // must still spread emissions over the torus.
        let positions = PositionGenerator::new(&params(b"k"), (0, 0), 64, 64)
            .generate(1024)
            .unwrap();
        let distinct_pixels: HashSet<(u16, u16)> =
            positions.iter().map(|p| (p.x, p.y)).collect();
        assert!(distinct_pixels.len() > 100);
    }
}
