//! Synthetic instrument recordings with known mass events.
//!
//! Used by the `generate_sample` binary and by the tests: a flat baseline
//! with Gaussian frequency dips, optional white noise, written in the raw
//! instrument layout (little-endian f64, no header).

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::data::loader::STARTUP_SAMPLES;
use crate::error::{Error, Result};

/// A downward frequency excursion caused by one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dip {
    /// Sample index of the minimum, counted after the startup samples.
    pub center: f64,
    /// Gaussian standard deviation in samples.
    pub sigma: f64,
    /// Frequency drop at the minimum (positive).
    pub depth: f64,
}

impl Dip {
    /// Frequency drop at sample position `x`.
    pub fn drop_at(&self, x: f64) -> f64 {
        let z = (x - self.center) / self.sigma;
        self.depth * (-0.5 * z * z).exp()
    }
}

/// Shape of one synthetic recording.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSpec {
    /// Total number of samples stored in the file, startup samples included.
    pub samples: usize,
    pub baseline: f64,
    pub dips: Vec<Dip>,
    /// Standard deviation of the added white noise. Zero for a clean signal.
    pub noise: f64,
}

impl WaveformSpec {
    pub fn clean(samples: usize, baseline: f64, dips: Vec<Dip>) -> Self {
        Self {
            samples,
            baseline,
            dips,
            noise: 0.0,
        }
    }

    /// Render all stored samples; dip centres are offset past the startup block.
    pub fn render(&self, rng: &mut NoiseRng) -> Vec<f64> {
        (0..self.samples)
            .map(|i| {
                let x = i as f64 - STARTUP_SAMPLES as f64;
                let drop: f64 = self.dips.iter().map(|d| d.drop_at(x)).sum();
                let noise = if self.noise > 0.0 { rng.normal(self.noise) } else { 0.0 };
                self.baseline - drop + noise
            })
            .collect()
    }
}

/// Encode samples in the raw instrument layout.
pub fn encode_raw(samples: &[f64]) -> Vec<u8> {
    let mut bytes = vec![0u8; samples.len() * 8];
    LittleEndian::write_f64_into(samples, &mut bytes);
    bytes
}

pub fn write_raw_file(path: &Path, samples: &[f64]) -> Result<()> {
    std::fs::write(path, encode_raw(samples)).map_err(|e| Error::io(path, e))
}

/// Seeded noise source for reproducible recordings (SplitMix64).
#[derive(Debug, Clone)]
pub struct NoiseRng {
    state: u64,
}

impl NoiseRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_bits(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        (self.next_bits() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in `[low, high)`.
    pub fn between(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }

    /// Zero-mean normal deviate (Marsaglia polar method).
    pub fn normal(&mut self, std_dev: f64) -> f64 {
        loop {
            let u = 2.0 * self.uniform() - 1.0;
            let v = 2.0 * self.uniform() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                return std_dev * u * (-2.0 * s.ln() / s).sqrt();
            }
        }
    }

    /// A dip at `center` with width and depth drawn from the given ranges.
    pub fn dip(&mut self, center: f64, sigma: (f64, f64), depth: (f64, f64)) -> Dip {
        Dip {
            center,
            sigma: self.between(sigma.0, sigma.1),
            depth: self.between(depth.0, depth.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dip_lands_after_startup_block() {
        let spec = WaveformSpec::clean(
            100,
            5.0,
            vec![Dip {
                center: 40.0,
                sigma: 3.0,
                depth: 2.0,
            }],
        );
        let samples = spec.render(&mut NoiseRng::new(1));
        assert_eq!(samples.len(), 100);
        assert!((samples[STARTUP_SAMPLES + 40] - 3.0).abs() < 1e-12);
        assert!((samples[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_recording() {
        let spec = WaveformSpec {
            samples: 200,
            baseline: 10.0,
            dips: Vec::new(),
            noise: 0.1,
        };
        let a = spec.render(&mut NoiseRng::new(42));
        assert_eq!(a, spec.render(&mut NoiseRng::new(42)));
        assert_ne!(a, spec.render(&mut NoiseRng::new(43)));
    }

    #[test]
    fn sampled_dips_stay_in_range() {
        let mut rng = NoiseRng::new(5);
        for _ in 0..100 {
            let dip = rng.dip(50.0, (4.0, 12.0), (0.2, 1.2));
            assert_eq!(dip.center, 50.0);
            assert!((4.0..12.0).contains(&dip.sigma));
            assert!((0.2..1.2).contains(&dip.depth));
            assert!(rng.normal(1.0).is_finite());
        }
    }
}
