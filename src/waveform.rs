//! Biphase symbol shaping.
//!
//! RDS data leaves the sequencer as a 1187.5 bit/s stream. Each bit is
//! differentially encoded and shaped into a biphase symbol with the
//! spectrum-shaping filter of IEC 62106 §5: the 100 % cosine-rolloff
//! spectrum `H(f) = cos(π f T / 4)`, whose time-domain pulse is
//!
//! ```text
//! g(t) ∝ cos(4πt/T) / ((π/2)² − (4πt/T)²)
//! ```
//!
//! and the transmitted symbol is the odd pair `g(t + T/4) − g(t − T/4)`.
//! The pulse table spans three symbol periods and is computed once,
//! shared by every shaper instance (main RDS stream plus the three RDS2
//! streams).

use std::sync::OnceLock;

use crate::osc::MPX_SAMPLE_RATE;

/// RDS bit rate: 1187.5 bit/s (57 kHz / 48).
pub const BIT_RATE: f64 = 1187.5;

/// Samples per data bit at the synthesis rate (exactly 192 at 228 kHz).
pub const SAMPLES_PER_BIT: f64 = MPX_SAMPLE_RATE as f64 / BIT_RATE;

/// Pulse support: three symbol periods.
pub const PULSE_LEN: usize = (3.0 * SAMPLES_PER_BIT) as usize;

/// Time-domain spectrum-shaping pulse, `tau` in symbol periods.
fn g(tau: f64) -> f64 {
    let a = 4.0 * std::f64::consts::PI * tau;
    let half_pi = std::f64::consts::FRAC_PI_2;
    let denom = half_pi * half_pi - a * a;
    if denom.abs() < 1e-9 {
        // Removable singularity at |tau| = 1/8
        a.sin() / (2.0 * a)
    } else {
        a.cos() / denom
    }
}

/// The shared biphase symbol table, normalized to unit peak.
pub fn shaping_pulse() -> &'static [f32] {
    static PULSE: OnceLock<Vec<f32>> = OnceLock::new();
    PULSE.get_or_init(|| {
        let mut pulse: Vec<f64> = (0..PULSE_LEN)
            .map(|i| {
                let tau = (i as f64 - PULSE_LEN as f64 / 2.0) / SAMPLES_PER_BIT;
                g(tau + 0.25) - g(tau - 0.25)
            })
            .collect();
        let peak = pulse.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
        for v in &mut pulse {
            *v /= peak;
        }
        pulse.iter().map(|&v| v as f32).collect()
    })
}

/// Differential biphase shaper.
///
/// Feed bits with [`push_bit`](Self::push_bit) whenever
/// [`needs_bit`](Self::needs_bit) reports the current bit is exhausted,
/// and pull one output sample per call to
/// [`next_sample`](Self::next_sample). Overlapping symbol tails are summed
/// in a ring accumulator; the fractional sample budget guarantees exactly
/// `SAMPLES_PER_BIT` samples per bit with no long-term slip.
pub struct BiphaseShaper {
    ring: Vec<f32>,
    pos: usize,
    level: bool,
    budget: f64,
}

impl BiphaseShaper {
    pub fn new() -> Self {
        Self {
            ring: vec![0.0; PULSE_LEN],
            pos: 0,
            level: false,
            budget: 0.0,
        }
    }

    /// True when the shaper has exhausted the current bit's samples.
    pub fn needs_bit(&self) -> bool {
        self.budget < 1.0
    }

    /// Differentially encode one data bit and add its shaped symbol into
    /// the accumulator.
    pub fn push_bit(&mut self, bit: u8) {
        self.level ^= bit != 0;
        let sign = if self.level { 1.0f32 } else { -1.0 };
        let pulse = shaping_pulse();
        for (k, &p) in pulse.iter().enumerate() {
            let idx = (self.pos + k) % PULSE_LEN;
            self.ring[idx] += sign * p;
        }
        self.budget += SAMPLES_PER_BIT;
    }

    /// Produce the next 228 kHz sample of the shaped bitstream.
    pub fn next_sample(&mut self) -> f32 {
        let s = self.ring[self.pos];
        self.ring[self.pos] = 0.0;
        self.pos = (self.pos + 1) % PULSE_LEN;
        self.budget -= 1.0;
        s
    }
}

impl Default for BiphaseShaper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_samples_per_bit() {
        assert_eq!(SAMPLES_PER_BIT, 192.0, "228000 / 1187.5 is exact");
        assert_eq!(PULSE_LEN, 576);

        let mut shaper = BiphaseShaper::new();
        let mut bits_fed = 0usize;
        let mut samples = 0usize;
        for _ in 0..192 * 1000 {
            if shaper.needs_bit() {
                shaper.push_bit(1);
                bits_fed += 1;
            }
            shaper.next_sample();
            samples += 1;
        }
        assert_eq!(samples, 192 * bits_fed, "192 samples per bit, no slip");
    }

    #[test]
    fn test_pulse_is_normalized_and_odd() {
        let pulse = shaping_pulse();
        let peak = pulse.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-6, "pulse normalized to unit peak");

        // g(t+T/4) − g(t−T/4) is an odd function of t
        let mid = PULSE_LEN / 2;
        for k in 1..mid {
            let a = pulse[mid + k];
            let b = pulse[mid - k];
            assert!(
                (a + b).abs() < 1e-3,
                "pulse must be odd-symmetric at ±{} ({} vs {})",
                k,
                a,
                b
            );
        }
    }

    #[test]
    fn test_differential_encoding_levels() {
        // A zero bit keeps the differential level; a one bit flips it.
        let mut shaper = BiphaseShaper::new();
        shaper.push_bit(1);
        assert!(shaper.level, "1 flips the initial level");
        for _ in 0..192 {
            shaper.next_sample();
        }
        shaper.push_bit(0);
        assert!(shaper.level, "0 keeps the level");
        shaper.push_bit(1);
        assert!(!shaper.level, "1 flips again");
    }

    #[test]
    fn test_output_energy_present() {
        let mut shaper = BiphaseShaper::new();
        let mut energy = 0.0f64;
        for i in 0..192 * 16 {
            if shaper.needs_bit() {
                shaper.push_bit((i % 2) as u8);
            }
            let s = shaper.next_sample();
            energy += (s as f64) * (s as f64);
        }
        assert!(energy > 1.0, "alternating bits must produce signal energy");
    }

    #[test]
    fn test_spectrum_nulls_beyond_two_bit_rates() {
        // The shaping spectrum is zero above 2/T = 2375 Hz: correlate a
        // long alternating-bit waveform against a 4 kHz tone and expect
        // (near) nothing relative to the in-band 1187.5 Hz component.
        let mut shaper = BiphaseShaper::new();
        let n = 192 * 512;
        let mut wave = Vec::with_capacity(n);
        for _ in 0..n {
            if shaper.needs_bit() {
                shaper.push_bit(1);
            }
            wave.push(shaper.next_sample() as f64);
        }
        let fs = MPX_SAMPLE_RATE as f64;
        let power_at = |f: f64| -> f64 {
            let (mut re, mut im) = (0.0, 0.0);
            for (i, &s) in wave.iter().enumerate() {
                let w = 2.0 * std::f64::consts::PI * f * i as f64 / fs;
                re += s * w.cos();
                im += s * w.sin();
            }
            (re * re + im * im).sqrt() / n as f64
        };
        let in_band = power_at(BIT_RATE / 2.0) + power_at(BIT_RATE);
        let out_of_band = power_at(4_000.0);
        assert!(
            out_of_band < in_band * 0.01,
            "4 kHz leakage {} must be far below in-band {}",
            out_of_band,
            in_band
        );
    }
}
