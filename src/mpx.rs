//! MPX baseband mixing.
//!
//! Sums the 19 kHz pilot with the DSB-SC data subcarriers into a single
//! mono float stream at the 228 kHz synthesis rate:
//!
//! ```text
//! mpx = V · ( 0.08 · pilot
//!           + 0.045 · biphase · carrier57
//!           + k_rds2 · Σ streamᵢ · carrierᵢ )
//! ```
//!
//! The master volume `V` is a percentage read from a shared atomic on
//! every sample, so the control channel can adjust it without touching the
//! generator thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::osc::CarrierBank;

/// Pilot injection level (fraction of full scale).
pub const PILOT_LEVEL: f32 = 0.08;

/// RDS subcarrier injection level.
pub const RDS_LEVEL: f32 = 0.045;

/// Pilot + RDS + RDS2 mixer with master volume.
pub struct MpxMixer {
    carriers: CarrierBank,
    volume: Arc<AtomicU8>,
    rds2_level: f32,
}

impl MpxMixer {
    /// RDS2 subcarriers default to the same injection as RDS (+0 dB).
    pub fn new(volume: Arc<AtomicU8>) -> Self {
        Self {
            carriers: CarrierBank::new(),
            volume,
            rds2_level: RDS_LEVEL,
        }
    }

    /// Adjust the RDS2 injection relative to RDS, in dB.
    pub fn set_rds2_gain_db(&mut self, db: f32) {
        self.rds2_level = RDS_LEVEL * 10f32.powf(db / 20.0);
    }

    /// Mix one sample. `rds` is the shaped main-stream sample, `rds2` the
    /// three RDS2 stream samples (zero when a stream is silent).
    pub fn next_sample(&mut self, rds: f32, rds2: [f32; 3]) -> f32 {
        let v = self.volume.load(Ordering::Relaxed).min(100) as f32 / 100.0;

        let mut s = PILOT_LEVEL * self.carriers.pilot();
        s += RDS_LEVEL * rds * self.carriers.rds();
        for (k, &stream) in rds2.iter().enumerate() {
            s += self.rds2_level * stream * self.carriers.rds2(k);
        }
        self.carriers.advance();

        (v * s).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::MPX_SAMPLE_RATE;
    use std::f64::consts::PI;

    fn volume(percent: u8) -> Arc<AtomicU8> {
        Arc::new(AtomicU8::new(percent))
    }

    /// Single-bin DFT magnitude (normalized).
    fn tone_level(wave: &[f32], freq: f64) -> f64 {
        let fs = MPX_SAMPLE_RATE as f64;
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for (i, &s) in wave.iter().enumerate() {
            let w = 2.0 * PI * freq * i as f64 / fs;
            re += s as f64 * w.cos();
            im += s as f64 * w.sin();
        }
        2.0 * (re * re + im * im).sqrt() / wave.len() as f64
    }

    #[test]
    fn test_pilot_level_without_data() {
        let mut mixer = MpxMixer::new(volume(100));
        let wave: Vec<f32> = (0..MPX_SAMPLE_RATE as usize / 4)
            .map(|_| mixer.next_sample(0.0, [0.0; 3]))
            .collect();
        let pilot = tone_level(&wave, 19_000.0);
        assert!(
            (pilot - PILOT_LEVEL as f64).abs() < 1e-3,
            "pilot must sit at 8 percent, got {}",
            pilot
        );
        assert!(tone_level(&wave, 57_000.0) < 1e-4, "no RDS energy without data");
    }

    #[test]
    fn test_rds_carrier_appears_with_data() {
        let mut mixer = MpxMixer::new(volume(100));
        // Constant +1 biphase input turns the 57 kHz carrier fully on
        let wave: Vec<f32> = (0..48 * 1000)
            .map(|_| mixer.next_sample(1.0, [0.0; 3]))
            .collect();
        let rds = tone_level(&wave, 57_000.0);
        assert!(
            (rds - RDS_LEVEL as f64).abs() < 1e-3,
            "57 kHz level should be 4.5 percent, got {}",
            rds
        );
    }

    #[test]
    fn test_rds2_subcarrier_frequencies() {
        let mut mixer = MpxMixer::new(volume(100));
        let wave: Vec<f32> = (0..48 * 1000)
            .map(|_| mixer.next_sample(0.0, [1.0, 1.0, 1.0]))
            .collect();
        for freq in [66_500.0, 71_250.0, 76_000.0] {
            let level = tone_level(&wave, freq);
            assert!(
                (level - RDS_LEVEL as f64).abs() < 1e-3,
                "{} Hz should carry default injection, got {}",
                freq,
                level
            );
        }
    }

    #[test]
    fn test_volume_scales_output() {
        let vol = volume(100);
        let mut mixer = MpxMixer::new(vol.clone());
        let full: Vec<f32> = (0..4800).map(|_| mixer.next_sample(0.0, [0.0; 3])).collect();

        vol.store(50, Ordering::Relaxed);
        let mut mixer2 = MpxMixer::new(vol.clone());
        let half: Vec<f32> = (0..4800).map(|_| mixer2.next_sample(0.0, [0.0; 3])).collect();

        for (f, h) in full.iter().zip(&half) {
            assert!((f * 0.5 - h).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rds2_gain_adjustment() {
        let mut mixer = MpxMixer::new(volume(100));
        mixer.set_rds2_gain_db(-6.0);
        let wave: Vec<f32> = (0..48 * 1000)
            .map(|_| mixer.next_sample(0.0, [1.0, 0.0, 0.0]))
            .collect();
        let level = tone_level(&wave, 66_500.0);
        let expected = RDS_LEVEL as f64 * 10f64.powf(-6.0 / 20.0);
        assert!((level - expected).abs() < 1e-3, "-6 dB injection, got {}", level);
    }

    #[test]
    fn test_output_stays_in_range() {
        let mut mixer = MpxMixer::new(volume(100));
        for i in 0..10_000 {
            let s = mixer.next_sample(if i % 2 == 0 { 1.0 } else { -1.0 }, [1.0, -1.0, 1.0]);
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
