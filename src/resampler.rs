//! Fixed-ratio output resampling.
//!
//! The multiplex is synthesized at 228 kHz; sound cards want 192 kHz (or
//! another standard rate). The ratio is a fixed rational decided at startup,
//! so this is a plain stateful sinc resampler: no adaptive ratio, no drift
//! correction — the audio sink's blocking write is the only clock in the
//! system.
//!
//! # Example
//!
//! ```
//! use minirds::resampler::MpxResampler;
//!
//! let mut resampler = MpxResampler::new(192_000, 1024).unwrap();
//! let input = vec![0.0f32; 1024];
//! let output = resampler.process(&input).unwrap();
//! assert!((output.len() as f64 - 1024.0 * 192.0 / 228.0).abs() <= 2.0);
//! ```

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{Error, Result};
use crate::osc::MPX_SAMPLE_RATE;

/// Lowest output rate that still carries the 76 kHz RDS2 subcarrier.
const MIN_OUTPUT_RATE: u32 = 160_000;
const MAX_OUTPUT_RATE: u32 = 768_000;

/// Stateful 228 kHz → output-rate converter.
///
/// Accepts fixed-size input frames (the generator's iteration size) and
/// returns roughly `input · ratio` frames per call, exact over time.
pub struct MpxResampler {
    inner: Option<SincFixedIn<f32>>,
    chunk_size: usize,
    ratio: f64,
}

impl MpxResampler {
    /// Build a converter to `output_rate`; `chunk_size` is the fixed number
    /// of input frames per [`process`](Self::process) call.
    pub fn new(output_rate: u32, chunk_size: usize) -> Result<Self> {
        if !(MIN_OUTPUT_RATE..=MAX_OUTPUT_RATE).contains(&output_rate) {
            return Err(Error::resampler(format!(
                "output rate {} outside {}..{}",
                output_rate, MIN_OUTPUT_RATE, MAX_OUTPUT_RATE
            )));
        }
        let ratio = output_rate as f64 / MPX_SAMPLE_RATE as f64;
        if output_rate == MPX_SAMPLE_RATE {
            return Ok(Self {
                inner: None,
                chunk_size,
                ratio,
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)
            .map_err(|e| Error::resampler(format!("failed to create resampler: {:?}", e)))?;
        Ok(Self {
            inner: Some(inner),
            chunk_size,
            ratio,
        })
    }

    /// Nominal output/input ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Convert one input frame of exactly `chunk_size` samples, returning
    /// the produced output frames.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.chunk_size {
            return Err(Error::resampler(format!(
                "expected {} input frames, got {}",
                self.chunk_size,
                input.len()
            )));
        }
        match &mut self.inner {
            // 228 kHz output: identity
            None => Ok(input.to_vec()),
            Some(inner) => {
                let mut output = inner
                    .process(&[input], None)
                    .map_err(|e| Error::resampler(format!("{:?}", e)))?;
                Ok(output.swap_remove(0))
            }
        }
    }
}
