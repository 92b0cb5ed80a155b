//! The generator loop.
//!
//! One dedicated thread pulls the whole pipeline: group sequencer →
//! biphase shapers → carrier bank → mixer → resampler → packer → sink.
//! Its only blocking point is the sink write, whose backpressure is the
//! system's sole clock; everything upstream is non-blocking.
//!
//! Shutdown: the stop flag is checked once per iteration. A sink error is
//! logged and ends the loop cleanly without touching the control task.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mpx::MpxMixer;
use crate::pack;
use crate::rds::group::GroupSequencer;
use crate::rds::params::SharedParams;
use crate::rds::rft::RftStream;
use crate::resampler::MpxResampler;
use crate::waveform::BiphaseShaper;

/// Input frames synthesized per iteration (about 18 ms at 228 kHz).
pub const NUM_MPX_FRAMES_IN: usize = 4096;

/// Where the packed PCM goes. The write must block when the device buffer
/// is full; that blocking is the generator's pacing.
pub trait MpxSink {
    fn write_frames(&mut self, frames: &[i16]) -> io::Result<()>;
}

/// The full synthesis pipeline, one instance per generator thread.
pub struct Generator {
    params: SharedParams,
    sequencer: GroupSequencer,
    shaper: BiphaseShaper,
    rds2_shapers: [BiphaseShaper; 3],
    rds2_streams: [RftStream; 3],
    mixer: MpxMixer,
    resampler: MpxResampler,
    bits: VecDeque<u8>,
    stop: Arc<AtomicBool>,
    mpx_buf: Vec<f32>,
    pcm: Vec<i16>,
}

impl Generator {
    pub fn new(
        params: SharedParams,
        volume: Arc<AtomicU8>,
        stop: Arc<AtomicBool>,
        output_rate: u32,
    ) -> Result<Self> {
        let resampler = MpxResampler::new(output_rate, NUM_MPX_FRAMES_IN)?;
        Ok(Self {
            sequencer: GroupSequencer::new(params.clone()),
            params,
            shaper: BiphaseShaper::new(),
            rds2_shapers: [
                BiphaseShaper::new(),
                BiphaseShaper::new(),
                BiphaseShaper::new(),
            ],
            rds2_streams: [RftStream::new(0), RftStream::new(1), RftStream::new(2)],
            mixer: MpxMixer::new(volume),
            resampler,
            bits: VecDeque::with_capacity(104),
            stop,
            mpx_buf: vec![0.0; NUM_MPX_FRAMES_IN],
            pcm: Vec::new(),
        })
    }

    /// Next bit of the main RDS stream, refilling from the sequencer at
    /// group boundaries.
    fn next_rds_bit(&mut self) -> u8 {
        if self.bits.is_empty() {
            self.bits.extend(self.sequencer.next_group().to_bits());
        }
        self.bits.pop_front().unwrap_or(0)
    }

    /// Synthesize one iteration's worth of multiplex samples.
    fn fill_mpx(&mut self) {
        // Adopt the current RFT image once per iteration; a swap is
        // observed at the next frame boundary
        let snapshot = self.params.get_params();
        for stream in &mut self.rds2_streams {
            stream.sync(snapshot.rft(), snapshot.rft_generation());
        }

        for i in 0..NUM_MPX_FRAMES_IN {
            if self.shaper.needs_bit() {
                let bit = self.next_rds_bit();
                self.shaper.push_bit(bit);
            }
            let rds = self.shaper.next_sample();

            let mut rds2 = [0.0f32; 3];
            for k in 0..3 {
                if self.rds2_shapers[k].needs_bit() {
                    let bit = self.rds2_streams[k].next_bit();
                    self.rds2_shapers[k].push_bit(bit);
                }
                let s = self.rds2_shapers[k].next_sample();
                if self.rds2_streams[k].is_active() {
                    rds2[k] = s;
                }
            }

            self.mpx_buf[i] = self.mixer.next_sample(rds, rds2);
        }
    }

    /// Run until the stop flag is set or the sink fails.
    pub fn run(&mut self, sink: &mut dyn MpxSink) -> Result<()> {
        info!(
            "generator running: {} Hz internal, ratio {:.6}",
            crate::osc::MPX_SAMPLE_RATE,
            self.resampler.ratio()
        );
        let mut iterations = 0u64;

        while !self.stop.load(Ordering::Acquire) {
            self.fill_mpx();
            let out = self.resampler.process(&self.mpx_buf)?;
            if out.is_empty() {
                continue;
            }
            pack::pack_stereo(&out, &mut self.pcm);
            if let Err(e) = sink.write_frames(&self.pcm) {
                warn!("sink write failed after {} iterations: {}", iterations, e);
                break;
            }
            iterations += 1;
        }

        debug!("generator stopped after {} iterations", iterations);
        Ok(())
    }
}

/// Convenience used by `main`: run a [`Generator`] on its own thread.
pub fn spawn(
    mut generator: Generator,
    mut sink: Box<dyn MpxSink + Send>,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<Result<()>> {
    std::thread::Builder::new()
        .name("mpx-generator".into())
        .spawn(move || {
            let result = generator.run(sink.as_mut());
            // Whatever ended the loop, make sure the control task follows
            stop.store(true, Ordering::Release);
            result
        })
        .expect("failed to spawn the generator thread")
}
