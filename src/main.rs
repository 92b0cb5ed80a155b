//! Software RDS encoder: real-time MPX baseband with RDS/RDS2 subcarriers.
//!
//! Wires the pieces together: CLI flags seed the program-information store,
//! the generator gets a dedicated thread feeding the sound card, and the
//! control transports (FIFO and/or TCP) mutate the store while the signal
//! runs.
//!
//! # Usage Examples
//!
//! ```bash
//! # Defaults, just a carrier with RDS
//! minirds
//!
//! # Station setup plus a control FIFO
//! mkfifo /tmp/rds_ctl
//! minirds --ps TESTFM --pi 1ABC --rt "Hello there" --ctl /tmp/rds_ctl
//!
//! # TCP control, station logo on the RDS2 file channel
//! minirds --port 8750 --rft logo.png
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use crossbeam::channel;
use tinyaudio::prelude::*;
use tracing::{error, info, warn};

use minirds::control::CommandProcessor;
use minirds::generator::{self, Generator, MpxSink};
use minirds::rds::params::{ProgramInfo, SharedParams};
use minirds::transport;
use minirds::{Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Software RDS encoder (FM multiplex baseband generator)", long_about = None)]
struct Args {
    /// Programme Service name (up to 8 characters)
    #[arg(long, default_value = "MiniRDS")]
    ps: String,

    /// RadioText (up to 64 characters)
    #[arg(long, default_value = "MiniRDS: Software RDS encoder")]
    rt: String,

    /// Programme Identification code, hex
    #[arg(long, default_value = "1000")]
    pi: String,

    /// Programme Type (0..31)
    #[arg(long, default_value_t = 0)]
    pty: u8,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 192_000)]
    mpx: u32,

    /// FIFO client policy: 1 re-awaits a client after EOF, 0 stops the
    /// encoder when a client hangs up
    #[arg(long, default_value_t = 1)]
    wait: u8,

    /// Control FIFO path (one-way, line-oriented ASCII commands)
    #[arg(long)]
    ctl: Option<PathBuf>,

    /// TCP control port on localhost (same command grammar)
    #[arg(long)]
    port: Option<u16>,

    /// Station logo image for the RDS2 file-transfer channel
    #[arg(long)]
    rft: Option<PathBuf>,

    /// Output volume in percent (0..100)
    #[arg(long, default_value_t = 100)]
    vol: u8,

    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// How long shutdown waits for the worker threads before giving up.
const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

static SIGNALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    SIGNALLED.store(true, Ordering::Release);
}

/// Audio sink: a bounded channel into the output device callback.
/// The blocking `send` when the channel is full is the backpressure that
/// paces the whole generator.
struct AudioSink {
    tx: channel::Sender<i16>,
    _device: OutputDevice,
}

impl AudioSink {
    fn open(output_rate: u32) -> Result<Self> {
        // Half a second of stereo buffer between generator and device
        let (tx, rx) = channel::bounded::<i16>(output_rate as usize);
        let config = OutputDeviceParameters {
            channels_count: 2,
            sample_rate: output_rate as usize,
            channel_sample_count: 1024,
        };
        let device = run_output_device(config, move |data| {
            for sample in data.iter_mut() {
                *sample = rx
                    .try_recv()
                    .map(|v| v as f32 / 32768.0)
                    .unwrap_or(0.0);
            }
        })
        .map_err(|e| Error::audio(format!("cannot open output device: {}", e)))?;
        Ok(Self {
            tx,
            _device: device,
        })
    }
}

impl MpxSink for AudioSink {
    fn write_frames(&mut self, frames: &[i16]) -> io::Result<()> {
        for &sample in frames {
            self.tx
                .send(sample)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "audio device closed"))?;
        }
        Ok(())
    }
}

/// Seed the store from the CLI flags.
///
/// A malformed flag is a configuration error, not an init failure: it is
/// logged, the default value stays, and the encoder still starts.
fn initial_params(args: &Args) -> ProgramInfo {
    let mut info = ProgramInfo::default();
    match u16::from_str_radix(args.pi.trim(), 16) {
        Ok(pi) => info.set_pi(pi),
        Err(_) => warn!(
            "bad --pi {:?} (expected hex), keeping {:04X}",
            args.pi,
            info.pi()
        ),
    }
    info.set_ps(&args.ps);
    info.set_rt(&args.rt, false);
    if let Err(e) = info.set_pty(args.pty) {
        warn!("{} (keeping {})", e, info.pty());
    }
    if let Some(path) = &args.rft {
        let loaded = std::fs::read(path)
            .map_err(|e| Error::rds(format!("cannot read RFT image {:?}: {}", path, e)))
            .and_then(|bytes| info.set_rft_image(bytes));
        if let Err(e) = loaded {
            warn!("{} (starting without an image)", e);
        }
    }
    info
}

fn run(args: Args) -> Result<()> {
    let params = SharedParams::new(initial_params(&args));
    let volume = Arc::new(AtomicU8::new(args.vol.min(100)));
    let stop = Arc::new(AtomicBool::new(false));

    // RDS pipeline and resampler come up before the audio device, in the
    // order the exit codes are defined
    let generator = Generator::new(params.clone(), volume.clone(), stop.clone(), args.mpx)?;
    info!("RDS encoder initialized (PI={}, PS={:?})", args.pi, args.ps);

    let sink = AudioSink::open(args.mpx)?;
    info!("audio output open at {} Hz", args.mpx);

    let generator_handle = generator::spawn(generator, Box::new(sink), stop.clone());

    let processor = CommandProcessor::new(params, volume);
    let mut control_handles = Vec::new();
    if let Some(path) = args.ctl.clone() {
        let processor = processor.clone();
        let stop = stop.clone();
        let wait = args.wait != 0;
        control_handles.push(
            std::thread::Builder::new()
                .name("control-fifo".into())
                .spawn(move || {
                    if let Err(e) = transport::run_fifo(&path, processor, stop.clone(), wait) {
                        error!("control pipe failed: {}", e);
                        stop.store(true, Ordering::Release);
                    }
                })
                .expect("failed to spawn the FIFO control thread"),
        );
    }
    if let Some(port) = args.port {
        let processor = processor.clone();
        let stop = stop.clone();
        control_handles.push(
            std::thread::Builder::new()
                .name("control-tcp".into())
                .spawn(move || {
                    if let Err(e) = transport::run_tcp(port, processor, stop.clone()) {
                        error!("control listener failed: {}", e);
                        stop.store(true, Ordering::Release);
                    }
                })
                .expect("failed to spawn the TCP control thread"),
        );
    }

    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    // Park until a signal arrives or the generator ends on its own
    while !SIGNALLED.load(Ordering::Acquire) && !generator_handle.is_finished() {
        std::thread::sleep(Duration::from_millis(100));
    }
    if SIGNALLED.load(Ordering::Acquire) {
        info!("signal received, shutting down");
    }
    stop.store(true, Ordering::Release);

    // Bounded join: a hung thread is abandoned, resources released
    // best-effort by process exit
    let deadline = Instant::now() + JOIN_TIMEOUT;
    let result = loop {
        if generator_handle.is_finished() {
            break generator_handle.join().unwrap_or_else(|_| {
                Err(Error::audio("generator thread panicked".to_string()))
            });
        }
        if Instant::now() >= deadline {
            warn!("generator did not stop in time, abandoning it");
            break Ok(());
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    for handle in control_handles {
        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            warn!("control thread did not stop in time, abandoning it");
        }
    }

    result
}

fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
