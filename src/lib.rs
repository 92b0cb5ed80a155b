#![doc = include_str!("../readme.md")]

pub mod control;
pub mod error;
pub mod generator;
pub mod mpx;
pub mod osc;
pub mod pack;
pub mod rds;
pub mod resampler;
pub mod transport;
pub mod waveform;

pub use error::{Error, Result};
pub use generator::{Generator, MpxSink};
pub use rds::params::{ProgramInfo, SharedParams};
