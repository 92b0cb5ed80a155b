//! Error handling for the minirds encoder
//!
//! This module provides a unified error type for all operations in the
//! encoder, including audio-device setup, resampler construction, RDS state
//! validation and control-channel I/O.

use std::fmt;
use std::io;

/// A specialized Result type for encoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for encoder operations
#[derive(Debug)]
pub enum Error {
    /// Audio device unavailable or rejected the output format
    Audio(String),

    /// Resampler construction or processing error
    Resampler(String),

    /// RDS state or group-encoder error (bad PI, out-of-range field, ...)
    Rds(String),

    /// Malformed control command (logged, the offending line is dropped)
    Command(String),

    /// I/O error (control transport, RFT image file, ...)
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Audio(msg) => write!(f, "Audio error: {}", msg),
            Error::Resampler(msg) => write!(f, "Resampler error: {}", msg),
            Error::Rds(msg) => write!(f, "RDS error: {}", msg),
            Error::Command(msg) => write!(f, "Command error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

// From conversions for common error types

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Command(msg)
    }
}

// Helper constructors for common error scenarios

impl Error {
    /// Create an audio error with a custom message
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Error::Audio(msg.into())
    }

    /// Create a resampler error with a custom message
    pub fn resampler<S: Into<String>>(msg: S) -> Self {
        Error::Resampler(msg.into())
    }

    /// Create an RDS error with a custom message
    pub fn rds<S: Into<String>>(msg: S) -> Self {
        Error::Rds(msg.into())
    }

    /// Create a command error with a custom message
    pub fn command<S: Into<String>>(msg: S) -> Self {
        Error::Command(msg.into())
    }

    /// Process exit code for this error kind (0 is success, used by `main`).
    ///
    /// 1 = audio-init failure, 2 = resampler-init failure, 3 = RDS-init
    /// failure; anything else maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Audio(_) => 1,
            Error::Resampler(_) => 2,
            Error::Rds(_) => 3,
            _ => 1,
        }
    }
}
