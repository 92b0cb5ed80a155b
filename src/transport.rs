//! Control-channel transports.
//!
//! Two one-way transports feed the command parser: a POSIX FIFO opened
//! non-blocking and polled with a short timeout, and a localhost TCP
//! listener. Both run on the control thread, apply complete payloads in
//! order, and exit within one poll interval of the stop flag being set.
//!
//! Transport errors are transient by design: a FIFO writer closing (EOF)
//! re-arms the reader for the next client, a TCP client disconnecting
//! returns the listener to accept. Neither ever stops the generator
//! (unless the FIFO runs without `wait`, where a client hangup is the
//! shutdown request).

use std::io::{BufRead, BufReader, ErrorKind};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::control::CommandProcessor;
use crate::error::{Error, Result};

/// Per-poll timeout on the control channel.
const READ_TIMEOUT_MS: i32 = 50;
const CTL_BUFFER_SIZE: usize = 4096;

/// One observation of the pipe state.
#[derive(Debug, PartialEq, Eq)]
pub enum PipeEvent {
    /// Nothing to read this poll interval.
    Idle,
    /// A payload arrived (possibly several lines).
    Payload(String),
    /// No writer is attached (never connected, or the client hung up).
    Hangup,
}

/// Non-blocking reader side of a control FIFO.
///
/// FIFO end-of-file is not sticky: when a later client opens the writing
/// end, the same descriptor delivers its data, so `Hangup` is a state to
/// wait out, not an error.
pub struct ControlPipe {
    fd: libc::c_int,
}

impl ControlPipe {
    /// Open the FIFO for reading without blocking on a writer.
    pub fn open(path: &Path) -> Result<Self> {
        let cpath = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|_| Error::command(format!("bad FIFO path {:?}", path)))?;
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(Self { fd })
    }

    /// Poll for a payload with a short timeout.
    pub fn poll_event(&mut self) -> Result<PipeEvent> {
        let mut poller = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut poller, 1, READ_TIMEOUT_MS) };
        if ready < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if ready == 0 {
            return Ok(PipeEvent::Idle);
        }

        let mut buf = [0u8; CTL_BUFFER_SIZE];
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        match n {
            n if n > 0 => Ok(PipeEvent::Payload(
                String::from_utf8_lossy(&buf[..n as usize]).into_owned(),
            )),
            0 => Ok(PipeEvent::Hangup),
            _ => {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::WouldBlock {
                    Ok(PipeEvent::Idle)
                } else {
                    Err(err.into())
                }
            }
        }
    }
}

impl Drop for ControlPipe {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Run the FIFO control loop until the stop flag is set.
///
/// With `wait` the pipe re-awaits a new client after EOF (the default);
/// without it, a hangup from a client that actually sent something
/// requests shutdown.
pub fn run_fifo(
    path: &Path,
    processor: CommandProcessor,
    stop: Arc<AtomicBool>,
    wait: bool,
) -> Result<()> {
    let mut pipe = ControlPipe::open(path)?;
    info!("control pipe open on {:?}", path);

    let mut had_client = false;
    while !stop.load(Ordering::Acquire) {
        match pipe.poll_event()? {
            PipeEvent::Payload(payload) => {
                had_client = true;
                processor.apply_payload(&payload);
            }
            PipeEvent::Idle => {}
            PipeEvent::Hangup => {
                if !wait && had_client {
                    info!("control client left, shutting down (--wait 0)");
                    stop.store(true, Ordering::Release);
                    break;
                }
                had_client = false;
                // poll() reports hangup immediately; pace the wait for the
                // next client instead of spinning
                std::thread::sleep(Duration::from_millis(READ_TIMEOUT_MS as u64));
            }
        }
    }
    Ok(())
}

/// Run the TCP control loop on localhost until the stop flag is set.
/// Serves one client at a time; each connection speaks the same
/// line-oriented grammar as the FIFO.
pub fn run_tcp(port: u16, processor: CommandProcessor, stop: Arc<AtomicBool>) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    listener.set_nonblocking(true)?;
    info!("control listener on 127.0.0.1:{}", port);

    while !stop.load(Ordering::Acquire) {
        let stream = match listener.accept() {
            Ok((stream, peer)) => {
                debug!("control client {} connected", peer);
                stream
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(READ_TIMEOUT_MS as u64));
                continue;
            }
            Err(e) => {
                warn!("control accept failed: {}", e);
                continue;
            }
        };

        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS as u64)))?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        while !stop.load(Ordering::Acquire) {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    debug!("control client disconnected");
                    break;
                }
                Ok(_) => processor.apply_payload(&line),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    debug!("control read failed: {}", e);
                    break;
                }
            }
        }
    }
    Ok(())
}
