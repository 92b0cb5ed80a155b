//! ASCII control command parsing.
//!
//! The control channel speaks one command per line: a case-insensitive
//! verb, then the rest of the line as argument. Blank lines and `#`
//! comments are ignored and `\r\n` endings are tolerated, so both
//! `echo`-into-a-FIFO and interactive netcat sessions work.
//!
//! Parse and validation failures are logged and drop only the offending
//! line; the rest of the payload still applies, in order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::rds::params::{RtPlusTags, SharedParams};

/// A parsed control command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pi(u16),
    Ps(String),
    Rt(String),
    Pty(u8),
    Ptyn(String),
    Tp(bool),
    Ta(bool),
    Ms(bool),
    Di(u8),
    AfAdd(f32),
    AfClear,
    Lps(String),
    Ert(String),
    RtPlusTags(RtPlusTags),
    RtPlusFlags { running: bool, toggle: bool },
    Rft(PathBuf),
    Volume(u8),
    Reset,
}

fn parse_bool(arg: &str) -> Result<bool> {
    match arg.to_ascii_uppercase().as_str() {
        "ON" | "1" | "MUSIC" | "M" => Ok(true),
        "OFF" | "0" | "SPEECH" | "S" => Ok(false),
        other => Err(Error::command(format!("bad flag value {:?}", other))),
    }
}

fn parse_u8(arg: &str, what: &str, max: u8) -> Result<u8> {
    let n: u8 = arg
        .trim()
        .parse()
        .map_err(|_| Error::command(format!("bad {} {:?}", what, arg)))?;
    if n > max {
        return Err(Error::command(format!("{} {} above {}", what, n, max)));
    }
    Ok(n)
}

/// Parse one line. `Ok(None)` means the line carried nothing (blank or a
/// comment).
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim_end_matches('\r').trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((v, a)) => (v, a.trim()),
        None => (line, ""),
    };

    let cmd = match verb.to_ascii_uppercase().as_str() {
        "PI" => {
            let pi = u16::from_str_radix(arg, 16)
                .map_err(|_| Error::command(format!("bad PI {:?}", arg)))?;
            Command::Pi(pi)
        }
        "PS" => {
            if arg.is_empty() || arg.chars().count() > 8 {
                return Err(Error::command("PS takes 1..8 characters".to_string()));
            }
            Command::Ps(arg.to_string())
        }
        "RT" => {
            if arg.chars().count() > 64 {
                return Err(Error::command("RT takes at most 64 characters".to_string()));
            }
            Command::Rt(arg.to_string())
        }
        "PTY" => Command::Pty(parse_u8(arg, "PTY", 31)?),
        "PTYN" => Command::Ptyn(arg.to_string()),
        "TP" => Command::Tp(parse_bool(arg)?),
        "TA" => Command::Ta(parse_bool(arg)?),
        "MS" => Command::Ms(parse_bool(arg)?),
        "DI" => Command::Di(parse_u8(arg, "DI", 15)?),
        "AF" => {
            let mhz: f32 = arg
                .parse()
                .map_err(|_| Error::command(format!("bad AF {:?}", arg)))?;
            Command::AfAdd(mhz)
        }
        "AFC" => Command::AfClear,
        "LPS" => Command::Lps(arg.to_string()),
        "ERT" => Command::Ert(arg.to_string()),
        "RTP" | "RTP+" => {
            let fields: Vec<u8> = arg
                .split_whitespace()
                .map(|f| f.parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| Error::command(format!("bad RTP fields {:?}", arg)))?;
            if fields.len() != 6 {
                return Err(Error::command("RTP takes 6 fields: t1 s1 l1 t2 s2 l2".to_string()));
            }
            Command::RtPlusTags(RtPlusTags {
                type1: fields[0],
                start1: fields[1],
                len1: fields[2],
                type2: fields[3],
                start2: fields[4],
                len2: fields[5],
            })
        }
        "RTPF" => {
            let mut it = arg.split_whitespace();
            let (run, toggle) = match (it.next(), it.next(), it.next()) {
                (Some(r), Some(t), None) => (parse_bool(r)?, parse_bool(t)?),
                _ => return Err(Error::command("RTPF takes 2 flags: run toggle".to_string())),
            };
            Command::RtPlusFlags {
                running: run,
                toggle,
            }
        }
        "RFT" => {
            if arg.is_empty() {
                return Err(Error::command("RFT takes an image path".to_string()));
            }
            Command::Rft(PathBuf::from(arg))
        }
        "VOL" => Command::Volume(parse_u8(arg, "VOL", 100)?),
        "RESET" => Command::Reset,
        other => return Err(Error::command(format!("unknown command {:?}", other))),
    };
    Ok(Some(cmd))
}

/// Applies parsed commands to the shared store, under the mutation
/// discipline: one writer at a time, FIFO order within a payload.
#[derive(Clone)]
pub struct CommandProcessor {
    params: SharedParams,
    volume: Arc<AtomicU8>,
}

impl CommandProcessor {
    pub fn new(params: SharedParams, volume: Arc<AtomicU8>) -> Self {
        Self { params, volume }
    }

    /// Split a transport payload into lines and apply each in textual
    /// order. Bad lines are logged and skipped.
    pub fn apply_payload(&self, payload: &str) {
        for line in payload.split('\n') {
            match parse_line(line) {
                Ok(Some(cmd)) => self.apply(cmd),
                Ok(None) => {}
                Err(e) => warn!("{} (line {:?} dropped)", e, line.trim_end()),
            }
        }
    }

    /// Apply one command. Setter-level validation failures keep the
    /// previous value.
    pub fn apply(&self, cmd: Command) {
        info!(?cmd, "control command");
        let result: Result<()> = match cmd {
            Command::Pi(pi) => {
                self.params.with(|p| p.set_pi(pi));
                Ok(())
            }
            Command::Ps(text) => {
                self.params.with(|p| p.set_ps(&text));
                Ok(())
            }
            Command::Rt(text) => {
                self.params.with(|p| p.set_rt(&text, true));
                Ok(())
            }
            Command::Pty(pty) => self.params.with(|p| p.set_pty(pty)),
            Command::Ptyn(text) => {
                self.params.with(|p| p.set_ptyn(&text));
                Ok(())
            }
            Command::Tp(v) => {
                self.params.with(|p| p.set_tp(v));
                Ok(())
            }
            Command::Ta(v) => {
                self.params.with(|p| p.set_ta(v));
                Ok(())
            }
            Command::Ms(v) => {
                self.params.with(|p| p.set_ms(v));
                Ok(())
            }
            Command::Di(v) => self.params.with(|p| p.set_di(v)),
            Command::AfAdd(mhz) => self.params.with(|p| p.add_af(mhz)),
            Command::AfClear => {
                self.params.with(|p| p.clear_af());
                Ok(())
            }
            Command::Lps(text) => {
                self.params.with(|p| p.set_lps(&text));
                Ok(())
            }
            Command::Ert(text) => {
                self.params.with(|p| p.set_ert(&text));
                Ok(())
            }
            Command::RtPlusTags(tags) => self.params.with(|p| p.set_rtplus_tags(tags)),
            Command::RtPlusFlags { running, toggle } => {
                self.params.with(|p| p.set_rtplus_flags(running, toggle));
                Ok(())
            }
            Command::Rft(path) => match std::fs::read(&path) {
                // The file is read here, in the control task; the store
                // only sees the finished Arc swap
                Ok(bytes) => self.params.with(|p| p.set_rft_image(bytes)),
                Err(e) => Err(Error::command(format!(
                    "cannot read RFT image {:?}: {}",
                    path, e
                ))),
            },
            Command::Volume(v) => {
                self.volume.store(v, Ordering::Relaxed);
                Ok(())
            }
            Command::Reset => {
                self.params.with(|p| p.reset());
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("{} (value rejected)", e);
        }
    }
}
