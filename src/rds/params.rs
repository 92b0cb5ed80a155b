//! The program-information store.
//!
//! A single [`ProgramInfo`] record holds every mutable RDS parameter: PI,
//! PS, RadioText, PTY, flags, the AF list, the RDS2 long fields and the RFT
//! image. The group sequencer reads it, the control channel mutates it.
//!
//! Mutation discipline: the store lives behind [`SharedParams`]
//! (`Arc<Mutex<ProgramInfo>>`). The control task applies setters under the
//! lock; the generator locks only long enough to clone a per-group snapshot,
//! never across the audio write. The RFT image is an `Arc` swap, so
//! replacing a multi-megabyte logo never copies under the lock.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};
use crate::rds::charset;
use crate::rds::rft::RftImage;

/// Programme Service name width in glyphs.
pub const PS_LENGTH: usize = 8;
/// RadioText width in glyphs.
pub const RT_LENGTH: usize = 64;
/// PTY Name width in glyphs.
pub const PTYN_LENGTH: usize = 8;
/// Long PS capacity (RDS2).
pub const LPS_LENGTH: usize = 32;
/// Enhanced RadioText capacity (RDS2).
pub const ERT_LENGTH: usize = 128;
/// Maximum number of alternative frequencies in the list.
pub const MAX_AF: usize = 25;

/// RadioText Plus tag pair: two (content type, start, length) triplets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtPlusTags {
    pub type1: u8,
    pub start1: u8,
    pub len1: u8,
    pub type2: u8,
    pub start2: u8,
    pub len2: u8,
}

/// RT+ tag state: the tags plus the running and item-toggle flags carried
/// in every 15A group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtPlusState {
    pub tags: RtPlusTags,
    pub running: bool,
    pub item_toggle: bool,
}

impl RtPlusState {
    /// RT+ is worth announcing once it carries at least one real tag.
    pub fn is_active(&self) -> bool {
        self.running || self.tags.len1 > 0 || self.tags.len2 > 0
    }
}

/// All mutable RDS parameters of the running encoder.
///
/// Construct with [`ProgramInfo::default`] and mutate through the typed
/// setters; each setter validates its input and applies fixed-width padding,
/// so the invariants of the wire format hold at all times.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pi: u16,
    ps: [u8; PS_LENGTH],
    rt: [u8; RT_LENGTH],
    rt_ab: bool,
    pty: u8,
    ptyn: [u8; PTYN_LENGTH],
    ptyn_ab: bool,
    tp: bool,
    ta: bool,
    ms: bool,
    di: u8,
    af: Vec<u8>,
    lps: [u8; LPS_LENGTH],
    lps_len: u8,
    ert: [u8; ERT_LENGTH],
    ert_len: u8,
    ert_utf8: bool,
    rtplus: RtPlusState,
    rft: Option<Arc<RftImage>>,
    rft_generation: u64,
}

impl Default for ProgramInfo {
    fn default() -> Self {
        let mut info = Self {
            pi: 0x1000,
            ps: [0x20; PS_LENGTH],
            rt: [0x20; RT_LENGTH],
            rt_ab: false,
            pty: 0,
            ptyn: [0x20; PTYN_LENGTH],
            ptyn_ab: false,
            tp: false,
            ta: false,
            ms: false,
            di: 0,
            af: Vec::new(),
            lps: [0x20; LPS_LENGTH],
            lps_len: 0,
            ert: [0x20; ERT_LENGTH],
            ert_len: 0,
            ert_utf8: true,
            rtplus: RtPlusState::default(),
            rft: None,
            rft_generation: 0,
        };
        charset::fill(&mut info.ps, "MiniRDS");
        charset::fill(&mut info.rt, "MiniRDS: Software RDS encoder");
        info
    }
}

impl ProgramInfo {
    pub fn pi(&self) -> u16 {
        self.pi
    }

    pub fn ps(&self) -> &[u8; PS_LENGTH] {
        &self.ps
    }

    pub fn rt(&self) -> &[u8; RT_LENGTH] {
        &self.rt
    }

    pub fn rt_ab(&self) -> bool {
        self.rt_ab
    }

    pub fn pty(&self) -> u8 {
        self.pty
    }

    pub fn ptyn(&self) -> &[u8; PTYN_LENGTH] {
        &self.ptyn
    }

    pub fn ptyn_ab(&self) -> bool {
        self.ptyn_ab
    }

    /// PTYN is transmitted only while it holds something besides spaces.
    pub fn ptyn_set(&self) -> bool {
        self.ptyn.iter().any(|&b| b != 0x20)
    }

    pub fn tp(&self) -> bool {
        self.tp
    }

    pub fn ta(&self) -> bool {
        self.ta
    }

    pub fn ms(&self) -> bool {
        self.ms
    }

    pub fn di(&self) -> u8 {
        self.di
    }

    /// Alternative frequencies as channel codes (1..=204).
    pub fn af(&self) -> &[u8] {
        &self.af
    }

    pub fn lps(&self) -> &[u8] {
        &self.lps[..self.lps_len as usize]
    }

    pub fn ert(&self) -> &[u8] {
        &self.ert[..self.ert_len as usize]
    }

    pub fn ert_utf8(&self) -> bool {
        self.ert_utf8
    }

    pub fn rtplus(&self) -> &RtPlusState {
        &self.rtplus
    }

    pub fn rft(&self) -> Option<&Arc<RftImage>> {
        self.rft.as_ref()
    }

    /// Bumped on every image replacement so stream cursors can restart
    /// from segment 0.
    pub fn rft_generation(&self) -> u64 {
        self.rft_generation
    }

    pub fn set_pi(&mut self, pi: u16) {
        self.pi = pi;
    }

    /// Set the Programme Service name; always stored as exactly 8 glyphs.
    pub fn set_ps(&mut self, text: &str) {
        charset::fill(&mut self.ps, text);
    }

    /// Set the RadioText (padded to 64 glyphs). With `ab_auto` the A/B
    /// toggle flips iff the padded content actually changed, which tells
    /// receivers to discard the previous text.
    pub fn set_rt(&mut self, text: &str, ab_auto: bool) {
        let mut new_rt = [0x20u8; RT_LENGTH];
        charset::fill(&mut new_rt, text);
        if ab_auto && new_rt != self.rt {
            self.rt_ab = !self.rt_ab;
        }
        self.rt = new_rt;
    }

    pub fn set_pty(&mut self, pty: u8) -> Result<()> {
        if pty > 31 {
            return Err(Error::rds(format!("PTY {} out of range (0..31)", pty)));
        }
        self.pty = pty;
        Ok(())
    }

    /// Set the PTY Name; the toggle flips iff the content changed.
    pub fn set_ptyn(&mut self, text: &str) {
        let mut new_ptyn = [0x20u8; PTYN_LENGTH];
        charset::fill(&mut new_ptyn, text);
        if new_ptyn != self.ptyn {
            self.ptyn_ab = !self.ptyn_ab;
        }
        self.ptyn = new_ptyn;
    }

    pub fn set_tp(&mut self, tp: bool) {
        self.tp = tp;
    }

    pub fn set_ta(&mut self, ta: bool) {
        self.ta = ta;
    }

    pub fn set_ms(&mut self, ms: bool) {
        self.ms = ms;
    }

    pub fn set_di(&mut self, di: u8) -> Result<()> {
        if di > 15 {
            return Err(Error::rds(format!("DI {} out of range (0..15)", di)));
        }
        self.di = di;
        Ok(())
    }

    /// Append an alternative frequency in MHz (87.6..=107.9).
    pub fn add_af(&mut self, mhz: f32) -> Result<()> {
        let code = ((mhz - 87.5) * 10.0).round();
        if !(1.0..=204.0).contains(&code) {
            return Err(Error::rds(format!("AF {:.1} MHz outside 87.6..107.9", mhz)));
        }
        if self.af.len() >= MAX_AF {
            return Err(Error::rds(format!("AF list full ({} entries)", MAX_AF)));
        }
        self.af.push(code as u8);
        Ok(())
    }

    pub fn clear_af(&mut self) {
        self.af.clear();
    }

    /// Set the Long PS (RDS2), up to 32 glyphs.
    pub fn set_lps(&mut self, text: &str) {
        let glyphs = charset::xlat(text);
        let len = glyphs.len().min(LPS_LENGTH);
        self.lps = [0x20; LPS_LENGTH];
        self.lps[..len].copy_from_slice(&glyphs[..len]);
        self.lps_len = len as u8;
    }

    /// Set the enhanced RadioText (RDS2), up to 128 glyphs.
    pub fn set_ert(&mut self, text: &str) {
        let glyphs = charset::xlat(text);
        let len = glyphs.len().min(ERT_LENGTH);
        self.ert = [0x20; ERT_LENGTH];
        self.ert[..len].copy_from_slice(&glyphs[..len]);
        self.ert_len = len as u8;
    }

    /// Set the RT+ tag pair. Each tag must reference a span inside the
    /// 64-glyph RadioText and a content type below 64. Tag 2's length
    /// field is only 5 bits on the wire, so its length tops out at 31.
    pub fn set_rtplus_tags(&mut self, tags: RtPlusTags) -> Result<()> {
        for (ty, start, len) in [
            (tags.type1, tags.start1, tags.len1),
            (tags.type2, tags.start2, tags.len2),
        ] {
            if ty > 63 {
                return Err(Error::rds(format!("RT+ content type {} out of range", ty)));
            }
            if start as usize + len as usize >= RT_LENGTH {
                return Err(Error::rds(format!(
                    "RT+ tag {}+{} exceeds the RadioText",
                    start, len
                )));
            }
        }
        if tags.len2 > 31 {
            return Err(Error::rds(format!(
                "RT+ tag 2 length {} above 31",
                tags.len2
            )));
        }
        self.rtplus.tags = tags;
        Ok(())
    }

    pub fn set_rtplus_flags(&mut self, running: bool, item_toggle: bool) {
        self.rtplus.running = running;
        self.rtplus.item_toggle = item_toggle;
    }

    /// Replace the RFT image. The CRC-32 is computed here, once, and the
    /// running transmission restarts from segment 0.
    pub fn set_rft_image(&mut self, data: Vec<u8>) -> Result<()> {
        let image = RftImage::new(data)?;
        debug!(
            "RFT image replaced: {} bytes, crc {:08X}, {} segments",
            image.len(),
            image.crc(),
            image.segment_count()
        );
        self.rft = Some(Arc::new(image));
        self.rft_generation += 1;
        Ok(())
    }

    pub fn clear_rft_image(&mut self) {
        self.rft = None;
        self.rft_generation += 1;
    }

    /// Restore the startup defaults, dropping any loaded image.
    pub fn reset(&mut self) {
        *self = ProgramInfo::default();
    }
}

/// Cloneable handle to the shared program-information store.
#[derive(Clone)]
pub struct SharedParams(Arc<Mutex<ProgramInfo>>);

impl SharedParams {
    pub fn new(info: ProgramInfo) -> Self {
        Self(Arc::new(Mutex::new(info)))
    }

    /// Consistent copy of the whole store (the reader snapshot of the
    /// monitor path; the sequencer uses the same call once per group).
    pub fn get_params(&self) -> ProgramInfo {
        self.0.lock().expect("params mutex poisoned").clone()
    }

    /// Run a mutation under the lock. Held only for the closure body;
    /// callers never block the generator for longer than a setter.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProgramInfo) -> R) -> R {
        let mut guard = self.0.lock().expect("params mutex poisoned");
        f(&mut guard)
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new(ProgramInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_startup_values() {
        let info = ProgramInfo::default();
        assert_eq!(info.pi(), 0x1000);
        assert_eq!(info.ps(), b"MiniRDS ");
        assert!(info.rt().starts_with(b"MiniRDS: Software RDS encoder"));
        assert!(
            info.rt()[29..].iter().all(|&b| b == 0x20),
            "RT is space padded to 64"
        );
        assert!(!info.ptyn_set());
        assert!(info.af().is_empty());
    }

    #[test]
    fn test_ps_always_eight_glyphs() {
        let mut info = ProgramInfo::default();
        for text in ["", "a", "exactly8", "more than eight chars"] {
            info.set_ps(text);
            assert_eq!(info.ps().len(), PS_LENGTH);
        }
        info.set_ps("Hello");
        assert_eq!(info.ps(), b"Hello   ");
    }

    #[test]
    fn test_rt_toggle_flips_only_on_change() {
        let mut info = ProgramInfo::default();
        let ab0 = info.rt_ab();

        info.set_rt("Some text", true);
        assert_ne!(info.rt_ab(), ab0, "new text flips the toggle");

        info.set_rt("Some text", true);
        assert_ne!(info.rt_ab(), ab0, "identical text must not flip again");

        info.set_rt("Other text", true);
        assert_eq!(info.rt_ab(), ab0, "changed text flips back");
    }

    #[test]
    fn test_rt_toggle_manual_mode() {
        let mut info = ProgramInfo::default();
        let ab0 = info.rt_ab();
        info.set_rt("Changed", false);
        assert_eq!(info.rt_ab(), ab0, "ab_auto=false leaves the toggle alone");
    }

    #[test]
    fn test_ptyn_toggle() {
        let mut info = ProgramInfo::default();
        let ab0 = info.ptyn_ab();
        info.set_ptyn("CLASSICS");
        assert_ne!(info.ptyn_ab(), ab0);
        assert!(info.ptyn_set());
        info.set_ptyn("CLASSICS");
        assert_ne!(info.ptyn_ab(), ab0, "same PTYN does not flip");
    }

    #[test]
    fn test_pty_range() {
        let mut info = ProgramInfo::default();
        assert!(info.set_pty(31).is_ok());
        assert!(info.set_pty(32).is_err());
        assert_eq!(info.pty(), 31, "rejected value keeps the previous one");
    }

    #[test]
    fn test_af_codes() {
        let mut info = ProgramInfo::default();
        info.add_af(87.6).unwrap();
        info.add_af(98.1).unwrap();
        info.add_af(107.9).unwrap();
        assert_eq!(info.af(), [1u8, 106, 204]);

        assert!(info.add_af(87.3).is_err(), "below band");
        assert!(info.add_af(108.5).is_err(), "above band");
        assert_eq!(info.af().len(), 3);
    }

    #[test]
    fn test_af_list_limit() {
        let mut info = ProgramInfo::default();
        for i in 0..MAX_AF {
            info.add_af(88.0 + i as f32 * 0.1).unwrap();
        }
        assert!(info.add_af(106.0).is_err(), "26th AF is rejected");
        info.clear_af();
        assert!(info.af().is_empty());
    }

    #[test]
    fn test_rtplus_validation() {
        let mut info = ProgramInfo::default();
        let ok = RtPlusTags {
            type1: 4,
            start1: 0,
            len1: 10,
            type2: 1,
            start2: 12,
            len2: 20,
        };
        assert!(info.set_rtplus_tags(ok).is_ok());
        assert!(info.rtplus().is_active());

        let bad = RtPlusTags {
            start1: 60,
            len1: 4,
            ..ok
        };
        assert!(info.set_rtplus_tags(bad).is_err(), "start+len must stay < 64");
        assert_eq!(info.rtplus().tags, ok, "rejected tags keep the previous pair");

        // Tag 1's length field is 6 bits wide, tag 2's only 5: a length
        // that fits the RadioText but not the wire must still be rejected
        let wide_1 = RtPlusTags {
            start1: 0,
            len1: 40,
            ..ok
        };
        assert!(info.set_rtplus_tags(wide_1).is_ok(), "len1 up to 63 fits its field");
        let wide_2 = RtPlusTags {
            start2: 0,
            len2: 32,
            ..ok
        };
        assert!(
            info.set_rtplus_tags(wide_2).is_err(),
            "len2 above 31 cannot be carried and must be rejected"
        );
        assert_eq!(info.rtplus().tags, wide_1, "rejected tags keep the previous pair");
    }

    #[test]
    fn test_lps_and_ert_lengths() {
        let mut info = ProgramInfo::default();
        info.set_lps("A long programme service name!!!X");
        assert_eq!(info.lps().len(), LPS_LENGTH, "LPS truncates at 32");

        info.set_ert("short");
        assert_eq!(info.ert(), b"short");
    }

    #[test]
    fn test_rft_generation_bumps() {
        let mut info = ProgramInfo::default();
        assert_eq!(info.rft_generation(), 0);
        info.set_rft_image(vec![0u8; 500]).unwrap();
        assert_eq!(info.rft_generation(), 1);
        let crc1 = info.rft().unwrap().crc();
        info.set_rft_image(vec![1u8; 500]).unwrap();
        assert_eq!(info.rft_generation(), 2);
        assert_ne!(info.rft().unwrap().crc(), crc1);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut info = ProgramInfo::default();
        info.set_pi(0xBEEF);
        info.set_ps("OTHER");
        info.set_rft_image(vec![0u8; 10]).unwrap();
        info.reset();
        assert_eq!(info.pi(), 0x1000);
        assert_eq!(info.ps(), b"MiniRDS ");
        assert!(info.rft().is_none());
    }

    #[test]
    fn test_shared_params_snapshot() {
        let shared = SharedParams::default();
        shared.with(|p| p.set_ps("SNAP"));
        let copy = shared.get_params();
        assert_eq!(copy.ps(), b"SNAP    ");

        // The snapshot is a copy: later writes do not affect it
        shared.with(|p| p.set_ps("LATER"));
        assert_eq!(copy.ps(), b"SNAP    ");
    }
}
