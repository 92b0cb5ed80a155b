//! The group sequencer.
//!
//! Produces the infinite stream of 104-bit RDS groups from the shared
//! program-information store. Each group is four 26-bit blocks: a 16-bit
//! information word plus a 10-bit checkword with the position's offset word
//! (A, B, C/C', D).
//!
//! The schedule is a weighted round-robin over a 4-slot base cycle:
//!
//! ```text
//! 0A   2A   0A   [optional]      (optional falls back to 2A)
//! ```
//!
//! so a full PS cycles every four 0A groups and the 64-character RadioText
//! completes every sixteen 2A groups. The optional slot serves PTYN (10A),
//! RT+ (15A), eRT (12A) and LPS (11A) with that tie-break priority, plus an
//! ODA announcement (3A) roughly every sixteen groups while any open-data
//! application is active.
//!
//! The sequencer snapshots the store once per group, never per block; a
//! mutation that lands mid-group is observed from the next group on. It
//! never blocks and never fails: inactive fields simply cede their slot.

use crate::rds::crc::{encode_block, OFFSET_A, OFFSET_B, OFFSET_C, OFFSET_C_PRIME, OFFSET_D};
use crate::rds::params::{ProgramInfo, SharedParams};

/// ODA application id for RadioText Plus.
pub const AID_RTPLUS: u16 = 0x4BD7;
/// ODA application id for enhanced RadioText.
pub const AID_ERT: u16 = 0x6552;
/// ODA application id for the RFT station logo channel.
pub const AID_RFT: u16 = 0xFF7F;

/// Groups between ODA announcements while an application is active.
const ODA_PERIOD: u64 = 16;

/// Number of optional group kinds competing for the fourth slot.
const OPT_KINDS: usize = 4;

/// What a group carries; also selects the block-B group-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// 0A: basic tuning and switching information + PS + AF.
    Basic,
    /// 2A: RadioText segment.
    RadioText,
    /// 3A: open data application announcement.
    OdaAnnounce,
    /// 10A: programme type name segment.
    PtyName,
    /// 11A: long PS segment (RDS2).
    LongPs,
    /// 12A: enhanced RadioText segment (RDS2).
    EnhancedRt,
    /// 15A: RadioText Plus tags.
    RtPlus,
}

impl GroupKind {
    fn type_code(self) -> u16 {
        match self {
            GroupKind::Basic => 0,
            GroupKind::RadioText => 2,
            GroupKind::OdaAnnounce => 3,
            GroupKind::PtyName => 10,
            GroupKind::LongPs => 11,
            GroupKind::EnhancedRt => 12,
            GroupKind::RtPlus => 15,
        }
    }
}

/// One assembled group: four information words, ready for checkwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub blocks: [u16; 4],
    pub kind: GroupKind,
    /// Version B groups repeat the PI in block 3 and use offset C'.
    /// The core schedule emits version A only.
    pub version_b: bool,
}

impl Group {
    /// Attach checkwords: the four transmitted 26-bit words.
    pub fn to_words(&self) -> [u32; 4] {
        let c_offset = if self.version_b { OFFSET_C_PRIME } else { OFFSET_C };
        [
            encode_block(self.blocks[0], OFFSET_A),
            encode_block(self.blocks[1], OFFSET_B),
            encode_block(self.blocks[2], c_offset),
            encode_block(self.blocks[3], OFFSET_D),
        ]
    }

    /// Serialize to 104 bits, MSB-first per block, transmission order.
    pub fn to_bits(&self) -> Vec<u8> {
        let mut bits = Vec::with_capacity(104);
        for word in self.to_words() {
            for i in (0..26).rev() {
                bits.push(((word >> i) & 1) as u8);
            }
        }
        bits
    }
}

/// Deterministic scheduler state advancing once per emitted group.
pub struct GroupSequencer {
    params: SharedParams,
    counter: u64,
    ps_segment: u8,
    rt_segment: u8,
    af_cursor: usize,
    ptyn_segment: u8,
    lps_segment: u8,
    ert_segment: u8,
    /// Cooldown (in optional slots) per optional kind:
    /// [PTYN, RT+, eRT, LPS].
    opt_cooldown: [u8; OPT_KINDS],
    groups_since_oda: u64,
    oda_rotation: usize,
}

impl GroupSequencer {
    pub fn new(params: SharedParams) -> Self {
        Self {
            params,
            counter: 0,
            ps_segment: 0,
            rt_segment: 0,
            af_cursor: 0,
            ptyn_segment: 0,
            lps_segment: 0,
            ert_segment: 0,
            opt_cooldown: [0; OPT_KINDS],
            groups_since_oda: 0,
            oda_rotation: 0,
        }
    }

    /// Emit the next group of the schedule.
    ///
    /// Takes one consistent snapshot of the store; all four blocks derive
    /// from it.
    pub fn next_group(&mut self) -> Group {
        let p = self.params.get_params();
        let slot = self.counter % 4;
        self.counter += 1;
        self.groups_since_oda += 1;

        match slot {
            0 | 2 => self.group_0a(&p),
            1 => self.group_2a(&p),
            _ => self.optional_group(&p).unwrap_or_else(|| self.group_2a(&p)),
        }
    }

    /// Block B skeleton shared by every group: type, version, TP, PTY.
    fn block_b(kind: GroupKind, p: &ProgramInfo, low5: u16) -> u16 {
        (kind.type_code() << 12)
            | ((p.tp() as u16) << 10)
            | ((p.pty() as u16) << 5)
            | (low5 & 0x1F)
    }

    fn group_0a(&mut self, p: &ProgramInfo) -> Group {
        let seg = self.ps_segment as u16;
        self.ps_segment = (self.ps_segment + 1) % 4;

        // One DI bit per segment, d3 first
        let di_bit = ((p.di() >> (3 - seg)) & 1) as u16;
        let low5 = ((p.ta() as u16) << 4) | ((p.ms() as u16) << 3) | (di_bit << 2) | seg;

        let ps = p.ps();
        let d = ((ps[seg as usize * 2] as u16) << 8) | ps[seg as usize * 2 + 1] as u16;

        Group {
            blocks: [p.pi(), Self::block_b(GroupKind::Basic, p, low5), self.af_block(p), d],
            kind: GroupKind::Basic,
            version_b: false,
        }
    }

    /// Next AF pair for block C of 0A: the `224+n` count marker leads the
    /// cycle, entries follow two at a time, odd tails padded with the
    /// 0xCD filler code.
    fn af_block(&mut self, p: &ProgramInfo) -> u16 {
        let af = p.af();
        if af.is_empty() {
            self.af_cursor = 0;
            return 0xE0CD;
        }
        let mut seq = Vec::with_capacity(af.len() + 2);
        seq.push(224 + af.len() as u8);
        seq.extend_from_slice(af);
        if seq.len() % 2 != 0 {
            seq.push(0xCD);
        }
        let i = self.af_cursor % seq.len();
        let pair = ((seq[i] as u16) << 8) | seq[i + 1] as u16;
        self.af_cursor = (i + 2) % seq.len();
        pair
    }

    fn group_2a(&mut self, p: &ProgramInfo) -> Group {
        let seg = self.rt_segment as u16;
        self.rt_segment = (self.rt_segment + 1) % 16;

        let low5 = ((p.rt_ab() as u16) << 4) | seg;
        let rt = p.rt();
        let base = seg as usize * 4;
        let c = ((rt[base] as u16) << 8) | rt[base + 1] as u16;
        let d = ((rt[base + 2] as u16) << 8) | rt[base + 3] as u16;

        Group {
            blocks: [p.pi(), Self::block_b(GroupKind::RadioText, p, low5), c, d],
            kind: GroupKind::RadioText,
            version_b: false,
        }
    }

    /// Serve the fourth slot: the first due optional kind in priority order
    /// PTYN > RT+ > eRT > LPS, then an overdue ODA announcement. `None`
    /// hands the slot back to 2A.
    fn optional_group(&mut self, p: &ProgramInfo) -> Option<Group> {
        for cd in &mut self.opt_cooldown {
            *cd = cd.saturating_sub(1);
        }

        let active = [
            p.ptyn_set(),
            p.rtplus().is_active(),
            !p.ert().is_empty(),
            !p.lps().is_empty(),
        ];
        // Leave at least one optional slot in every rotation free, so ODA
        // announcements cannot be starved by dense optional traffic.
        let cooldown = active.iter().filter(|&&a| a).count() as u8 + 1;

        for (i, &is_active) in active.iter().enumerate() {
            if is_active && self.opt_cooldown[i] == 0 {
                self.opt_cooldown[i] = cooldown;
                let group = match i {
                    0 => self.group_10a(p),
                    1 => self.group_15a(p),
                    2 => self.group_12a(p),
                    _ => self.group_11a(p),
                };
                return Some(group);
            }
        }

        if self.groups_since_oda >= ODA_PERIOD {
            if let Some(group) = self.group_3a(p) {
                self.groups_since_oda = 0;
                return Some(group);
            }
        }
        None
    }

    fn group_10a(&mut self, p: &ProgramInfo) -> Group {
        let seg = self.ptyn_segment as u16;
        self.ptyn_segment = (self.ptyn_segment + 1) % 2;

        let low5 = ((p.ptyn_ab() as u16) << 4) | seg;
        let ptyn = p.ptyn();
        let base = seg as usize * 4;
        let c = ((ptyn[base] as u16) << 8) | ptyn[base + 1] as u16;
        let d = ((ptyn[base + 2] as u16) << 8) | ptyn[base + 3] as u16;

        Group {
            blocks: [p.pi(), Self::block_b(GroupKind::PtyName, p, low5), c, d],
            kind: GroupKind::PtyName,
            version_b: false,
        }
    }

    fn group_11a(&mut self, p: &ProgramInfo) -> Group {
        let lps = p.lps();
        let segments = (lps.len().div_ceil(4)).max(1) as u8;
        let seg = (self.lps_segment % segments) as u16;
        self.lps_segment = (self.lps_segment + 1) % segments;

        let ch = |i: usize| *lps.get(i).unwrap_or(&0x20) as u16;
        let base = seg as usize * 4;

        Group {
            blocks: [
                p.pi(),
                Self::block_b(GroupKind::LongPs, p, seg),
                (ch(base) << 8) | ch(base + 1),
                (ch(base + 2) << 8) | ch(base + 3),
            ],
            kind: GroupKind::LongPs,
            version_b: false,
        }
    }

    fn group_12a(&mut self, p: &ProgramInfo) -> Group {
        let ert = p.ert();
        let segments = (ert.len().div_ceil(4)).max(1) as u8;
        let seg = (self.ert_segment % segments) as u16;
        self.ert_segment = (self.ert_segment + 1) % segments;

        let ch = |i: usize| *ert.get(i).unwrap_or(&0x20) as u16;
        let base = seg as usize * 4;

        Group {
            blocks: [
                p.pi(),
                Self::block_b(GroupKind::EnhancedRt, p, seg),
                (ch(base) << 8) | ch(base + 1),
                (ch(base + 2) << 8) | ch(base + 3),
            ],
            kind: GroupKind::EnhancedRt,
            version_b: false,
        }
    }

    /// RT+ tagging group (IEC 62106-6 bit layout): item toggle, item
    /// running, then two content-type/start/length triplets packed across
    /// blocks B..D.
    fn group_15a(&mut self, p: &ProgramInfo) -> Group {
        let rtp = p.rtplus();
        let t = &rtp.tags;

        let low5 = ((rtp.item_toggle as u16) << 4)
            | ((rtp.running as u16) << 3)
            | ((t.type1 as u16 >> 3) & 0x7);
        let c = ((t.type1 as u16 & 0x7) << 13)
            | ((t.start1 as u16 & 0x3F) << 7)
            | ((t.len1 as u16 & 0x3F) << 1)
            | ((t.type2 as u16 >> 5) & 0x1);
        let d = ((t.type2 as u16 & 0x1F) << 11)
            | ((t.start2 as u16 & 0x3F) << 5)
            | (t.len2 as u16 & 0x1F);

        Group {
            blocks: [p.pi(), Self::block_b(GroupKind::RtPlus, p, low5), c, d],
            kind: GroupKind::RtPlus,
            version_b: false,
        }
    }

    /// ODA announcement, rotating over the currently active applications.
    fn group_3a(&mut self, p: &ProgramInfo) -> Option<Group> {
        // (target group type << 1 | version, message, AID)
        let mut apps: Vec<(u16, u16, u16)> = Vec::new();
        if p.rtplus().is_active() {
            apps.push((15 << 1, 0, AID_RTPLUS));
        }
        if !p.ert().is_empty() {
            apps.push((12 << 1, p.ert_utf8() as u16, AID_ERT));
        }
        if let Some(image) = p.rft() {
            // RFT rides the RDS2 streams; the message advertises the
            // segment count so receivers can size the reassembly buffer.
            apps.push((0, (image.segment_count() as u16).min(0x1FFF), AID_RFT));
        }
        if apps.is_empty() {
            return None;
        }

        let (target, message, aid) = apps[self.oda_rotation % apps.len()];
        self.oda_rotation = self.oda_rotation.wrapping_add(1);

        Some(Group {
            blocks: [
                p.pi(),
                Self::block_b(GroupKind::OdaAnnounce, p, target),
                message,
                aid,
            ],
            kind: GroupKind::OdaAnnounce,
            version_b: false,
        })
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
