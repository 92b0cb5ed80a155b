//! Checkword and CRC computation.
//!
//! Two unrelated checksums live here. The 10-bit block checkword protects
//! each 26-bit RDS block (generator polynomial
//! g(x) = x^10 + x^8 + x^7 + x^5 + x^4 + x^3 + 1, offset words added per
//! block position, IEC 62106 annex B). The CRC-32 (ISO 3309) covers the
//! whole RFT image so a receiver can validate reassembled files.

/// RDS block polynomial, bits 10..0 of g(x) (0x5B9 in the usual shorthand).
pub const BLOCK_POLY: u32 = 0x5B9;
const POLY_DEGREE: usize = 10;

/// Offset words (d9..d0) for block positions A, B, C, C' and D.
/// Values from IEC 62106:2015 Table B.1.
pub const OFFSET_A: u16 = 0b0011111100;
pub const OFFSET_B: u16 = 0b0110011000;
pub const OFFSET_C: u16 = 0b0101101000;
pub const OFFSET_C_PRIME: u16 = 0b1101010000;
pub const OFFSET_D: u16 = 0b0110110100;

/// Remainder of a 26-bit word (MSB-first) divided by g(x).
///
/// During encoding this is fed `data << 10`; during verification the full
/// block including the checkword.
pub fn block_remainder(word26: u32) -> u16 {
    let mut v = word26;
    for i in (POLY_DEGREE..26).rev() {
        if (v >> i) & 1 != 0 {
            v ^= BLOCK_POLY << (i - POLY_DEGREE);
        }
    }
    (v & ((1 << POLY_DEGREE) - 1)) as u16
}

/// Checkword for a 16-bit information word at a given block position.
pub fn checkword(data: u16, offset: u16) -> u16 {
    block_remainder((data as u32) << POLY_DEGREE) ^ offset
}

/// Assemble the transmitted 26-bit block: information word plus checkword.
pub fn encode_block(data: u16, offset: u16) -> u32 {
    ((data as u32) << POLY_DEGREE) | checkword(data, offset) as u32
}

/// Verify a received 26-bit block against the offset word it should carry.
///
/// An error-free block satisfies `remainder(block) == remainder(offset)`,
/// since the offset word is simply added on top of the cyclic code.
pub fn verify_block(word26: u32, offset: u16) -> bool {
    block_remainder(word26) == block_remainder(offset as u32)
}

/// Table-based CRC-32 (ISO 3309 / ITU-T V.42, the zlib polynomial).
///
/// Used to checksum RFT images; recomputed whenever the image is replaced.
pub struct Crc32 {
    table: [u32; 256],
    value: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
            *entry = crc;
        }
        Self {
            table,
            value: 0xFFFF_FFFF,
        }
    }

    /// Update the CRC with additional data.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let idx = ((self.value ^ byte as u32) & 0xFF) as usize;
            self.value = (self.value >> 8) ^ self.table[idx];
        }
    }

    /// Finalize and return the CRC value.
    pub fn finalize(&self) -> u32 {
        self.value ^ 0xFFFF_FFFF
    }

    /// Compute the CRC of an entire buffer in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
