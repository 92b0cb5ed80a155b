//! Float → interleaved 16-bit stereo packing.
//!
//! The sink consumes little-endian interleaved stereo; the multiplex is
//! mono, so both channels carry the same sample.

/// Map one float in ±1.0 to a saturated 16-bit sample.
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Pack a mono buffer into interleaved stereo frames (L == R), reusing the
/// output vector.
pub fn pack_stereo(mono: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.reserve(mono.len() * 2);
    for &s in mono {
        let v = to_i16(s);
        out.push(v);
        out.push(v);
    }
}

/// Serialize interleaved frames as little-endian bytes (the sink's wire
/// format).
pub fn frames_to_le_bytes(frames: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames.len() * 2);
    for &f in frames {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_and_rounding() {
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(-1.0), -32767);
        assert_eq!(to_i16(0.5), 16384, "0.5 · 32767 rounds to 16384");
    }

    #[test]
    fn test_saturation() {
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-2.0), -32768);
    }

    #[test]
    fn test_stereo_duplication() {
        let mut out = Vec::new();
        pack_stereo(&[0.5, -0.25], &mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], out[1], "left equals right");
        assert_eq!(out[2], out[3]);
        assert_eq!(out[0], to_i16(0.5));
    }

    #[test]
    fn test_little_endian_bytes() {
        let bytes = frames_to_le_bytes(&[0x1234]);
        assert_eq!(bytes, vec![0x34, 0x12]);
    }

    #[test]
    fn test_pack_reuses_buffer() {
        let mut out = vec![7i16; 100];
        pack_stereo(&[0.0], &mut out);
        assert_eq!(out, vec![0, 0]);
    }
}
