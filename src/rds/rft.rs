//! RDS2 file transfer (RFT) payloads.
//!
//! The station logo travels on the RDS2 subcarriers as a cyclic sequence of
//! segment frames. The image is split into 163-byte segments; every frame
//! carries a small header (segment index, segment count, total length and
//! the CRC-32 of the whole file) followed by the segment bytes, so a
//! receiver joining mid-transmission can place any segment and validate the
//! reassembled file.
//!
//! [`RftImage`] is immutable once built and shared as an `Arc`; replacing
//! the image swaps the pointer and restarts transmission from segment 0.

use crate::error::{Error, Result};
use crate::rds::crc::Crc32;

/// Payload bytes per transmitted segment.
pub const SEGMENT_SIZE: usize = 163;

/// Frame header bytes ahead of each segment payload.
pub const FRAME_HEADER: usize = 12;

/// An immutable file payload with its transmission metadata.
#[derive(Debug)]
pub struct RftImage {
    data: Vec<u8>,
    crc: u32,
}

impl RftImage {
    /// Build an image payload, computing its CRC-32 once.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::rds("RFT image is empty"));
        }
        let crc = Crc32::compute(&data);
        Ok(Self { data, crc })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// CRC-32 of the whole file, carried in every frame header.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Number of 163-byte segments (the last may be short).
    pub fn segment_count(&self) -> usize {
        self.data.len().div_ceil(SEGMENT_SIZE)
    }

    /// Payload bytes of one segment.
    pub fn segment(&self, index: usize) -> &[u8] {
        let start = index * SEGMENT_SIZE;
        let end = (start + SEGMENT_SIZE).min(self.data.len());
        &self.data[start..end]
    }

    /// Serialize the on-wire frame for one segment (little-endian header).
    pub fn frame(&self, index: usize) -> Vec<u8> {
        let payload = self.segment(index);
        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&(index as u16).to_le_bytes());
        frame.extend_from_slice(&(self.segment_count() as u16).to_le_bytes());
        frame.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&self.crc.to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

/// Bit-level cursor over the cyclic frame sequence of one RDS2 stream.
///
/// Each of the three subcarriers runs its own cursor, staggered by one
/// segment, all fed from the same shared image. `sync` follows image
/// replacements by watching the store's generation counter.
#[derive(Debug, Default)]
pub struct RftStream {
    image: Option<std::sync::Arc<RftImage>>,
    generation: u64,
    stagger: usize,
    segment: usize,
    frame: Vec<u8>,
    byte_pos: usize,
    bit_pos: u8,
}

impl RftStream {
    pub fn new(stagger: usize) -> Self {
        Self {
            stagger,
            ..Default::default()
        }
    }

    /// Adopt the current image. On a generation change the cursor restarts
    /// at this stream's stagger offset into segment order.
    pub fn sync(&mut self, image: Option<&std::sync::Arc<RftImage>>, generation: u64) {
        if generation == self.generation {
            return;
        }
        self.generation = generation;
        self.image = image.cloned();
        self.frame.clear();
        self.byte_pos = 0;
        self.bit_pos = 0;
        self.segment = match &self.image {
            Some(img) => self.stagger % img.segment_count(),
            None => 0,
        };
    }

    /// Whether this stream currently transmits anything.
    pub fn is_active(&self) -> bool {
        self.image.is_some()
    }

    /// Segment index the next frame will carry (for tests and monitoring).
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// Next bit of the frame sequence, MSB-first within each byte.
    /// Returns 0 forever while no image is loaded, keeping the bit clock
    /// running so reactivation stays phase aligned.
    pub fn next_bit(&mut self) -> u8 {
        let Some(image) = self.image.clone() else {
            return 0;
        };
        if self.byte_pos >= self.frame.len() {
            self.frame = image.frame(self.segment);
            self.segment = (self.segment + 1) % image.segment_count();
            self.byte_pos = 0;
            self.bit_pos = 0;
        }
        let byte = self.frame[self.byte_pos];
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_segmentation() {
        let image = RftImage::new(vec![0xAB; 8192]).unwrap();
        assert_eq!(image.segment_count(), 8192_usize.div_ceil(163));
        assert_eq!(image.segment(0).len(), SEGMENT_SIZE);
        // 8192 = 50*163 + 42
        assert_eq!(image.segment(image.segment_count() - 1).len(), 42);
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(RftImage::new(Vec::new()).is_err());
    }

    #[test]
    fn test_frame_header_layout() {
        let image = RftImage::new((0..=255u8).collect()).unwrap();
        let frame = image.frame(1);
        assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 1, "segment index");
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 2, "segment count");
        assert_eq!(
            u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]),
            256,
            "total length"
        );
        assert_eq!(
            u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]),
            image.crc(),
            "file CRC"
        );
        assert_eq!(&frame[FRAME_HEADER..], image.segment(1));
    }

    #[test]
    fn test_reassembly_matches_crc() {
        let data: Vec<u8> = (0..8192u32).map(|i| (i * 7) as u8).collect();
        let expected_crc = crate::rds::crc::Crc32::compute(&data);
        let image = RftImage::new(data).unwrap();
        assert_eq!(image.crc(), expected_crc);

        let mut rebuilt = Vec::new();
        for i in 0..image.segment_count() {
            rebuilt.extend_from_slice(image.segment(i));
        }
        assert_eq!(crate::rds::crc::Crc32::compute(&rebuilt), expected_crc);
    }

    #[test]
    fn test_stream_cycles_all_segments() {
        let image = Arc::new(RftImage::new(vec![1u8; 500]).unwrap());
        let mut stream = RftStream::new(0);
        stream.sync(Some(&image), 1);

        let mut seen = Vec::new();
        for _ in 0..image.segment_count() + 1 {
            seen.push(stream.segment());
            let frame_bits = 8 * (FRAME_HEADER + image.segment(stream.segment()).len());
            for _ in 0..frame_bits {
                stream.next_bit();
            }
        }
        // 500 bytes -> 4 segments; indices wrap after one full cycle
        assert_eq!(seen, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_stream_restarts_on_replacement() {
        let image = Arc::new(RftImage::new(vec![1u8; 1000]).unwrap());
        let mut stream = RftStream::new(0);
        stream.sync(Some(&image), 1);
        for _ in 0..5000 {
            stream.next_bit();
        }
        assert!(stream.segment() > 0 || stream.is_active());

        let replacement = Arc::new(RftImage::new(vec![2u8; 1000]).unwrap());
        stream.sync(Some(&replacement), 2);
        assert_eq!(stream.segment(), 0, "replacement restarts at segment 0");
    }

    #[test]
    fn test_stagger_offsets() {
        let image = Arc::new(RftImage::new(vec![1u8; 1000]).unwrap());
        let mut s0 = RftStream::new(0);
        let mut s1 = RftStream::new(1);
        let mut s2 = RftStream::new(2);
        for s in [&mut s0, &mut s1, &mut s2] {
            s.sync(Some(&image), 1);
        }
        assert_eq!((s0.segment(), s1.segment(), s2.segment()), (0, 1, 2));
    }

    #[test]
    fn test_inactive_stream_emits_zero_bits() {
        let mut stream = RftStream::new(0);
        assert!(!stream.is_active());
        for _ in 0..100 {
            assert_eq!(stream.next_bit(), 0);
        }
    }

    #[test]
    fn test_first_bit_is_msb_of_index() {
        // Frame starts with the LE segment index; segment 0 -> first byte 0
        let image = Arc::new(RftImage::new(vec![0xFF; 10]).unwrap());
        let mut stream = RftStream::new(0);
        stream.sync(Some(&image), 1);
        let first_byte: u8 = (0..8).fold(0, |acc, _| (acc << 1) | stream.next_bit());
        assert_eq!(first_byte, 0);
    }
}
