//! AstroPix 4 readout framing.
//!
//! A readout is one full burst transfer from the readout board: a fixed-length
//! buffer holding zero or more hit frames followed by `0xff` padding up to the
//! full buffer length. Each frame wraps one bit-reversed 8-byte hit payload in
//! a fixed 2-byte header marker and 6-byte trailer marker.

use std::fmt::Display;

use tracing::debug;

use crate::bits::reverse_bit_order;
use crate::hit::{Apx4Hit, Hit};
use crate::{Error, Result};

/// Byte value used to right-pad a readout buffer.
pub const PAD_BYTE: u8 = 0xff;
/// Marker preceding each hit payload.
pub const HIT_HEADER: [u8; 2] = [0xbc, 0xbc];
/// Marker following each hit payload.
pub const HIT_TRAILER: [u8; 6] = [0xbc; 6];
/// Full frame length: header marker + hit payload + trailer marker.
pub const FRAME_LENGTH: usize = HIT_HEADER.len() + Apx4Hit::SIZE + HIT_TRAILER.len();

/// One decoded readout burst and the hits it contained, in arrival order.
#[derive(Debug, Clone)]
pub struct Readout {
    data: Vec<u8>,
    pub hits: Vec<Apx4Hit>,
    /// Wall-clock timestamp shared by every hit in the readout.
    pub timestamp: Option<f64>,
}

impl Readout {
    /// Decode a raw readout buffer into its hits, propagating `timestamp` to
    /// every hit.
    ///
    /// An all-padding (or empty) buffer decodes to zero hits.
    ///
    /// # Errors
    /// [`Error::FrameLength`] if the stripped buffer is not a whole number of
    /// frames, [`Error::FrameHeader`]/[`Error::FrameTrailer`] on a marker
    /// mismatch. Framing errors are fatal to the whole readout; no partial
    /// hit list is produced.
    pub fn decode(data: &[u8], timestamp: Option<f64>) -> Result<Readout> {
        let stripped = strip_padding(data);
        if stripped.len() % FRAME_LENGTH != 0 {
            return Err(Error::FrameLength {
                length: stripped.len(),
                frame_length: FRAME_LENGTH,
            });
        }

        let mut hits = Vec::with_capacity(stripped.len() / FRAME_LENGTH);
        for frame in stripped.chunks_exact(FRAME_LENGTH) {
            if frame[..HIT_HEADER.len()] != HIT_HEADER {
                return Err(Error::FrameHeader {
                    found: [frame[0], frame[1]],
                    expected: HIT_HEADER,
                });
            }
            let trailer = &frame[FRAME_LENGTH - HIT_TRAILER.len()..];
            if *trailer != HIT_TRAILER {
                let mut found = [0u8; HIT_TRAILER.len()];
                found.copy_from_slice(trailer);
                return Err(Error::FrameTrailer {
                    found,
                    expected: HIT_TRAILER,
                });
            }

            // The firmware serializes each payload byte LSB first; undo that
            // before decoding.
            let mut payload = [0u8; Apx4Hit::SIZE];
            payload.copy_from_slice(&frame[HIT_HEADER.len()..HIT_HEADER.len() + Apx4Hit::SIZE]);
            reverse_bit_order(&mut payload);
            hits.push(Apx4Hit::decode(&payload, timestamp)?);
        }
        debug!(
            num_hits = hits.len(),
            num_bytes = stripped.len(),
            "decoded readout"
        );

        Ok(Readout {
            data: stripped.to_vec(),
            hits,
            timestamp,
        })
    }

    /// Number of hits in the readout.
    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    /// Length of the stripped readout data in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Display for Readout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Readout({} hits, {} bytes)", self.num_hits(), self.len())
    }
}

/// Trim all trailing [`PAD_BYTE`]s; pad bytes elsewhere are left alone.
fn strip_padding(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|&b| b != PAD_BYTE)
        .map_or(0, |i| i + 1);
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    // The two frames of the mock readout captured from a real AstroPix 4 run.
    const FRAME_0: &str = "bcbce08056e80da85403bcbcbcbcbcbc";
    const FRAME_1: &str = "bcbce080d26f04ca3005bcbcbcbcbcbc";

    fn mock_readout() -> Vec<u8> {
        let mut data = hex::decode(FRAME_0).unwrap();
        data.extend(hex::decode(FRAME_1).unwrap());
        data.resize(data.len() + 504, PAD_BYTE);
        data
    }

    #[test]
    fn decode_two_hit_readout() {
        let readout = Readout::decode(&mock_readout(), Some(42.0)).unwrap();
        assert_eq!(readout.num_hits(), 2);
        assert_eq!(readout.len(), 2 * FRAME_LENGTH);
        assert_eq!(readout.to_string(), "Readout(2 hits, 32 bytes)");

        let hit0 = &readout.hits[0];
        assert_eq!(
            (hit0.chip_id, hit0.payload, hit0.row, hit0.column),
            (0, 7, 0, 5)
        );
        assert_eq!(hit0.tot_us, 162.75);
        assert_eq!(hit0.timestamp, Some(42.0));

        let hit1 = &readout.hits[1];
        assert_eq!(
            (hit1.chip_id, hit1.payload, hit1.row, hit1.column),
            (0, 7, 0, 5)
        );
        assert_eq!(hit1.tot_us, 332.65);
    }

    #[test]
    fn all_padding_decodes_to_zero_hits() {
        let readout = Readout::decode(&[PAD_BYTE; 512], None).unwrap();
        assert_eq!(readout.num_hits(), 0);
        assert!(readout.is_empty());
    }

    #[test]
    fn empty_buffer_decodes_to_zero_hits() {
        let readout = Readout::decode(&[], None).unwrap();
        assert_eq!(readout.num_hits(), 0);
    }

    #[test]
    fn length_not_a_multiple_of_frame_length() {
        // One frame with a byte chopped off the end, then padding.
        let mut data = hex::decode(FRAME_0).unwrap();
        data.truncate(FRAME_LENGTH - 1);
        data.resize(64, PAD_BYTE);
        assert!(matches!(
            Readout::decode(&data, None),
            Err(Error::FrameLength {
                length: 15,
                frame_length: 16
            })
        ));
    }

    #[test]
    fn wrong_frame_header() {
        let mut data = mock_readout();
        data[0] = 0xab;
        assert!(matches!(
            Readout::decode(&data, None),
            Err(Error::FrameHeader { found: [0xab, 0xbc], .. })
        ));
    }

    #[test]
    fn wrong_frame_trailer() {
        let mut data = mock_readout();
        // last trailer byte of the first frame
        data[FRAME_LENGTH - 1] = 0x00;
        assert!(matches!(
            Readout::decode(&data, None),
            Err(Error::FrameTrailer { .. })
        ));
    }

    #[test]
    fn strip_padding_only_trims_the_right_end() {
        assert_eq!(strip_padding(&[0xff, 0xff]), &[] as &[u8]);
        assert_eq!(strip_padding(&[0x01, 0xff, 0x02, 0xff]), [0x01, 0xff, 0x02]);
        assert_eq!(strip_padding(&[]), &[] as &[u8]);
    }
}
