//! Frame layout and decoding.
//!
//! A frame is `sensor_count` little-endian IEEE-754 f32 values, optionally
//! followed by the bank's stop sequence. Every 4-byte pattern is a valid f32,
//! so the only way a frame can fail to decode is a length mismatch.

use crate::error::DecodeError;

/// Bytes per encoded reading.
pub const BYTES_PER_READING: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub sensor_count: usize,
    pub stop_sequence: Vec<u8>,
    /// Bytes read per frame, terminator included when the sender emits one.
    pub payload_len: usize,
}

impl FrameLayout {
    /// Layout with the usual payload length: readings plus terminator.
    pub fn new(sensor_count: usize, stop_sequence: &[u8]) -> Self {
        Self {
            sensor_count,
            stop_sequence: stop_sequence.to_vec(),
            payload_len: sensor_count * BYTES_PER_READING + stop_sequence.len(),
        }
    }

    /// Bytes occupied by the readings alone.
    #[inline]
    pub fn reading_bytes(&self) -> usize {
        self.sensor_count * BYTES_PER_READING
    }
}

/// Decode one frame into `layout.sensor_count` readings.
///
/// A trailing stop sequence is stripped first if present.
pub fn decode(frame: &[u8], layout: &FrameLayout) -> Result<Vec<f32>, DecodeError> {
    let body = frame
        .strip_suffix(layout.stop_sequence.as_slice())
        .unwrap_or(frame);
    let expected = layout.reading_bytes();
    if body.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: body.len(),
        });
    }
    Ok(body
        .chunks_exact(BYTES_PER_READING)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encode readings the way a bank transmits them. Used by simulators and tests.
pub fn encode(readings: &[f32], stop_sequence: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(readings.len() * BYTES_PER_READING + stop_sequence.len());
    for r in readings {
        out.extend_from_slice(&r.to_le_bytes());
    }
    out.extend_from_slice(stop_sequence);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn decodes_two_sensor_frame() {
        let layout = FrameLayout::new(2, b"\r\n");
        assert_eq!(layout.payload_len, 10);
        let mut frame = Vec::new();
        frame.extend_from_slice(&1.5f32.to_le_bytes());
        frame.extend_from_slice(&2.5f32.to_le_bytes());
        frame.extend_from_slice(b"\r\n");
        assert_eq!(decode(&frame, &layout).unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn terminator_is_optional() {
        let layout = FrameLayout::new(1, b"\r\n");
        assert_eq!(decode(&0.25f32.to_le_bytes(), &layout).unwrap(), vec![0.25]);
    }

    #[rstest]
    #[case(&[0u8; 7][..])]
    #[case(&[0u8; 9][..])]
    #[case(&[0u8; 12][..])]
    #[case(&[][..])]
    fn wrong_length_is_rejected(#[case] frame: &[u8]) {
        let layout = FrameLayout::new(2, b"\r\n");
        let err = decode(frame, &layout).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                expected: 8,
                actual: frame.len()
            }
        );
    }

    #[test]
    fn mismatched_terminator_counts_toward_length() {
        let layout = FrameLayout::new(2, b"\r\n");
        let mut frame = encode(&[1.0, 2.0], b"");
        frame.extend_from_slice(b"\n\r");
        assert!(matches!(
            decode(&frame, &layout),
            Err(DecodeError::LengthMismatch { expected: 8, actual: 10 })
        ));
    }

    #[test]
    fn nan_bit_patterns_decode() {
        let layout = FrameLayout::new(1, b"\r\n");
        let frame = encode(&[f32::NAN], b"\r\n");
        assert!(decode(&frame, &layout).unwrap()[0].is_nan());
    }
}
