//! Variable-length quantity encoding.
//!
//! MIDI delta-times and meta-event payload lengths are stored as big-endian
//! 7-bit groups: the high bit of every byte except the last is set to signal
//! continuation. Zero encodes as a single zero byte.

/// Encode `value` as a minimal variable-length quantity.
///
/// # Example
/// ```
/// use cantus::midi::vlq;
///
/// assert_eq!(vlq::encode(0), vec![0x00]);
/// assert_eq!(vlq::encode(127), vec![0x7f]);
/// assert_eq!(vlq::encode(128), vec![0x81, 0x00]);
/// ```
pub fn encode(value: u32) -> Vec<u8> {
    let mut groups = vec![(value & 0x7f) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }
    groups.reverse();
    groups
}

/// Decode a variable-length quantity from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// input ends before a byte without the continuation bit.
pub fn decode(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value = (value << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x81, 0x00]);
        assert_eq!(encode(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode(0x4000), vec![0x81, 0x80, 0x00]);
        // largest four-byte quantity
        assert_eq!(encode(0x0fff_ffff), vec![0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn continuation_bits_set_on_all_but_last() {
        let bytes = encode(0x4000);
        let (last, rest) = bytes.split_last().unwrap();
        assert!(rest.iter().all(|b| b & 0x80 != 0));
        assert_eq!(last & 0x80, 0);
    }

    #[test]
    fn decode_inverts_encode() {
        for value in [0u32, 1, 72, 127, 128, 288, 500_000, 0x3fff, 0x4000, 0x0fff_ffff] {
            let bytes = encode(value);
            assert_eq!(decode(&bytes), Some((value, bytes.len())));
        }
    }

    #[test]
    fn decode_reports_consumed_length_with_trailing_data() {
        let mut bytes = encode(300);
        bytes.extend_from_slice(&[0x90, 0x3c, 0x64]);
        assert_eq!(decode(&bytes), Some((300, 2)));
    }

    #[test]
    fn decode_fails_on_unterminated_input() {
        assert_eq!(decode(&[0x81]), None);
        assert_eq!(decode(&[]), None);
    }
}
