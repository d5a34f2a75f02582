//! A minimal H.264 Annex B parser configured for complete-frame input.
//!
//! Scans NAL unit start codes in every incoming chunk to classify it as a
//! keyframe or not; extradata bytes themselves are stored and handed to the
//! muxer opaquely, without parsing out individual parameter sets.

use std::sync::Arc;

/// NAL unit type 5: coded slice of an IDR picture.
const NAL_TYPE_IDR_SLICE: u8 = 5;

/// A fully-delimited access unit emitted by [`AccessUnitParser::parse`].
pub struct AccessUnit {
    pub payload: Arc<[u8]>,
    pub key_frame: bool,
}

/// Parses chunks that are already known to contain complete access units
/// (the stream's socket framing guarantees this per the wire protocol) into
/// [`AccessUnit`]s, classifying each one as a keyframe or not by scanning its
/// NAL units.
///
/// Real H.264 parsers (e.g. libavcodec's in `PARSER_FLAG_COMPLETE_FRAMES`
/// mode) can in principle split or merge NAL units across calls; since this
/// crate's wire protocol already guarantees one complete access unit per
/// chunk, this parser never needs to buffer across calls and is stateless.
#[derive(Debug, Default)]
pub struct AccessUnitParser;

impl AccessUnitParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one chunk payload into zero or more access units. The wire
    /// protocol guarantees `size > 0` and complete framing (§3), so every
    /// non-empty chunk is always one access unit; the NAL scan is only
    /// consulted to classify it as a keyframe, never to decide whether to
    /// emit it.
    pub fn parse(&mut self, data: &[u8]) -> Vec<AccessUnit> {
        if data.is_empty() {
            return Vec::new();
        }

        let key_frame = nal_units(data).any(|nal| nal_type(nal) == NAL_TYPE_IDR_SLICE);

        vec![AccessUnit {
            payload: Arc::from(data),
            key_frame,
        }]
    }
}

/// NAL unit type of a NAL (the low 5 bits of its first byte).
fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map(|byte| byte & 0x1f).unwrap_or(0)
}

/// Iterate over the NAL units (start code stripped) contained in `bytes`.
fn nal_units(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut index = find_start_code(bytes, 0).map(|(_, next)| next);
    std::iter::from_fn(move || {
        let start = index?;
        let (end, next) = match find_start_code(bytes, start) {
            Some((end, next)) => (end, Some(next)),
            None => (bytes.len(), None),
        };
        index = next;
        Some(&bytes[start..end])
    })
}

/// Find the next Annex B start code (`00 00 01` or `00 00 00 01`) at or after
/// `offset`. Returns `(start, end)`: the index of the first byte of the
/// start code, and the index of the first byte after it.
fn find_start_code(bytes: &[u8], offset: usize) -> Option<(usize, usize)> {
    let part = bytes.get(offset..)?;
    if part.len() < 3 {
        return None;
    }
    for i in 0..=(part.len() - 3) {
        if part[i..i + 3] == [0x00, 0x00, 0x01] {
            return Some((offset + i, offset + i + 3));
        }
        if i + 4 <= part.len() && part[i..i + 4] == [0x00, 0x00, 0x00, 0x01] {
            return Some((offset + i, offset + i + 4));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_idr_slice_is_keyframe() {
        let mut parser = AccessUnitParser::new();
        let mut data = vec![0x00, 0x00, 0x00, 0x01];
        data.push((NAL_TYPE_IDR_SLICE) | 0x60); // nal_ref_idc=3, type=5
        data.extend_from_slice(&[0xAA, 0xBB]);
        let units = parser.parse(&data);
        assert_eq!(units.len(), 1);
        assert!(units[0].key_frame);
        assert_eq!(&*units[0].payload, &data[..]);
    }

    #[test]
    fn sps_only_chunk_is_not_keyframe() {
        let mut parser = AccessUnitParser::new();
        let data = vec![0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F];
        let units = parser.parse(&data);
        assert_eq!(units.len(), 1);
        assert!(!units[0].key_frame);
    }

    #[test]
    fn s3_chunk_without_a_start_code_is_still_one_access_unit() {
        // §3: the wire protocol guarantees a complete access unit per
        // chunk; a raw NAL payload with no Annex B start code (as in S3's
        // `DE AD` chunk) must still be emitted, just not as a keyframe.
        let mut parser = AccessUnitParser::new();
        let data = vec![0xDE, 0xAD];
        let units = parser.parse(&data);
        assert_eq!(units.len(), 1);
        assert!(!units[0].key_frame);
        assert_eq!(&*units[0].payload, &data[..]);
    }

    #[test]
    fn empty_chunk_yields_no_access_units() {
        let mut parser = AccessUnitParser::new();
        assert!(parser.parse(&[]).is_empty());
    }
}
