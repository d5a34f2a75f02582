use std::sync::Arc;

use crate::time::Time;

/// Flags carried alongside a [`Packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags {
    /// Set iff the H.264 parser reported this access unit as a keyframe
    /// (an IDR slice).
    pub key_frame: bool,
}

/// A single access unit, reconstructed by the stream parser from the wire
/// framing, on its way to the decoder and/or recorder sinks.
///
/// The payload is reference-counted (`Arc<[u8]>`): constructing a [`Packet`]
/// allocates once, and every sink that needs to retain it past the lifetime
/// of a `push` call clones the `Arc` rather than copying bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    payload: Arc<[u8]>,
    pts: Time,
    dts: Time,
    duration: Time,
    flags: PacketFlags,
}

impl Packet {
    /// Construct a new packet. The stream sets `pts` and `dts` to the same
    /// value, since the wire protocol carries only one timestamp per chunk
    /// (see `Stream`'s design note on PTS propagation).
    pub fn new(payload: Arc<[u8]>, pts: Time, dts: Time, flags: PacketFlags) -> Self {
        Self {
            payload,
            pts,
            dts,
            duration: Time::unset(),
            flags,
        }
    }

    /// Presentation timestamp, or unset for a config packet.
    pub fn pts(&self) -> Time {
        self.pts
    }

    /// Decode timestamp.
    pub fn dts(&self) -> Time {
        self.dts
    }

    /// Duration, if one has been inferred (only ever set by the recorder's
    /// writer thread on its private copy, never by the stream).
    pub fn duration(&self) -> Time {
        self.duration
    }

    /// Set the inferred duration. Used exclusively by the recorder writer
    /// thread's duration-inference step; packets handed to the decoder sink
    /// never have a duration set.
    pub fn set_duration(&mut self, duration: Time) {
        self.duration = duration;
    }

    /// The raw access-unit bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Byte size of the payload.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Whether this packet carries a config payload (extradata) rather than
    /// frame data. A config packet always has an unset PTS.
    pub fn is_config(&self) -> bool {
        !self.pts.has_value()
    }

    /// Whether the H.264 parser reported this access unit as a keyframe.
    pub fn key_frame(&self) -> bool {
        self.flags.key_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_packet_has_unset_pts() {
        let packet = Packet::new(
            Arc::from(&b"\x67"[..]),
            Time::unset(),
            Time::unset(),
            PacketFlags::default(),
        );
        assert!(packet.is_config());
    }

    #[test]
    fn data_packet_with_pts_is_not_config() {
        let packet = Packet::new(
            Arc::from(&b"\xaa"[..]),
            Time::micros(1_000),
            Time::micros(1_000),
            PacketFlags { key_frame: true },
        );
        assert!(!packet.is_config());
        assert!(packet.key_frame());
    }
}
