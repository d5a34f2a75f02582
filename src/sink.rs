extern crate ffmpeg_next as ffmpeg;

use ffmpeg::codec::Id as AvCodecId;
use ffmpeg::format::pixel::Pixel as AvPixel;

use crate::error::Result;
use crate::packet::Packet;

/// Describes the codec a [`Sink`] is being opened for: the `codec`
/// parameter mentioned throughout the component design. For this crate the
/// codec is always H.264/YUV420P, but the type exists so a sink
/// implementation is not hardcoded to that choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub id: AvCodecId,
    pub pixel_format: AvPixel,
    pub width: u32,
    pub height: u32,
}

impl CodecDescriptor {
    /// An H.264/YUV420P descriptor for the given declared frame size.
    pub fn h264_yuv420p(width: u32, height: u32) -> Self {
        Self {
            id: AvCodecId::H264,
            pixel_format: AvPixel::YUV420P,
            width,
            height,
        }
    }
}

/// A packet consumer the [`crate::stream::Stream`] worker pushes every
/// access unit into, in a fixed declaration order (§4.1, §5).
///
/// Each sink owns its own internal concurrency: the recorder sink hands
/// packets to an asynchronous writer thread and returns immediately; the
/// decoder sink processes synchronously on the calling (stream worker)
/// thread. Both expose the same `open / push / close` contract so the
/// stream can treat them uniformly.
pub trait Sink: Send + Sync {
    /// Acquire whatever resources this sink needs (a codec context, a file,
    /// a muxer) before the first `push`.
    fn open(&self, codec: &CodecDescriptor) -> Result<()>;

    /// Consume one packet. Implementations that need to retain the packet
    /// past this call must clone it (cloning a [`Packet`] is cheap: its
    /// payload is reference-counted).
    fn push(&self, packet: &Packet) -> Result<()>;

    /// Release resources acquired in `open`. Must be safe to call even if
    /// `open` was never called or already failed.
    fn close(&self);
}

/// A capability exposed by sinks that can be unblocked mid-wait for a clean
/// shutdown. In this crate only the decoder sink implements it, to unblock
/// a renderer blocked waiting on the video buffer (§4.1, §9).
pub trait Interruptible {
    fn interrupt(&self);
}
