extern crate ffmpeg_next as ffmpeg;

use ffmpeg::util::format::Pixel as AvPixel;
use ffmpeg::util::frame::Video as AvFrame;

use crate::time::Time;

/// Re-export internal `AvPixel` as `PixelFormat` for callers.
pub type PixelFormat = AvPixel;

/// Re-export internal `AvFrame` for callers that need the raw decoded
/// frame.
pub type RawFrame = AvFrame;

/// A decoded frame together with the presentation timestamp the decoder
/// derived for it, as deposited into the [`crate::video_buffer::VideoBuffer`]
/// by the decoder sink.
pub struct DecodedFrame {
    pub frame: RawFrame,
    pub pts: Time,
}

impl DecodedFrame {
    pub fn new(frame: RawFrame, pts: Time) -> Self {
        Self { frame, pts }
    }
}

// `RawFrame` wraps a raw `AVFrame *`; a `DecodedFrame` is only ever owned by
// one thread at a time (it crosses threads by being moved, not shared), so
// this is sound the same way the teacher's `Packet` and `Reader` are `Send`.
unsafe impl Send for DecodedFrame {}
