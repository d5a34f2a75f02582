extern crate ffmpeg_next as ffmpeg;

use std::sync::{Arc, Mutex};

use ffmpeg::codec::context::Context as AvContext;
use ffmpeg::codec::decoder::Video as AvDecoder;
use ffmpeg::codec::packet::Packet as AvPacket;
use ffmpeg::util::error::EAGAIN;
use ffmpeg::{Error as AvError, Rational as AvRational};

use crate::error::{Error, Result};
use crate::ffi;
use crate::frame::{DecodedFrame, RawFrame};
use crate::packet::Packet;
use crate::sink::{CodecDescriptor, Interruptible, Sink};
use crate::time::Time;
use crate::video_buffer::VideoBuffer;

/// Maximum number of `receive_frame` invocations attempted when draining the
/// decoder at `close`, mirroring the teacher's `DecoderSplit` drop-time
/// drain loop.
const MAX_DRAIN_ITERATIONS: u32 = 100;

/// Builds a [`Decoder`].
pub struct DecoderBuilder {
    video_buffer: Arc<VideoBuffer>,
}

impl DecoderBuilder {
    /// Create a decoder that deposits frames into `video_buffer`.
    pub fn new(video_buffer: Arc<VideoBuffer>) -> Self {
        Self { video_buffer }
    }

    pub fn build(self) -> Decoder {
        Decoder {
            video_buffer: self.video_buffer,
            state: Mutex::new(None),
        }
    }
}

/// The decoder sink: drives an `ffmpeg` codec context and offers each
/// resulting frame into a [`VideoBuffer`].
///
/// `push` is only ever called from the stream worker thread, but `state` is
/// still held behind a [`Mutex`] rather than requiring `&mut self`, so that
/// `Decoder` can implement [`Sink`] the same way the asynchronous recorder
/// does: by interior mutability, never by requiring exclusive access at the
/// call site.
pub struct Decoder {
    video_buffer: Arc<VideoBuffer>,
    state: Mutex<Option<State>>,
}

struct State {
    decoder: AvDecoder,
    time_base: AvRational,
}

impl Sink for Decoder {
    fn open(&self, codec: &CodecDescriptor) -> Result<()> {
        let av_codec = ffmpeg::decoder::find(codec.id).ok_or(Error::DecoderUnavailable)?;
        let mut context = ffi::codec_context_as(&av_codec)?;
        ffi::set_decoder_context_time_base(&mut context, crate::time::pipeline_time_base());

        let decoder = context.decoder().video().map_err(Error::BackendError)?;
        let time_base = decoder.time_base();

        *self.state.lock().unwrap() = Some(State { decoder, time_base });
        Ok(())
    }

    fn push(&self, packet: &Packet) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = guard.as_mut().ok_or(Error::Closed)?;

        let mut av_packet = AvPacket::copy(packet.payload());
        av_packet.set_pts(packet.pts().rescale(state.time_base));
        av_packet.set_dts(packet.dts().rescale(state.time_base));

        state
            .decoder
            .send_packet(&av_packet)
            .map_err(Error::BackendError)?;

        if let Some(frame) = receive_frame(&mut state.decoder)? {
            let pts = Time::from_rescaled(frame.pts(), state.time_base);
            self.video_buffer
                .producer_offer_frame(DecodedFrame::new(frame, pts));
        }

        Ok(())
    }

    fn close(&self) {
        if let Some(mut state) = self.state.lock().unwrap().take() {
            if state.decoder.send_eof().is_ok() {
                for _ in 0..MAX_DRAIN_ITERATIONS {
                    match receive_frame(&mut state.decoder) {
                        Ok(Some(frame)) => {
                            let pts = Time::from_rescaled(frame.pts(), state.time_base);
                            self.video_buffer
                                .producer_offer_frame(DecodedFrame::new(frame, pts));
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
            }
        }
    }
}

impl Interruptible for Decoder {
    /// Unblocks a renderer that may be blocked consuming from the video
    /// buffer (§4.1, §9); this decoder itself never blocks on `push`.
    fn interrupt(&self) {
        self.video_buffer.interrupt();
    }
}

/// Attempt one frame receive. `EAGAIN` ("more input needed") is not an
/// error (§4.4); any other backend error is fatal.
fn receive_frame(decoder: &mut AvDecoder) -> Result<Option<RawFrame>> {
    let mut frame = RawFrame::empty();
    match decoder.receive_frame(&mut frame) {
        Ok(()) => Ok(Some(frame)),
        Err(AvError::Other { errno }) if errno == EAGAIN => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_without_open_is_a_no_op() {
        let decoder = DecoderBuilder::new(Arc::new(VideoBuffer::new())).build();
        decoder.close();
    }

    #[test]
    fn push_before_open_is_closed_error() {
        let decoder = DecoderBuilder::new(Arc::new(VideoBuffer::new())).build();
        let packet = Packet::new(
            Arc::from(&b"\x00\x00\x00\x01\x67"[..]),
            Time::unset(),
            Time::unset(),
            Default::default(),
        );
        assert!(matches!(decoder.push(&packet), Err(Error::Closed)));
    }
}
