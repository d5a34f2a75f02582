mod decoder;
mod error;
mod event;
mod ffi;
mod framing;
mod frame;
mod h264;
mod init;
mod packet;
mod recorder;
mod sink;
mod stream;
mod time;
mod video_buffer;

pub use decoder::{Decoder, DecoderBuilder};
pub use error::Error;
pub use event::Event;
pub use frame::{DecodedFrame, PixelFormat, RawFrame};
pub use init::init;
pub use packet::{Packet, PacketFlags};
pub use recorder::{ContainerFormat, Recorder, RecorderBuilder};
pub use sink::{CodecDescriptor, Interruptible, Sink};
pub use stream::Stream;
pub use time::{pipeline_time_base, Time};
pub use video_buffer::{ConsumerCallbacks, VideoBuffer};

/// Re-export the inner `ffmpeg` library, for callers that need to reach past
/// this crate's [`Sink`] boundary (e.g. to build a renderer around a
/// [`RawFrame`]).
pub use ffmpeg_next as ffmpeg;
