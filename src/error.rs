extern crate ffmpeg_next as ffmpeg;

use std::error;
use std::fmt;
use std::io;

use ffmpeg::Error as FfmpegError;

/// Errors produced anywhere in the pipeline: stream reading and framing, the
/// recorder, and the decoder sink. Some variants wrap the `ffmpeg` backend
/// directly in [`Error::BackendError`].
#[derive(Debug)]
pub enum Error {
    /// The socket was closed (or reached EOF) before a full frame header or
    /// payload could be read.
    Io(io::Error),
    /// A chunk header declared a payload length of zero, which violates the
    /// wire protocol.
    EmptyPayload,
    /// A sink rejected a packet or closed before the stream was done pushing
    /// to it.
    SinkFailed,
    /// The first packet pushed to the recorder did not carry the unset PTS
    /// sentinel, i.e. it was not a config packet.
    NotAConfigPacket,
    /// The requested container format is not a muxer this crate supports.
    MuxerUnavailable,
    /// No decoder is registered for the requested codec.
    DecoderUnavailable,
    /// Allocating a codec, format, or buffer context failed.
    Alloc,
    /// Opening the output file for write failed.
    OpenFailed,
    /// A push was attempted after the component already failed.
    AlreadyFailed,
    /// A push was attempted after `close` was called.
    Closed,
    /// The extradata carried by the config packet could not be parsed.
    InvalidExtraData,
    /// The stream ended before a single packet was read.
    ReadExhausted,
    /// Error surfaced by the `ffmpeg` backend (codec, muxer, or scaler).
    BackendError(FfmpegError),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(internal) => Some(internal),
            Error::BackendError(internal) => Some(internal),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(internal) => write!(f, "socket I/O error: {internal}"),
            Error::EmptyPayload => write!(f, "chunk header declares zero-length payload"),
            Error::SinkFailed => write!(f, "sink push failed"),
            Error::NotAConfigPacket => write!(f, "first packet is not a config packet"),
            Error::MuxerUnavailable => write!(f, "requested container format has no muxer"),
            Error::DecoderUnavailable => write!(f, "no decoder registered for requested codec"),
            Error::Alloc => write!(f, "allocation failed"),
            Error::OpenFailed => write!(f, "failed to open output for write"),
            Error::AlreadyFailed => write!(f, "recorder has already failed, rejecting push"),
            Error::Closed => write!(f, "component is closed"),
            Error::InvalidExtraData => write!(f, "codec parameters extradata is corrupted"),
            Error::ReadExhausted => write!(f, "stream exhausted"),
            Error::BackendError(internal) => internal.fmt(f),
        }
    }
}

impl From<FfmpegError> for Error {
    fn from(internal: FfmpegError) -> Error {
        Error::BackendError(internal)
    }
}

impl From<io::Error> for Error {
    fn from(internal: io::Error) -> Error {
        Error::Io(internal)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
