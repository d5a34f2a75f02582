extern crate ffmpeg_next as ffmpeg;

use ffmpeg::codec::codec::Codec;
use ffmpeg::codec::context::Context;
use ffmpeg::format::context::Output;
use ffmpeg::format::stream::StreamMut;
use ffmpeg::{Error as AvError, Rational};

use ffmpeg::ffi::*;

use crate::error::{Error, Result};
use crate::sink::CodecDescriptor;

/// Initialize a new codec context using a specific codec. Not natively
/// supported in the public API: the safe surface only builds a context from
/// an existing stream's parameters, but the decoder sink needs a context for
/// a codec it knows about up front, with no stream to copy from.
///
/// # Arguments
///
/// * `codec` - Codec to initialize with.
pub fn codec_context_as(codec: &Codec) -> Result<Context> {
    unsafe {
        let context_ptr = avcodec_alloc_context3(codec.as_ptr());
        if !context_ptr.is_null() {
            Ok(Context::wrap(context_ptr, None))
        } else {
            Err(Error::Alloc)
        }
    }
}

/// Set the `time_base` field of a decoder context. (Not natively supported
/// in the public API.)
pub fn set_decoder_context_time_base(decoder_context: &mut Context, time_base: Rational) {
    unsafe {
        (*decoder_context.as_mut_ptr()).time_base = time_base.into();
    }
}

/// Set codec id, pixel format, and declared frame size directly on a
/// freshly added output stream's `codecpar`.
///
/// The safe `ffmpeg-next` surface only lets a caller clone codec parameters
/// from an existing (demuxed) stream via `StreamMut::set_parameters` (as
/// `mux.rs`'s `with_stream` does), but has no builder for constructing
/// parameters from scratch, which is exactly the recorder's situation: it
/// only ever receives raw H.264 access units, never an `ffmpeg` stream to
/// clone parameters from.
pub fn set_video_stream_parameters(stream: &mut StreamMut, codec: &CodecDescriptor) {
    unsafe {
        let ptr = (*stream.as_mut_ptr()).codecpar;
        (*ptr).codec_type = AVMEDIA_TYPE_VIDEO;
        (*ptr).codec_id = codec.id.into();
        (*ptr).format = AVPixelFormat::from(codec.pixel_format) as i32;
        (*ptr).width = codec.width as i32;
        (*ptr).height = codec.height as i32;
    }
}

/// Install `extradata` bytes (e.g. H.264 SPS/PPS) on a stream's `codecpar`,
/// mirrors [`extradata`]'s getter in the other direction. Used by the
/// recorder to copy a config packet's payload onto the output stream before
/// writing the container header.
pub fn set_stream_extradata(stream: &mut StreamMut, extradata: &[u8]) -> Result<()> {
    unsafe {
        let ptr = (*stream.as_mut_ptr()).codecpar;
        let buffer = av_malloc(extradata.len() + AV_INPUT_BUFFER_PADDING_SIZE as usize) as *mut u8;
        if buffer.is_null() {
            return Err(Error::Alloc);
        }
        std::ptr::copy_nonoverlapping(extradata.as_ptr(), buffer, extradata.len());
        std::ptr::write_bytes(
            buffer.add(extradata.len()),
            0,
            AV_INPUT_BUFFER_PADDING_SIZE as usize,
        );
        if !(*ptr).extradata.is_null() {
            av_free((*ptr).extradata as *mut std::ffi::c_void);
        }
        (*ptr).extradata = buffer;
        (*ptr).extradata_size = extradata.len() as i32;
    }
    Ok(())
}

/// Set a format-level metadata key/value pair (used to tag the output file
/// with `comment = "Recorded by <app> <version>"`, per §6).
pub fn set_format_metadata(output: &mut Output, key: &str, value: &str) -> Result<()> {
    let key = std::ffi::CString::new(key).map_err(|_| Error::Alloc)?;
    let value = std::ffi::CString::new(value).map_err(|_| Error::Alloc)?;
    unsafe {
        let ret = av_dict_set(
            &mut (*output.as_mut_ptr()).metadata,
            key.as_ptr(),
            value.as_ptr(),
            0,
        );
        if ret < 0 {
            return Err(Error::BackendError(AvError::from(ret)));
        }
    }
    Ok(())
}

/// Initialize the logging handler. This redirects all `ffmpeg` logging to
/// the Rust `tracing` crate and any subscribers to it.
pub fn init_logging() {
    unsafe {
        av_log_set_callback(Some(log_callback));
    }
}

/// Internal function with C-style callback behavior that receives all log
/// messages from `ffmpeg` and forwards them through `tracing`.
unsafe extern "C" fn log_callback(
    avcl: *mut std::ffi::c_void,
    level_no: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    #[cfg(all(target_arch = "x86_64", target_family = "unix"))] vl: *mut __va_list_tag,
    #[cfg(not(all(target_arch = "x86_64", target_family = "unix")))] vl: va_list,
) {
    let event_would_log = match level_no {
        AV_LOG_PANIC | AV_LOG_FATAL | AV_LOG_ERROR => tracing::enabled!(tracing::Level::ERROR),
        AV_LOG_WARNING => tracing::enabled!(tracing::Level::WARN),
        AV_LOG_INFO => tracing::enabled!(tracing::Level::INFO),
        AV_LOG_VERBOSE | AV_LOG_DEBUG => tracing::enabled!(tracing::Level::DEBUG),
        AV_LOG_TRACE => tracing::enabled!(tracing::Level::TRACE),
        _ => return,
    };

    if event_would_log {
        // 1024 bytes is the same buffer size ffmpeg itself uses internally.
        let mut line = [0; 1024];
        let mut print_prefix: std::ffi::c_int = 1;
        let ret = av_log_format_line2(
            avcl,
            level_no,
            fmt,
            vl,
            line.as_mut_ptr(),
            (line.len()) as std::ffi::c_int,
            (&mut print_prefix) as *mut std::ffi::c_int,
        );
        if ret > 0 {
            if let Ok(line) = std::ffi::CStr::from_ptr(line.as_mut_ptr()).to_str() {
                let line = line.trim();
                match level_no {
                    AV_LOG_PANIC | AV_LOG_FATAL | AV_LOG_ERROR => {
                        tracing::error!(target: "camrelay::ffmpeg", "{}", line)
                    }
                    AV_LOG_WARNING => tracing::warn!(target: "camrelay::ffmpeg", "{}", line),
                    AV_LOG_INFO => tracing::info!(target: "camrelay::ffmpeg", "{}", line),
                    AV_LOG_VERBOSE | AV_LOG_DEBUG => {
                        tracing::debug!(target: "camrelay::ffmpeg", "{}", line)
                    }
                    AV_LOG_TRACE => tracing::trace!(target: "camrelay::ffmpeg", "{}", line),
                    _ => {}
                };
            }
        }
    }
}
