extern crate ffmpeg_next as ffmpeg;

use crate::error::Result;
use crate::ffi::init_logging;

/// Initialize global `ffmpeg` state (codec and muxer registries, allocators)
/// and redirect its logging into `tracing`. Call once at process start,
/// before constructing any [`crate::stream::Stream`], [`crate::decoder::Decoder`],
/// or [`crate::recorder::Recorder`] (§9: the pipeline assumes this global
/// state is already initialized).
pub fn init() -> Result<()> {
    ffmpeg::init()?;
    init_logging();
    Ok(())
}
