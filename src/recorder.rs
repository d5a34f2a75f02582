extern crate ffmpeg_next as ffmpeg;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use ffmpeg::codec::packet::Packet as AvPacket;
use ffmpeg::format::context::Output as AvOutput;
use ffmpeg::Rational as AvRational;

use crate::error::{Error, Result};
use crate::ffi;
use crate::packet::Packet;
use crate::sink::{CodecDescriptor, Sink};
use crate::time::Time;

/// An arbitrary fallback duration assigned to the final packet of a
/// recording, for which no successor exists to infer a duration from (§4.2).
const FALLBACK_DURATION_MICROS: i64 = 100_000;

/// Container format a [`Recorder`] can mux into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    Matroska,
}

impl ContainerFormat {
    fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Matroska => "matroska",
        }
    }
}

/// Builds a [`Recorder`].
pub struct RecorderBuilder {
    filename: PathBuf,
    format: ContainerFormat,
}

impl RecorderBuilder {
    /// Create a recorder that will write to `filename` in `format` once
    /// opened.
    pub fn new(filename: impl AsRef<Path>, format: ContainerFormat) -> Self {
        Self {
            filename: filename.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn build(self) -> Recorder {
        Recorder {
            filename: self.filename,
            format: self.format,
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    packets: VecDeque::new(),
                    stopped: false,
                    failed: false,
                }),
                cond: Condvar::new(),
            }),
            writer: Mutex::new(None),
        }
    }
}

/// The recorder sink: hands packets to an asynchronous writer thread over a
/// FIFO queue, so that a producer thread (the stream worker) never blocks on
/// disk I/O.
pub struct Recorder {
    filename: PathBuf,
    format: ContainerFormat,
    shared: Arc<Shared>,
    writer: Mutex<Option<thread::JoinHandle<()>>>,
}

/// State shared between the `Recorder` handle and its writer thread.
struct Shared {
    queue: Mutex<Queue>,
    cond: Condvar,
}

struct Queue {
    packets: VecDeque<Packet>,
    stopped: bool,
    failed: bool,
}

/// State touched exclusively by the writer thread after `open` (§4.2, §5):
/// the muxer context, the one-slot duration-inference lookahead, and the
/// header-written flag.
struct WriterState {
    output: AvOutput,
    stream_index: usize,
    prev: Option<Packet>,
    header_written: bool,
}

impl Recorder {
    /// Whether the recorder has hit a fatal error (§4.2/§8 invariant 4:
    /// monotonic once set). Meaningful to call once `close()` has returned.
    pub fn has_failed(&self) -> bool {
        self.shared.queue.lock().unwrap().failed
    }
}

impl Sink for Recorder {
    fn open(&self, codec: &CodecDescriptor) -> Result<()> {
        let mut output = ffmpeg::format::output_as(&self.filename, self.format.muxer_name())
            .map_err(|_| Error::OpenFailed)?;

        let av_codec = ffmpeg::encoder::find(codec.id);
        let mut stream = output.add_stream(av_codec).map_err(Error::BackendError)?;
        ffi::set_video_stream_parameters(&mut stream, codec);
        let stream_index = stream.index();

        ffi::set_format_metadata(
            &mut output,
            "comment",
            &format!(
                "Recorded by {} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
        )?;

        let state = WriterState {
            output,
            stream_index,
            prev: None,
            header_written: false,
        };

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("recorder-writer".to_string())
            .spawn(move || writer_loop(shared, state))
            .map_err(|_| Error::Alloc)?;

        *self.writer.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn push(&self, packet: &Packet) -> Result<()> {
        let mut queue = self.shared.queue.lock().unwrap();
        if queue.failed {
            return Err(Error::AlreadyFailed);
        }
        assert!(!queue.stopped, "push called on recorder after close");
        queue.packets.push_back(packet.clone());
        self.shared.cond.notify_one();
        Ok(())
    }

    fn close(&self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.stopped = true;
        }
        self.shared.cond.notify_one();
        if let Some(handle) = self.writer.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

/// The writer thread body: drains the queue, infers durations via a one-slot
/// lookahead, writes each packet, and finalizes the container on exit.
fn writer_loop(shared: Arc<Shared>, mut state: WriterState) {
    loop {
        let curr = {
            let mut queue = shared.queue.lock().unwrap();
            while queue.packets.is_empty() && !queue.stopped {
                queue = shared.cond.wait(queue).unwrap();
            }
            queue.packets.pop_front()
        };

        let curr = match curr {
            Some(curr) => curr,
            None => break,
        };

        if let Err(err) = process(&mut state, curr) {
            tracing::error!("recorder write failed, aborting recording: {err}");
            let mut queue = shared.queue.lock().unwrap();
            queue.failed = true;
            queue.packets.clear();
            return;
        }
    }

    let mut final_write_failed_before_header = false;
    if let Some(mut prev) = state.prev.take() {
        prev.set_duration(Time::micros(FALLBACK_DURATION_MICROS));
        let header_written_before = state.header_written;
        if let Err(err) = write_packet(&mut state, &prev) {
            if header_written_before {
                tracing::warn!("failed to write final packet, recording may be missing its last frame: {err}");
            } else {
                tracing::error!("{err}");
                final_write_failed_before_header = true;
            }
        }
    }

    if final_write_failed_before_header {
        let mut queue = shared.queue.lock().unwrap();
        queue.failed = true;
        return;
    }

    if state.header_written {
        if let Err(err) = state.output.write_trailer() {
            tracing::error!("failed to write container trailer: {err}");
            let mut queue = shared.queue.lock().unwrap();
            queue.failed = true;
        } else {
            tracing::info!("recording complete: {}", state.output.format().name());
        }
    } else {
        let mut queue = shared.queue.lock().unwrap();
        queue.failed = true;
    }
}

/// Duration inference (§4.2): `curr` becomes the new lookahead slot; the
/// previous occupant, now that its successor's PTS is known, is written out
/// with an inferred duration.
fn process(state: &mut WriterState, curr: Packet) -> Result<()> {
    match state.prev.take() {
        None => {
            state.prev = Some(curr);
            Ok(())
        }
        Some(mut prev) => {
            if let Some(delta) = curr.pts() - prev.pts() {
                prev.set_duration(Time::micros(delta));
            }
            write_packet(state, &prev)?;
            state.prev = Some(curr);
            Ok(())
        }
    }
}

/// Write protocol (§4.2): install extradata and write the container header
/// on the first write; silently drop a mid-stream config packet; otherwise
/// rescale and submit to the muxer.
fn write_packet(state: &mut WriterState, packet: &Packet) -> Result<()> {
    if !state.header_written {
        if !packet.is_config() {
            return Err(Error::NotAConfigPacket);
        }
        let mut stream = state
            .output
            .stream_mut(state.stream_index)
            .ok_or(Error::MuxerUnavailable)?;
        ffi::set_stream_extradata(&mut stream, packet.payload())?;
        state.output.write_header().map_err(Error::BackendError)?;
        state.header_written = true;
        return Ok(());
    }

    if packet.is_config() {
        return Ok(());
    }

    let stream_time_base: AvRational = state
        .output
        .stream(state.stream_index)
        .ok_or(Error::MuxerUnavailable)?
        .time_base();

    let mut av_packet = AvPacket::copy(packet.payload());
    av_packet.set_stream(state.stream_index);
    av_packet.set_pts(packet.pts().rescale(stream_time_base));
    av_packet.set_dts(packet.dts().rescale(stream_time_base));
    if let Some(duration) = packet.duration().rescale(stream_time_base) {
        av_packet.set_duration(duration);
    }
    av_packet.write(&mut state.output).map_err(Error::BackendError)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketFlags;
    use std::sync::Arc as StdArc;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "camrelay-recorder-test-{}-{}",
            std::process::id(),
            name
        ));
        path
    }

    fn config_packet(payload: &[u8]) -> Packet {
        Packet::new(
            StdArc::from(payload),
            Time::unset(),
            Time::unset(),
            PacketFlags::default(),
        )
    }

    fn data_packet(pts_micros: i64, payload: &[u8], key_frame: bool) -> Packet {
        Packet::new(
            StdArc::from(payload),
            Time::micros(pts_micros),
            Time::micros(pts_micros),
            PacketFlags { key_frame },
        )
    }

    #[test]
    fn s1_clean_two_frame_record() {
        let path = temp_path("s1.mp4");
        let recorder = RecorderBuilder::new(&path, ContainerFormat::Mp4).build();
        recorder
            .open(&CodecDescriptor::h264_yuv420p(64, 64))
            .unwrap();

        recorder.push(&config_packet(&[0x01, 0x02, 0x03, 0x04])).unwrap();
        recorder.push(&data_packet(1_000, &[0xAA], true)).unwrap();
        recorder.push(&data_packet(4_000, &[0xBB], false)).unwrap();
        recorder.close();

        assert!(path.exists());
        assert!(!recorder.has_failed());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn s4_bad_first_packet_fails() {
        let path = temp_path("s4.mp4");
        let recorder = RecorderBuilder::new(&path, ContainerFormat::Mp4).build();
        recorder
            .open(&CodecDescriptor::h264_yuv420p(64, 64))
            .unwrap();

        recorder.push(&data_packet(500, &[0xAA], true)).unwrap();
        recorder.close();

        assert!(recorder.has_failed());
        assert!(matches!(
            recorder.push(&config_packet(&[0x01])),
            Err(Error::AlreadyFailed)
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn s5_drains_queue_on_shutdown() {
        let path = temp_path("s5.mp4");
        let recorder = RecorderBuilder::new(&path, ContainerFormat::Mp4).build();
        recorder
            .open(&CodecDescriptor::h264_yuv420p(64, 64))
            .unwrap();

        recorder.push(&config_packet(&[0x01, 0x02])).unwrap();
        for i in 0..10 {
            recorder
                .push(&data_packet(1_000 * (i + 1), &[0xAA], i == 0))
                .unwrap();
        }
        recorder.close();

        assert!(!recorder.has_failed());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn monotonic_failure_rejects_every_push_after_it_is_set() {
        // Universal invariant 4 (§8): once `failed` is set it is never
        // cleared, and every subsequent push is rejected. Drives the
        // recorder through the same bad-first-packet failure as S4, then
        // pushes several more packets before `close` to confirm none of
        // them get a chance to reach the writer thread.
        let path = temp_path("monotonic.mp4");
        let recorder = RecorderBuilder::new(&path, ContainerFormat::Mp4).build();
        recorder
            .open(&CodecDescriptor::h264_yuv420p(64, 64))
            .unwrap();

        recorder.push(&data_packet(500, &[0xAA], true)).unwrap();
        recorder.close();

        for i in 0..5 {
            assert!(matches!(
                recorder.push(&data_packet(i, &[0xBB], false)),
                Err(Error::AlreadyFailed)
            ));
        }
        assert!(recorder.has_failed());
    }
}
