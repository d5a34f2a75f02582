use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::framing;
use crate::h264::AccessUnitParser;
use crate::packet::{Packet, PacketFlags};
use crate::sink::{Interruptible, Sink};

/// Reads framed H.264 off a socket, reassembles it into packets, and fans
/// each one out to a fixed, ordered collection of sinks (§4.1).
///
/// `sinks` receive every packet in declaration order; `interruptibles` is the
/// (usually smaller) subset of those same sinks that also implement
/// [`Interruptible`], woken up by `stop()`. The two lists are accepted
/// separately rather than recovered from one by downcasting, since `Sink`
/// trait objects carry no `Any` bound.
pub struct Stream {
    socket: TcpStream,
    interruptibles: Vec<Arc<dyn Interruptible + Send + Sync>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Stream {
    /// Spawn the worker thread. Fails only if the thread itself could not be
    /// created or the socket could not be cloned for the worker's own use.
    pub fn start(
        socket: TcpStream,
        sinks: Vec<Arc<dyn Sink>>,
        interruptibles: Vec<Arc<dyn Interruptible + Send + Sync>>,
        events: Sender<Event>,
    ) -> Result<Self> {
        let worker_socket = socket.try_clone()?;

        let handle = thread::Builder::new()
            .name("stream-worker".to_string())
            .spawn(move || worker_loop(worker_socket, sinks, events))
            .map_err(|_| Error::Alloc)?;

        Ok(Self {
            socket,
            interruptibles,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Request termination. Idempotent and callable from any thread (§4.1).
    /// Interrupts every interruptible sink, then closes this crate's own
    /// handle to the socket; the worker's blocking read unblocks via the
    /// resulting EOF. No separate wake-up pipe is built (§9).
    pub fn stop(&self) {
        for interruptible in &self.interruptibles {
            interruptible.interrupt();
        }
        if let Ok(clone) = self.socket.try_clone() {
            let _ = clone.shutdown(Shutdown::Both);
        }
    }

    /// Block until the worker thread exits.
    pub fn join(&self) {
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

/// The worker algorithm (§4.1): deframe, parse into access units, push each
/// to every sink in order, and terminate on the first failure of any kind.
fn worker_loop(mut socket: TcpStream, sinks: Vec<Arc<dyn Sink>>, events: Sender<Event>) {
    let mut parser = AccessUnitParser::new();

    'worker: loop {
        let header = match framing::recv_header(&mut socket) {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(err) => {
                tracing::error!("stream worker stopping, failed to read chunk header: {err}");
                break;
            }
        };

        let payload = match framing::recv_payload(&mut socket, header.len) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("stream worker stopping, failed to read chunk payload: {err}");
                break;
            }
        };

        for unit in parser.parse(&payload) {
            let packet = Packet::new(
                unit.payload,
                header.pts,
                header.pts,
                PacketFlags {
                    key_frame: unit.key_frame,
                },
            );

            for sink in &sinks {
                if let Err(err) = sink.push(&packet) {
                    tracing::error!("stream worker stopping, sink rejected packet: {err}");
                    break 'worker;
                }
            }
        }
    }

    let _ = events.send(Event::StreamStopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CodecDescriptor;
    use crate::time::Time;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct RecordingSink {
        pushed: AtomicUsize,
        last_pts: Mutex<Time>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                pushed: AtomicUsize::new(0),
                last_pts: Mutex::new(Time::unset()),
            }
        }
    }

    impl Sink for RecordingSink {
        fn open(&self, _codec: &CodecDescriptor) -> Result<()> {
            Ok(())
        }

        fn push(&self, packet: &Packet) -> Result<()> {
            self.pushed.fetch_add(1, Ordering::SeqCst);
            *self.last_pts.lock().unwrap() = packet.pts();
            Ok(())
        }

        fn close(&self) {}
    }

    #[test]
    fn s3_single_chunk_reaches_sink_with_its_pts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (server_socket, _) = listener.accept().unwrap();

        let sink = Arc::new(RecordingSink::new());
        let sinks: Vec<Arc<dyn Sink>> = vec![sink.clone()];
        let (tx, rx) = mpsc::channel();

        let stream = Stream::start(server_socket, sinks, Vec::new(), tx).unwrap();

        client
            .write_all(&[
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x05, 0x00,
                0x00, 0x00, 0x01, 0x67,
            ])
            .unwrap();
        drop(client);

        assert_eq!(rx.recv().unwrap(), Event::StreamStopped);
        stream.join();

        assert_eq!(sink.pushed.load(Ordering::SeqCst), 1);
        assert_eq!(sink.last_pts.lock().unwrap().value(), Some(1_000));
    }

    #[test]
    fn stop_is_idempotent_and_unblocks_the_worker() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server_socket, _) = listener.accept().unwrap();

        let sinks: Vec<Arc<dyn Sink>> = Vec::new();
        let (tx, rx) = mpsc::channel();
        let stream = Stream::start(server_socket, sinks, Vec::new(), tx).unwrap();

        stream.stop();
        stream.stop();
        assert_eq!(rx.recv().unwrap(), Event::StreamStopped);
        stream.join();
        drop(client);
    }
}
