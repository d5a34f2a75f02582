/// Events posted by [`crate::stream::Stream`] onto the `mpsc::Sender<Event>`
/// supplied to `Stream::start`, standing in for the "opaque event queue" of
/// §6 without inventing a new external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The stream worker exited, for any reason: clean EOF, a sink push
    /// failure, a protocol violation, or an explicit `stop()`.
    StreamStopped,
}
