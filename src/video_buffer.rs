use std::sync::Mutex;

use crate::frame::DecodedFrame;

/// Callbacks invoked by [`VideoBuffer::producer_offer_frame`], outside the
/// internal lock, from whichever thread called `producer_offer_frame`.
pub trait ConsumerCallbacks: Send + Sync {
    /// A new frame became available to the consumer.
    fn on_frame_available(&self);

    /// The producer offered a frame while a previously-offered frame had not
    /// yet been taken by the consumer; the previous frame was dropped
    /// without being seen.
    fn on_frame_skipped(&self) {}
}

/// A lossy, constant-memory, latest-value hand-off between one producer
/// thread and one consumer thread.
///
/// Three frame slots (`producer`, `pending`, `consumer`) plus one boolean
/// (`pending_consumed`) are enough: the producer only ever writes
/// `producer`, the consumer only ever reads `consumer`, and `pending` is the
/// hand-off slot that crosses the mutex. This is deliberately not
/// generalized into a queue — the consumer must see the *latest* frame, not
/// *every* frame, so intermediate frames are dropped rather than buffered.
pub struct VideoBuffer {
    inner: Mutex<Inner>,
    callbacks: Mutex<Option<Box<dyn ConsumerCallbacks>>>,
}

struct Inner {
    producer: Option<DecodedFrame>,
    pending: Option<DecodedFrame>,
    consumer: Option<DecodedFrame>,
    pending_consumed: bool,
}

/// Whether the callback fired as a result of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfferOutcome {
    FrameAvailable,
    FrameSkipped,
}

impl VideoBuffer {
    /// Allocate a new, empty video buffer. `pending_consumed` starts `true`:
    /// there is no frame available yet, so there is nothing to skip.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                producer: None,
                pending: None,
                consumer: None,
                pending_consumed: true,
            }),
            callbacks: Mutex::new(None),
        }
    }

    /// Register the consumer callbacks. Must be called exactly once, before
    /// the first call to `producer_offer_frame`.
    pub fn set_consumer_callbacks(&self, callbacks: Box<dyn ConsumerCallbacks>) {
        *self.callbacks.lock().unwrap() = Some(callbacks);
    }

    /// Offer a freshly produced frame to the consumer. Writing into the
    /// producer slot and offering it are combined into one call here (taking
    /// the frame by value) rather than requiring a separate in-place write
    /// followed by a no-argument `offer()`, since there is no placement
    /// benefit in Rust for a value this size.
    ///
    /// Drops the previous `pending` frame (and fires `on_frame_skipped`)
    /// if it had not yet been consumed; otherwise fires `on_frame_available`.
    pub fn producer_offer_frame(&self, frame: DecodedFrame) {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            inner.producer = Some(frame);
            // Clear pending's payload reference (dropping it if unconsumed),
            // then swap producer <-> pending.
            inner.pending = None;
            std::mem::swap(&mut inner.producer, &mut inner.pending);
            let was_consumed = std::mem::replace(&mut inner.pending_consumed, false);
            if was_consumed {
                OfferOutcome::FrameAvailable
            } else {
                OfferOutcome::FrameSkipped
            }
        };

        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            match outcome {
                OfferOutcome::FrameAvailable => callbacks.on_frame_available(),
                OfferOutcome::FrameSkipped => callbacks.on_frame_skipped(),
            }
        }
    }

    /// Called by the consumer (typically from `on_frame_available`) to take
    /// the latest offered frame. Panics if called without an unconsumed
    /// pending frame (a single-threaded-consumer invariant violation), or if
    /// no frame has ever been offered.
    pub fn consumer_take_frame(&self) -> DecodedFrame {
        let mut inner = self.inner.lock().unwrap();
        assert!(!inner.pending_consumed, "consumer_take_frame called without a pending frame");
        inner.pending_consumed = true;
        std::mem::swap(&mut inner.consumer, &mut inner.pending);
        inner.pending = None;
        inner
            .consumer
            .take()
            .expect("pending_consumed was false, so a frame must be present")
    }

    /// Unblock any consumer sleeping for frames. In this design consumers
    /// are event-driven via [`ConsumerCallbacks`] and never block inside the
    /// buffer itself; this is a hook for sink implementations (e.g. a
    /// renderer with its own wait loop) that do.
    pub fn interrupt(&self) {}
}

impl Default for VideoBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;
    use ffmpeg_next::util::frame::Video as AvFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frame(pts: i64) -> DecodedFrame {
        DecodedFrame::new(AvFrame::empty(), Time::micros(pts))
    }

    struct Counters {
        available: Arc<AtomicUsize>,
        skipped: Arc<AtomicUsize>,
    }

    impl ConsumerCallbacks for Counters {
        fn on_frame_available(&self) {
            self.available.fetch_add(1, Ordering::SeqCst);
        }

        fn on_frame_skipped(&self) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn s2_three_offers_one_take_skips_two() {
        let buffer = VideoBuffer::new();
        let available = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));
        buffer.set_consumer_callbacks(Box::new(Counters {
            available: available.clone(),
            skipped: skipped.clone(),
        }));

        buffer.producer_offer_frame(frame(1));
        buffer.producer_offer_frame(frame(2));
        buffer.producer_offer_frame(frame(3));

        assert_eq!(available.load(Ordering::SeqCst), 1);
        assert_eq!(skipped.load(Ordering::SeqCst), 2);

        let taken = buffer.consumer_take_frame();
        assert_eq!(taken.pts, Time::micros(3));
    }

    #[test]
    #[should_panic]
    fn take_without_offer_panics() {
        let buffer = VideoBuffer::new();
        buffer.consumer_take_frame();
    }
}
