//! Frame types for the capture-to-worker handoff.

use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A fixed-size chunk of interleaved PCM16 samples delivered by the capture
/// pipeline.
///
/// Frames are immutable once delivered; downstream consumers own a frame only
/// for the duration of its processing.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed, interleaved by channel).
    pub samples: Vec<i16>,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }
}

/// Delivery endpoint handed to a capture source.
///
/// Wraps the bounded frame queue with the session's pause gate: while paused,
/// frames are dropped here, before any processing work is spent on them.
/// `try_send` keeps the real-time capture callback non-blocking; a full queue
/// drops the frame and counts it.
#[derive(Clone)]
pub struct FrameSink {
    tx: Sender<AudioFrame>,
    gate: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    /// Creates a sink feeding `tx`, gated by `gate` (true = paused).
    pub fn new(tx: Sender<AudioFrame>, gate: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            gate,
            sequence: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver one frame of samples.
    ///
    /// Returns true if the frame was enqueued, false if it was dropped
    /// (paused, queue full, or the worker has gone away).
    pub fn deliver(&self, samples: Vec<i16>) -> bool {
        if self.gate.load(Ordering::Acquire) {
            return false;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(AudioFrame::new(samples, sequence)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!(dropped, "frame queue full, dropping capture frames");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Total frames dropped due to a full queue.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn sink_pair(capacity: usize) -> (FrameSink, crossbeam_channel::Receiver<AudioFrame>) {
        let (tx, rx) = bounded(capacity);
        (FrameSink::new(tx, Arc::new(AtomicBool::new(false))), rx)
    }

    #[test]
    fn test_deliver_enqueues_in_order_with_sequence() {
        let (sink, rx) = sink_pair(4);

        assert!(sink.deliver(vec![1]));
        assert!(sink.deliver(vec![2]));
        assert!(sink.deliver(vec![3]));

        assert_eq!(rx.recv().unwrap().sequence, 0);
        assert_eq!(rx.recv().unwrap().sequence, 1);
        let frame = rx.recv().unwrap();
        assert_eq!(frame.sequence, 2);
        assert_eq!(frame.samples, vec![3]);
    }

    #[test]
    fn test_paused_gate_drops_frames() {
        let (tx, rx) = bounded(4);
        let gate = Arc::new(AtomicBool::new(false));
        let sink = FrameSink::new(tx, Arc::clone(&gate));

        assert!(sink.deliver(vec![1]));

        gate.store(true, Ordering::Release);
        assert!(!sink.deliver(vec![2]));
        assert!(!sink.deliver(vec![3]));

        gate.store(false, Ordering::Release);
        assert!(sink.deliver(vec![4]));

        assert_eq!(rx.recv().unwrap().samples, vec![1]);
        assert_eq!(rx.recv().unwrap().samples, vec![4]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (sink, rx) = sink_pair(1);

        assert!(sink.deliver(vec![1]));
        assert!(!sink.deliver(vec![2]));
        assert!(!sink.deliver(vec![3]));
        assert_eq!(sink.dropped_frames(), 2);

        // Draining makes room again
        assert_eq!(rx.recv().unwrap().samples, vec![1]);
        assert!(sink.deliver(vec![4]));
    }

    #[test]
    fn test_disconnected_receiver_drops_silently() {
        let (sink, rx) = sink_pair(4);
        drop(rx);

        assert!(!sink.deliver(vec![1]));
        assert_eq!(sink.dropped_frames(), 0);
    }
}
