//! Bounded hand-off between the capture callback and the processing thread.
//!
//! The capture side never blocks: [`CaptureHandle::offer`] uses `try_send` and
//! counts what it could not enqueue. Pausing happens here too, so a paused
//! session never even sees the frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};

use crate::source::PacketEvent;

/// Producer side of the ingestion queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    tx: Sender<PacketEvent>,
    paused: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped_full: AtomicU64,
    dropped_paused: AtomicU64,
}

/// Snapshot of the queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped_full: u64,
    pub dropped_paused: u64,
}

/// Create a queue holding at most `capacity` frames.
///
/// # Examples
/// ```
/// use dpsshark_core::ingest::ingestion_queue;
/// use dpsshark_core::source::PacketEvent;
/// use pcap_parser::Linktype;
///
/// let (handle, rx) = ingestion_queue(1);
/// assert!(handle.offer(PacketEvent::new(None, Linktype::ETHERNET, vec![1])));
/// assert!(!handle.offer(PacketEvent::new(None, Linktype::ETHERNET, vec![2])));
/// assert_eq!(rx.len(), 1);
/// assert_eq!(handle.stats().dropped_full, 1);
/// ```
pub fn ingestion_queue(capacity: usize) -> (CaptureHandle, Receiver<PacketEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    let handle = CaptureHandle {
        tx,
        paused: Arc::new(AtomicBool::new(false)),
        counters: Arc::new(Counters::default()),
    };
    (handle, rx)
}

impl CaptureHandle {
    /// Enqueue a frame without blocking. Returns whether it was accepted.
    pub fn offer(&self, event: PacketEvent) -> bool {
        if self.paused.load(Ordering::Relaxed) {
            self.counters.dropped_paused.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped_full.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!(dropped, "ingestion queue full, dropping frames");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        tracing::info!(paused, "capture pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped_full: self.counters.dropped_full.load(Ordering::Relaxed),
            dropped_paused: self.counters.dropped_paused.load(Ordering::Relaxed),
        }
    }
}
