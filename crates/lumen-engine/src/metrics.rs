//! Lock-free counters for render loops and controller channels.
//!
//! Both the render thread and the channel workers bump these on their hot
//! paths, so every operation is a single relaxed atomic. Totals that matter
//! outside the process are also emitted through the `metrics` facade; the
//! daemon decides whether anything records them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Facade counter: frames rejected because a channel queue was full.
pub const FRAMES_DROPPED_TOTAL: &str = "lumen_frames_dropped_total";
/// Facade counter: jammed queues purged by a channel worker.
pub const QUEUE_PURGES_TOTAL: &str = "lumen_queue_purges_total";
/// Facade counter: bytes written to controllers.
pub const BYTES_SENT_TOTAL: &str = "lumen_bytes_sent_total";

/// Render loop counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCounterSnapshot {
    /// Ticks run
    pub ticks_rendered: u64,
    /// Ticks that missed their deadline
    pub ticks_dropped: u64,
    /// Effects ended because update or draw failed
    pub effect_faults: u64,
    /// Ticks skipped because the canvas could not be created
    pub canvas_failures: u64,
}

/// Render loop counters.
#[derive(Debug, Default)]
pub struct SiteCounters {
    ticks_rendered: AtomicU64,
    ticks_dropped: AtomicU64,
    effect_faults: AtomicU64,
    canvas_failures: AtomicU64,
}

impl SiteCounters {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a tick and whether it was dropped.
    #[inline]
    pub fn record_tick(&self, dropped: bool) {
        self.ticks_rendered.fetch_add(1, Ordering::Relaxed);
        if dropped {
            self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count an isolated effect failure.
    #[inline]
    pub fn inc_effect_fault(&self) {
        self.effect_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a tick without a canvas.
    #[inline]
    pub fn inc_canvas_failure(&self) {
        self.canvas_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> SiteCounterSnapshot {
        SiteCounterSnapshot {
            ticks_rendered: self.ticks_rendered.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            effect_faults: self.effect_faults.load(Ordering::Relaxed),
            canvas_failures: self.canvas_failures.load(Ordering::Relaxed),
        }
    }
}

/// Controller channel counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCounterSnapshot {
    /// Frames accepted onto the queue
    pub frames_enqueued: u64,
    /// Frames rejected because the queue was full
    pub frames_dropped: u64,
    /// Frames rejected while reconnecting
    pub frames_throttled: u64,
    /// Batches written
    pub batches_sent: u64,
    /// Bytes written
    pub bytes_sent: u64,
    /// Jammed queues cleared
    pub queue_purges: u64,
    /// Sockets discarded after an error
    pub socket_resets: u64,
}

/// Controller channel counters.
#[derive(Debug)]
pub struct ChannelCounters {
    host: String,
    frames_enqueued: AtomicU64,
    frames_dropped: AtomicU64,
    frames_throttled: AtomicU64,
    batches_sent: AtomicU64,
    bytes_sent: AtomicU64,
    queue_purges: AtomicU64,
    socket_resets: AtomicU64,
}

impl ChannelCounters {
    /// Zeroed counters labelled with `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            frames_enqueued: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_throttled: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            queue_purges: AtomicU64::new(0),
            socket_resets: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_enqueued(&self) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(FRAMES_DROPPED_TOTAL, "host" => self.host.clone()).increment(1);
    }

    #[inline]
    pub(crate) fn inc_throttled(&self) {
        self.frames_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, bytes: usize) {
        let bytes = u64::try_from(bytes).unwrap_or(u64::MAX);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        metrics::counter!(BYTES_SENT_TOTAL, "host" => self.host.clone()).increment(bytes);
    }

    pub(crate) fn inc_purge(&self) {
        self.queue_purges.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(QUEUE_PURGES_TOTAL, "host" => self.host.clone()).increment(1);
    }

    #[inline]
    pub(crate) fn inc_socket_reset(&self) {
        self.socket_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> ChannelCounterSnapshot {
        ChannelCounterSnapshot {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_throttled: self.frames_throttled.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            queue_purges: self.queue_purges.load(Ordering::Relaxed),
            socket_resets: self.socket_resets.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_counters() {
        let counters = SiteCounters::new();
        counters.record_tick(false);
        counters.record_tick(true);
        counters.inc_effect_fault();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.ticks_rendered, 2);
        assert_eq!(snapshot.ticks_dropped, 1);
        assert_eq!(snapshot.effect_faults, 1);
        assert_eq!(snapshot.canvas_failures, 0);
    }

    #[test]
    fn test_channel_counters_without_recorder() {
        let counters = ChannelCounters::new("10.0.0.5");
        counters.inc_enqueued();
        counters.inc_dropped();
        counters.record_batch(120);
        counters.record_batch(30);
        counters.inc_purge();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.frames_enqueued, 1);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.batches_sent, 2);
        assert_eq!(snapshot.bytes_sent, 150);
        assert_eq!(snapshot.queue_purges, 1);
    }
}
