//! Outbound frame pipeline for one controller.
//!
//! The render thread encodes frames and pushes them onto a bounded queue;
//! a dedicated worker drains the queue in batches onto the host's pooled
//! socket. The queue never blocks the render thread: a full queue drops the
//! new frame, and a queue the worker finds full is purged along with the
//! socket it was feeding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use lumen_config::ControllerConfig;
use lumen_errors::LumenError;
use lumen_wire::{LedColor, PixelFrameEncoder, TelemetryRecord, compress_frame, playback_offset};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::pool::{SharedSocket, SocketPool};
use super::socket::{ConnectOutcome, connect_shared};
use crate::metrics::{ChannelCounterSnapshot, ChannelCounters};

/// Maximum frames waiting for one controller.
pub const OUTBOUND_QUEUE_CAP: usize = 99;

/// Worker poll interval.
pub const WORKER_INTERVAL: Duration = Duration::from_millis(10);

/// Enqueues are refused for this long after the previous attempt while the
/// host has no live socket.
pub const RECONNECT_ENQUEUE_GRACE: Duration = Duration::from_secs(2);

/// A non-empty queue is flushed once this much time passed since the last
/// batch, whatever the batch size.
pub const MAX_BATCH_AGE: Duration = Duration::from_secs(1);

/// Result of [`ControllerChannel::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Frame queued
    Accepted,
    /// Host is reconnecting; frame dropped
    Throttled,
    /// Queue at capacity; frame dropped
    QueueFull,
    /// Frame could not be encoded
    EncodeFailed,
    /// Channel worker has exited
    Stopped,
}

impl EnqueueOutcome {
    /// Whether the frame was queued.
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Accepted)
    }
}

/// Whether the worker should send now.
///
/// A batch is due when more frames are queued than the site renders per
/// second, when anything has waited longer than [`MAX_BATCH_AGE`], or when
/// the configured batch size is reached.
pub fn batch_due(queued: usize, site_fps: u32, batch_size: u32, since_last_batch: Duration) -> bool {
    if queued == 0 {
        return false;
    }
    let over_fps = u32::try_from(queued).map_or(true, |q| q > site_fps);
    let full_batch = u32::try_from(queued).map_or(true, |q| q >= batch_size);
    over_fps || since_last_batch > MAX_BATCH_AGE || full_batch
}

/// Controller telemetry as exposed in status snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySummary {
    /// Firmware version string
    pub firmware_version: String,
    /// Frames buffered on the controller
    pub buffer_pos: u32,
    /// Controller buffer capacity
    pub buffer_size: u32,
    /// Frames drawn per second
    pub fps_drawing: u32,
    /// Estimated power draw
    pub watts: u32,
    /// Output brightness
    pub brightness: f64,
    /// WiFi RSSI
    pub wifi_signal: f64,
    /// Newest buffered frame minus controller clock, seconds
    pub clock_skew: f64,
    /// When the record arrived
    pub received_at: DateTime<Utc>,
}

impl TelemetrySummary {
    fn from_record(record: &TelemetryRecord, received_at: DateTime<Utc>) -> Self {
        Self {
            firmware_version: record.firmware_version(),
            buffer_pos: record.buffer_pos,
            buffer_size: record.buffer_size,
            fps_drawing: record.fps_drawing,
            watts: record.watts,
            brightness: record.brightness,
            wifi_signal: record.wifi_signal,
            clock_skew: record.clock_skew(),
            received_at,
        }
    }
}

/// Point-in-time view of a controller channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    /// Host string
    pub host: String,
    /// Display name
    pub name: String,
    /// Frames waiting
    pub queue_depth: usize,
    /// Whether the host has a live socket
    pub connected: bool,
    /// Recent write rate
    pub bytes_per_second: f64,
    /// Last telemetry since the channel was last ready
    pub telemetry: Option<TelemetrySummary>,
    /// Counters
    pub counters: ChannelCounterSnapshot,
}

#[derive(Debug)]
struct ChannelShared {
    host: String,
    name: String,
    encoder: PixelFrameEncoder,
    use_compression: bool,
    batch_size: u32,
    site_fps: u32,
    offset: Duration,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pool: Arc<SocketPool>,
    last_enqueue_attempt: Mutex<Option<Instant>>,
    telemetry: Mutex<Option<TelemetrySummary>>,
    counters: ChannelCounters,
}

impl ChannelShared {
    /// Never touches the socket lock, which a worker may hold for a whole
    /// connect or batch write.
    fn has_live_socket(&self) -> bool {
        self.pool
            .link(&self.host)
            .is_some_and(|link| link.is_connected())
    }

    fn discard(&self, socket: &SharedSocket) {
        if self.pool.remove_if_same(&self.host, socket) {
            self.counters.inc_socket_reset();
        }
    }

    /// One worker iteration.
    fn service(&self, now: Instant, last_batch: &mut Instant) {
        let Some(socket) = self.pool.get_or_create(&self.host, now) else {
            return;
        };

        if self.rx.len() >= OUTBOUND_QUEUE_CAP {
            let purged = self.rx.try_iter().count();
            warn!(
                host = %self.host,
                controller = %self.name,
                purged,
                "Outbound queue jammed; purging and resetting socket"
            );
            self.counters.inc_purge();
            self.discard(&socket);
            return;
        }

        let connect = connect_shared(&socket, now);
        match connect {
            Ok(ConnectOutcome::Connected) => {}
            Ok(ConnectOutcome::Throttled) => return,
            Err(e) => {
                debug!(host = %self.host, error = %e, "Socket unusable");
                self.discard(&socket);
                return;
            }
        }

        let queued = self.rx.len();
        if !batch_due(
            queued,
            self.site_fps,
            self.batch_size,
            now.saturating_duration_since(*last_batch),
        ) {
            return;
        }

        let mut batch = Vec::new();
        let mut frames = 0usize;
        for frame in self.rx.try_iter().take(queued) {
            batch.extend_from_slice(&frame);
            frames = frames.saturating_add(1);
        }
        if batch.is_empty() {
            return;
        }

        let result = socket.lock().send(&batch, now);
        match result {
            Ok(report) => {
                *last_batch = now;
                self.counters.record_batch(report.bytes);
                debug!(host = %self.host, frames, bytes = report.bytes, "Sent batch");
                if let Some(record) = report.telemetry {
                    *self.telemetry.lock() = Some(TelemetrySummary::from_record(&record, Utc::now()));
                }
            }
            Err(e) => {
                error!(host = %self.host, controller = %self.name, error = %e, "Batch send failed");
                self.discard(&socket);
            }
        }
    }
}

/// Bounded outbound queue plus worker thread for one controller window.
#[derive(Debug)]
pub struct ControllerChannel {
    shared: Arc<ChannelShared>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ControllerChannel {
    /// Build a channel for `config` on a canvas `canvas_width` pixels wide
    /// rendered at `site_fps`. The worker is not started.
    pub fn new(
        config: &ControllerConfig,
        canvas_width: u32,
        site_fps: u32,
        pool: Arc<SocketPool>,
    ) -> Self {
        let encoder = PixelFrameEncoder::new(config.window(canvas_width))
            .with_channel(config.channel)
            .with_swap_red_green(config.swap_red_green)
            .with_reversed(config.reversed);
        let (tx, rx) = bounded(OUTBOUND_QUEUE_CAP);
        let name = if config.name.is_empty() {
            config.host.clone()
        } else {
            config.name.clone()
        };

        Self {
            shared: Arc::new(ChannelShared {
                host: config.host.clone(),
                name,
                encoder,
                use_compression: config.use_compression,
                batch_size: config.batch_size.max(1),
                site_fps,
                offset: playback_offset(config.frames_per_buffer, site_fps),
                tx,
                rx,
                pool,
                last_enqueue_attempt: Mutex::new(None),
                telemetry: Mutex::new(None),
                counters: ChannelCounters::new(config.host.clone()),
            }),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Host string.
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Lead added to render time to get the playback timestamp.
    pub fn playback_offset(&self) -> Duration {
        self.shared.offset
    }

    /// Frames waiting to be sent.
    pub fn queue_depth(&self) -> usize {
        self.shared.rx.len()
    }

    /// Whether the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Io`] if the thread cannot be spawned.
    pub fn start(&self) -> Result<(), LumenError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name(format!("lumen-ch-{}", self.shared.host))
            .spawn(move || Self::worker_main(&shared, &running))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                LumenError::Io(e)
            })?;
        *worker = Some(handle);
        info!(host = %self.shared.host, controller = %self.shared.name, "Controller channel started");
        Ok(())
    }

    /// Signal the worker and wait for it to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        match handle.join() {
            Ok(()) => info!(host = %self.shared.host, "Controller channel stopped"),
            Err(_) => error!(host = %self.shared.host, "Controller channel worker panicked"),
        }
    }

    fn worker_main(shared: &ChannelShared, running: &AtomicBool) {
        let mut last_batch = Instant::now();
        while running.load(Ordering::Acquire) {
            shared.service(Instant::now(), &mut last_batch);
            thread::sleep(WORKER_INTERVAL);
        }
    }

    /// Run one worker iteration on the caller's thread.
    ///
    /// Used by tests that drive the pipeline without a worker thread.
    pub fn service_once(&self, now: Instant, last_batch: &mut Instant) {
        self.shared.service(now, last_batch);
    }

    /// Encode `pixels` for playback at `target` plus the playback offset and
    /// queue the frame. Never blocks.
    pub fn enqueue(&self, pixels: &[LedColor], target: SystemTime) -> EnqueueOutcome {
        self.enqueue_at(pixels, target, Instant::now())
    }

    /// Only calls that get past the reconnect throttle restart its grace
    /// period.
    fn enqueue_at(&self, pixels: &[LedColor], target: SystemTime, now: Instant) -> EnqueueOutcome {
        let shared = &*self.shared;
        {
            let mut last_attempt = shared.last_enqueue_attempt.lock();
            if last_attempt
                .is_some_and(|t| now.saturating_duration_since(t) < RECONNECT_ENQUEUE_GRACE)
                && !shared.has_live_socket()
            {
                shared.counters.inc_throttled();
                return EnqueueOutcome::Throttled;
            }
            *last_attempt = Some(now);
        }
        if shared.tx.is_full() {
            shared.counters.inc_dropped();
            return EnqueueOutcome::QueueFull;
        }

        let timestamp = target
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(shared.offset);
        let frame = match shared.encoder.encode(pixels, timestamp) {
            Ok(frame) if shared.use_compression => compress_frame(frame),
            other => other,
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(host = %shared.host, error = %e, "Frame encode failed");
                return EnqueueOutcome::EncodeFailed;
            }
        };

        match shared.tx.try_send(frame.into_bytes()) {
            Ok(()) => {
                shared.counters.inc_enqueued();
                EnqueueOutcome::Accepted
            }
            Err(TrySendError::Full(_)) => {
                shared.counters.inc_dropped();
                EnqueueOutcome::QueueFull
            }
            Err(TrySendError::Disconnected(_)) => EnqueueOutcome::Stopped,
        }
    }

    /// Whether the host has a live connected socket and the queue has room.
    pub fn is_ready_for_data(&self) -> bool {
        self.queue_depth() < OUTBOUND_QUEUE_CAP && self.shared.has_live_socket()
    }

    /// Forget the last telemetry record.
    pub fn reset_telemetry(&self) {
        *self.shared.telemetry.lock() = None;
    }

    /// Last telemetry record, if any arrived since the last reset.
    pub fn telemetry(&self) -> Option<TelemetrySummary> {
        self.shared.telemetry.lock().clone()
    }

    /// Counter snapshot.
    pub fn counters(&self) -> ChannelCounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Status snapshot.
    pub fn status(&self) -> ControllerStatus {
        let now = Instant::now();
        let (connected, bytes_per_second) = self
            .shared
            .pool
            .link(&self.shared.host)
            .map(|link| (link.is_connected(), link.bytes_per_second(now)))
            .unwrap_or((false, 0.0));
        ControllerStatus {
            host: self.shared.host.clone(),
            name: self.shared.name.clone(),
            queue_depth: self.queue_depth(),
            connected,
            bytes_per_second,
            telemetry: self.telemetry(),
            counters: self.counters(),
        }
    }
}

impl Drop for ControllerChannel {
    fn drop(&mut self) {
        self.stop();
    }
}
