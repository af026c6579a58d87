//! Site runtime: effect selection, rendering and fan-out to controllers.
//!
//! Each site owns one render thread. Every tick it makes sure an effect is
//! running, lets it draw into the canvas and hands a snapshot of the canvas to
//! every controller channel that can take it. Control-plane calls mutate the
//! effect slots under the same mutex the render thread draws under, so a
//! change is observed at the next tick boundary.
//!
//! Selection order when the active effect is missing or over:
//!
//! 1. a pending forced effect (which then stays pinned until cleared)
//! 2. the pinned forced effect again, restarted, if its lifetime ran out
//! 3. the head of the FIFO effect queue
//! 4. the first scheduled entry active at the current local time

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use lumen_config::LocationConfig;
use lumen_errors::{ControlError, EffectError, LumenError};
use lumen_scheduler::{FramePacer, TickOutcome};
use lumen_wire::LedColor;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::canvas::{Canvas, CanvasInfo, CanvasRegistry};
use crate::controller::{ControllerChannel, ControllerStatus, SocketPool};
use crate::effect::{Effect, EffectOrigin, EffectRegistry};
use crate::metrics::{SiteCounterSnapshot, SiteCounters};
use crate::schedule::{self, WallClock};

/// Maximum effects waiting in one site's queue.
pub const EFFECT_QUEUE_CAP: usize = 64;

/// Description of a running or queued effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSummary {
    /// Instance id
    pub id: String,
    /// Factory name
    pub name: String,
    /// Where it came from
    pub origin: EffectOrigin,
    /// Seconds since it started, 0 if it has not
    pub running_secs: f64,
    /// Declared lifetime in seconds, `None` for forever
    pub lifetime_secs: Option<f64>,
    /// Current settings
    pub settings: Value,
}

impl EffectSummary {
    fn of(effect: &dyn Effect, origin: EffectOrigin, now: Instant) -> Self {
        let state = effect.state();
        Self {
            id: effect.id().to_string(),
            name: effect.name().to_string(),
            origin,
            running_secs: state.running_time(now).as_secs_f64(),
            lifetime_secs: state.lifetime().map(|l| l.as_secs_f64()),
            settings: effect.settings(),
        }
    }
}

/// Point-in-time view of a site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStatus {
    /// Site name
    pub name: String,
    /// Render rate
    pub frames_per_second: u32,
    /// Whether control-plane calls are accepted
    pub api_enabled: bool,
    /// Whether the render thread is running
    pub running: bool,
    /// Whether the canvas has been created
    pub canvas_ready: bool,
    /// Active effect
    pub active: Option<EffectSummary>,
    /// Whether the active effect is a pinned forced override
    pub forced_pinned: bool,
    /// Effects waiting in the queue
    pub queue_length: usize,
    /// Smallest slack seen in the last full second, milliseconds
    pub spare_time_min_ms: f64,
    /// Render counters
    pub counters: SiteCounterSnapshot,
    /// Per-controller status
    pub controllers: Vec<ControllerStatus>,
}

/// What one render tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Id of the effect that drew, if any
    pub effect_id: Option<String>,
    /// Controllers that accepted the frame
    pub delivered: usize,
}

struct ActiveEffect {
    effect: Box<dyn Effect>,
    origin: EffectOrigin,
}

#[derive(Default)]
struct RenderState {
    canvas: Option<Box<dyn Canvas>>,
    canvas_warned: bool,
    active: Option<ActiveEffect>,
    forced: Option<Box<dyn Effect>>,
    pinned: bool,
    queue: VecDeque<Box<dyn Effect>>,
    schedule_error: Option<String>,
}

impl RenderState {
    fn holds_id(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.effect.id() == id)
            || self.forced.as_ref().is_some_and(|f| f.id() == id)
            || self.queue.iter().any(|q| q.id() == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Box<dyn Effect>> {
        if let Some(active) = self.active.as_mut().filter(|a| a.effect.id() == id) {
            return Some(&mut active.effect);
        }
        if let Some(forced) = self.forced.as_mut().filter(|f| f.id() == id) {
            return Some(forced);
        }
        self.queue.iter_mut().find(|q| q.id() == id)
    }
}

struct LocationShared {
    config: LocationConfig,
    state: Mutex<RenderState>,
    channels: Vec<ControllerChannel>,
    effects: Arc<EffectRegistry>,
    canvases: Arc<CanvasRegistry>,
    clock: Arc<dyn WallClock>,
    counters: SiteCounters,
    spare_min_micros: AtomicU64,
}

impl LocationShared {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn canvas_info(&self) -> CanvasInfo {
        CanvasInfo {
            width: self.config.width,
            height: self.config.height,
        }
    }

    fn ensure_canvas(&self, state: &mut RenderState) -> bool {
        if state.canvas.is_some() {
            return true;
        }
        let created = self
            .canvases
            .create(&self.config.canvas_type, self.config.width, self.config.height);
        match created {
            Some(canvas) => {
                info!(location = %self.name(), kind = %canvas.kind(), "Canvas created");
                state.canvas = Some(canvas);
                state.canvas_warned = false;
                true
            }
            None => {
                self.counters.inc_canvas_failure();
                if !state.canvas_warned {
                    warn!(
                        location = %self.name(),
                        canvas_type = %self.config.canvas_type,
                        "Canvas unavailable; rendering suspended"
                    );
                    state.canvas_warned = true;
                }
                false
            }
        }
    }

    fn select_effect(&self, state: &mut RenderState, now: Instant) {
        let local = self.clock.now();

        if let Some(active) = state.active.as_mut()
            && let EffectOrigin::Scheduled { entry_id } = &active.origin
        {
            let window_open = self
                .config
                .scheduled_effects
                .iter()
                .find(|entry| &entry.id == entry_id)
                .is_some_and(|entry| schedule::is_active(entry, local));
            if !window_open {
                active.effect.request_end();
            }
        }

        let needs_replacement = state
            .active
            .as_ref()
            .is_none_or(|a| a.effect.state().is_over_at(now));
        if !needs_replacement {
            return;
        }

        if let Some(mut forced) = state.forced.take() {
            forced.start(now);
            info!(location = %self.name(), effect = %forced.name(), id = %forced.id(), "Forced effect started");
            state.active = Some(ActiveEffect {
                effect: forced,
                origin: EffectOrigin::Forced,
            });
            state.pinned = true;
            return;
        }

        if state.pinned
            && let Some(active) = state.active.as_mut()
        {
            debug!(location = %self.name(), id = %active.effect.id(), "Restarting forced effect");
            active.effect.start(now);
            return;
        }
        state.pinned = false;

        if let Some(mut next) = state.queue.pop_front() {
            next.start(now);
            info!(location = %self.name(), effect = %next.name(), id = %next.id(), "Queued effect started");
            state.active = Some(ActiveEffect {
                effect: next,
                origin: EffectOrigin::Queued,
            });
            return;
        }

        if let Some(entry) = schedule::first_active(&self.config.scheduled_effects, local) {
            match self.effects.create(
                &entry.effect_name,
                self.canvas_info(),
                Some(entry.id.clone()),
                &entry.settings,
            ) {
                Ok(mut effect) => {
                    effect.start(now);
                    info!(location = %self.name(), effect = %entry.effect_name, id = %entry.id, "Scheduled effect started");
                    state.schedule_error = None;
                    state.active = Some(ActiveEffect {
                        effect,
                        origin: EffectOrigin::Scheduled {
                            entry_id: entry.id.clone(),
                        },
                    });
                    return;
                }
                Err(e) => {
                    if state.schedule_error.as_deref() != Some(entry.id.as_str()) {
                        warn!(location = %self.name(), id = %entry.id, error = %e, "Scheduled effect could not be created");
                        state.schedule_error = Some(entry.id.clone());
                    }
                }
            }
        }

        if let Some(ended) = state.active.take() {
            info!(location = %self.name(), id = %ended.effect.id(), "Effect ended; nothing to replace it");
        }
    }

    /// Update and draw the active effect, isolating failures and panics.
    fn draw_active(&self, state: &mut RenderState, delta: Duration) -> Option<Vec<LedColor>> {
        let RenderState {
            canvas,
            active,
            pinned,
            ..
        } = state;
        let canvas = canvas.as_mut()?;
        let current = active.as_mut()?;

        let result = catch_unwind(AssertUnwindSafe(|| {
            current.effect.update(delta)?;
            current.effect.draw(&mut **canvas, delta)
        }))
        .unwrap_or_else(|_| Err(EffectError::Panicked(current.effect.name().to_string())));

        match result {
            Ok(()) => Some(canvas.pixels().to_vec()),
            Err(e) => {
                error!(
                    location = %self.name(),
                    effect = %current.effect.name(),
                    id = %current.effect.id(),
                    error = %e,
                    "Effect failed; ending it"
                );
                self.counters.inc_effect_fault();
                if current.origin == EffectOrigin::Forced {
                    *pinned = false;
                }
                *active = None;
                None
            }
        }
    }

    fn render_tick(&self, delta: Duration, target: SystemTime) -> RenderReport {
        let now = Instant::now();
        let (effect_id, frame) = {
            let mut state = self.state.lock();
            if !self.ensure_canvas(&mut state) {
                return RenderReport::default();
            }
            self.select_effect(&mut state, now);
            let frame = self.draw_active(&mut state, delta);
            let effect_id = state.active.as_ref().map(|a| a.effect.id().to_string());
            (effect_id, frame)
        };

        let Some(pixels) = frame else {
            return RenderReport::default();
        };
        let mut delivered = 0usize;
        for channel in &self.channels {
            if channel.is_ready_for_data() {
                if channel.enqueue(&pixels, target).is_accepted() {
                    delivered = delivered.saturating_add(1);
                }
            } else {
                channel.reset_telemetry();
            }
        }
        RenderReport {
            effect_id,
            delivered,
        }
    }

    fn render_main(&self, running: &AtomicBool) {
        let mut pacer = match FramePacer::new(self.config.frames_per_second) {
            Ok(pacer) => pacer,
            Err(e) => {
                error!(location = %self.name(), error = %e, "Render loop cannot start");
                return;
            }
        };

        while running.load(Ordering::Acquire) {
            let tick = pacer.begin_tick();
            self.render_tick(tick.delta, tick.wall_clock);
            let outcome = pacer.finish_tick();
            self.counters.record_tick(outcome.is_dropped());
            if let TickOutcome::Dropped { overrun } = outcome {
                warn!(location = %self.name(), tick = tick.index, ?overrun, "Render tick dropped");
            }
            let spare = u64::try_from(pacer.metrics().spare_time_min().as_micros()).unwrap_or(u64::MAX);
            self.spare_min_micros.store(spare, Ordering::Relaxed);
        }
    }
}

/// One site: canvas, effect slots, render thread and controller channels.
pub struct Location {
    shared: Arc<LocationShared>,
    running: Arc<AtomicBool>,
    render: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Location")
            .field("name", &self.shared.config.name)
            .field("controllers", &self.shared.channels.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Location {
    /// Build a site from its configuration. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(
        config: LocationConfig,
        effects: Arc<EffectRegistry>,
        canvases: Arc<CanvasRegistry>,
        pool: Arc<SocketPool>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let channels = config
            .controllers
            .iter()
            .map(|c| ControllerChannel::new(c, config.width, config.frames_per_second, Arc::clone(&pool)))
            .collect();
        Self {
            shared: Arc::new(LocationShared {
                config,
                state: Mutex::new(RenderState::default()),
                channels,
                effects,
                canvases,
                clock,
                counters: SiteCounters::new(),
                spare_min_micros: AtomicU64::new(0),
            }),
            running: Arc::new(AtomicBool::new(false)),
            render: Mutex::new(None),
        }
    }

    /// Site name.
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Site configuration.
    pub fn config(&self) -> &LocationConfig {
        &self.shared.config
    }

    /// Whether control-plane calls are accepted.
    pub fn is_api_enabled(&self) -> bool {
        self.shared.config.is_api_enabled
    }

    /// Canvas geometry new effects are sized for.
    pub fn canvas_info(&self) -> CanvasInfo {
        self.shared.canvas_info()
    }

    /// Controller channels.
    pub fn channels(&self) -> &[ControllerChannel] {
        &self.shared.channels
    }

    /// Whether the render thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Create the canvas, start every controller worker and the render
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Io`] if a thread cannot be spawned.
    pub fn start(&self) -> Result<(), LumenError> {
        let mut render = self.render.lock();
        if render.is_some() {
            return Ok(());
        }
        {
            let mut state = self.shared.state.lock();
            self.shared.ensure_canvas(&mut state);
        }
        for channel in &self.shared.channels {
            channel.start()?;
        }

        self.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name(format!("lumen-loc-{}", self.shared.name()))
            .spawn(move || shared.render_main(&running))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                LumenError::Io(e)
            })?;
        *render = Some(handle);
        info!(
            location = %self.name(),
            fps = self.shared.config.frames_per_second,
            controllers = self.shared.channels.len(),
            "Location started"
        );
        Ok(())
    }

    /// Stop the render thread, then every controller worker.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.render.lock().take() {
            match handle.join() {
                Ok(()) => info!(location = %self.name(), "Render loop stopped"),
                Err(_) => error!(location = %self.name(), "Render thread panicked"),
            }
        }
        for channel in &self.shared.channels {
            channel.stop();
        }
    }

    /// Run one render tick on the caller's thread.
    ///
    /// The render thread calls this once per period; tests call it directly
    /// to step a site deterministically.
    pub fn render_tick(&self, delta: Duration, target: SystemTime) -> RenderReport {
        self.shared.render_tick(delta, target)
    }

    /// Append an effect to the queue.
    ///
    /// A running scheduled effect makes way for it at the next tick.
    ///
    /// # Errors
    ///
    /// [`ControlError::DuplicateEffectId`] if the id is already held and
    /// [`ControlError::QueueFull`] at capacity.
    pub fn enqueue_effect(&self, effect: Box<dyn Effect>) -> Result<(), ControlError> {
        let mut state = self.shared.state.lock();
        if state.holds_id(effect.id()) {
            return Err(ControlError::DuplicateEffectId {
                location: self.name().to_string(),
                id: effect.id().to_string(),
            });
        }
        if state.queue.len() >= EFFECT_QUEUE_CAP {
            return Err(ControlError::QueueFull {
                location: self.name().to_string(),
                capacity: EFFECT_QUEUE_CAP,
            });
        }
        info!(location = %self.name(), effect = %effect.name(), id = %effect.id(), "Effect queued");
        state.queue.push_back(effect);
        Ok(())
    }

    /// Install a forced override, or with `None` clear it.
    ///
    /// The running effect is asked to end so the override takes over at the
    /// next tick.
    ///
    /// # Errors
    ///
    /// [`ControlError::DuplicateEffectId`] if a queued effect carries the id.
    pub fn set_forced_effect(&self, effect: Option<Box<dyn Effect>>) -> Result<(), ControlError> {
        let Some(effect) = effect else {
            self.clear_forced_effect();
            return Ok(());
        };
        let mut state = self.shared.state.lock();
        if state.queue.iter().any(|q| q.id() == effect.id()) {
            return Err(ControlError::DuplicateEffectId {
                location: self.name().to_string(),
                id: effect.id().to_string(),
            });
        }
        info!(location = %self.name(), effect = %effect.name(), id = %effect.id(), "Forced effect set");
        if let Some(active) = state.active.as_mut() {
            active.effect.request_end();
        }
        state.forced = Some(effect);
        Ok(())
    }

    /// Unpin the forced override and end it. Returns whether one was set.
    pub fn clear_forced_effect(&self) -> bool {
        let mut state = self.shared.state.lock();
        let had_pending = state.forced.take().is_some();
        let was_pinned = std::mem::take(&mut state.pinned);
        if was_pinned && let Some(active) = state.active.as_mut() {
            active.effect.request_end();
        }
        if had_pending || was_pinned {
            info!(location = %self.name(), "Forced effect cleared");
        }
        had_pending || was_pinned
    }

    /// End the active effect, unpinning it if it was forced. Returns whether
    /// an effect was active.
    pub fn clear_active_effect(&self) -> bool {
        let mut state = self.shared.state.lock();
        state.pinned = false;
        match state.active.as_mut() {
            Some(active) => {
                active.effect.request_end();
                info!(location = %self.name(), id = %active.effect.id(), "Active effect cleared");
                true
            }
            None => false,
        }
    }

    /// Drop every queued effect. Returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.shared.state.lock();
        let removed = state.queue.len();
        state.queue.clear();
        if removed > 0 {
            info!(location = %self.name(), removed, "Effect queue cleared");
        }
        removed
    }

    /// Queued effects in the order they will run.
    pub fn effect_queue(&self) -> Vec<EffectSummary> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .queue
            .iter()
            .map(|effect| EffectSummary::of(effect.as_ref(), EffectOrigin::Queued, now))
            .collect()
    }

    /// The effect currently drawing.
    pub fn active_effect(&self) -> Option<EffectSummary> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .active
            .as_ref()
            .map(|a| EffectSummary::of(a.effect.as_ref(), a.origin.clone(), now))
    }

    /// Settings of the active, forced or queued effect with `id`.
    ///
    /// # Errors
    ///
    /// [`ControlError::EffectIdNotFound`] if no effect carries the id.
    pub fn effect_settings(&self, id: &str) -> Result<Value, ControlError> {
        let mut state = self.shared.state.lock();
        state
            .find_mut(id)
            .map(|effect| effect.settings())
            .ok_or_else(|| ControlError::effect_id_not_found(self.name(), id))
    }

    /// Merge `overrides` into the settings of the effect with `id` and
    /// return the result.
    ///
    /// # Errors
    ///
    /// [`ControlError::EffectIdNotFound`] for an unknown id and
    /// [`ControlError::InvalidSettings`] if the effect rejects the merge.
    pub fn set_effect_settings(&self, id: &str, overrides: &Value) -> Result<Value, ControlError> {
        let mut state = self.shared.state.lock();
        let effect = state
            .find_mut(id)
            .ok_or_else(|| ControlError::effect_id_not_found(self.name(), id))?;
        effect
            .apply_settings(overrides)
            .map_err(|e| ControlError::invalid_settings(effect.name(), e.to_string()))?;
        debug!(location = %self.name(), id, "Effect settings updated");
        Ok(effect.settings())
    }

    /// Render counters.
    pub fn counters(&self) -> SiteCounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Status snapshot.
    pub fn status(&self) -> LocationStatus {
        let now = Instant::now();
        let (active, forced_pinned, queue_length, canvas_ready) = {
            let state = self.shared.state.lock();
            (
                state
                    .active
                    .as_ref()
                    .map(|a| EffectSummary::of(a.effect.as_ref(), a.origin.clone(), now)),
                state.pinned,
                state.queue.len(),
                state.canvas.is_some(),
            )
        };
        let spare = Duration::from_micros(self.shared.spare_min_micros.load(Ordering::Relaxed));
        LocationStatus {
            name: self.name().to_string(),
            frames_per_second: self.shared.config.frames_per_second,
            api_enabled: self.is_api_enabled(),
            running: self.is_running(),
            canvas_ready,
            active,
            forced_pinned,
            queue_length,
            spare_time_min_ms: spare.as_secs_f64() * 1_000.0,
            counters: self.counters(),
            controllers: self.shared.channels.iter().map(ControllerChannel::status).collect(),
        }
    }
}

impl Drop for Location {
    fn drop(&mut self) {
        self.stop();
    }
}
