//! Accumulating frame pacer.
//!
//! Tick deadlines are derived by adding the period to the previous deadline,
//! never to the time the previous tick finished, so work time does not
//! stretch the frame rate. A late tick is reported as dropped and followed by
//! a 1 ms yield; the pacer does not skip deadlines to catch up.

use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::error::{PacerError, PacerResult};
use crate::headroom::HeadroomMetrics;
use crate::DROPPED_TICK_YIELD;

/// One scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick number
    pub index: u64,
    /// Monotonic deadline of the tick
    pub deadline: Instant,
    /// Nominal time advanced by this tick
    pub delta: Duration,
    /// Wall-clock equivalent of `deadline`, used to timestamp frames
    pub wall_clock: SystemTime,
}

/// How a tick finished relative to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Work finished with time to spare
    OnTime {
        /// Slack until the deadline
        spare: Duration,
    },
    /// Work finished at or past the deadline
    Dropped {
        /// How far past the deadline
        overrun: Duration,
    },
}

impl TickOutcome {
    /// How long the loop should sleep before the next tick.
    pub fn sleep_duration(&self) -> Duration {
        match self {
            TickOutcome::OnTime { spare } => *spare,
            TickOutcome::Dropped { .. } => DROPPED_TICK_YIELD,
        }
    }

    /// Whether the deadline was missed.
    pub fn is_dropped(&self) -> bool {
        matches!(self, TickOutcome::Dropped { .. })
    }
}

/// Fixed-rate pacer for one render loop.
///
/// Call [`begin_tick`](Self::begin_tick) before doing the tick's work and
/// [`finish_tick`](Self::finish_tick) after it.
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    next_deadline: Instant,
    current_deadline: Instant,
    tick_count: u64,
    instant_base: Instant,
    wall_base: SystemTime,
    metrics: HeadroomMetrics,
}

impl FramePacer {
    /// Create a pacer for `fps` frames per second, first deadline now.
    pub fn new(fps: u32) -> PacerResult<Self> {
        if fps == 0 {
            return Err(PacerError::ZeroFrameRate);
        }
        Self::with_period(Duration::from_secs_f64(1.0 / f64::from(fps)))
    }

    /// Create a pacer with an explicit period, first deadline now.
    pub fn with_period(period: Duration) -> PacerResult<Self> {
        Self::starting_at(period, Instant::now(), SystemTime::now())
    }

    /// Create a pacer whose first deadline is `now`, mapping `now` to
    /// `wall_now` for frame timestamps.
    pub fn starting_at(period: Duration, now: Instant, wall_now: SystemTime) -> PacerResult<Self> {
        if period.is_zero() {
            return Err(PacerError::ZeroPeriod);
        }
        Ok(Self {
            period,
            next_deadline: now,
            current_deadline: now,
            tick_count: 0,
            instant_base: now,
            wall_base: wall_now,
            metrics: HeadroomMetrics::new(now),
        })
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks begun so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Health counters.
    pub fn metrics(&self) -> &HeadroomMetrics {
        &self.metrics
    }

    /// Start the next tick and advance the deadline by one period.
    pub fn begin_tick(&mut self) -> Tick {
        let deadline = self.next_deadline;
        self.current_deadline = deadline;
        self.next_deadline = deadline.checked_add(self.period).unwrap_or(deadline);
        self.tick_count = self.tick_count.saturating_add(1);

        Tick {
            index: self.tick_count,
            deadline,
            delta: self.period,
            wall_clock: self.wall_clock_at(deadline),
        }
    }

    /// Classify the current tick as of `now` and record it, without sleeping.
    pub fn finish_tick_at(&mut self, now: Instant) -> TickOutcome {
        let outcome = match self.current_deadline.checked_duration_since(now) {
            Some(spare) if !spare.is_zero() => TickOutcome::OnTime { spare },
            _ => TickOutcome::Dropped {
                overrun: now.saturating_duration_since(self.current_deadline),
            },
        };

        match outcome {
            TickOutcome::OnTime { spare } => self.metrics.record_tick(spare, false, now),
            TickOutcome::Dropped { overrun } => {
                self.metrics.record_overrun(overrun);
                self.metrics.record_tick(Duration::ZERO, true, now);
            }
        }
        outcome
    }

    /// Finish the current tick and sleep until the next one is due.
    pub fn finish_tick(&mut self) -> TickOutcome {
        let outcome = self.finish_tick_at(Instant::now());
        thread::sleep(outcome.sleep_duration());
        outcome
    }

    fn wall_clock_at(&self, deadline: Instant) -> SystemTime {
        self.wall_base
            .checked_add(deadline.saturating_duration_since(self.instant_base))
            .unwrap_or(self.wall_base)
    }
}
