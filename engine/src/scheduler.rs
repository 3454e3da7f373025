//! Single-threaded cooperative scheduling of snapshot polls and animation frames.
//!
//! The [`Scheduler`] owns two timers, a [`PollTimer`] feeding snapshots from a
//! [`SnapshotSource`] into [`HeatmapEngine::reconcile`] and a [`FrameLoop`]
//! calling [`HeatmapEngine::frame`]. Both run on the caller's thread: when
//! both are due in the same turn the poll runs first and completes before
//! the frame starts. Each timer exposes a [`StopHandle`]; once stopped it never
//! touches the engine or the surface again.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result as AnyResult;
use crowd_pulse_core::{GuestSnapshot, Timestamp, Tuning, ZoneSnapshot};
use crowd_pulse_rendering::DensitySurface;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{clock::Clock, HeatmapEngine};

/// External poller delivering full replacement snapshots.
pub trait SnapshotSource {
    /// Returns the snapshot pair that arrived since the previous call, if any.
    ///
    /// Must not block. Errors are logged and the poll is skipped.
    fn poll(&mut self) -> AnyResult<Option<(ZoneSnapshot, GuestSnapshot)>>;
}

/// Cloneable flag that stops a timer.
///
/// Stopping is idempotent and may happen from any thread, including while the
/// scheduler is being torn down.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates a handle in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the timer to stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Reports whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Timer {
    interval: Duration,
    next_due: Option<Timestamp>,
    stop: StopHandle,
}

impl Timer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            stop: StopHandle::new(),
        }
    }

    fn is_due(&self, now: Timestamp) -> bool {
        !self.stop.is_stopped() && self.next_due.map_or(true, |due| now >= due)
    }

    fn reschedule(&mut self, now: Timestamp) {
        self.next_due = Some(now + self.interval);
    }

    fn deadline(&self, now: Timestamp) -> Option<Timestamp> {
        if self.stop.is_stopped() {
            return None;
        }
        Some(self.next_due.unwrap_or(now))
    }
}

/// Animation timer firing at the frame rate.
#[derive(Debug)]
pub struct FrameLoop {
    timer: Timer,
}

impl FrameLoop {
    /// Creates a frame loop firing every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: Timer::new(interval),
        }
    }

    /// Handle that stops the frame loop.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.timer.stop.clone()
    }
}

/// Timer firing once per snapshot poll interval.
#[derive(Debug)]
pub struct PollTimer {
    timer: Timer,
}

impl PollTimer {
    /// Creates a poll timer firing every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: Timer::new(interval),
        }
    }

    /// Handle that stops the poll timer.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.timer.stop.clone()
    }
}

/// What a single scheduler turn did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Turn {
    /// A snapshot was reconciled.
    pub reconciled: bool,
    /// A frame was ticked.
    pub ticked: bool,
    /// A heat frame reached the surface.
    pub pushed: bool,
}

/// Drives the poll timer and the frame loop from one clock.
#[derive(Debug)]
pub struct Scheduler<C> {
    clock: C,
    frames: FrameLoop,
    polls: PollTimer,
}

impl<C: Clock> Scheduler<C> {
    /// Creates a scheduler using the frame and poll intervals of the tuning.
    #[must_use]
    pub fn new(clock: C, tuning: &Tuning) -> Self {
        Self::with_timers(
            clock,
            FrameLoop::new(tuning.frame_interval()),
            PollTimer::new(tuning.poll_interval()),
        )
    }

    /// Creates a scheduler from explicit timers.
    #[must_use]
    pub fn with_timers(clock: C, frames: FrameLoop, polls: PollTimer) -> Self {
        Self {
            clock,
            frames,
            polls,
        }
    }

    /// Clock the scheduler reads.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Handle that stops the frame loop.
    #[must_use]
    pub fn frame_stop_handle(&self) -> StopHandle {
        self.frames.stop_handle()
    }

    /// Handle that stops the poll timer.
    #[must_use]
    pub fn poll_stop_handle(&self) -> StopHandle {
        self.polls.stop_handle()
    }

    /// Stops both timers.
    pub fn stop(&self) {
        self.frames.timer.stop.stop();
        self.polls.timer.stop.stop();
    }

    /// Reports whether both timers are stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.frames.timer.stop.is_stopped() && self.polls.timer.stop.is_stopped()
    }

    /// Earliest moment a timer becomes due, or `None` when both are stopped.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let now = self.clock.now();
        match (self.polls.timer.deadline(now), self.frames.timer.deadline(now)) {
            (Some(poll), Some(frame)) => Some(poll.min(frame)),
            (poll, frame) => poll.or(frame),
        }
    }

    /// Runs every timer that is due at the current clock reading.
    ///
    /// Snapshot source failures are logged and skipped. Surface failures are
    /// returned to the caller.
    pub fn run_once<R, P, S>(
        &mut self,
        engine: &mut HeatmapEngine<R>,
        source: &mut P,
        surface: &mut S,
    ) -> AnyResult<Turn>
    where
        R: Rng,
        P: SnapshotSource + ?Sized,
        S: DensitySurface + ?Sized,
    {
        let now = self.clock.now();
        let mut turn = Turn::default();

        if self.polls.timer.is_due(now) {
            self.polls.timer.reschedule(now);
            match source.poll() {
                Ok(Some((zones, guests))) => {
                    let _ = engine.reconcile(&zones, &guests, now);
                    turn.reconciled = true;
                }
                Ok(None) => {}
                Err(error) => warn!(error = %error, "snapshot poll failed"),
            }
        }

        if self.frames.timer.is_due(now) {
            self.frames.timer.reschedule(now);
            turn.pushed = engine.frame(now, surface)?;
            turn.ticked = true;
        }

        Ok(turn)
    }

    /// Runs turns until both timers are stopped.
    ///
    /// `sleep` is called with the time left until the next deadline; it may
    /// block, advance a manual clock, or stop the scheduler.
    pub fn run<R, P, S>(
        &mut self,
        engine: &mut HeatmapEngine<R>,
        source: &mut P,
        surface: &mut S,
        mut sleep: impl FnMut(Duration),
    ) -> AnyResult<()>
    where
        R: Rng,
        P: SnapshotSource + ?Sized,
        S: DensitySurface + ?Sized,
    {
        info!("scheduler started");
        while let Some(deadline) = self.next_deadline() {
            let now = self.clock.now();
            if deadline > now {
                sleep(deadline.saturating_duration_since(now));
                continue;
            }
            let _ = self.run_once(engine, source, surface)?;
        }
        debug!(pushes = engine.pushes(), "scheduler stopped");
        Ok(())
    }
}
