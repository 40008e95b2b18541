/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! The monotonic capture scheduler.
//!
//! [`CaptureScheduler::run`] realizes a [`LayerPlan`] as one wait/capture
//! cycle per layer.  The deadline arithmetic is the whole point:
//!
//! * One `Instant` is taken when the run starts.  Every deadline is that
//!   start plus the running total of planned durations, accumulated in
//!   `Duration` (integer nanoseconds), so consecutive deadlines differ by
//!   exactly the planned layer duration.
//! * Deadlines are never rescheduled from actual capture times.  A slow
//!   capture eats into its own layer's wait and delays nothing else; a
//!   deadline already in the past is released immediately, with no catch-up
//!   burst.
//! * The clock is monotonic, so NTP or DST wall-clock jumps during a
//!   multi-hour print cannot move a single deadline.
//!
//! Waits sleep in bounded chunks and poll a [`CancelFlag`] between chunks,
//! keeping cancellation responsive within [`CANCEL_POLL_INTERVAL`] without
//! busy-spinning.  Cancellation is a clean outcome, not an error: the
//! [`RunReport`] keeps the partial capture list for downstream rendering.

pub mod clock;

pub use clock::{MonotonicClock, SystemClock};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::plan::LayerPlan;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Upper bound on a single sleep inside a deadline wait.
///
/// The cancel flag is polled between sleeps, so this is the worst-case
/// latency between the operator requesting cancellation and the scheduler
/// noticing it mid-wait.  250 ms is far below any layer duration and cheap
/// enough to never matter for scheduling accuracy.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cloneable cancellation handle shared between the scheduler and whatever
/// decides to stop the run (the binary's stdin watcher, a test).
///
/// A set flag is a latch: there is no way to un-cancel.  The flag carries no
/// payload, so `Relaxed` ordering is enough.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Run report ────────────────────────────────────────────────────────────────

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every layer in the plan got its capture attempt.
    Completed,
    /// The cancel flag was observed during a wait or between layers.
    Cancelled,
}

/// What a run produced, whether it completed or not.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Layer indices whose capture succeeded, in order.
    pub captured: Vec<u32>,

    /// Layer indices whose capture failed, in order.  Failures never abort
    /// the run.
    pub failed: Vec<u32>,

    /// The layer the scheduler would have serviced next.  After a completed
    /// run this is one past the last planned index.
    pub next_layer_index: u32,

    /// Time from run start to return, on the scheduler's clock.
    pub elapsed: Duration,
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Per-run progress: created when `run()` starts, advanced once per layer,
/// discarded when the run ends.  Exactly one writer, the scheduling loop
/// itself.
struct ScheduleState {
    started: Instant,
    next_layer_index: u32,
    cumulative_target: Duration,
}

/// Drives frame captures at the cadence a [`LayerPlan`] prescribes.
///
/// The scheduler is synchronous and single-threaded: `run()` blocks its
/// caller, alternating deadline waits and capture calls, until the plan is
/// exhausted or the cancel flag is raised.
pub struct CaptureScheduler<'a, C: MonotonicClock> {
    clock: &'a C,
    cancel: CancelFlag,
}

impl<'a, C: MonotonicClock> CaptureScheduler<'a, C> {
    pub fn new(clock: &'a C, cancel: CancelFlag) -> Self {
        Self { clock, cancel }
    }

    /// Drive `plan` to completion or cancellation.
    ///
    /// Each layer gets exactly one capture attempt, at its deadline.  A
    /// failed capture is logged with its layer index, recorded in the
    /// report, and skipped; the run only ends early when the cancel flag is
    /// raised.  An empty plan completes immediately.
    pub fn run(&self, plan: LayerPlan, camera: &mut dyn Camera) -> RunReport {
        let mut state = ScheduleState {
            started: self.clock.now(),
            next_layer_index: plan.entries().first().map(|e| e.index).unwrap_or(0),
            cumulative_target: Duration::ZERO,
        };
        let mut captured = Vec::new();
        let mut failed = Vec::new();
        let mut outcome = RunOutcome::Completed;

        info!(
            layers = plan.len(),
            total_s = plan.total_duration_s(),
            "Capture schedule started"
        );

        for entry in plan.entries() {
            state.cumulative_target += entry.duration();
            let deadline = state.started + state.cumulative_target;

            if !self.wait_until(deadline) {
                outcome = RunOutcome::Cancelled;
                break;
            }

            match camera.capture(entry.index) {
                Ok(path) => {
                    debug!(
                        layer = entry.index,
                        kind = %entry.kind,
                        path = %path.display(),
                        "Captured frame"
                    );
                    captured.push(entry.index);
                }
                Err(e) => {
                    warn!(layer = entry.index, error = %e, "Capture failed, layer skipped");
                    failed.push(entry.index);
                }
            }
            state.next_layer_index = entry.index + 1;

            if self.cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }
        }

        let elapsed = self.clock.now() - state.started;
        match outcome {
            RunOutcome::Completed => info!(
                captured = captured.len(),
                failed = failed.len(),
                elapsed_s = elapsed.as_secs_f64(),
                "Capture schedule completed"
            ),
            RunOutcome::Cancelled => info!(
                captured = captured.len(),
                failed = failed.len(),
                next_layer = state.next_layer_index,
                "Capture schedule cancelled"
            ),
        }

        RunReport {
            outcome,
            captured,
            failed,
            next_layer_index: state.next_layer_index,
            elapsed,
        }
    }

    /// Block until `deadline` on the scheduler's clock.  Returns `false` when
    /// the cancel flag was raised first.  A deadline already in the past
    /// returns `true` immediately.
    fn wait_until(&self, deadline: Instant) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = self.clock.now();
            if now >= deadline {
                return true;
            }
            let remaining = deadline - now;
            self.clock.sleep(remaining.min(CANCEL_POLL_INTERVAL));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
