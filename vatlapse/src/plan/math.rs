/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Pure layer-timing arithmetic.
//!
//! These are free functions rather than methods so they can be used and tested
//! independently of the planner.  All of them assume validated input (positive
//! speeds on moving stages, non-negative everything else); validation lives in
//! [`plan::validate`](super::validate).

use crate::job::{LayerSettings, MotionProfile, RestPauses};

/// Total lift travel time in seconds: first stage plus the optional second
/// stage.  An absent second stage contributes zero, exactly like a
/// zero-distance segment would.
pub fn lift_time_s(motion: &MotionProfile) -> f64 {
    motion.lift.travel_time_s()
        + motion
            .second_lift
            .map(|s| s.travel_time_s())
            .unwrap_or(0.0)
}

/// Total retract travel time in seconds, mirroring [`lift_time_s`].
pub fn retract_time_s(motion: &MotionProfile) -> f64 {
    motion.retract.travel_time_s()
        + motion
            .second_retract
            .map(|s| s.travel_time_s())
            .unwrap_or(0.0)
}

/// All Z travel for one layer: lift stages plus retract stages.
pub fn motion_time_s(motion: &MotionProfile) -> f64 {
    lift_time_s(motion) + retract_time_s(motion)
}

/// Theoretical wall-clock duration of one layer, in seconds:
///
/// ```text
/// exposure
///   + before_lift rest
///   + lift (both stages)
///   + after_lift rest
///   + retract (both stages)
///   + after_retract rest
///   + firmware overhead
/// ```
///
/// With zero rests this reduces to `exposure + motion + overhead`.
pub fn layer_time_s(settings: &LayerSettings, rests: &RestPauses, overhead_s: f64) -> f64 {
    settings.exposure_s
        + rests.before_lift_s
        + lift_time_s(&settings.motion)
        + rests.after_lift_s
        + retract_time_s(&settings.motion)
        + rests.after_retract_s
        + overhead_s
}

/// Per-layer exposure decrement for a linear transition ramp.
///
/// ChiTuBox divides the exposure gap into `count + 1` equal steps so that the
/// ramp lands *next to* the normal exposure rather than on it:
///
/// ```text
/// step = (bottom_exposure - normal_exposure) / (count + 1)
/// ```
///
/// Returns `0.0` when `count` is zero (no transition band, no step).
pub fn transition_exposure_step_s(bottom_exposure_s: f64, normal_exposure_s: f64, count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (bottom_exposure_s - normal_exposure_s) / f64::from(count + 1)
}

/// Exposure for each transition layer under the linear ramp, in print order.
///
/// Layer `i` (1-based within the band) exposes for `bottom - i * step`.  The
/// first transition layer is one step below the bottom exposure and the last
/// is one step above the normal exposure.
pub fn transition_exposures(
    bottom_exposure_s: f64,
    normal_exposure_s: f64,
    count: u32,
) -> Vec<f64> {
    let step = transition_exposure_step_s(bottom_exposure_s, normal_exposure_s, count);
    (1..=count)
        .map(|i| bottom_exposure_s - f64::from(i) * step)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
