/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Layer planning: from a validated [`PrintJob`] to an ordered [`LayerPlan`].
//!
//! The planner is pure computation.  [`compute`] validates the job, derives a
//! wall-clock duration for every physical layer, and returns the plan together
//! with a [`PlanSummary`] for the operator.  Nothing here touches a camera or
//! a clock; the [`scheduler`](crate::scheduler) realizes the plan against real
//! time.
//!
//! Layer order is fixed: bottom layers first, then the transition band, then
//! normal layers to the end of the job.  Measured per-layer overrides replace
//! the theoretical bottom/normal durations when configured; transition layers
//! always use theoretical times.
//!
//! Validation covers only the categories the job actually uses: a job with
//! `bottom_count == 0` may carry arbitrary bottom settings (with one
//! exception: a linear transition ramp reads the bottom exposure, so the band
//! re-validates it).  Every numeric check demands a finite value and is
//! written with negated comparisons, so NaN and `.inf` input fail validation
//! instead of sneaking through.  On top of the field checks, [`compute`] caps
//! every derived per-layer duration at [`MAX_LAYER_SECONDS`].

pub mod math;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::job::{LayerKind, LayerSettings, PrintJob, TransitionRamp};

// ── Error type ────────────────────────────────────────────────────────────────

/// Configuration errors detected before any capture is attempted.
///
/// All variants are fatal: the binary logs them and exits without scheduling.
/// Each carries the offending category / stage / value so the message alone
/// tells the operator what to fix in the profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// `total_layers` was zero.
    #[error("total_layers is 0; a print needs at least one layer")]
    NoLayers,

    /// Bottom plus transition layers exceed the total layer count.
    #[error("{bottom} bottom + {transition} transition layers exceed the {total}-layer job")]
    LayerCountOverflow {
        bottom: u32,
        transition: u32,
        total: u32,
    },

    /// An exposure used by the job was zero, negative, or not finite.
    #[error("{kind} exposure must be positive and finite, got {value}")]
    InvalidExposure { kind: LayerKind, value: f64 },

    /// A stage wants to move a positive distance at a speed that gives it no
    /// finite travel time.
    #[error("{kind} {stage} moves {distance_mm} mm at {speed_mm_s} mm/s; speed must be positive and finite")]
    InvalidStageSpeed {
        kind: LayerKind,
        stage: &'static str,
        distance_mm: f64,
        speed_mm_s: f64,
    },

    /// A stage distance was negative or not finite.
    #[error("{kind} {stage} has invalid distance {distance_mm} mm")]
    InvalidStageDistance {
        kind: LayerKind,
        stage: &'static str,
        distance_mm: f64,
    },

    /// The firmware overhead was negative or not finite.
    #[error("firmware overhead must be finite and >= 0 s, got {value}")]
    InvalidOverhead { value: f64 },

    /// One of the rest pauses was negative or not finite.
    #[error("rest {which} must be finite and >= 0 s, got {value}")]
    InvalidRest { which: &'static str, value: f64 },

    /// A measured per-layer override was zero, negative, or not finite.
    #[error("measured {kind} layer time must be positive and finite, got {value}")]
    InvalidMeasuredTime { kind: LayerKind, value: f64 },

    /// A derived per-layer duration came out over [`MAX_LAYER_SECONDS`].
    #[error("{kind} layer time computes to {computed_s} s, over the {max} s per-layer ceiling", max = MAX_LAYER_SECONDS)]
    LayerTimeTooLong { kind: LayerKind, computed_s: f64 },
}

// ── LayerPlan ─────────────────────────────────────────────────────────────────

/// One layer of the plan: which layer, what regime, how long it takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanEntry {
    /// Physical layer index, `0..total_layers`.
    pub index: u32,
    pub kind: LayerKind,
    /// Planned wall-clock duration of this layer in seconds.
    pub duration_s: f64,
}

impl PlanEntry {
    /// Planned duration as a `Duration`.  Entries built by [`compute`] always
    /// carry positive durations of at most [`MAX_LAYER_SECONDS`].
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_s)
    }
}

/// Ordered per-layer durations for one print, immutable once computed.
///
/// The plan is **moved** into the capture scheduler, which owns it for the
/// life of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlan {
    entries: Vec<PlanEntry>,
}

impl LayerPlan {
    /// Build `count` identical entries starting at `first_index`.
    ///
    /// Used for the post-print tail: extra frames captured at the normal-layer
    /// cadence after the last real layer.  `duration_s` must be positive and
    /// finite.
    pub fn uniform(first_index: u32, count: u32, kind: LayerKind, duration_s: f64) -> Self {
        let entries = (0..count)
            .map(|i| PlanEntry {
                index: first_index + i,
                kind,
                duration_s,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of(&self, kind: LayerKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Sum of all entry durations, accumulated in `Duration` with the same
    /// arithmetic the scheduler uses, so this equals the final cumulative
    /// deadline offset exactly.
    pub fn total_duration(&self) -> Duration {
        self.entries.iter().map(|e| e.duration()).sum()
    }

    pub fn total_duration_s(&self) -> f64 {
        self.total_duration().as_secs_f64()
    }
}

// ── PlanSummary ───────────────────────────────────────────────────────────────

/// Derived values surfaced to the operator before scheduling starts.
///
/// The theoretical fields stay populated even when a measured override is in
/// effect; comparing the two is how the firmware overhead gets calibrated.
/// Per-category fields are meaningful only when the matching count is
/// non-zero.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub bottom_count: u32,
    pub transition_count: u32,
    pub normal_count: u32,

    /// Theoretical bottom layer time from the formula, in seconds.
    pub bottom_theoretical_s: f64,
    pub normal_theoretical_s: f64,

    /// Duration actually planned per bottom layer (measured override when
    /// configured, theoretical otherwise).
    pub bottom_effective_s: f64,
    pub normal_effective_s: f64,

    /// True when the effective value came from a measured override.
    pub bottom_measured: bool,
    pub normal_measured: bool,

    /// Per-layer exposure decrement of the linear ramp.  `None` for a fixed
    /// transition block or an empty band.
    pub transition_step_s: Option<f64>,

    /// Planned duration of each transition layer, in print order.
    pub transition_layer_s: Vec<f64>,

    /// Total planned job duration in seconds.
    pub total_duration_s: f64,
}

/// Result of [`compute`]: the plan plus its operator summary.
#[derive(Debug, Clone)]
pub struct ComputedPlan {
    pub layers: LayerPlan,
    pub summary: PlanSummary,
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Ceiling on a single layer's planned duration, in seconds.
///
/// One day per layer is far past any real print.  Capping here keeps every
/// per-layer `Duration` conversion and the whole-plan sum inside `Duration`'s
/// range, even for a `u32::MAX`-layer job.
pub const MAX_LAYER_SECONDS: f64 = 86_400.0;

fn check_settings(kind: LayerKind, settings: &LayerSettings) -> Result<(), PlanError> {
    if !(settings.exposure_s > 0.0 && settings.exposure_s.is_finite()) {
        return Err(PlanError::InvalidExposure {
            kind,
            value: settings.exposure_s,
        });
    }
    for (stage, seg) in settings.motion.stages() {
        if !(seg.distance_mm >= 0.0 && seg.distance_mm.is_finite()) {
            return Err(PlanError::InvalidStageDistance {
                kind,
                stage,
                distance_mm: seg.distance_mm,
            });
        }
        if seg.distance_mm > 0.0 && !(seg.speed_mm_s > 0.0 && seg.speed_mm_s.is_finite()) {
            return Err(PlanError::InvalidStageSpeed {
                kind,
                stage,
                distance_mm: seg.distance_mm,
                speed_mm_s: seg.speed_mm_s,
            });
        }
    }
    Ok(())
}

/// Reject any job the timing formula cannot handle.
///
/// # Errors
/// See [`PlanError`].  The first violation found is returned; categories the
/// job does not use are not checked.
pub fn validate(job: &PrintJob) -> Result<(), PlanError> {
    if job.total_layers == 0 {
        return Err(PlanError::NoLayers);
    }

    // u64 so bottom_count + transition_count itself cannot overflow
    let reserved = u64::from(job.bottom_count) + u64::from(job.transition_count);
    if reserved > u64::from(job.total_layers) {
        return Err(PlanError::LayerCountOverflow {
            bottom: job.bottom_count,
            transition: job.transition_count,
            total: job.total_layers,
        });
    }

    if !(job.firmware_overhead_s >= 0.0 && job.firmware_overhead_s.is_finite()) {
        return Err(PlanError::InvalidOverhead {
            value: job.firmware_overhead_s,
        });
    }

    for (which, value) in [
        ("before_lift", job.rests.before_lift_s),
        ("after_lift", job.rests.after_lift_s),
        ("after_retract", job.rests.after_retract_s),
    ] {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(PlanError::InvalidRest { which, value });
        }
    }

    if job.bottom_count > 0 {
        check_settings(LayerKind::Bottom, &job.bottom)?;
        if let Some(value) = job.measured_bottom_s {
            if !(value > 0.0 && value.is_finite()) {
                return Err(PlanError::InvalidMeasuredTime {
                    kind: LayerKind::Bottom,
                    value,
                });
            }
        }
    }

    let linear_band =
        job.transition_count > 0 && matches!(job.transition, TransitionRamp::Linear);

    // Linear transitions move with the normal profile, so normal settings are
    // in use even when every layer after the band belongs to the band itself.
    if job.normal_count() > 0 || linear_band {
        check_settings(LayerKind::Normal, &job.normal)?;
    }
    if job.normal_count() > 0 {
        if let Some(value) = job.measured_normal_s {
            if !(value > 0.0 && value.is_finite()) {
                return Err(PlanError::InvalidMeasuredTime {
                    kind: LayerKind::Normal,
                    value,
                });
            }
        }
    }

    if job.transition_count > 0 {
        match &job.transition {
            // The ramp interpolates from the bottom exposure even when the
            // job has no bottom layers of its own.
            TransitionRamp::Linear => {
                if !(job.bottom.exposure_s > 0.0 && job.bottom.exposure_s.is_finite()) {
                    return Err(PlanError::InvalidExposure {
                        kind: LayerKind::Bottom,
                        value: job.bottom.exposure_s,
                    });
                }
            }
            TransitionRamp::Fixed(settings) => {
                check_settings(LayerKind::Transition, settings)?;
            }
        }
    }

    Ok(())
}

// ── Plan computation ──────────────────────────────────────────────────────────

/// Validate `job` and derive the full per-layer plan.
///
/// # Errors
/// Anything [`validate`] rejects, plus [`PlanError::LayerTimeTooLong`] when a
/// derived per-layer duration lands over [`MAX_LAYER_SECONDS`].  Nothing is
/// partially computed on failure.
pub fn compute(job: &PrintJob) -> Result<ComputedPlan, PlanError> {
    validate(job)?;

    let bottom_theoretical_s = math::layer_time_s(&job.bottom, &job.rests, job.firmware_overhead_s);
    let normal_theoretical_s = math::layer_time_s(&job.normal, &job.rests, job.firmware_overhead_s);
    let bottom_effective_s = job.measured_bottom_s.unwrap_or(bottom_theoretical_s);
    let normal_effective_s = job.measured_normal_s.unwrap_or(normal_theoretical_s);

    let (transition_step_s, transition_layer_s) = if job.transition_count == 0 {
        (None, Vec::new())
    } else {
        match &job.transition {
            TransitionRamp::Linear => {
                let step = math::transition_exposure_step_s(
                    job.bottom.exposure_s,
                    job.normal.exposure_s,
                    job.transition_count,
                );
                // Each ramp exposure lies strictly between the two endpoint
                // exposures, so positivity is inherited from validation.
                let durations = math::transition_exposures(
                    job.bottom.exposure_s,
                    job.normal.exposure_s,
                    job.transition_count,
                )
                .into_iter()
                .map(|exposure_s| {
                    math::layer_time_s(
                        &LayerSettings::new(exposure_s, job.normal.motion),
                        &job.rests,
                        job.firmware_overhead_s,
                    )
                })
                .collect();
                (Some(step), durations)
            }
            TransitionRamp::Fixed(settings) => {
                let t = math::layer_time_s(settings, &job.rests, job.firmware_overhead_s);
                (None, vec![t; job.transition_count as usize])
            }
        }
    };

    // Field checks bound each input, not what the inputs combine into: a
    // huge distance over a tiny speed is still finite fields with an
    // infinite travel time.  The ceiling catches the combination.
    for (kind, count, duration_s) in [
        (LayerKind::Bottom, job.bottom_count, bottom_effective_s),
        (LayerKind::Normal, job.normal_count(), normal_effective_s),
    ] {
        if count > 0 && !(duration_s <= MAX_LAYER_SECONDS) {
            return Err(PlanError::LayerTimeTooLong {
                kind,
                computed_s: duration_s,
            });
        }
    }
    for &duration_s in &transition_layer_s {
        if !(duration_s <= MAX_LAYER_SECONDS) {
            return Err(PlanError::LayerTimeTooLong {
                kind: LayerKind::Transition,
                computed_s: duration_s,
            });
        }
    }

    let mut entries = Vec::with_capacity(job.total_layers as usize);
    let mut index = 0u32;
    for _ in 0..job.bottom_count {
        entries.push(PlanEntry {
            index,
            kind: LayerKind::Bottom,
            duration_s: bottom_effective_s,
        });
        index += 1;
    }
    for &duration_s in &transition_layer_s {
        entries.push(PlanEntry {
            index,
            kind: LayerKind::Transition,
            duration_s,
        });
        index += 1;
    }
    for _ in 0..job.normal_count() {
        entries.push(PlanEntry {
            index,
            kind: LayerKind::Normal,
            duration_s: normal_effective_s,
        });
        index += 1;
    }
    let layers = LayerPlan { entries };

    let summary = PlanSummary {
        bottom_count: job.bottom_count,
        transition_count: job.transition_count,
        normal_count: job.normal_count(),
        bottom_theoretical_s,
        normal_theoretical_s,
        bottom_effective_s,
        normal_effective_s,
        bottom_measured: job.measured_bottom_s.is_some(),
        normal_measured: job.measured_normal_s.is_some(),
        transition_step_s,
        transition_layer_s: transition_layer_s.clone(),
        total_duration_s: layers.total_duration_s(),
    };

    info!(
        total_layers = layers.len(),
        bottom = summary.bottom_count,
        transition = summary.transition_count,
        normal = summary.normal_count,
        total_s = summary.total_duration_s,
        "Computed layer plan"
    );
    for (i, t) in transition_layer_s.iter().enumerate() {
        debug!(
            layer = job.bottom_count + i as u32,
            duration_s = *t,
            "  transition layer"
        );
    }

    Ok(ComputedPlan { layers, summary })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{MotionProfile, MotionSegment, RestPauses};

    fn segment(distance_mm: f64, speed_mm_s: f64) -> MotionSegment {
        MotionSegment::new(distance_mm, speed_mm_s)
    }

    /// Bottom layers take 13 s (10 + 2 + 1), normal layers 4 s (2 + 1 + 1),
    /// no rests, no overhead.
    fn simple_job(total: u32, bottom: u32, transition: u32) -> PrintJob {
        PrintJob {
            total_layers: total,
            bottom_count: bottom,
            transition_count: transition,
            bottom: LayerSettings::new(
                10.0,
                MotionProfile::single_stage(segment(5.0, 2.5), segment(5.0, 5.0)),
            ),
            normal: LayerSettings::new(
                2.0,
                MotionProfile::single_stage(segment(5.0, 5.0), segment(5.0, 5.0)),
            ),
            transition: TransitionRamp::Linear,
            rests: RestPauses::none(),
            firmware_overhead_s: 0.0,
            measured_bottom_s: None,
            measured_normal_s: None,
        }
    }

    // ── sequencing ────────────────────────────────────────────────────────────

    #[test]
    fn hundred_layer_plan_sequences_bottom_then_normal() {
        let plan = compute(&simple_job(100, 5, 0)).unwrap().layers;
        assert_eq!(plan.len(), 100);
        assert_eq!(plan.count_of(LayerKind::Bottom), 5);
        assert_eq!(plan.count_of(LayerKind::Normal), 95);

        for (i, e) in plan.entries().iter().enumerate() {
            assert_eq!(e.index, i as u32);
            let expected = if i < 5 {
                LayerKind::Bottom
            } else {
                LayerKind::Normal
            };
            assert_eq!(e.kind, expected, "layer {i}");
        }
    }

    #[test]
    fn transition_band_sits_between_bottom_and_normal_blocks() {
        let plan = compute(&simple_job(20, 5, 7)).unwrap().layers;
        let kinds: Vec<LayerKind> = plan.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds[..5], vec![LayerKind::Bottom; 5][..]);
        assert_eq!(kinds[5..12], vec![LayerKind::Transition; 7][..]);
        assert_eq!(kinds[12..], vec![LayerKind::Normal; 8][..]);
    }

    #[test]
    fn fully_reserved_job_has_no_normal_layers() {
        let plan = compute(&simple_job(12, 5, 7)).unwrap().layers;
        assert_eq!(plan.count_of(LayerKind::Normal), 0);
        assert_eq!(plan.len(), 12);
    }

    // ── durations ─────────────────────────────────────────────────────────────

    #[test]
    fn normal_layer_time_matches_hand_computed_value() {
        // exposure 2 s + lift 5 mm @ 5 mm/s + retract 5 mm @ 5 mm/s, no
        // overhead: exactly 4 s
        let plan = compute(&simple_job(1, 0, 0)).unwrap().layers;
        assert_eq!(plan.entries()[0].duration_s, 4.0);
    }

    #[test]
    fn layer_time_never_drops_below_exposure_plus_overhead() {
        let mut job = simple_job(10, 3, 0);
        job.firmware_overhead_s = 1.4;
        let plan = compute(&job).unwrap().layers;
        for e in plan.entries() {
            let exposure = match e.kind {
                LayerKind::Bottom => 10.0,
                _ => 2.0,
            };
            assert!(e.duration_s >= exposure + 1.4, "layer {}", e.index);
        }
    }

    #[test]
    fn rests_add_their_sum_to_every_layer() {
        let base = compute(&simple_job(4, 2, 0)).unwrap().layers;
        let mut rested = simple_job(4, 2, 0);
        rested.rests = RestPauses {
            before_lift_s: 0.5,
            after_lift_s: 0.0,
            after_retract_s: 2.0,
        };
        let plan = compute(&rested).unwrap().layers;
        for (a, b) in plan.entries().iter().zip(base.entries()) {
            assert_eq!(a.duration_s, b.duration_s + 2.5);
        }
    }

    #[test]
    fn total_duration_is_the_sum_of_entry_durations() {
        let plan = compute(&simple_job(100, 5, 0)).unwrap().layers;
        let expected: Duration = plan.entries().iter().map(|e| e.duration()).sum();
        assert_eq!(plan.total_duration(), expected);
        // 5 × 13 s + 95 × 4 s = 445 s
        assert_eq!(plan.total_duration_s(), 445.0);
    }

    // ── transition ramp ───────────────────────────────────────────────────────

    #[test]
    fn linear_transition_durations_descend_from_bottom_toward_normal() {
        let mut job = simple_job(20, 5, 7);
        // gap of 48 s over 8 steps: step is exactly 6 s
        job.bottom.exposure_s = 50.0;
        let out = compute(&job).unwrap();

        assert_eq!(out.summary.transition_step_s, Some(6.0));
        // transition exposure 44..8 s, plus 2 s of normal motion
        let expected = vec![46.0, 40.0, 34.0, 28.0, 22.0, 16.0, 10.0];
        assert_eq!(out.summary.transition_layer_s, expected);

        let band: Vec<f64> = out.layers.entries()[5..12]
            .iter()
            .map(|e| e.duration_s)
            .collect();
        assert_eq!(band, expected);
    }

    #[test]
    fn linear_transition_layers_use_normal_motion() {
        let job = simple_job(20, 5, 7);
        let out = compute(&job).unwrap();
        let normal_motion_s = 2.0; // lift 1 s + retract 1 s
        for (i, t) in out.summary.transition_layer_s.iter().enumerate() {
            let exposure = t - normal_motion_s;
            assert!(
                exposure > 2.0 && exposure < 10.0,
                "transition {i} exposure {exposure} outside (normal, bottom)"
            );
        }
    }

    #[test]
    fn fixed_transition_gives_a_uniform_band_and_no_step() {
        let mut job = simple_job(20, 5, 7);
        job.transition = TransitionRamp::Fixed(LayerSettings::new(
            5.0,
            MotionProfile::single_stage(segment(5.0, 5.0), segment(5.0, 5.0)),
        ));
        let out = compute(&job).unwrap();
        assert_eq!(out.summary.transition_step_s, None);
        assert_eq!(out.summary.transition_layer_s, vec![7.0; 7]);
    }

    // ── measured overrides ────────────────────────────────────────────────────

    #[test]
    fn measured_override_replaces_duration_but_summary_keeps_theoretical() {
        let mut job = simple_job(20, 5, 7);
        job.measured_bottom_s = Some(126.9);
        job.measured_normal_s = Some(9.03);
        let out = compute(&job).unwrap();

        assert_eq!(out.summary.bottom_theoretical_s, 13.0);
        assert_eq!(out.summary.normal_theoretical_s, 4.0);
        assert_eq!(out.summary.bottom_effective_s, 126.9);
        assert_eq!(out.summary.normal_effective_s, 9.03);
        assert!(out.summary.bottom_measured);
        assert!(out.summary.normal_measured);

        for e in out.layers.entries() {
            match e.kind {
                LayerKind::Bottom => assert_eq!(e.duration_s, 126.9),
                LayerKind::Normal => assert_eq!(e.duration_s, 9.03),
                // transitions stay theoretical
                LayerKind::Transition => assert!(e.duration_s < 13.0),
            }
        }
    }

    // ── validation ────────────────────────────────────────────────────────────

    #[test]
    fn zero_total_layers_is_rejected() {
        let job = simple_job(0, 0, 0);
        assert_eq!(validate(&job).unwrap_err(), PlanError::NoLayers);
    }

    #[test]
    fn reserved_layers_beyond_total_are_rejected() {
        let job = simple_job(10, 8, 3);
        assert_eq!(
            validate(&job).unwrap_err(),
            PlanError::LayerCountOverflow {
                bottom: 8,
                transition: 3,
                total: 10
            }
        );
    }

    #[test]
    fn non_positive_exposure_is_rejected() {
        let mut job = simple_job(10, 2, 0);
        job.bottom.exposure_s = 0.0;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidExposure {
                kind: LayerKind::Bottom,
                ..
            }
        ));
    }

    #[test]
    fn nan_exposure_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.normal.exposure_s = f64::NAN;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidExposure {
                kind: LayerKind::Normal,
                ..
            }
        ));
    }

    #[test]
    fn moving_stage_with_zero_speed_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.normal.motion.retract = segment(5.0, 0.0);
        match validate(&job).unwrap_err() {
            PlanError::InvalidStageSpeed { kind, stage, .. } => {
                assert_eq!(kind, LayerKind::Normal);
                assert_eq!(stage, "retract");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn negative_stage_distance_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.normal.motion.second_lift = Some(segment(-1.0, 4.0));
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidStageDistance {
                stage: "second lift",
                ..
            }
        ));
    }

    #[test]
    fn negative_rest_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.rests.after_lift_s = -0.1;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidRest {
                which: "after_lift",
                ..
            }
        ));
    }

    #[test]
    fn negative_overhead_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.firmware_overhead_s = -1.4;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidOverhead { .. }
        ));
    }

    #[test]
    fn non_positive_measured_time_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.measured_normal_s = Some(0.0);
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidMeasuredTime {
                kind: LayerKind::Normal,
                ..
            }
        ));
    }

    #[test]
    fn infinite_exposure_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.normal.exposure_s = f64::INFINITY;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidExposure {
                kind: LayerKind::Normal,
                ..
            }
        ));
        assert!(compute(&job).is_err());
    }

    #[test]
    fn infinite_rest_and_overhead_are_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.rests.after_retract_s = f64::INFINITY;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidRest {
                which: "after_retract",
                ..
            }
        ));

        let mut job = simple_job(10, 0, 0);
        job.firmware_overhead_s = f64::INFINITY;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidOverhead { .. }
        ));
    }

    #[test]
    fn non_finite_motion_values_are_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.normal.motion.lift = segment(f64::INFINITY, 4.0);
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidStageDistance { stage: "lift", .. }
        ));

        let mut job = simple_job(10, 0, 0);
        job.normal.motion.lift = segment(5.0, f64::INFINITY);
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidStageSpeed { stage: "lift", .. }
        ));
    }

    #[test]
    fn infinite_measured_time_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.measured_normal_s = Some(f64::INFINITY);
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidMeasuredTime {
                kind: LayerKind::Normal,
                ..
            }
        ));
    }

    #[test]
    fn layer_time_over_the_ceiling_is_rejected() {
        let mut job = simple_job(10, 0, 0);
        job.measured_normal_s = Some(MAX_LAYER_SECONDS * 2.0);
        match compute(&job).unwrap_err() {
            PlanError::LayerTimeTooLong { kind, computed_s } => {
                assert_eq!(kind, LayerKind::Normal);
                assert_eq!(computed_s, MAX_LAYER_SECONDS * 2.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // the ceiling itself is still allowed
        job.measured_normal_s = Some(MAX_LAYER_SECONDS);
        assert!(compute(&job).is_ok());
    }

    #[test]
    fn finite_fields_overflowing_to_infinity_are_caught() {
        // both fields pass validation on their own; the quotient does not fit
        let mut job = simple_job(10, 0, 0);
        job.normal.motion.lift = segment(1e308, 1e-300);
        assert!(matches!(
            compute(&job).unwrap_err(),
            PlanError::LayerTimeTooLong {
                kind: LayerKind::Normal,
                ..
            }
        ));
    }

    #[test]
    fn unused_category_is_not_validated() {
        // No bottom layers and no transition band: bottom settings may be
        // arbitrary garbage.
        let mut job = simple_job(10, 0, 0);
        job.bottom.exposure_s = -99.0;
        job.bottom.motion.lift = segment(5.0, 0.0);
        assert!(validate(&job).is_ok());
        assert_eq!(compute(&job).unwrap().layers.len(), 10);
    }

    #[test]
    fn linear_band_revalidates_the_bottom_exposure() {
        // No bottom layers, but a linear band still ramps from the bottom
        // exposure.
        let mut job = simple_job(10, 0, 3);
        job.bottom.exposure_s = -99.0;
        assert!(matches!(
            validate(&job).unwrap_err(),
            PlanError::InvalidExposure {
                kind: LayerKind::Bottom,
                ..
            }
        ));
    }

    #[test]
    fn error_and_plan_never_coexist() {
        let job = simple_job(10, 8, 3);
        assert!(compute(&job).is_err());
    }

    // ── uniform plans ─────────────────────────────────────────────────────────

    #[test]
    fn uniform_plan_numbers_layers_from_the_given_index() {
        let plan = LayerPlan::uniform(5000, 3, LayerKind::Normal, 9.0);
        let indices: Vec<u32> = plan.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![5000, 5001, 5002]);
        assert!(plan.entries().iter().all(|e| e.duration_s == 9.0));
        assert_eq!(plan.count_of(LayerKind::Normal), 3);
    }

    #[test]
    fn uniform_plan_with_zero_count_is_empty() {
        assert!(LayerPlan::uniform(0, 0, LayerKind::Normal, 1.0).is_empty());
    }
}
