/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Core print-job data structures for the layer timing model.
//!
//! A resin print is described the way a slicer describes it:
//!
//! ```text
//! PrintJob
//! ├── bottom      LayerSettings   (exposure + MotionProfile)
//! ├── transition  TransitionRamp  (linear exposure ramp, or explicit settings)
//! ├── normal      LayerSettings
//! ├── rests       RestPauses      (slicer "waiting mode" pauses, per layer)
//! └── firmware_overhead_s         (per-layer controller/settle latency)
//! ```
//!
//! # Ownership model
//! A `PrintJob` is assembled once (from a profile plus the operator-supplied
//! total layer count), validated by the planner, and then only read.  The
//! [`LayerPlan`](crate::plan::LayerPlan) built from it is **moved** into the
//! capture scheduler, which owns it for the life of the run.

// ── Motion ────────────────────────────────────────────────────────────────────

/// One straight Z move: a distance at a constant speed.
///
/// Speeds are stored in mm/s, the unit the duration formula divides by.
/// Slicers display speeds in mm/min; use [`MotionSegment::from_slicer`] when
/// carrying values over from a slicer screen, and let the profile loader do
/// the conversion for YAML input.
///
/// A zero-distance segment takes zero time regardless of its speed, so
/// "stage absent" and "stage present with distance 0" behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSegment {
    pub distance_mm: f64,
    pub speed_mm_s: f64,
}

impl MotionSegment {
    pub const fn new(distance_mm: f64, speed_mm_s: f64) -> Self {
        Self {
            distance_mm,
            speed_mm_s,
        }
    }

    /// Build a segment from slicer units (speed in mm/min).
    pub fn from_slicer(distance_mm: f64, speed_mm_min: f64) -> Self {
        Self {
            distance_mm,
            speed_mm_s: speed_mm_min / 60.0,
        }
    }

    /// Travel time in seconds.  Zero distance ⇒ zero time, even at zero
    /// speed; the planner rejects a *positive* distance with a non-positive
    /// speed before this is ever evaluated.
    pub fn travel_time_s(&self) -> f64 {
        if self.distance_mm == 0.0 {
            0.0
        } else {
            self.distance_mm / self.speed_mm_s
        }
    }
}

/// Two-stage lift / two-stage retract motion for one layer category.
///
/// The second stage of each direction is the slicer "+" stage: optional, and
/// additive when present.  It is a real `Option` rather than a flag plus bare
/// fields so the duration formula stays uniform: `None` contributes exactly
/// what a zero-distance segment would.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionProfile {
    pub lift: MotionSegment,
    pub second_lift: Option<MotionSegment>,
    pub retract: MotionSegment,
    pub second_retract: Option<MotionSegment>,
}

impl MotionProfile {
    /// Profile with single-stage lift and retract only.
    pub fn single_stage(lift: MotionSegment, retract: MotionSegment) -> Self {
        Self {
            lift,
            second_lift: None,
            retract,
            second_retract: None,
        }
    }

    /// Every present stage with its human-readable name, in motion order.
    /// Used by the planner's validation to point at the offending stage.
    pub fn stages(&self) -> impl Iterator<Item = (&'static str, MotionSegment)> {
        [
            ("lift", Some(self.lift)),
            ("second lift", self.second_lift),
            ("retract", Some(self.retract)),
            ("second retract", self.second_retract),
        ]
        .into_iter()
        .filter_map(|(name, seg)| seg.map(|s| (name, s)))
    }
}

// ── Layer categories ──────────────────────────────────────────────────────────

/// Which timing regime a layer belongs to.
///
/// Bottom layers come first (long exposure for plate adhesion), then the
/// optional transition band, then normal layers to the end of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Bottom,
    Transition,
    Normal,
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Bottom => "bottom",
            LayerKind::Transition => "transition",
            LayerKind::Normal => "normal",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Exposure plus motion for one layer category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSettings {
    /// UV exposure in seconds.  Must be > 0.
    pub exposure_s: f64,
    pub motion: MotionProfile,
}

impl LayerSettings {
    pub fn new(exposure_s: f64, motion: MotionProfile) -> Self {
        Self {
            exposure_s,
            motion,
        }
    }
}

// ── Rest pauses ───────────────────────────────────────────────────────────────

/// Per-layer rest pauses (slicer "waiting mode"), all in seconds, all ≥ 0.
///
/// Applied identically to every layer category.  With all three at zero the
/// layer duration reduces to exposure + motion + firmware overhead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RestPauses {
    pub before_lift_s: f64,
    pub after_lift_s: f64,
    pub after_retract_s: f64,
}

impl RestPauses {
    pub const fn none() -> Self {
        Self {
            before_lift_s: 0.0,
            after_lift_s: 0.0,
            after_retract_s: 0.0,
        }
    }

    pub fn total_s(&self) -> f64 {
        self.before_lift_s + self.after_lift_s + self.after_retract_s
    }
}

// ── Transition ramp ───────────────────────────────────────────────────────────

/// How transition-layer timing is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionRamp {
    /// ChiTuBox-style linear convention: exposure steps from the bottom
    /// exposure toward the normal exposure in `count + 1` equal increments,
    /// and every transition layer moves with the **normal** motion profile.
    /// Each transition layer therefore has its own duration.
    Linear,

    /// Every transition layer uses one explicit parameter block, giving the
    /// whole band a single fixed duration.
    Fixed(LayerSettings),
}

impl Default for TransitionRamp {
    fn default() -> Self {
        TransitionRamp::Linear
    }
}

// ── PrintJob ──────────────────────────────────────────────────────────────────

/// Everything the layer timing model needs to know about one print.
///
/// `firmware_overhead_s` is the measured per-layer latency the controller
/// adds on top of the slicer motion math (acceleration, settling, frame
/// handling).  It is an explicit field rather than a process-wide constant,
/// so the model stays a pure function of its input.  Calibrate it by timing
/// a handful of real layers and comparing against the theoretical values in
/// the plan summary.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    /// Total layer count reported by the slicer.  Must be ≥ 1.
    pub total_layers: u32,

    /// Number of bottom layers.  May be 0.
    pub bottom_count: u32,

    /// Number of transition layers between the bottom and normal regimes.
    /// May be 0.
    pub transition_count: u32,

    pub bottom: LayerSettings,
    pub normal: LayerSettings,
    pub transition: TransitionRamp,

    pub rests: RestPauses,

    /// Fixed per-layer firmware/controller overhead in seconds, ≥ 0.
    pub firmware_overhead_s: f64,

    /// Measured real-world bottom layer time in seconds.  When set, the plan
    /// uses it in place of the theoretical bottom duration; the summary still
    /// reports the theoretical value for calibration.
    pub measured_bottom_s: Option<f64>,

    /// Measured real-world normal layer time; same override rule as
    /// [`measured_bottom_s`](Self::measured_bottom_s).
    pub measured_normal_s: Option<f64>,
}

impl PrintJob {
    /// Layers left for the normal regime after bottoms and transitions.
    pub fn normal_count(&self) -> u32 {
        self.total_layers
            .saturating_sub(self.bottom_count)
            .saturating_sub(self.transition_count)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
