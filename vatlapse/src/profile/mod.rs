//! Print profile loading.
//!
//! A profile describes the printer's slicer settings plus camera and output
//! preferences.  Every block is optional; whatever is absent falls back to
//! the built-in defaults, which match a GKTwo-class printer sliced with
//! ChiTuBox-style settings.  Inside a `bottom:`/`normal:` settings block,
//! `exposure_s`, `lift` and `retract` are required; only the second stages
//! are optional.
//!
//! The expected YAML structure is:
//! ```yaml
//! job:
//!   bottom_layers: 10
//!   transition_layers: 7
//!   bottom:
//!     exposure_s: 50.0
//!     lift: { distance_mm: 5.0, speed_mm_min: 50.0 }
//!     second_lift: { distance_mm: 5.0, speed_mm_min: 100.0 }
//!     retract: { distance_mm: 9.0, speed_mm_min: 100.0 }
//!     second_retract: { distance_mm: 1.0, speed_mm_min: 50.0 }
//!   normal:
//!     exposure_s: 1.7
//!     lift: { distance_mm: 1.8, speed_mm_min: 135.0 }
//!     second_lift: { distance_mm: 2.4, speed_mm_min: 230.0 }
//!     retract: { distance_mm: 2.2, speed_mm_min: 230.0 }
//!     second_retract: { distance_mm: 2.0, speed_mm_min: 90.0 }
//!   transition:
//!     mode: linear
//!   rests:
//!     before_lift_s: 0.5
//!     after_lift_s: 0.0
//!     after_retract_s: 2.0
//!   firmware_overhead_s: 1.4
//!   measured_bottom_s: 126.9     # optional, omit to use the theoretical time
//!   measured_normal_s: 9.03      # optional
//! camera:
//!   device: /dev/video0
//!   input_format: v4l2
//!   width: 1920
//!   height: 1080
//!   jpeg_quality: 2
//! output:
//!   root_dir: captures
//!   keep_frames: false
//!   open_folder: true
//!   extra_capture_s: 600.0
//! ```
//!
//! Speeds in the file are mm/min, the unit slicers display.  Conversion to
//! the model's mm/s happens once, here, at parse time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::camera::CameraSettings;
use crate::job::{
    LayerSettings, MotionProfile, MotionSegment, PrintJob, RestPauses, TransitionRamp,
};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
///
/// Kept private, callers work with [`PrintProfile`] instead.
#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    job: Option<JobFile>,
    #[serde(default)]
    camera: Option<CameraFile>,
    #[serde(default)]
    output: Option<OutputFile>,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    bottom_layers: Option<u32>,
    transition_layers: Option<u32>,
    bottom: Option<SettingsFile>,
    normal: Option<SettingsFile>,
    transition: Option<TransitionFile>,
    rests: Option<RestsFile>,
    firmware_overhead_s: Option<f64>,
    measured_bottom_s: Option<f64>,
    measured_normal_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    exposure_s: f64,
    lift: SegmentFile,
    second_lift: Option<SegmentFile>,
    retract: SegmentFile,
    second_retract: Option<SegmentFile>,
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    distance_mm: f64,
    /// mm/min, as the slicer shows it.
    speed_mm_min: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum TransitionFile {
    Linear,
    Fixed {
        exposure_s: f64,
        lift: SegmentFile,
        second_lift: Option<SegmentFile>,
        retract: SegmentFile,
        second_retract: Option<SegmentFile>,
    },
}

#[derive(Debug, Deserialize)]
struct RestsFile {
    before_lift_s: Option<f64>,
    after_lift_s: Option<f64>,
    after_retract_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CameraFile {
    device: Option<String>,
    input_format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OutputFile {
    root_dir: Option<PathBuf>,
    keep_frames: Option<bool>,
    open_folder: Option<bool>,
    extra_capture_s: Option<f64>,
}

impl SegmentFile {
    fn into_segment(self) -> MotionSegment {
        MotionSegment::from_slicer(self.distance_mm, self.speed_mm_min)
    }
}

impl SettingsFile {
    fn into_settings(self) -> LayerSettings {
        LayerSettings {
            exposure_s: self.exposure_s,
            motion: MotionProfile {
                lift: self.lift.into_segment(),
                second_lift: self.second_lift.map(SegmentFile::into_segment),
                retract: self.retract.into_segment(),
                second_retract: self.second_retract.map(SegmentFile::into_segment),
            },
        }
    }
}

// ── Public data structures ────────────────────────────────────────────────────

/// Per-printer slicer parameters, everything a [`PrintJob`] needs except the
/// total layer count (which changes per print and is asked at run time).
#[derive(Debug, Clone, PartialEq)]
pub struct JobProfile {
    pub bottom_count: u32,
    pub transition_count: u32,
    pub bottom: LayerSettings,
    pub normal: LayerSettings,
    pub transition: TransitionRamp,
    pub rests: RestPauses,
    pub firmware_overhead_s: f64,
    pub measured_bottom_s: Option<f64>,
    pub measured_normal_s: Option<f64>,
}

impl JobProfile {
    /// Combine the profile with the slicer-reported layer count.
    pub fn job(&self, total_layers: u32) -> PrintJob {
        PrintJob {
            total_layers,
            bottom_count: self.bottom_count,
            transition_count: self.transition_count,
            bottom: self.bottom,
            normal: self.normal,
            transition: self.transition,
            rests: self.rests,
            firmware_overhead_s: self.firmware_overhead_s,
            measured_bottom_s: self.measured_bottom_s,
            measured_normal_s: self.measured_normal_s,
        }
    }
}

impl Default for JobProfile {
    /// GKTwo settings as sliced: 10 bottom layers at 50 s, a 7-layer linear
    /// band, normal layers at 1.7 s, two-stage motion throughout.
    fn default() -> Self {
        Self {
            bottom_count: 10,
            transition_count: 7,
            bottom: LayerSettings {
                exposure_s: 50.0,
                motion: MotionProfile {
                    lift: MotionSegment::from_slicer(5.0, 50.0),
                    second_lift: Some(MotionSegment::from_slicer(5.0, 100.0)),
                    retract: MotionSegment::from_slicer(9.0, 100.0),
                    second_retract: Some(MotionSegment::from_slicer(1.0, 50.0)),
                },
            },
            normal: LayerSettings {
                exposure_s: 1.7,
                motion: MotionProfile {
                    lift: MotionSegment::from_slicer(1.8, 135.0),
                    second_lift: Some(MotionSegment::from_slicer(2.4, 230.0)),
                    retract: MotionSegment::from_slicer(2.2, 230.0),
                    second_retract: Some(MotionSegment::from_slicer(2.0, 90.0)),
                },
            },
            transition: TransitionRamp::Linear,
            rests: RestPauses {
                before_lift_s: 0.5,
                after_lift_s: 0.0,
                after_retract_s: 2.0,
            },
            firmware_overhead_s: 1.4,
            measured_bottom_s: None,
            measured_normal_s: None,
        }
    }
}

/// Where output goes and what happens to it after the render.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub root_dir: PathBuf,
    /// Keep the `seq_*.jpg` frames next to the MP4 instead of deleting them.
    pub keep_frames: bool,
    /// Reveal the rendered file in the OS file manager when done.
    pub open_folder: bool,
    /// Seconds of extra capture after the last planned layer, at the normal
    /// cadence.  Covers the tail where the printer is still finishing while
    /// the model says the print is done.
    pub extra_capture_s: f64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("captures"),
            keep_frames: false,
            open_folder: true,
            extra_capture_s: 600.0,
        }
    }
}

/// The full validated-shape profile: job parameters, camera, output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintProfile {
    pub job: JobProfile,
    pub camera: CameraSettings,
    pub output: OutputSettings,
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl ProfileFile {
    fn into_profile(self) -> PrintProfile {
        PrintProfile {
            job: self.job.map(JobFile::into_profile).unwrap_or_default(),
            camera: self.camera.map(CameraFile::into_settings).unwrap_or_default(),
            output: self.output.map(OutputFile::into_settings).unwrap_or_default(),
        }
    }
}

impl JobFile {
    fn into_profile(self) -> JobProfile {
        let d = JobProfile::default();
        let rests = match self.rests {
            Some(r) => RestPauses {
                before_lift_s: r.before_lift_s.unwrap_or(d.rests.before_lift_s),
                after_lift_s: r.after_lift_s.unwrap_or(d.rests.after_lift_s),
                after_retract_s: r.after_retract_s.unwrap_or(d.rests.after_retract_s),
            },
            None => d.rests,
        };
        let transition = match self.transition {
            Some(TransitionFile::Linear) => TransitionRamp::Linear,
            Some(TransitionFile::Fixed {
                exposure_s,
                lift,
                second_lift,
                retract,
                second_retract,
            }) => TransitionRamp::Fixed(
                SettingsFile {
                    exposure_s,
                    lift,
                    second_lift,
                    retract,
                    second_retract,
                }
                .into_settings(),
            ),
            None => d.transition,
        };
        JobProfile {
            bottom_count: self.bottom_layers.unwrap_or(d.bottom_count),
            transition_count: self.transition_layers.unwrap_or(d.transition_count),
            bottom: self.bottom.map(SettingsFile::into_settings).unwrap_or(d.bottom),
            normal: self.normal.map(SettingsFile::into_settings).unwrap_or(d.normal),
            transition,
            rests,
            firmware_overhead_s: self.firmware_overhead_s.unwrap_or(d.firmware_overhead_s),
            measured_bottom_s: self.measured_bottom_s,
            measured_normal_s: self.measured_normal_s,
        }
    }
}

impl CameraFile {
    fn into_settings(self) -> CameraSettings {
        let d = CameraSettings::default();
        CameraSettings {
            device: self.device.unwrap_or(d.device),
            input_format: self.input_format.unwrap_or(d.input_format),
            width: self.width.unwrap_or(d.width),
            height: self.height.unwrap_or(d.height),
            jpeg_quality: self.jpeg_quality.unwrap_or(d.jpeg_quality),
        }
    }
}

impl OutputFile {
    fn into_settings(self) -> OutputSettings {
        let d = OutputSettings::default();
        OutputSettings {
            root_dir: self.root_dir.unwrap_or(d.root_dir),
            keep_frames: self.keep_frames.unwrap_or(d.keep_frames),
            open_folder: self.open_folder.unwrap_or(d.open_folder),
            extra_capture_s: self.extra_capture_s.unwrap_or(d.extra_capture_s),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parse `path` into a [`PrintProfile`].
///
/// # Errors
/// Returns an error if the file cannot be opened or the YAML is structurally
/// invalid.  Value-level validation (positive exposures, valid speeds) is the
/// planner's job, not the loader's.
pub fn load_from_file(path: &Path) -> Result<PrintProfile> {
    info!("Loading print profile from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open profile file: {}", path.display()))?;

    let file: ProfileFile = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse profile YAML: {}", path.display()))?;

    let profile = file.into_profile();
    info!(
        bottom_layers = profile.job.bottom_count,
        transition_layers = profile.job.transition_count,
        overhead_s = profile.job.firmware_overhead_s,
        "Print profile loaded"
    );
    debug!(
        device = %profile.camera.device,
        format = %profile.camera.input_format,
        root = %profile.output.root_dir.display(),
        "  camera/output settings"
    );

    Ok(profile)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_job_profile_matches_the_builtin_printer_settings() {
        let d = JobProfile::default();
        assert_eq!(d.bottom_count, 10);
        assert_eq!(d.transition_count, 7);
        assert_eq!(d.bottom.exposure_s, 50.0);
        assert_eq!(d.normal.exposure_s, 1.7);
        assert_eq!(d.firmware_overhead_s, 1.4);
        assert_eq!(d.rests.total_s(), 2.5);
        assert_eq!(d.transition, TransitionRamp::Linear);
        assert!(d.measured_bottom_s.is_none());
        assert!(d.measured_normal_s.is_none());

        // slicer mm/min converted once, at the boundary
        assert_eq!(d.normal.motion.lift.speed_mm_s, 135.0 / 60.0);
        assert_eq!(d.bottom.motion.retract.distance_mm, 9.0);
        assert_eq!(d.bottom.motion.retract.speed_mm_s, 100.0 / 60.0);
    }

    #[test]
    fn default_profile_passes_plan_validation() {
        let profile = PrintProfile::default();
        assert!(crate::plan::validate(&profile.job.job(100)).is_ok());
    }

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn full_yaml_profile_parses_every_block() {
        let yaml = r#"
job:
  bottom_layers: 4
  transition_layers: 2
  bottom:
    exposure_s: 40.0
    lift: { distance_mm: 5.0, speed_mm_min: 60.0 }
    retract: { distance_mm: 5.0, speed_mm_min: 120.0 }
  normal:
    exposure_s: 2.0
    lift: { distance_mm: 1.8, speed_mm_min: 135.0 }
    second_lift: { distance_mm: 2.4, speed_mm_min: 240.0 }
    retract: { distance_mm: 2.2, speed_mm_min: 240.0 }
    second_retract: { distance_mm: 2.0, speed_mm_min: 90.0 }
  rests:
    before_lift_s: 1.0
  firmware_overhead_s: 0.9
  measured_normal_s: 9.03
camera:
  device: /dev/video2
  width: 1280
  height: 720
output:
  root_dir: out/prints
  keep_frames: true
"#;
        let f = yaml_tempfile(yaml);
        let p = load_from_file(f.path()).unwrap();

        assert_eq!(p.job.bottom_count, 4);
        assert_eq!(p.job.transition_count, 2);
        assert_eq!(p.job.bottom.exposure_s, 40.0);
        // 60 mm/min is 1 mm/s
        assert_eq!(p.job.bottom.motion.lift.speed_mm_s, 1.0);
        assert!(p.job.bottom.motion.second_lift.is_none());
        assert_eq!(p.job.normal.motion.second_lift.unwrap().speed_mm_s, 4.0);
        assert_eq!(p.job.measured_normal_s, Some(9.03));
        assert_eq!(p.job.measured_bottom_s, None);
        assert_eq!(p.job.firmware_overhead_s, 0.9);

        // partial rests block: unset fields keep their defaults
        assert_eq!(p.job.rests.before_lift_s, 1.0);
        assert_eq!(p.job.rests.after_retract_s, 2.0);

        assert_eq!(p.camera.device, "/dev/video2");
        assert_eq!((p.camera.width, p.camera.height), (1280, 720));
        assert_eq!(p.output.root_dir, PathBuf::from("out/prints"));
        assert!(p.output.keep_frames);
        // unspecified output fields keep their defaults
        assert!(p.output.open_folder);
        assert_eq!(p.output.extra_capture_s, 600.0);
    }

    #[test]
    fn absent_blocks_fall_back_to_defaults() {
        let f = yaml_tempfile("output:\n  keep_frames: true\n");
        let p = load_from_file(f.path()).unwrap();
        assert_eq!(p.job, JobProfile::default());
        assert_eq!(p.camera, CameraSettings::default());
        assert!(p.output.keep_frames);
    }

    #[test]
    fn fixed_transition_mode_parses_its_own_settings() {
        let yaml = r#"
job:
  transition:
    mode: fixed
    exposure_s: 5.0
    lift: { distance_mm: 3.0, speed_mm_min: 90.0 }
    retract: { distance_mm: 3.0, speed_mm_min: 180.0 }
"#;
        let f = yaml_tempfile(yaml);
        let p = load_from_file(f.path()).unwrap();
        match p.job.transition {
            TransitionRamp::Fixed(s) => {
                assert_eq!(s.exposure_s, 5.0);
                assert_eq!(s.motion.lift.speed_mm_s, 1.5);
            }
            other => panic!("expected fixed transition, got {other:?}"),
        }
    }

    #[test]
    fn linear_transition_mode_parses_as_the_default_ramp() {
        let f = yaml_tempfile("job:\n  transition:\n    mode: linear\n");
        let p = load_from_file(f.path()).unwrap();
        assert_eq!(p.job.transition, TransitionRamp::Linear);
    }

    #[test]
    fn missing_file_returns_error() {
        assert!(load_from_file(Path::new("/nonexistent/profile.yaml")).is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("job: [not, a, mapping");
        assert!(load_from_file(f.path()).is_err());
    }

    #[test]
    fn a_settings_block_missing_required_fields_fails_to_parse() {
        // a provided bottom/normal block must spell out exposure, lift and
        // retract; only the second stages may be left off
        let f = yaml_tempfile("job:\n  normal:\n    exposure_s: 2.0\n");
        assert!(load_from_file(f.path()).is_err());
    }

    #[test]
    fn yaml_inf_values_fail_plan_validation() {
        let yaml = r#"
job:
  normal:
    exposure_s: .inf
    lift: { distance_mm: 1.8, speed_mm_min: 135.0 }
    retract: { distance_mm: 2.2, speed_mm_min: 240.0 }
"#;
        let f = yaml_tempfile(yaml);
        let p = load_from_file(f.path()).unwrap();
        // the loader passes it through untouched, the planner refuses it
        assert_eq!(p.job.normal.exposure_s, f64::INFINITY);
        assert!(crate::plan::validate(&p.job.job(100)).is_err());
    }

    // ── JobProfile::job ───────────────────────────────────────────────────────

    #[test]
    fn jobs_built_from_the_profile_carry_the_layer_count() {
        let profile = JobProfile::default();
        let job = profile.job(5000);
        assert_eq!(job.total_layers, 5000);
        assert_eq!(job.bottom_count, profile.bottom_count);
        assert_eq!(job.normal_count(), 5000 - 10 - 7);
    }
}
