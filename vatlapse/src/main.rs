/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use clap::Parser;
use tracing::{error, info, warn};

use vatlapse::camera::FfmpegCamera;
use vatlapse::job::LayerKind;
use vatlapse::plan::{self, ComputedPlan, LayerPlan, PlanSummary};
use vatlapse::profile::{self, PrintProfile};
use vatlapse::prompt;
use vatlapse::render::{self, RenderSettings};
use vatlapse::scheduler::{CancelFlag, CaptureScheduler, RunOutcome, SystemClock};
use vatlapse::session;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Per-layer timelapse capture for resin printers.
///
/// Example:
///   vatlapse -c gktwo.yaml -l 3182 -t 10
#[derive(Debug, Parser)]
#[command(
    name = "vatlapse",
    about = "Per-layer timelapse capture for resin printers",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML print profile (built-in GKTwo defaults when omitted).
    #[arg(short = 'c', long = "profile")]
    profile: Option<PathBuf>,

    /// Session name; also the video filename.  Prompted for when omitted.
    #[arg(short = 's', long = "session")]
    session: Option<String>,

    /// Total layer count as reported by the slicer.
    #[arg(short = 'l', long = "layers")]
    layers: Option<u32>,

    /// Timelapse framerate when no target length is set.
    #[arg(short = 'r', long = "fps")]
    fps: Option<u32>,

    /// Target video length in seconds; 0 keeps the plain framerate.
    #[arg(short = 't', long = "video-seconds")]
    video_seconds: Option<f64>,

    /// Root directory for session folders, overriding the profile.
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Take every default without prompting (for scripted runs).
    #[arg(long = "non-interactive", default_value_t = false)]
    non_interactive: bool,
}

// ── Console helpers ───────────────────────────────────────────────────────────

fn ask_or_exit<T>(input: &mut impl BufRead, output: &mut impl Write, label: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match prompt::ask(input, output, label, default) {
        Ok(value) => value,
        Err(e) => {
            error!("Console input failed: {e}");
            process::exit(1);
        }
    }
}

fn log_plan_summary(summary: &PlanSummary) {
    info!(
        "Plan: {} layers ({} bottom, {} transition, {} normal)",
        summary.bottom_count + summary.transition_count + summary.normal_count,
        summary.bottom_count,
        summary.transition_count,
        summary.normal_count,
    );
    if summary.bottom_count > 0 {
        if summary.bottom_measured {
            info!(
                "  bottom layer:     {:.2}s measured  (theory {:.2}s)",
                summary.bottom_effective_s, summary.bottom_theoretical_s,
            );
        } else {
            info!("  bottom layer:     {:.2}s", summary.bottom_effective_s);
        }
    }
    if summary.normal_count > 0 {
        if summary.normal_measured {
            info!(
                "  normal layer:     {:.2}s measured  (theory {:.2}s)",
                summary.normal_effective_s, summary.normal_theoretical_s,
            );
        } else {
            info!("  normal layer:     {:.2}s", summary.normal_effective_s);
        }
    }
    if let Some(step) = summary.transition_step_s {
        info!("  transition:       exposure steps down {step:.3}s per layer");
    }
    if !summary.transition_layer_s.is_empty() {
        let times: Vec<String> = summary
            .transition_layer_s
            .iter()
            .map(|t| format!("{t:.2}"))
            .collect();
        info!("  transition layers: [{}]s", times.join(", "));
    }
    info!(
        "  total:            {:.0}s (~{:.2}h)",
        summary.total_duration_s,
        summary.total_duration_s / 3600.0,
    );
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    info!("vatlapse starting up...");

    // ── Parse CLI arguments ───────────────────────────────────────────────────
    let cli = Cli::parse();

    info!(
        profile         = ?cli.profile,
        session         = ?cli.session,
        layers          = ?cli.layers,
        fps             = ?cli.fps,
        video_seconds   = ?cli.video_seconds,
        out_dir         = ?cli.out_dir,
        non_interactive = cli.non_interactive,
        "Configuration"
    );

    if !render::is_ffmpeg_on_path() {
        error!("ffmpeg was not found on PATH; install it and retry");
        process::exit(1);
    }

    // ── Load print profile ────────────────────────────────────────────────────
    let profile = match &cli.profile {
        Some(path) => match profile::load_from_file(path) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to load print profile: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No print profile provided, using built-in GKTwo settings");
            PrintProfile::default()
        }
    };

    // ── Gather run parameters ─────────────────────────────────────────────────
    let default_session = Local::now().format("print_%Y%m%d").to_string();
    let (session_raw, total_layers, fps, video_seconds) = {
        let mut input = io::stdin().lock();
        let mut output = io::stdout();

        let session_raw = match cli.session {
            Some(v) => v,
            None if cli.non_interactive => default_session,
            None => ask_or_exit(&mut input, &mut output, "Session name", default_session),
        };
        let total_layers = match cli.layers {
            Some(v) => v,
            None if cli.non_interactive => 5000,
            None => ask_or_exit(&mut input, &mut output, "Total layers", 5000),
        };
        let fps = match cli.fps {
            Some(v) => v,
            None if cli.non_interactive => RenderSettings::default().fps,
            None => ask_or_exit(
                &mut input,
                &mut output,
                "Video fps",
                RenderSettings::default().fps,
            ),
        };
        let video_seconds = match cli.video_seconds {
            Some(v) => v,
            None if cli.non_interactive => 8.0,
            None => ask_or_exit(
                &mut input,
                &mut output,
                "Video length in seconds, 0 for plain fps",
                8.0,
            ),
        };
        (session_raw, total_layers, fps, video_seconds)
    };
    let target_seconds = (video_seconds > 0.0).then_some(video_seconds);

    // Catch a dead framerate now, not after hours of capture.
    let render_settings = RenderSettings {
        fps,
        target_seconds,
        ..RenderSettings::default()
    };
    if let Err(e) = render_settings.validate() {
        error!("Render settings are invalid: {e}");
        process::exit(1);
    }

    // ── Build and print the layer plan ────────────────────────────────────────
    let job = profile.job.job(total_layers);
    let ComputedPlan { layers, summary } = match plan::compute(&job) {
        Ok(p) => p,
        Err(e) => {
            error!("Print parameters are invalid: {e}");
            process::exit(1);
        }
    };

    log_plan_summary(&summary);
    let eta: DateTime<Local> = (SystemTime::now() + layers.total_duration()).into();
    info!("  estimated finish: {}", eta.format("%Y-%m-%d %H:%M"));

    // ── Allocate the session directory ────────────────────────────────────────
    let session = session::sanitize_name(&session_raw);
    let out_root = cli.out_dir.unwrap_or_else(|| profile.output.root_dir.clone());
    let session_dir = match session::allocate_session_dir(&out_root, &session) {
        Ok(dir) => dir,
        Err(e) => {
            error!("Could not allocate a session directory: {:#}", e);
            process::exit(1);
        }
    };

    // ── Run the capture schedule ──────────────────────────────────────────────
    let cancel = CancelFlag::new();
    prompt::spawn_cancel_watcher(cancel.clone());
    info!("Start the print now; type 'q' then enter to stop capturing early");

    let mut camera = FfmpegCamera::new(profile.camera.clone(), session_dir.clone());
    let clock = SystemClock;
    let scheduler = CaptureScheduler::new(&clock, cancel);

    // The tail keeps the cadence the plan ended on.
    let tail_cadence_s = layers.entries().last().map(|e| e.duration_s).unwrap_or_default();
    let mut report = scheduler.run(layers, &mut camera);

    if report.outcome == RunOutcome::Completed
        && profile.output.extra_capture_s > 0.0
        && tail_cadence_s > 0.0
    {
        let extra_frames = (profile.output.extra_capture_s / tail_cadence_s).ceil() as u32;
        info!(
            frames = extra_frames,
            window_s = profile.output.extra_capture_s,
            "Planned layers done, capturing on while the printer wraps up"
        );
        let tail = LayerPlan::uniform(
            report.next_layer_index,
            extra_frames,
            LayerKind::Normal,
            tail_cadence_s,
        );
        let tail_report = scheduler.run(tail, &mut camera);
        report.captured.extend(tail_report.captured);
        report.failed.extend(tail_report.failed);
        report.next_layer_index = tail_report.next_layer_index;
        report.elapsed += tail_report.elapsed;
        report.outcome = tail_report.outcome;
    }

    match report.outcome {
        RunOutcome::Completed => info!(
            captured = report.captured.len(),
            failed = report.failed.len(),
            elapsed_s = report.elapsed.as_secs(),
            "Run finished"
        ),
        RunOutcome::Cancelled => warn!(
            captured = report.captured.len(),
            next_layer = report.next_layer_index,
            "Run cancelled by operator"
        ),
    }

    // ── Render and tidy up ────────────────────────────────────────────────────
    // A cancelled run still renders whatever made it to disk.
    let frames_written = camera.frames_written();
    if frames_written == 0 {
        warn!("No frames were captured; nothing to render");
        return;
    }

    match render::render_video(&session_dir, &session, frames_written, &render_settings) {
        Ok(video) => {
            if !profile.output.keep_frames {
                if let Err(e) = render::delete_frames(&session_dir) {
                    warn!("Frame cleanup failed: {:#}", e);
                }
            }
            info!("Timelapse ready: {}", video.display());
            if profile.output.open_folder {
                render::reveal_in_file_manager(&video);
            }
        }
        Err(e) => {
            error!("Render failed, frames kept in {}: {e}", session_dir.display());
            process::exit(1);
        }
    }
}
