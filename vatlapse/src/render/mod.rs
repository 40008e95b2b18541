/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Timelapse assembly: frames in, MP4 out, via the system `ffmpeg`.
//!
//! The frame directory is fed to ffmpeg's image2 demuxer as `seq_%05d.jpg`.
//! When the operator asked for a target video length, the input framerate is
//! derived from the frame count instead of taken literally, so a 5000-layer
//! print still collapses to the requested few seconds of footage.
//!
//! Frame cleanup and the reveal-in-file-manager conveniences live here too;
//! both are strictly post-render.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::camera::frame_pattern;

// ── Settings ──────────────────────────────────────────────────────────────────

/// Encoder parameters.  `crf` and `preset` are libx264 knobs; the defaults
/// favor quality over encode speed, since the video is rendered once at the
/// end of a multi-hour print.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Output framerate when no target length is given.
    pub fps: u32,

    /// Desired video length in seconds.  When set, the framerate becomes
    /// `frame_count / target` and `fps` is ignored.
    pub target_seconds: Option<f64>,

    pub crf: u8,
    pub preset: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            target_seconds: None,
            crf: 20,
            preset: "slow".to_string(),
        }
    }
}

impl RenderSettings {
    /// The input framerate to encode with, given how many frames exist.
    pub fn effective_fps(&self, frame_count: u32) -> u32 {
        match self.target_seconds {
            Some(target) if target > 0.0 => {
                let fps = (f64::from(frame_count) / target).round() as u32;
                fps.max(1)
            }
            _ => self.fps,
        }
    }

    /// Reject settings that cannot yield a usable framerate.
    ///
    /// Checked by [`render_video`] and, in the binary, at startup before any
    /// capture time is spent.
    ///
    /// # Errors
    /// [`RenderError::ZeroFps`] when `fps` is 0 and no positive target length
    /// is set to derive one from.
    pub fn validate(&self) -> Result<(), RenderError> {
        let has_target = matches!(self.target_seconds, Some(t) if t > 0.0);
        if self.fps == 0 && !has_target {
            return Err(RenderError::ZeroFps);
        }
        Ok(())
    }
}

// ── Error type ────────────────────────────────────────────────────────────────

/// Why the render step failed.  [`RenderError::ZeroFps`] is detectable from
/// settings alone and is checked again at startup; the rest surface at the
/// end of the run.
#[derive(Debug, Error)]
pub enum RenderError {
    /// `fps == 0` with no positive target length to derive a framerate from.
    #[error("fps is 0 and no target video length is set")]
    ZeroFps,

    #[error("no frames were captured, nothing to render")]
    NoFrames,

    #[error("could not launch ffmpeg: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    #[error("ffmpeg exited with {status}: {stderr}")]
    Encoder { status: ExitStatus, stderr: String },
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn encode_args(dir: &Path, out: &Path, fps: u32, settings: &RenderSettings) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-framerate".into(),
        fps.to_string(),
        "-i".into(),
        dir.join(frame_pattern()).display().to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        out.display().to_string(),
    ]
}

/// Encode `<dir>/seq_%05d.jpg` into `<dir>/<session>.mp4`.
///
/// `frame_count` is the number of frames the camera wrote; it drives the
/// framerate when a target length is configured.
///
/// # Errors
/// [`RenderError::ZeroFps`] for settings with no usable framerate,
/// [`RenderError::NoFrames`] for an empty session, otherwise spawn or
/// encoder failures with ffmpeg's stderr attached.
pub fn render_video(
    dir: &Path,
    session: &str,
    frame_count: u32,
    settings: &RenderSettings,
) -> Result<PathBuf, RenderError> {
    settings.validate()?;
    if frame_count == 0 {
        return Err(RenderError::NoFrames);
    }

    let out = dir.join(format!("{session}.mp4"));
    let fps = settings.effective_fps(frame_count);
    info!(
        frames = frame_count,
        fps,
        out = %out.display(),
        "Rendering timelapse"
    );

    let output = Command::new("ffmpeg")
        .args(encode_args(dir, &out, fps, settings))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| RenderError::Spawn { source })?;

    if !output.status.success() {
        return Err(RenderError::Encoder {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    info!(out = %out.display(), "Render complete");
    Ok(out)
}

/// True when an `ffmpeg` binary answers on `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// ── Cleanup ───────────────────────────────────────────────────────────────────

/// Delete every `seq_*.jpg` in `dir`, returning how many were removed.
///
/// Individual deletions that fail are logged and skipped; the rendered MP4
/// and any unrelated files are never touched.
pub fn delete_frames(dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list frame directory '{}'", dir.display()))?;

    let mut deleted = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("seq_") && name.ends_with(".jpg") {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(file = %entry.path().display(), error = %e, "Could not delete frame"),
            }
        }
    }
    info!(deleted, "Frame cleanup done");
    Ok(deleted)
}

// ── Reveal ────────────────────────────────────────────────────────────────────

/// Best-effort: show the rendered file in the OS file manager.
///
/// Windows selects the file in Explorer, macOS reveals it in Finder, and
/// everything else opens the containing folder.  Failures are logged, never
/// propagated.
pub fn reveal_in_file_manager(target: &Path) {
    let result = match std::env::consts::OS {
        "windows" => Command::new("explorer")
            .arg("/select,")
            .arg(target)
            .spawn(),
        "macos" => Command::new("open").arg("-R").arg(target).spawn(),
        _ => {
            let folder = target.parent().unwrap_or(Path::new("."));
            Command::new("xdg-open").arg(folder).spawn()
        }
    };
    if let Err(e) = result {
        warn!(target = %target.display(), error = %e, "Could not open file manager");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
