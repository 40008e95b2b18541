/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! Frame capture through the system `ffmpeg` binary.
//!
//! [`FfmpegCamera`] grabs one JPEG per call from a webcam device.  The system
//! binary is used intentionally, rather than FFmpeg bindings, to avoid native
//! dev header/lib requirements; the binary only needs to be on `PATH`.
//!
//! # Frame numbering
//! Frames are numbered by an internal counter, not by layer index, and the
//! counter only advances on success.  The renderer feeds `seq_%05d.jpg` to
//! ffmpeg's image2 demuxer, which stops at the first gap in the sequence, so
//! the files on disk must be densely numbered even when some layer captures
//! failed.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;

// ── Frame naming ──────────────────────────────────────────────────────────────

/// File name of frame `n`: `seq_00000.jpg`, `seq_00001.jpg`, …
pub fn frame_filename(n: u32) -> String {
    format!("seq_{n:05}.jpg")
}

/// The matching ffmpeg image2 input pattern.
pub fn frame_pattern() -> &'static str {
    "seq_%05d.jpg"
}

// ── Error type ────────────────────────────────────────────────────────────────

/// Per-frame capture failure.  Recoverable: the scheduler logs it, records
/// the layer index, and moves on to the next layer.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The ffmpeg process could not be started at all.
    #[error("could not launch ffmpeg for layer {frame_index}: {source}")]
    Spawn {
        frame_index: u32,
        #[source]
        source: io::Error,
    },

    /// ffmpeg ran but exited non-zero (device busy, device unplugged, ...).
    #[error("ffmpeg failed grabbing layer {frame_index} ({status}): {stderr}")]
    Grab {
        frame_index: u32,
        status: ExitStatus,
        stderr: String,
    },

    /// ffmpeg reported success but the frame file is not on disk.
    #[error("ffmpeg reported success but '{}' was not created", .path.display())]
    MissingOutput { path: PathBuf },
}

// ── Camera trait ──────────────────────────────────────────────────────────────

/// A source of one frame per layer.
///
/// `frame_index` is the layer index being captured, used for diagnostics; the
/// implementation decides the actual file name.  Returns the path of the
/// written frame.
pub trait Camera {
    fn capture(&mut self, frame_index: u32) -> Result<PathBuf, CaptureError>;
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Webcam device parameters for the ffmpeg grab.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// ffmpeg input device.  `/dev/video0` on Linux, an avfoundation index on
    /// macOS, a `video=<name>` string on Windows (list devices with
    /// `ffmpeg -list_devices true -f dshow -i dummy`).
    pub device: String,

    /// ffmpeg input format matching the device (`v4l2`, `avfoundation`,
    /// `dshow`).
    pub input_format: String,

    pub width: u32,
    pub height: u32,

    /// JPEG quality on ffmpeg's `-q:v` scale, 2..=31 where lower is better.
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let (input_format, device) = match std::env::consts::OS {
            "macos" => ("avfoundation", "0"),
            "windows" => ("dshow", "video=Integrated Camera"),
            _ => ("v4l2", "/dev/video0"),
        };
        Self {
            device: device.to_string(),
            input_format: input_format.to_string(),
            width: 1920,
            height: 1080,
            jpeg_quality: 2,
        }
    }
}

// ── FfmpegCamera ──────────────────────────────────────────────────────────────

/// Production [`Camera`]: one short-lived ffmpeg process per frame.
pub struct FfmpegCamera {
    settings: CameraSettings,
    out_dir: PathBuf,
    frames_written: u32,
}

impl FfmpegCamera {
    pub fn new(settings: CameraSettings, out_dir: PathBuf) -> Self {
        Self {
            settings,
            out_dir,
            frames_written: 0,
        }
    }

    /// Number of frames successfully written so far.  Also the number of the
    /// next frame file.
    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    fn next_frame_path(&self) -> PathBuf {
        self.out_dir.join(frame_filename(self.frames_written))
    }

    fn grab_args(&self, path: &Path) -> Vec<String> {
        let s = &self.settings;
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            s.input_format.clone(),
            "-video_size".into(),
            format!("{}x{}", s.width, s.height),
            "-i".into(),
            s.device.clone(),
            "-frames:v".into(),
            "1".into(),
            "-q:v".into(),
            s.jpeg_quality.to_string(),
            path.display().to_string(),
        ]
    }
}

impl Camera for FfmpegCamera {
    fn capture(&mut self, frame_index: u32) -> Result<PathBuf, CaptureError> {
        let path = self.next_frame_path();

        // stdin stays detached: the operator's console belongs to the cancel
        // watcher, and an attached ffmpeg would swallow its keypresses.
        let output = Command::new("ffmpeg")
            .args(self.grab_args(&path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| CaptureError::Spawn {
                frame_index,
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::Grab {
                frame_index,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !path.exists() {
            return Err(CaptureError::MissingOutput { path });
        }

        self.frames_written += 1;
        debug!(layer = frame_index, frame = self.frames_written - 1, "Frame written");
        Ok(path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
