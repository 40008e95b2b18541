/*
SPDX-FileCopyrightText: Copyright 2025 vatlapse contributors
SPDX-License-Identifier: MIT
*/

//! vatlapse – per-layer timelapse capture for resin printers
//!
//! The printer gives no feedback, so the whole tool rests on two legs: a
//! layer timing model that predicts when each layer's lift happens, and a
//! monotonic scheduler that fires the camera at those times without drift.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── job.rs      – print parameters as the slicer describes them
//! ├── plan/       – validation + per-layer duration plan (math.rs: formulas)
//! ├── scheduler/  – monotonic capture loop, cancel flag (clock.rs: clock trait)
//! ├── camera/     – ffmpeg frame grabbing, contiguous frame numbering
//! ├── render/     – ffmpeg MP4 encode, frame cleanup, folder reveal
//! ├── profile/    – YAML print profile with built-in defaults
//! ├── session.rs  – session naming and output directory allocation
//! └── prompt.rs   – console prompts and the cancel watcher
//! ```

pub mod camera;
pub mod job;
pub mod plan;
pub mod profile;
pub mod prompt;
pub mod render;
pub mod scheduler;
pub mod session;
