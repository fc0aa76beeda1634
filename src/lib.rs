// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! pictag: vision-model image tagging and renaming
//!
//! Tags batches of images with a vision model into an append-only CSV log,
//! renames files to the clean names the model suggested, and renders the
//! log as an HTML gallery.

pub mod batch;
pub mod config;
pub mod error;
pub mod gallery;
pub mod image_prep;
pub mod journal;
pub mod progress;
pub mod record;
pub mod renamer;
pub mod sanitize;
pub mod scan;
pub mod tag_log;
pub mod tagger;
pub mod vision;

pub use config::AppConfig;
pub use error::{PictagError, Result};
