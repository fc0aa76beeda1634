// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Listing input files and writing scrambled thumbnail sets

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::image_prep::resize_to_fit;
use crate::sanitize::split_extension;
use crate::Result;

const SECONDS_PER_DAY: f64 = 86_400.0;

const LETTERS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Regular files directly inside each of `dirs`, symlinks followed, sorted
/// within each directory. With `max_days_old`, only files modified less
/// than that many days ago are kept; an age too large for a `Duration`
/// means no limit.
pub fn find_images<P: AsRef<Path>>(dirs: &[P], max_days_old: Option<f64>) -> Result<Vec<PathBuf>> {
    let now = SystemTime::now();
    let max_age = max_days_old
        .and_then(|days| Duration::try_from_secs_f64((days * SECONDS_PER_DAY).max(0.0)).ok());

    let mut found = Vec::new();
    for dir in dirs {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!("Skipping {:?}: {}", path, e);
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            if let Some(max_age) = max_age {
                let age = now
                    .duration_since(meta.modified()?)
                    .unwrap_or(Duration::ZERO);
                if age >= max_age {
                    continue;
                }
            }
            files.push(path);
        }
        files.sort();
        debug!("Found {} files in {:?}", files.len(), dir.as_ref());
        found.extend(files);
    }

    Ok(found)
}

/// Eight distinct ASCII letters derived from `stem`.
///
/// The seed is the BLAKE3 extended output of the UTF-8 stem, so a name
/// always scrambles the same way on every platform.
pub fn scramble_name(stem: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(stem.as_bytes());
    let mut stream = hasher.finalize_xof();

    let mut pool = *LETTERS;
    let mut word = [0u8; 4];
    for i in 0..8 {
        stream.fill(&mut word);
        let remaining = (pool.len() - i) as u32;
        let j = i + (u32::from_le_bytes(word) % remaining) as usize;
        pool.swap(i, j);
    }

    String::from_utf8_lossy(&pool[..8]).into_owned()
}

/// Write a downscaled copy of every image in `input_dir` to `output_dir`
/// under its scrambled name, keeping the extension. Files that cannot be
/// read or written as images are skipped with a warning.
pub fn scramble_directory(input_dir: &Path, output_dir: &Path, max_dimension: u32) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for path in find_images(&[input_dir], None)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem, ext) = split_extension(&name);
        let target = output_dir.join(format!("{}{}", scramble_name(stem), ext));

        let img = match image::open(&path) {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                continue;
            }
        };
        if let Err(e) = resize_to_fit(img, max_dimension).save(&target) {
            warn!("Failed to write thumbnail {:?}: {}", target, e);
            continue;
        }
        written.push(target);
    }

    info!("Wrote {} scrambled thumbnails to {:?}", written.len(), output_dir);
    Ok(written)
}
