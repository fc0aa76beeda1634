// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Resumable batch tagging into the tagging log

use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::image_prep::ImageSource;
use crate::progress::{Progress, Verbosity};
use crate::record::TaggingRecord;
use crate::tag_log::TaggingLog;
use crate::tagger::Tagger;
use crate::vision::VisionModel;
use crate::Result;

/// Settings for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Re-attempt inputs whose only rows are errors
    pub retry_errors: bool,
    pub verbosity: Verbosity,
    /// Lowercase suffixes (with dot) of inputs that are never tagged
    pub extension_blacklist: Vec<String>,
}

impl BatchOptions {
    pub fn from_config(config: &AppConfig, retry_errors: bool, verbosity: Verbosity) -> Self {
        Self {
            retry_errors,
            verbosity,
            extension_blacklist: config
                .tagging
                .extension_blacklist
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn is_blacklisted(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        self.extension_blacklist.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default(), false, Verbosity::Dots)
    }
}

/// Counts from one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub tagged: usize,
    pub failed: usize,
    pub blacklisted: usize,
    pub already_processed: usize,
}

/// Tag `inputs` in order, appending one row per attempt to the log at
/// `log_path`, with progress on stdout.
pub async fn process_batch<M: VisionModel>(
    tagger: &Tagger<M>,
    inputs: &[String],
    log_path: &Path,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    let mut progress = Progress::new(std::io::stdout(), options.verbosity);
    process_batch_with_progress(tagger, inputs, log_path, options, &mut progress).await
}

/// [`process_batch`] with progress sent to any writer.
///
/// Only opening or writing the log is fatal; a failure to tag an item is
/// logged as an `error` row and the run moves on.
pub async fn process_batch_with_progress<M: VisionModel, W: Write>(
    tagger: &Tagger<M>,
    inputs: &[String],
    log_path: &Path,
    options: &BatchOptions,
    progress: &mut Progress<W>,
) -> Result<BatchSummary> {
    let mut log = TaggingLog::open(log_path, options.retry_errors)?;
    let mut summary = BatchSummary::default();

    for (index, input) in inputs.iter().enumerate() {
        if options.is_blacklisted(input) {
            debug!("Skipping blacklisted input {}", input);
            summary.blacklisted += 1;
            continue;
        }

        if !log.claim(input) {
            debug!("Skipping already processed input {}", input);
            progress.line(Verbosity::Full, || format!("skipping {:?}: already processed", input));
            summary.already_processed += 1;
            continue;
        }

        match tagger.tag_one(input).await {
            Ok(record) => {
                log.append(&record)?;
                summary.tagged += 1;
                progress.item(index, '.', || format!("{:?}", record));
            }
            Err(e) => {
                let report = format!("{:?}", anyhow::Error::new(e));
                warn!("Failed to tag {}: {}", input, report.lines().next().unwrap_or_default());
                let display_name = ImageSource::parse(input).display_name().ok();
                log.append(&TaggingRecord::error(input, display_name, report.clone()))?;
                summary.failed += 1;
                progress.item(index, 'e', || report);
            }
        }
    }

    progress.finish();
    info!(
        "Batch done: {} tagged, {} failed, {} already processed, {} blacklisted ({})",
        summary.tagged,
        summary.failed,
        summary.already_processed,
        summary.blacklisted,
        log.path().display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Status;
    use crate::tag_log::read_records;
    use crate::tagger::TaggerOptions;
    use crate::vision::{VisionRequest, VisionResponse};
    use crate::PictagError;
    use async_trait::async_trait;
    use image::DynamicImage;
    use reqwest::Client;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionModel for Counting {
        async fn describe(&self, request: &VisionRequest) -> crate::Result<VisionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.prompt.contains("\"broken.png\"") {
                return Err(PictagError::ModelResponse("refused".to_string()));
            }
            Ok(VisionResponse {
                content: r#"{"description": "d", "category": "photo", "genre": "realism",
                    "tags": ["A"], "filename_already_makes_sense": true, "filename": "nice name.png"}"#
                    .to_string(),
                total_tokens: 10,
                model: "fake".to_string(),
            })
        }
    }

    fn tagger() -> Tagger<Counting> {
        Tagger::new(
            Counting { calls: AtomicUsize::new(0) },
            Client::new(),
            TaggerOptions::default(),
        )
    }

    fn image(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        DynamicImage::new_rgb8(8, 8)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    fn silent() -> BatchOptions {
        BatchOptions {
            verbosity: Verbosity::Silent,
            ..BatchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_blacklisted_inputs_leave_no_row() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("tags.csv");
        let tagger = tagger();

        let inputs = vec!["report.pdf".to_string(), "NOTES.TXT".to_string()];
        let summary = process_batch(&tagger, &inputs, &log_path, &silent()).await.unwrap();

        assert_eq!(summary.blacklisted, 2);
        assert!(read_records(&log_path).unwrap().is_empty());
        assert_eq!(tagger.model().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_become_error_rows() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("tags.csv");
        let tagger = tagger();

        let inputs = vec![
            image(dir.path(), "good.png"),
            image(dir.path(), "broken.png"),
            dir.path().join("missing.png").to_string_lossy().into_owned(),
        ];
        let summary = process_batch(&tagger, &inputs, &log_path, &silent()).await.unwrap();
        assert_eq!(summary.tagged, 1);
        assert_eq!(summary.failed, 2);

        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, Status::Ok);
        assert_eq!(records[0].clean_filename.as_deref(), Some("nice_name.png"));
        assert_eq!(records[1].status, Status::Error);
        assert!(records[1].description.as_deref().unwrap().contains("refused"));
        assert!(records[1].clean_filename.is_none());
        assert_eq!(records[2].status, Status::Error);
        assert_eq!(records[2].original_filepath, inputs[2]);
    }

    #[tokio::test]
    async fn test_duplicate_inputs_tagged_once() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("tags.csv");
        let tagger = tagger();

        let a = image(dir.path(), "a.png");
        let inputs = vec![a.clone(), a.clone(), a];
        let summary = process_batch(&tagger, &inputs, &log_path, &silent()).await.unwrap();

        assert_eq!(summary.tagged, 1);
        assert_eq!(summary.already_processed, 2);
        assert_eq!(read_records(&log_path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_and_retry_errors() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("tags.csv");
        let a = image(dir.path(), "a.png");
        let b = image(dir.path(), "broken.png");
        let inputs = vec![a, b];

        let first = tagger();
        process_batch(&first, &inputs, &log_path, &silent()).await.unwrap();
        assert_eq!(first.model().calls.load(Ordering::SeqCst), 2);

        let second = tagger();
        let summary = process_batch(&second, &inputs, &log_path, &silent()).await.unwrap();
        assert_eq!(summary.already_processed, 2);
        assert_eq!(second.model().calls.load(Ordering::SeqCst), 0);

        let third = tagger();
        let retry = BatchOptions {
            retry_errors: true,
            ..silent()
        };
        let summary = process_batch(&third, &inputs, &log_path, &retry).await.unwrap();
        assert_eq!(summary.already_processed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(third.model().calls.load(Ordering::SeqCst), 1);

        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_dot_progress() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("tags.csv");
        let tagger = tagger();
        let inputs = vec![image(dir.path(), "a.png"), image(dir.path(), "broken.png")];

        let mut progress = Progress::new(Vec::new(), Verbosity::Dots);
        process_batch_with_progress(&tagger, &inputs, &log_path, &silent(), &mut progress)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(progress.into_inner()).unwrap(), ".e\n");
    }

    #[test]
    fn test_blacklist_is_case_insensitive() {
        let options = BatchOptions::default();
        assert!(options.is_blacklisted("dir/Report.PDF"));
        assert!(options.is_blacklisted("backup.tar.gz"));
        assert!(!options.is_blacklisted("photo.jpg"));
    }
}
