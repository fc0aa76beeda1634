// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Renaming files to the clean filenames recorded in the tagging log

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CollisionPolicy;
use crate::journal::{JournalEntry, RenameJournal};
use crate::progress::{Progress, Verbosity};
use crate::record::TaggingRecord;
use crate::sanitize::split_extension;
use crate::tag_log::read_records;
use crate::Result;

/// Settings for one rename pass
#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Run every check but touch nothing
    pub dry_run: bool,
    pub verbosity: Verbosity,
    pub collisions: CollisionPolicy,
}

/// What happened to one log row
#[derive(Debug, Clone, PartialEq)]
pub enum RenameOutcome {
    /// Error row or no clean filename
    NotTagged { input: String },
    MissingSource { source: PathBuf },
    /// `clean_filename` is not a plain name inside the source directory
    InvalidTarget { source: PathBuf, clean_filename: String },
    NoOp { source: PathBuf },
    ExtensionMismatch { source: PathBuf, target: PathBuf },
    /// Target taken; `alternative` is the first free `_N` name, left unused
    Collision { source: PathBuf, target: PathBuf, alternative: PathBuf },
    Renamed { source: PathBuf, target: PathBuf },
    WouldRename { source: PathBuf, target: PathBuf },
    Failed { source: PathBuf, target: PathBuf, error: String },
}

/// Outcomes of a rename pass, in log order
#[derive(Debug, Clone, Default)]
pub struct RenameReport {
    pub outcomes: Vec<RenameOutcome>,
}

impl RenameReport {
    pub fn renamed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RenameOutcome::Renamed { .. } | RenameOutcome::WouldRename { .. }))
            .count()
    }

    pub fn problems(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    RenameOutcome::MissingSource { .. }
                        | RenameOutcome::InvalidTarget { .. }
                        | RenameOutcome::ExtensionMismatch { .. }
                        | RenameOutcome::Collision { .. }
                        | RenameOutcome::Failed { .. }
                )
            })
            .count()
    }
}

/// First `stem_N.ext` next to `target`, N from 2, that is not an existing file.
pub fn first_free_alternative(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    let mut suffix = 2u32;
    loop {
        let candidate = target.with_file_name(format!("{}_{}{}", stem, suffix, ext));
        if !candidate.is_file() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Rename every tagged file in the log at `log_path`, printing to stdout.
pub fn apply_renames(
    log_path: &Path,
    options: &RenameOptions,
    journal: Option<&RenameJournal>,
) -> Result<RenameReport> {
    let mut progress = Progress::new(std::io::stdout(), options.verbosity);
    apply_renames_with_progress(log_path, options, journal, &mut progress)
}

/// [`apply_renames`] with output sent to any writer. Only reading the log
/// is fatal; per-row failures end up in the report.
pub fn apply_renames_with_progress<W: Write>(
    log_path: &Path,
    options: &RenameOptions,
    journal: Option<&RenameJournal>,
    progress: &mut Progress<W>,
) -> Result<RenameReport> {
    let records = read_records(log_path)?;
    let mut report = RenameReport::default();

    for (index, record) in records.iter().enumerate() {
        let outcome = rename_one(index, record, options, journal, progress);
        report.outcomes.push(outcome);
    }

    info!(
        "Rename pass over {:?}: {} renamed, {} problems{}",
        log_path,
        report.renamed(),
        report.problems(),
        if options.dry_run { " (dry run)" } else { "" }
    );
    Ok(report)
}

fn rename_one<W: Write>(
    index: usize,
    record: &TaggingRecord,
    options: &RenameOptions,
    journal: Option<&RenameJournal>,
    progress: &mut Progress<W>,
) -> RenameOutcome {
    let clean = match record.clean_filename.as_deref() {
        Some(clean) if record.is_ok() && !clean.is_empty() => clean,
        _ => {
            progress.line(Verbosity::Full, || {
                format!("skipping errored row {} {:?}", index, record.original_filepath)
            });
            return RenameOutcome::NotTagged {
                input: record.original_filepath.clone(),
            };
        }
    };

    let source = PathBuf::from(&record.original_filepath);
    if !source.is_file() {
        warn!("Source file {:?} is missing", source);
        progress.line(Verbosity::Dots, || format!("source file {:?} is missing!", source));
        return RenameOutcome::MissingSource { source };
    }

    if !is_single_name(clean) {
        warn!("Refusing to move {:?} to {:?}", source, clean);
        progress.line(Verbosity::Dots, || {
            format!("clean filename {:?} for {:?} is not a plain file name!", clean, source)
        });
        return RenameOutcome::InvalidTarget {
            source,
            clean_filename: clean.to_string(),
        };
    }

    let target = source.with_file_name(clean);
    if target == source {
        progress.line(Verbosity::Full, || format!("no rename necessary for {:?}", source));
        return RenameOutcome::NoOp { source };
    }

    let source_ext = extension_of(&source);
    let target_ext = extension_of(&target);
    if !source_ext.eq_ignore_ascii_case(&target_ext) {
        warn!("Mismatched extensions between {:?} and {:?}", source, target);
        progress.line(Verbosity::Dots, || {
            format!("Mismatched file extensions between {:?} and {:?}!", source, target)
        });
        return RenameOutcome::ExtensionMismatch { source, target };
    }

    let target = if target.is_file() {
        let alternative = first_free_alternative(&target);
        warn!("Target {:?} already exists; first free name is {:?}", target, alternative);
        progress.line(Verbosity::Dots, || format!("target {:?} already exists!", target));
        match options.collisions {
            CollisionPolicy::Report => {
                progress.line(Verbosity::Dots, || {
                    format!("free alternative would be {:?}; not renaming.", alternative)
                });
                return RenameOutcome::Collision {
                    source,
                    target,
                    alternative,
                };
            }
            CollisionPolicy::RenameWithSuffix => {
                progress.line(Verbosity::Dots, || format!("proceeding with target {:?}.", alternative));
                alternative
            }
        }
    } else {
        target
    };

    if options.dry_run {
        progress.line(Verbosity::Full, || format!("would rename {:?} to {:?}", source, target));
        return RenameOutcome::WouldRename { source, target };
    }

    debug!("Renaming {:?} to {:?}", source, target);
    match std::fs::rename(&source, &target) {
        Ok(()) => {
            progress.line(Verbosity::Full, || format!("renamed {:?} to {:?}", source, target));
            if let Some(journal) = journal {
                if let Err(e) = journal.append(&JournalEntry::new(source.clone(), target.clone())) {
                    warn!("Failed to record rename in {:?}: {}", journal.path(), e);
                }
            }
            RenameOutcome::Renamed { source, target }
        }
        Err(e) => {
            warn!("Error renaming {:?} to {:?}: {}", source, target, e);
            progress.line(Verbosity::Dots, || {
                format!("error renaming {:?} to {:?}: {}", source, target, e)
            });
            RenameOutcome::Failed {
                source,
                target,
                error: e.to_string(),
            }
        }
    }
}

fn is_single_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

fn extension_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    split_extension(&name).1.to_string()
}
