// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Journal of performed renames, for undo

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Result;

/// One rename performed by the renamer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub undone: bool,
}

impl JournalEntry {
    pub fn new(original_path: PathBuf, new_path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            original_path,
            new_path,
            undone: false,
        }
    }
}

/// JSON-lines file of [`JournalEntry`]
pub struct RenameJournal {
    path: PathBuf,
}

impl RenameJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// All entries, oldest first; unparseable lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Failed to parse journal entry: {}", e),
            }
        }

        Ok(entries)
    }

    /// Entries not yet undone, newest first.
    pub fn undoable(&self) -> Result<Vec<JournalEntry>> {
        let mut entries: Vec<_> = self.read_all()?.into_iter().filter(|e| !e.undone).collect();
        entries.reverse();
        Ok(entries)
    }

    pub fn mark_undone(&self, ids: &HashSet<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let entries = self.read_all()?;

        let mut writer = std::io::BufWriter::new(File::create(&self.path)?);
        for mut entry in entries {
            if ids.contains(&entry.id) {
                entry.undone = true;
            }
            writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What happened to one journal entry during undo
#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    Restored { from: PathBuf, to: PathBuf },
    WouldRestore { from: PathBuf, to: PathBuf },
    /// The renamed file is gone
    Missing { path: PathBuf },
    /// Something now occupies the original name
    OriginalTaken { path: PathBuf },
    Failed { from: PathBuf, error: String },
}

/// Reverse the `count` most recent renames (all when `count` is 0).
pub fn undo_renames(journal: &RenameJournal, count: usize, dry_run: bool) -> Result<Vec<UndoOutcome>> {
    let entries = journal.undoable()?;
    let count = if count == 0 { entries.len() } else { count.min(entries.len()) };

    let mut outcomes = Vec::with_capacity(count);
    let mut undone = HashSet::new();

    for entry in entries.into_iter().take(count) {
        if !entry.new_path.exists() {
            warn!("File not found (may have been moved/deleted): {:?}", entry.new_path);
            outcomes.push(UndoOutcome::Missing { path: entry.new_path });
            continue;
        }
        if entry.original_path.exists() {
            warn!("Original path already exists: {:?}", entry.original_path);
            outcomes.push(UndoOutcome::OriginalTaken { path: entry.original_path });
            continue;
        }

        if dry_run {
            outcomes.push(UndoOutcome::WouldRestore {
                from: entry.new_path,
                to: entry.original_path,
            });
            continue;
        }

        match std::fs::rename(&entry.new_path, &entry.original_path) {
            Ok(()) => {
                info!("Undone: {:?} -> {:?}", entry.new_path, entry.original_path);
                undone.insert(entry.id.clone());
                outcomes.push(UndoOutcome::Restored {
                    from: entry.new_path,
                    to: entry.original_path,
                });
            }
            Err(e) => {
                warn!("Failed to undo {:?}: {}", entry.new_path, e);
                outcomes.push(UndoOutcome::Failed {
                    from: entry.new_path,
                    error: e.to_string(),
                });
            }
        }
    }

    journal.mark_undone(&undone)?;
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn renamed(dir: &Path, from: &str, to: &str, journal: &RenameJournal) {
        std::fs::write(dir.join(to), b"x").unwrap();
        journal
            .append(&JournalEntry::new(dir.join(from), dir.join(to)))
            .unwrap();
    }

    #[test]
    fn test_undo_newest_first() {
        let dir = tempdir().unwrap();
        let journal = RenameJournal::new(dir.path().join("renames.jsonl"));
        renamed(dir.path(), "IMG_1.jpg", "cat.jpg", &journal);
        renamed(dir.path(), "IMG_2.jpg", "dog.jpg", &journal);

        let outcomes = undo_renames(&journal, 1, false).unwrap();
        assert_eq!(
            outcomes,
            vec![UndoOutcome::Restored {
                from: dir.path().join("dog.jpg"),
                to: dir.path().join("IMG_2.jpg"),
            }]
        );
        assert!(dir.path().join("IMG_2.jpg").exists());
        assert!(dir.path().join("cat.jpg").exists());

        let remaining = journal.undoable().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].new_path, dir.path().join("cat.jpg"));
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        let journal = RenameJournal::new(dir.path().join("renames.jsonl"));
        renamed(dir.path(), "IMG_1.jpg", "cat.jpg", &journal);

        let outcomes = undo_renames(&journal, 0, true).unwrap();
        assert!(matches!(outcomes[0], UndoOutcome::WouldRestore { .. }));
        assert!(dir.path().join("cat.jpg").exists());
        assert_eq!(journal.undoable().unwrap().len(), 1);
    }

    #[test]
    fn test_refuses_to_overwrite_original() {
        let dir = tempdir().unwrap();
        let journal = RenameJournal::new(dir.path().join("renames.jsonl"));
        renamed(dir.path(), "IMG_1.jpg", "cat.jpg", &journal);
        std::fs::write(dir.path().join("IMG_1.jpg"), b"new occupant").unwrap();

        let outcomes = undo_renames(&journal, 0, false).unwrap();
        assert!(matches!(outcomes[0], UndoOutcome::OriginalTaken { .. }));
        assert_eq!(std::fs::read(dir.path().join("IMG_1.jpg")).unwrap(), b"new occupant");
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = tempdir().unwrap();
        let journal = RenameJournal::new(dir.path().join("absent.jsonl"));
        assert!(undo_renames(&journal, 0, false).unwrap().is_empty());
    }
}
