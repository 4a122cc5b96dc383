//! Append-only durable journal of registry mutations.
//!
//! The registry's history is an ordered sequence of [`AtomicOperation`]
//! records; recovery is simply "replay everything from the beginning".
//! The [`ParticipantLogger`] trait is the seam between the registry and
//! its storage: [`FileJournal`] is the durable implementation, and tests
//! substitute in-memory loggers.
//!
//! # File format
//!
//! One JSON object per line, for example:
//!
//! ```text
//! {"operation":"Add","participant_description":{"name":"robot_1",...}}
//! {"operation":"Remove","participant_description":{"name":"robot_1",...}}
//! ```
//!
//! Appending a record never rewrites earlier lines. A line that fails to
//! parse is reported with its line number and treated as fatal by the
//! registry: recovering an ambiguous safety-critical history wrongly is
//! worse than refusing to run.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::description::ParticipantDescription;

/// The two kinds of registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// A participant was registered.
    Add,
    /// A participant was removed.
    Remove,
}

/// One durable unit of registry change.
///
/// Exactly one operation corresponds to one registry mutation, and it is
/// written to the journal before the mutation is acknowledged as durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomicOperation {
    /// Whether this records an addition or a removal.
    pub operation: OpKind,

    /// The description being added or removed.
    pub participant_description: ParticipantDescription,
}

/// Errors from journal storage.
#[derive(Debug, Error)]
pub enum JournalError {
    /// I/O failure reading or writing the journal file.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be parsed during replay.
    #[error("malformed journal record at line {line}: {reason}")]
    Malformed {
        /// 1-based line number of the offending record.
        line: usize,
        /// Parser diagnostic.
        reason: String,
    },

    /// Another process holds the journal.
    #[error("journal {path} is locked by another process")]
    Locked {
        /// Path of the contested journal file.
        path: PathBuf,
    },
}

/// Storage seam consumed by the registry.
///
/// `read_next_record` yields a lazy, finite, one-shot sequence: once it
/// returns `None` the history is exhausted, and the sequence cannot be
/// restarted without reconstructing the logger.
pub trait ParticipantLogger {
    /// Durably appends one operation.
    ///
    /// Returning `Ok(())` means the record is on storage; the caller may
    /// only acknowledge the corresponding mutation as durable afterwards.
    ///
    /// # Errors
    ///
    /// [`JournalError::Io`] if the record could not be durably written.
    fn write_operation(&mut self, operation: &AtomicOperation) -> Result<(), JournalError>;

    /// Reads the next record of the replay sequence, or `None` once the
    /// history is exhausted.
    ///
    /// # Errors
    ///
    /// [`JournalError::Malformed`] for an unparseable record,
    /// [`JournalError::Io`] for a read failure.
    fn read_next_record(&mut self) -> Result<Option<AtomicOperation>, JournalError>;
}

/// JSON-lines journal file.
///
/// Assumes exclusive ownership of its file: an advisory exclusive lock is
/// held for the lifetime of the value, so a second process opening the
/// same journal fails with [`JournalError::Locked`] instead of corrupting
/// history. A journal file that does not exist yet is an empty history,
/// not an error.
pub struct FileJournal {
    path: PathBuf,
    /// Holds the advisory lock; never written through.
    _lock: File,
    /// Replay cursor over the pre-existing records; `None` once drained.
    reader: Option<BufReader<File>>,
    line: usize,
}

impl std::fmt::Debug for FileJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileJournal")
            .field("path", &self.path)
            .field("replayed_lines", &self.line)
            .finish_non_exhaustive()
    }
}

impl FileJournal {
    /// Opens (creating if absent) the journal at `path` and takes the
    /// exclusive lock.
    ///
    /// # Errors
    ///
    /// [`JournalError::Locked`] if another process holds the journal,
    /// [`JournalError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        fs2::FileExt::try_lock_exclusive(&lock).map_err(|_| JournalError::Locked {
            path: path.clone(),
        })?;

        let reader = BufReader::new(File::open(&path)?);
        Ok(Self {
            path,
            _lock: lock,
            reader: Some(reader),
            line: 0,
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ParticipantLogger for FileJournal {
    fn write_operation(&mut self, operation: &AtomicOperation) -> Result<(), JournalError> {
        let record = serde_json::to_string(operation).map_err(|e| {
            JournalError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        // The append handle lives only for this write; it is released on
        // every exit path, so a failure never leaves the file open or the
        // log in a half-written state.
        {
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            writeln!(file, "{record}")?;
            file.sync_all()?;
        }

        tracing::debug!(
            operation = ?operation.operation,
            name = %operation.participant_description.name,
            owner = %operation.participant_description.owner,
            "journal append"
        );
        Ok(())
    }

    fn read_next_record(&mut self) -> Result<Option<AtomicOperation>, JournalError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            let mut buf = String::new();
            if reader.read_line(&mut buf)? == 0 {
                // History exhausted; the sequence does not restart.
                self.reader = None;
                return Ok(None);
            }
            self.line += 1;

            let record = buf.trim();
            if record.is_empty() {
                continue;
            }

            return serde_json::from_str(record)
                .map(Some)
                .map_err(|e| JournalError::Malformed {
                    line: self.line,
                    reason: e.to_string(),
                });
        }
    }
}
