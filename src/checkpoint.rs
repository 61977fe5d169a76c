//! Checkpoint store - resumable sweep position
//!
//! A checkpoint records the *last completed* cell as one line of
//! whitespace-separated fields:
//!
//! ```text
//! VM <query> <version>
//! DM <query> <start> <end>
//! VQ <query>
//! ```
//!
//! It is overwritten after every completed cell and read once at startup.
//! Nothing here ever deletes it; a finished sweep leaves its final cell
//! recorded so rerunning is a no-op.

use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::sweep::{Bounds, Cell, Mode, Sweep};
use crate::{Error, Result};

/// Identity of the last completed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    last: Cell,
}

impl Checkpoint {
    /// Checkpoint recording `last` as completed.
    #[must_use]
    pub const fn new(last: Cell) -> Self {
        Self { last }
    }

    /// The last completed cell.
    #[must_use]
    pub const fn last(&self) -> Cell {
        self.last
    }

    /// Remaining sweep under `bounds`, starting at the cell after `last`.
    ///
    /// # Errors
    ///
    /// Returns `CorruptCheckpoint` if `last` is not a cell of that sweep.
    pub fn resume(&self, bounds: Bounds) -> Result<Sweep> {
        Sweep::resume_after(bounds, &self.last)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.last.mode().tag(), self.last.query)?;
        for parameter in self.last.context.parameters() {
            write!(f, " {parameter}")?;
        }
        Ok(())
    }
}

impl FromStr for Checkpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let Some((tag, numbers)) = fields.split_first() else {
            return Err(Error::CorruptCheckpoint("empty record".to_string()));
        };
        let mode = Mode::from_tag(tag)
            .ok_or_else(|| Error::CorruptCheckpoint(format!("unknown mode tag {tag:?}")))?;

        let numbers = numbers
            .iter()
            .map(|field| {
                field.parse::<usize>().map_err(|_| {
                    Error::CorruptCheckpoint(format!("{field:?} is not a non-negative integer"))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let last = match (mode, numbers.as_slice()) {
            (Mode::VersionMaterialization, &[query, version]) => Cell::vm(query, version),
            (Mode::DeltaMaterialization, &[query, start, end]) => Cell::dm(query, start, end),
            (Mode::VersionQuery, &[query]) => Cell::vq(query),
            _ => {
                return Err(Error::CorruptCheckpoint(format!(
                    "{mode} record has {} integer fields",
                    numbers.len()
                )))
            }
        };
        if !last.is_sweep_cell() {
            return Err(Error::CorruptCheckpoint(format!(
                "{last} is never produced by a sweep"
            )));
        }
        Ok(Self { last })
    }
}

/// Persistence for the sweep position.
pub trait CheckpointStore {
    /// Read the checkpoint.
    ///
    /// Returns `Ok(None)` when no checkpoint exists yet.
    ///
    /// # Errors
    ///
    /// Returns `CorruptCheckpoint` if a record exists but cannot be decoded.
    fn load(&self) -> Result<Option<Checkpoint>>;

    /// Overwrite the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written durably.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Checkpoint kept in a single text file.
///
/// Saves go through a sibling temp file that is synced and then renamed over
/// the record, so a crash leaves either the old or the new line, never a torn one.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.parse().map(Some).map_err(|e| match e {
            Error::CorruptCheckpoint(reason) => {
                Error::CorruptCheckpoint(format!("{}: {reason}", self.path.display()))
            }
            other => other,
        })
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(checkpoint.to_string().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-memory checkpoint holding the encoded record.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    record: Option<String>,
}

impl MemoryCheckpointStore {
    /// Empty store (fresh sweep).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw record, e.g. to simulate a prior run.
    #[must_use]
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Some(record.into()),
        }
    }

    /// The raw record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        self.record.as_deref().map(str::parse).transpose()
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.record = Some(checkpoint.to_string());
        Ok(())
    }
}
