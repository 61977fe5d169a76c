//! Result sink - one row per completed cell
//!
//! Rows go to one table per mode (VM, DM, VQ). [`CsvSink`] writes the tables
//! as CSV files next to the experiment; [`MemorySink`] keeps records in memory.

mod csv;

pub use self::csv::CsvSink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measure::CellStatistics;
use crate::sweep::{Cell, Mode};
use crate::Result;

/// Statistics of one completed cell, stamped with its completion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// The measured cell
    pub cell: Cell,
    /// Aggregated measurements
    pub stats: CellStatistics,
    /// When the cell completed
    pub recorded_at: DateTime<Utc>,
}

impl CellRecord {
    /// Record stamped with the current time.
    #[must_use]
    pub fn new(cell: Cell, stats: CellStatistics) -> Self {
        Self {
            cell,
            stats,
            recorded_at: Utc::now(),
        }
    }
}

/// Destination for completed cells.
pub trait ResultSink {
    /// Append the row for a completed cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn record(&mut self, record: &CellRecord) -> Result<()>;
}

/// Sink collecting records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<CellRecord>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells of every record, in completion order.
    #[must_use]
    pub fn cells(&self) -> Vec<Cell> {
        self.records.iter().map(|r| r.cell).collect()
    }

    /// Records of one mode.
    pub fn records_for(&self, mode: Mode) -> impl Iterator<Item = &CellRecord> {
        self.records.iter().filter(move |r| r.cell.mode() == mode)
    }
}

impl ResultSink for MemorySink {
    fn record(&mut self, record: &CellRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
