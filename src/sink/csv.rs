//! CSV tables per mode, plus optional per-cell arrival curves
//!
//! ```text
//! <dir>/vm.csv                 query,version,<stats>
//! <dir>/dm.csv                 query,version_start,version_end,<stats>
//! <dir>/vq.csv                 query,<stats>
//! <dir>/arrivals/dm_q0_0_2.csv ordinal,mean_arrival_us
//! ```
//!
//! `<stats>` is `mean_duration_us,mean_first_result_us,throughput_rps,mean_results,replications,recorded_at`.
//! Undefined values (no first result, undefined throughput) are left empty.
//! A header is written only when a table file is new or empty, so resumed
//! runs keep appending to the same tables.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use tracing::debug;

use super::{CellRecord, ResultSink};
use crate::sweep::{Cell, Mode, VersionContext};
use crate::Result;

const STATS_COLUMNS: &str =
    "mean_duration_us,mean_first_result_us,throughput_rps,mean_results,replications,recorded_at";

/// Sink writing one CSV file per mode.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    export_arrivals: bool,
}

impl CsvSink {
    /// Sink writing under `dir`; `export_arrivals` adds one curve file per cell.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, export_arrivals: bool) -> Self {
        Self {
            dir: dir.into(),
            export_arrivals,
        }
    }

    /// Table file for `mode`.
    #[must_use]
    pub fn table_path(&self, mode: Mode) -> PathBuf {
        self.dir
            .join(format!("{}.csv", mode.tag().to_ascii_lowercase()))
    }

    /// Arrival curve file for `cell`.
    #[must_use]
    pub fn arrivals_path(&self, cell: &Cell) -> PathBuf {
        let mut name = format!("{}_q{}", cell.mode().tag().to_ascii_lowercase(), cell.query);
        for parameter in cell.context.parameters() {
            let _ = write!(name, "_{parameter}");
        }
        self.dir.join("arrivals").join(format!("{name}.csv"))
    }

    fn append_row(&self, record: &CellRecord) -> Result<()> {
        let mode = record.cell.mode();
        let path = self.table_path(mode);
        let mut file = open_table(&path, &header(mode))?;
        writeln!(file, "{}", row(record))?;
        file.sync_data()?;
        Ok(())
    }

    fn write_arrivals(&self, record: &CellRecord) -> Result<()> {
        let path = self.arrivals_path(&record.cell);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::from("ordinal,mean_arrival_us\n");
        for point in &record.stats.arrivals {
            let _ = writeln!(out, "{},{:.3}", point.ordinal, point.mean_micros);
        }
        fs::write(&path, out)?;
        debug!(file = %path.display(), points = record.stats.arrivals.len(), "wrote arrival curve");
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn record(&mut self, record: &CellRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.append_row(record)?;
        if self.export_arrivals {
            self.write_arrivals(record)?;
        }
        Ok(())
    }
}

fn open_table(path: &Path, header: &str) -> Result<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{header}")?;
    }
    Ok(file)
}

fn header(mode: Mode) -> String {
    let keys = match mode {
        Mode::VersionMaterialization => "query,version",
        Mode::DeltaMaterialization => "query,version_start,version_end",
        Mode::VersionQuery => "query",
    };
    format!("{keys},{STATS_COLUMNS}")
}

fn row(record: &CellRecord) -> String {
    let stats = &record.stats;
    let mut line = record.cell.query.to_string();
    match record.cell.context {
        VersionContext::PointInTime(version) => {
            let _ = write!(line, ",{version}");
        }
        VersionContext::Delta { start, end } => {
            let _ = write!(line, ",{start},{end}");
        }
        VersionContext::FullHistory => {}
    }
    let _ = write!(
        line,
        ",{:.3},{},{},{},{},{}",
        stats.mean_duration_micros,
        optional(stats.mean_first_result_micros),
        optional(stats.throughput),
        stats.mean_result_count,
        stats.replications,
        record.recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    line
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_default()
}
