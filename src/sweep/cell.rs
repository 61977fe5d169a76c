//! Cell - one (query, mode, version parameters) unit of measurement

use std::fmt;

use serde::{Deserialize, Serialize};

/// Evaluation mode of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    /// Version materialization: the data as it existed at one version.
    #[serde(rename = "VM")]
    VersionMaterialization,
    /// Delta materialization: facts present at a start version but absent at an end version.
    #[serde(rename = "DM")]
    DeltaMaterialization,
    /// Version query: the whole history, with the version as an output variable.
    #[serde(rename = "VQ")]
    VersionQuery,
}

impl Mode {
    /// All modes, in sweep order.
    pub const ALL: [Self; 3] = [
        Self::VersionMaterialization,
        Self::DeltaMaterialization,
        Self::VersionQuery,
    ];

    /// Short tag used in checkpoints and output file names.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::VersionMaterialization => "VM",
            Self::DeltaMaterialization => "DM",
            Self::VersionQuery => "VQ",
        }
    }

    /// Parse a checkpoint tag (`"VM"`, `"DM"` or `"VQ"`).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "VM" => Some(Self::VersionMaterialization),
            "DM" => Some(Self::DeltaMaterialization),
            "VQ" => Some(Self::VersionQuery),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Version scope a query is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionContext {
    /// A single version.
    PointInTime(usize),
    /// Present at `start`, absent at `end`.
    Delta {
        /// Version the facts must be present in
        start: usize,
        /// Version the facts must be absent from
        end: usize,
    },
    /// Every version; the version is left unbound.
    FullHistory,
}

impl VersionContext {
    /// Mode this context belongs to.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::PointInTime(_) => Mode::VersionMaterialization,
            Self::Delta { .. } => Mode::DeltaMaterialization,
            Self::FullHistory => Mode::VersionQuery,
        }
    }

    /// Version parameters in checkpoint order (one for VM, two for DM, none for VQ).
    #[must_use]
    pub fn parameters(&self) -> Vec<usize> {
        match *self {
            Self::PointInTime(version) => vec![version],
            Self::Delta { start, end } => vec![start, end],
            Self::FullHistory => Vec::new(),
        }
    }
}

impl fmt::Display for VersionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointInTime(version) => write!(f, "version {version}"),
            Self::Delta { start, end } => write!(f, "delta {start}->{end}"),
            Self::FullHistory => f.write_str("all versions"),
        }
    }
}

/// One unit of work: a query index paired with a version context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Index into the query catalog
    pub query: usize,
    /// Version scope for this measurement
    pub context: VersionContext,
}

impl Cell {
    /// Version-materialization cell.
    #[must_use]
    pub const fn vm(query: usize, version: usize) -> Self {
        Self {
            query,
            context: VersionContext::PointInTime(version),
        }
    }

    /// Delta-materialization cell.
    #[must_use]
    pub const fn dm(query: usize, start: usize, end: usize) -> Self {
        Self {
            query,
            context: VersionContext::Delta { start, end },
        }
    }

    /// Version-query cell.
    #[must_use]
    pub const fn vq(query: usize) -> Self {
        Self {
            query,
            context: VersionContext::FullHistory,
        }
    }

    /// Mode of this cell.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.context.mode()
    }

    /// Whether the sweep can ever emit this cell.
    ///
    /// Delta cells only start at version 0 or 1 and always move forward.
    #[must_use]
    pub const fn is_sweep_cell(&self) -> bool {
        match self.context {
            VersionContext::Delta { start, end } => start <= 1 && start < end,
            _ => true,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} query {} ({})", self.mode(), self.query, self.context)
    }
}
