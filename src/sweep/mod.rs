//! Enumeration state machine over the (query, mode, version) space
//!
//! The sweep visits cells in one fixed order:
//!
//! ```text
//! for query in 0..total_queries:
//!     VM  version 0, 1, .., total_versions-1
//!     DM  for end in 1..total_versions: for start in {0, 1}: if start != end
//!     VQ  once
//! ```
//!
//! Cells are never materialized as a collection. The state machine derives
//! the next cell from the current state and the two bounds, and a completed
//! cell is enough to rebuild the state (see [`SweepState::after`]). That is
//! what makes the sweep resumable from a one-line checkpoint.
//!
//! ## Example
//!
//! ```rust
//! use vqbench::sweep::{Bounds, Cell, Sweep};
//!
//! let cells: Vec<Cell> = Sweep::new(Bounds::new(1, 3)).collect();
//! assert_eq!(cells.len(), 7);
//! assert_eq!(cells[3], Cell::dm(0, 0, 1));
//! assert_eq!(cells[6], Cell::vq(0));
//! ```

mod cell;

pub use cell::{Cell, Mode, VersionContext};

use crate::{Error, Result};

/// Fixed bounds of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Number of queries in the catalog
    pub total_queries: usize,
    /// Number of versions in the store
    pub total_versions: usize,
}

impl Bounds {
    /// Create sweep bounds.
    #[must_use]
    pub const fn new(total_queries: usize, total_versions: usize) -> Self {
        Self {
            total_queries,
            total_versions,
        }
    }

    /// Number of DM cells per query (`start != end`, `start` in {0, 1}).
    #[must_use]
    pub const fn delta_cells_per_query(&self) -> usize {
        if self.total_versions < 2 {
            0
        } else {
            2 * self.total_versions - 3
        }
    }

    /// Number of cells per query across all three modes.
    #[must_use]
    pub const fn cells_per_query(&self) -> usize {
        self.total_versions + self.delta_cells_per_query() + 1
    }

    /// Number of cells in the whole sweep.
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.total_queries * self.cells_per_query()
    }

    /// Zero-based position of `cell` in sweep order.
    ///
    /// Returns `None` for cells the sweep never emits under these bounds.
    #[must_use]
    pub fn ordinal(&self, cell: &Cell) -> Option<usize> {
        if cell.query >= self.total_queries || !cell.is_sweep_cell() {
            return None;
        }
        let base = cell.query * self.cells_per_query();
        let offset = match cell.context {
            VersionContext::PointInTime(version) => {
                if version >= self.total_versions {
                    return None;
                }
                version
            }
            VersionContext::Delta { start, end } => {
                if end >= self.total_versions {
                    return None;
                }
                // end == 1 holds a single pair (0, 1); every later end holds two.
                let before = if end == 1 { 0 } else { 1 + 2 * (end - 2) };
                let within = if end == 1 { 0 } else { start };
                self.total_versions + before + within
            }
            VersionContext::FullHistory => self.total_versions + self.delta_cells_per_query(),
        };
        Some(base + offset)
    }
}

/// Position of the sweep: the next cell to consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Version materialization of `query` at `version`.
    RunningVm {
        /// Query index
        query: usize,
        /// Version to materialize
        version: usize,
    },
    /// Delta materialization of `query` between `start` and `end`.
    RunningDm {
        /// Query index
        query: usize,
        /// Start version (oscillates between 0 and 1)
        start: usize,
        /// End version
        end: usize,
    },
    /// Full-history query of `query`.
    RunningVq {
        /// Query index
        query: usize,
    },
    /// Every cell has been visited.
    Done,
}

/// Outcome of one state machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Cell to measure, if this transition emits one
    pub emitted: Option<Cell>,
    /// State after the transition
    pub next: SweepState,
}

impl SweepState {
    /// Initial state of a fresh sweep.
    pub const START: Self = Self::RunningVm {
        query: 0,
        version: 0,
    };

    /// Apply one transition.
    ///
    /// Transitions that only change phase (VM to DM, DM to VQ, skipping a
    /// `start == end` pair) emit nothing.
    #[must_use]
    pub const fn step(self, bounds: Bounds) -> Step {
        match self {
            Self::RunningVm { query, version } => {
                if query >= bounds.total_queries {
                    Step::silent(Self::Done)
                } else if version >= bounds.total_versions {
                    Step::silent(Self::RunningDm {
                        query,
                        start: 0,
                        end: 1,
                    })
                } else {
                    Step::emit(Cell::vm(query, version), Self::RunningVm {
                        query,
                        version: version + 1,
                    })
                }
            }
            Self::RunningDm { query, start, end } => {
                if query >= bounds.total_queries {
                    Step::silent(Self::Done)
                } else if end >= bounds.total_versions {
                    Step::silent(Self::RunningVq { query })
                } else {
                    // end < total_versions, so the successor always exists
                    let next = match next_delta(query, start, end) {
                        Some(next) => next,
                        None => Self::RunningVq { query },
                    };
                    if start == end {
                        Step::silent(next)
                    } else {
                        Step::emit(Cell::dm(query, start, end), next)
                    }
                }
            }
            Self::RunningVq { query } => {
                if query >= bounds.total_queries {
                    Step::silent(Self::Done)
                } else {
                    Step::emit(Cell::vq(query), Self::RunningVm {
                        query: query + 1,
                        version: 0,
                    })
                }
            }
            Self::Done => Step::silent(Self::Done),
        }
    }

    /// State that follows a completed cell.
    ///
    /// Mirrors the emitting branch of [`SweepState::step`], so resuming after
    /// `cell` neither repeats it nor skips the cell after it. Returns `None`
    /// when the successor index does not fit in `usize`.
    #[must_use]
    pub const fn after(cell: &Cell) -> Option<Self> {
        match cell.context {
            VersionContext::PointInTime(version) => match version.checked_add(1) {
                Some(version) => Some(Self::RunningVm {
                    query: cell.query,
                    version,
                }),
                None => None,
            },
            VersionContext::Delta { start, end } => next_delta(cell.query, start, end),
            VersionContext::FullHistory => match cell.query.checked_add(1) {
                Some(query) => Some(Self::RunningVm { query, version: 0 }),
                None => None,
            },
        }
    }

    /// Whether the sweep has finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl Step {
    const fn emit(cell: Cell, next: SweepState) -> Self {
        Self {
            emitted: Some(cell),
            next,
        }
    }

    const fn silent(next: SweepState) -> Self {
        Self {
            emitted: None,
            next,
        }
    }
}

/// `start` alternates 0, 1 for each `end` before `end` moves on.
const fn next_delta(query: usize, start: usize, end: usize) -> Option<SweepState> {
    let start = (start + 1) % 2;
    let end = if start == 0 {
        match end.checked_add(1) {
            Some(end) => end,
            None => return None,
        }
    } else {
        end
    };
    Some(SweepState::RunningDm { query, start, end })
}

/// Iterator over the remaining cells of a sweep.
#[derive(Debug, Clone)]
pub struct Sweep {
    bounds: Bounds,
    state: SweepState,
    position: usize,
}

impl Sweep {
    /// Fresh sweep starting at the first cell.
    #[must_use]
    pub const fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            state: SweepState::START,
            position: 0,
        }
    }

    /// Sweep resuming right after `last_completed`.
    ///
    /// # Errors
    ///
    /// Returns `CorruptCheckpoint` if `last_completed` is not a cell of a
    /// sweep with these bounds (for instance a checkpoint left by a larger
    /// catalog), so a foreign checkpoint never restarts or skips the sweep.
    pub fn resume_after(bounds: Bounds, last_completed: &Cell) -> Result<Self> {
        let ordinal = bounds.ordinal(last_completed).ok_or_else(|| {
            Error::CorruptCheckpoint(format!(
                "{last_completed} is outside a sweep of {} queries x {} versions",
                bounds.total_queries, bounds.total_versions
            ))
        })?;
        let state = SweepState::after(last_completed).ok_or_else(|| {
            Error::CorruptCheckpoint(format!("{last_completed} has no successor"))
        })?;
        Ok(Self {
            bounds,
            state,
            position: ordinal + 1,
        })
    }

    /// Current state (the position of the next cell).
    #[must_use]
    pub const fn state(&self) -> SweepState {
        self.state
    }

    /// Cells emitted so far, counting those completed before a resume.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Cells not yet emitted.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bounds.total_cells().saturating_sub(self.position)
    }
}

impl Iterator for Sweep {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        loop {
            let Step { emitted, next } = self.state.step(self.bounds);
            self.state = next;
            if emitted.is_some() {
                self.position += 1;
                return emitted;
            }
            if next.is_done() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_queries_three_versions() {
        let cells: Vec<Cell> = Sweep::new(Bounds::new(2, 3)).collect();
        let expected_per_query = |q| {
            vec![
                Cell::vm(q, 0),
                Cell::vm(q, 1),
                Cell::vm(q, 2),
                Cell::dm(q, 0, 1),
                Cell::dm(q, 0, 2),
                Cell::dm(q, 1, 2),
                Cell::vq(q),
            ]
        };
        let mut expected = expected_per_query(0);
        expected.extend(expected_per_query(1));

        assert_eq!(cells, expected);
        assert_eq!(cells.len(), 14);
        assert_eq!(Bounds::new(2, 3).total_cells(), 14);
    }

    #[test]
    fn test_single_version_has_no_deltas() {
        let cells: Vec<Cell> = Sweep::new(Bounds::new(1, 1)).collect();
        assert_eq!(cells, vec![Cell::vm(0, 0), Cell::vq(0)]);
    }

    #[test]
    fn test_empty_store_still_runs_version_queries() {
        let cells: Vec<Cell> = Sweep::new(Bounds::new(2, 0)).collect();
        assert_eq!(cells, vec![Cell::vq(0), Cell::vq(1)]);
    }

    #[test]
    fn test_empty_catalog_is_done_immediately() {
        let mut sweep = Sweep::new(Bounds::new(0, 5));
        assert_eq!(sweep.next(), None);
        assert!(sweep.state().is_done());
    }

    #[test]
    fn test_degenerate_pair_is_skipped_silently() {
        let step = SweepState::RunningDm {
            query: 0,
            start: 1,
            end: 1,
        }
        .step(Bounds::new(1, 3));
        assert_eq!(step.emitted, None);
        assert_eq!(
            step.next,
            SweepState::RunningDm {
                query: 0,
                start: 0,
                end: 2
            }
        );
    }

    #[test]
    fn test_last_version_query_resolves_to_done() {
        let bounds = Bounds::new(2, 3);
        let step = SweepState::RunningVq { query: 1 }.step(bounds);
        assert_eq!(step.emitted, Some(Cell::vq(1)));
        assert_eq!(step.next.step(bounds).next, SweepState::Done);
    }

    #[test]
    fn test_after_matches_forward_stepping() {
        assert_eq!(
            SweepState::after(&Cell::vm(1, 4)).unwrap(),
            SweepState::RunningVm {
                query: 1,
                version: 5
            }
        );
        assert_eq!(
            SweepState::after(&Cell::dm(0, 0, 3)).unwrap(),
            SweepState::RunningDm {
                query: 0,
                start: 1,
                end: 3
            }
        );
        assert_eq!(
            SweepState::after(&Cell::dm(0, 1, 3)).unwrap(),
            SweepState::RunningDm {
                query: 0,
                start: 0,
                end: 4
            }
        );
        assert_eq!(
            SweepState::after(&Cell::vq(2)).unwrap(),
            SweepState::RunningVm {
                query: 3,
                version: 0
            }
        );
    }

    #[test]
    fn test_ordinal_follows_sweep_order() {
        let bounds = Bounds::new(3, 5);
        for (position, cell) in Sweep::new(bounds).enumerate() {
            assert_eq!(bounds.ordinal(&cell), Some(position), "cell {cell}");
        }
        assert_eq!(bounds.ordinal(&Cell::vm(3, 0)), None);
        assert_eq!(bounds.ordinal(&Cell::dm(0, 1, 1)), None);
        assert_eq!(bounds.ordinal(&Cell::dm(0, 0, 5)), None);
    }

    #[test]
    fn test_after_at_index_limit_has_no_successor() {
        assert_eq!(SweepState::after(&Cell::vq(usize::MAX)), None);
        assert_eq!(SweepState::after(&Cell::vm(0, usize::MAX)), None);
        assert_eq!(SweepState::after(&Cell::dm(0, 1, usize::MAX)), None);
        assert!(SweepState::after(&Cell::dm(0, 0, usize::MAX)).is_some());
    }

    #[test]
    fn test_resume_rejects_cells_outside_bounds() {
        let bounds = Bounds::new(2, 3);
        for last in [
            Cell::vq(usize::MAX),
            Cell::dm(0, 1, usize::MAX),
            Cell::vq(40),
            Cell::vm(0, 3),
            Cell::dm(1, 0, 3),
        ] {
            assert!(
                matches!(
                    Sweep::resume_after(bounds, &last),
                    Err(Error::CorruptCheckpoint(_))
                ),
                "{last} should not resume"
            );
        }
    }

    #[test]
    fn test_resume_tracks_position() {
        let bounds = Bounds::new(2, 3);
        let mut sweep = Sweep::resume_after(bounds, &Cell::dm(0, 0, 2)).unwrap();
        assert_eq!(sweep.position(), 5);
        assert_eq!(sweep.remaining(), 9);

        assert_eq!(sweep.next(), Some(Cell::dm(0, 1, 2)));
        assert_eq!(sweep.position(), 6);
        assert_eq!(sweep.by_ref().count(), 8);
        assert_eq!(sweep.remaining(), 0);
    }
}
