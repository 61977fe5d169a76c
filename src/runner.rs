//! Sweep driver - evaluate, record, checkpoint, repeat
//!
//! ```text
//! checkpoint.load ─> Sweep::resume_after ─> next cell
//!        ▲                                     │
//!        │                   catalog.query + measurer.measure
//!        │                                     │
//!  checkpoint.save <──────── sink.record <─────┘
//! ```
//!
//! Exactly one cell is in flight. The checkpoint only advances after the
//! cell's row has been written, so an interrupted cell is measured again from
//! scratch on the next run. A cell whose replications all fail stops the
//! run without writing a row and without moving the checkpoint.

use tracing::{debug, error, info};

use crate::catalog::Catalog;
use crate::checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
use crate::config::Experiment;
use crate::engine::{CommandEngine, CommandStore, FixedStore, QueryEngine, VersionedStore};
use crate::measure::{CellStatistics, Measurer};
use crate::sink::{CellRecord, CsvSink, ResultSink};
use crate::sweep::{Bounds, Cell, Mode, Sweep};
use crate::{Error, Result};

/// Outcome of a (possibly resumed) sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Sweep bounds
    pub bounds: Bounds,
    /// Last cell completed by an earlier run, if resuming
    pub resumed_after: Option<Cell>,
    /// Cells completed by this run
    pub completed: usize,
}

/// Position of a sweep as recorded by its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStatus {
    /// Sweep bounds
    pub bounds: Bounds,
    /// Last completed cell
    pub last: Option<Cell>,
    /// Next cell to run, `None` once the sweep is finished
    pub next: Option<Cell>,
    /// Cells left to run
    pub remaining: usize,
}

/// Drives one sweep over a catalog.
pub struct Runner<E, C, S> {
    catalog: Catalog,
    measurer: Measurer<E>,
    checkpoints: C,
    sink: S,
    limit: Option<usize>,
}

impl<E, C, S> Runner<E, C, S>
where
    E: QueryEngine,
    C: CheckpointStore,
    S: ResultSink,
{
    /// Assemble a runner.
    #[must_use]
    pub fn new(catalog: Catalog, measurer: Measurer<E>, checkpoints: C, sink: S) -> Self {
        Self {
            catalog,
            measurer,
            checkpoints,
            sink,
            limit: None,
        }
    }

    /// Cap the result count of every generated query.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// The catalog being swept.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The measurer (and through it, the engine).
    #[must_use]
    pub const fn measurer(&self) -> &Measurer<E> {
        &self.measurer
    }

    /// The checkpoint store.
    #[must_use]
    pub const fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    /// The result sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Sweep bounds for a store holding `total_versions` versions.
    #[must_use]
    pub fn bounds(&self, total_versions: usize) -> Bounds {
        Bounds::new(self.catalog.len(), total_versions)
    }

    /// Where the sweep stands according to the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `CorruptCheckpoint` if the checkpoint cannot be decoded or
    /// names a cell outside `bounds`.
    pub fn status(&self, bounds: Bounds) -> Result<SweepStatus> {
        let checkpoint = self.checkpoints.load()?;
        let sweep = resume(bounds, checkpoint.as_ref())?;
        let last = checkpoint.map(|c| c.last());
        let remaining = sweep.remaining();
        let next = sweep.clone().next();
        Ok(SweepStatus {
            bounds,
            last,
            next,
            remaining,
        })
    }

    /// Measure one cell.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` for a cell outside the catalog and
    /// `AllReplicationsFailed` if the engine never succeeded.
    pub async fn evaluate(&self, cell: &Cell) -> Result<CellStatistics> {
        let query = self.catalog.query(cell.query, cell.context, self.limit)?;
        debug!(%cell, %query, "generated query");
        self.measurer.measure(cell, &query).await
    }

    /// Run the sweep from the checkpoint (or the beginning) to completion.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error: corrupt checkpoint, a cell whose
    /// replications all failed, or an output write failure.
    pub async fn run(&mut self, bounds: Bounds) -> Result<RunSummary> {
        let checkpoint = self.checkpoints.load()?;
        let mut sweep = resume(bounds, checkpoint.as_ref())?;
        let resumed_after = checkpoint.map(|c| c.last());
        match resumed_after {
            Some(last) => info!(%last, "resuming after checkpoint"),
            None => info!("starting fresh sweep"),
        }
        info!(
            queries = bounds.total_queries,
            versions = bounds.total_versions,
            cells = bounds.total_cells(),
            replications = self.measurer.options().replications,
            "sweep bounds"
        );

        let mut completed = 0;
        let mut previous = resumed_after;
        while let Some(cell) = sweep.next() {
            announce(previous.as_ref(), &cell);

            let stats = match self.evaluate(&cell).await {
                Ok(stats) => stats,
                Err(e) => {
                    error!(%cell, error = %e, "cell failed; checkpoint left at previous cell");
                    return Err(e);
                }
            };

            info!(
                "cell {}/{}: {cell}: {:.0}us mean, {} results, {}/{} replications",
                sweep.position(),
                bounds.total_cells(),
                stats.mean_duration_micros,
                stats.mean_result_count,
                stats.replications,
                self.measurer.options().replications,
            );

            self.sink.record(&CellRecord::new(cell, stats))?;
            self.checkpoints.save(&Checkpoint::new(cell))?;
            completed += 1;
            previous = Some(cell);
        }

        info!(completed, "sweep complete");
        Ok(RunSummary {
            bounds,
            resumed_after,
            completed,
        })
    }
}

fn resume(bounds: Bounds, checkpoint: Option<&Checkpoint>) -> Result<Sweep> {
    checkpoint.map_or_else(|| Ok(Sweep::new(bounds)), |c| c.resume(bounds))
}

/// Log query and phase boundaries.
fn announce(previous: Option<&Cell>, cell: &Cell) {
    let new_query = previous.map_or(true, |p| p.query != cell.query);
    if new_query {
        info!(query = cell.query, "query start");
    }
    if new_query || previous.map(Cell::mode) != Some(cell.mode()) {
        let phase = match cell.mode() {
            Mode::VersionMaterialization => "version materialization",
            Mode::DeltaMaterialization => "delta materialization",
            Mode::VersionQuery => "version query",
        };
        info!(query = cell.query, phase, "phase start");
    }
}

/// Runner wired to the experiment's files and external commands.
pub type ExperimentRunner = Runner<CommandEngine, FileCheckpointStore, CsvSink>;

/// Build the runner for `experiment` and count the store's versions.
///
/// # Errors
///
/// Returns `InvalidConfig`, `MalformedCatalog` or a store error.
pub async fn prepare(experiment: &Experiment) -> Result<(ExperimentRunner, Bounds)> {
    let config = experiment.config();
    config.validate()?;

    let catalog = Catalog::load(experiment.catalog_path())?;
    let store_path = experiment.store_path();
    let total_versions = match (config.store.versions, &config.store.program) {
        (Some(versions), _) => FixedStore(versions).version_count().await?,
        (None, Some(program)) => {
            CommandStore::new(program, &config.store.args, &store_path)
                .version_count()
                .await?
        }
        (None, None) => {
            return Err(Error::InvalidConfig(
                "no source for the store's version count".to_string(),
            ))
        }
    };

    let engine = CommandEngine::new(&config.engine.program, &config.engine.args, &store_path);
    let runner = Runner::new(
        catalog,
        Measurer::new(engine, config.measure_options()),
        FileCheckpointStore::new(experiment.checkpoint_path()),
        CsvSink::new(experiment.results_dir(), config.export_arrivals),
    )
    .with_limit(config.limit);
    let bounds = runner.bounds(total_versions);
    Ok((runner, bounds))
}

/// Run (or resume) the whole experiment.
///
/// # Errors
///
/// See [`prepare`] and [`Runner::run`].
pub async fn run_experiment(experiment: &Experiment) -> Result<RunSummary> {
    let (mut runner, bounds) = prepare(experiment).await?;
    runner.run(bounds).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QueryDefinition;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::engine::{Replication, ScriptedEngine};
    use crate::measure::MeasureOptions;
    use crate::sink::MemorySink;

    fn catalog(queries: usize) -> Catalog {
        Catalog::new(
            (0..queries)
                .map(|q| QueryDefinition::new(Vec::new(), vec![format!("?s <p{q}> ?o .")]))
                .collect(),
        )
    }

    fn runner(
        queries: usize,
        engine: ScriptedEngine,
        checkpoints: MemoryCheckpointStore,
    ) -> Runner<ScriptedEngine, MemoryCheckpointStore, MemorySink> {
        let options = MeasureOptions {
            replications: 1,
            ..MeasureOptions::default()
        };
        Runner::new(
            catalog(queries),
            Measurer::new(engine, options),
            checkpoints,
            MemorySink::new(),
        )
    }

    #[tokio::test]
    async fn test_full_run_two_queries_three_versions() {
        let mut runner = runner(2, ScriptedEngine::constant(1), MemoryCheckpointStore::new());
        let summary = runner.run(runner.bounds(3)).await.unwrap();

        assert_eq!(summary.completed, 14);
        assert_eq!(summary.resumed_after, None);
        assert_eq!(runner.sink().records_for(Mode::VersionMaterialization).count(), 6);
        assert_eq!(runner.sink().records_for(Mode::DeltaMaterialization).count(), 6);
        assert_eq!(runner.sink().records_for(Mode::VersionQuery).count(), 2);
        assert_eq!(runner.checkpoints().record(), Some("VQ 1"));
    }

    #[tokio::test]
    async fn test_resume_skips_completed_cells() {
        let mut runner = runner(
            1,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record("DM 0 0 2"),
        );
        let summary = runner.run(runner.bounds(3)).await.unwrap();

        assert_eq!(summary.resumed_after, Some(Cell::dm(0, 0, 2)));
        assert_eq!(runner.sink().cells(), vec![Cell::dm(0, 1, 2), Cell::vq(0)]);
    }

    #[tokio::test]
    async fn test_all_failed_cell_stops_without_row_or_checkpoint() {
        // VM 0 0 succeeds, VM 0 1 is rejected
        let engine = ScriptedEngine::new(vec![Replication::Results(3), Replication::Reject]);
        let mut runner = runner(1, engine, MemoryCheckpointStore::new());

        let err = runner.run(runner.bounds(3)).await.unwrap_err();
        assert!(matches!(err, Error::AllReplicationsFailed { query: 0, .. }));
        assert_eq!(runner.sink().cells(), vec![Cell::vm(0, 0)]);
        assert_eq!(runner.checkpoints().record(), Some("VM 0 0"));
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_fatal() {
        let mut runner = runner(
            1,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record("garbage"),
        );
        let err = runner.run(runner.bounds(3)).await.unwrap_err();

        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        assert_eq!(runner.measurer().engine().calls(), 0);
    }

    #[tokio::test]
    async fn test_limit_reaches_engine() {
        let mut runner = runner(1, ScriptedEngine::constant(1), MemoryCheckpointStore::new())
            .with_limit(Some(25));
        runner.run(runner.bounds(1)).await.unwrap();

        let issued = runner.measurer().engine().issued();
        assert_eq!(issued.len(), 2);
        assert!(issued.iter().all(|q| q.ends_with(" LIMIT 25")));
        assert!(issued[0].contains("GRAPH <version:0>"));
        assert!(issued[1].contains("GRAPH ?version"));
    }

    #[test]
    fn test_status() {
        let runner = runner(
            2,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record("VM 1 2"),
        );
        let status = runner.status(runner.bounds(3)).unwrap();

        assert_eq!(status.last, Some(Cell::vm(1, 2)));
        assert_eq!(status.next, Some(Cell::dm(1, 0, 1)));
        assert_eq!(status.remaining, 4);
    }

    #[tokio::test]
    async fn test_foreign_checkpoint_is_fatal() {
        // Left by a sweep over a larger catalog
        let mut runner = runner(
            2,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record("VQ 40"),
        );
        let bounds = runner.bounds(3);

        assert!(matches!(runner.status(bounds), Err(Error::CorruptCheckpoint(_))));
        let err = runner.run(bounds).await.unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        assert_eq!(runner.measurer().engine().calls(), 0);
        assert_eq!(runner.checkpoints().record(), Some("VQ 40"));
    }

    #[tokio::test]
    async fn test_index_limit_checkpoint_does_not_restart() {
        let record = format!("VQ {}", usize::MAX);
        let mut runner = runner(
            1,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record(record.as_str()),
        );

        let err = runner.run(runner.bounds(3)).await.unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        assert!(runner.sink().cells().is_empty());
        assert_eq!(runner.checkpoints().record(), Some(record.as_str()));
    }

    #[test]
    fn test_status_finished() {
        let runner = runner(
            2,
            ScriptedEngine::constant(1),
            MemoryCheckpointStore::with_record("VQ 1"),
        );
        let status = runner.status(runner.bounds(3)).unwrap();

        assert_eq!(status.next, None);
        assert_eq!(status.remaining, 0);
    }
}
